//! # qobs builder
//!
//! Everything behind the `qobs` command: `Qobs.toml` parsing with features,
//! conditional sections and templates, dependency fetching and resolution,
//! toolchain detection and the build generators.
//!
//! ```rust,ignore
//! use qobs_builder::{BuildOptions, Builder};
//!
//! let builder = Builder::in_directory(".", &[], true)?;
//! let artifact = builder.build(&BuildOptions::default())?;
//! ```

mod builder;
pub mod cc;
pub mod config;
mod error;
pub mod expr;
pub mod fetch;
pub mod files;
pub mod r#gen;
pub mod graph;

pub use builder::{BUILD_DIR, BuildOptions, Builder, DEPS_DIR};
pub use cc::{CompilerFlavor, Toolchain};
pub use config::{ConfigEnv, Dependency, MANIFEST_FILENAME, Manifest};
pub use error::{BuilderError, BuilderErrorExt, Result};
pub use r#gen::{BuildUnit, Generator, GeneratorKind};
pub use graph::{Graph, Package};
