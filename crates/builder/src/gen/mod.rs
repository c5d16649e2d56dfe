//! # Generators
//!
//! A generator receives one [`BuildUnit`] per package and turns them into
//! artifacts: either directly (the native `qobs` builder) or by writing a
//! build file for another tool and invoking it.

pub mod native;
pub mod ninja;
pub mod vs2022;

use crate::cc::{self, Toolchain};
use crate::error::{BuilderError, BuilderErrorExt, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use strum_macros::{Display, EnumString, VariantNames};
use tracing::{debug, warn};

pub use native::QobsBuilder;
pub use ninja::NinjaGenerator;
pub use vs2022::Vs2022Generator;

/// Directory (inside the build directory) holding object files.
pub const OBJECT_DIR: &str = "QobsFiles";

/// The available generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, VariantNames)]
#[strum(serialize_all = "lowercase")]
pub enum GeneratorKind {
    /// Built-in incremental parallel builder.
    #[default]
    Qobs,
    /// `build.ninja` + `ninja`.
    Ninja,
    /// Visual Studio 2022 solution + MSBuild.
    Vs2022,
}

impl GeneratorKind {
    /// Creates a generator for a build with the given profile and job limit.
    #[must_use]
    pub fn create(self, profile: &str, jobs: Option<usize>) -> Box<dyn Generator> {
        match self {
            Self::Qobs => Box::new(QobsBuilder::new(jobs)),
            Self::Ninja => Box::new(NinjaGenerator::default()),
            Self::Vs2022 => Box::new(Vs2022Generator::new(profile)),
        }
    }
}

/// One source file and the object it compiles to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub src: PathBuf,
    /// Relative to the build directory.
    pub obj: PathBuf,
    pub is_cxx: bool,
}

/// A library or executable to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildUnit {
    /// Package name, unique within a build.
    pub name: String,
    /// Artifact file name, relative to the output directory.
    pub output: String,
    pub basedir: PathBuf,
    pub is_lib: bool,
    pub sources: Vec<SourceFile>,
    /// Names of the units linked into this one, transitively.
    pub dependencies: Vec<String>,
    pub cflags: Vec<String>,
    pub ldflags: Vec<String>,
}

impl BuildUnit {
    /// Creates a unit, placing objects at `QobsFiles/<name>.dir/<relative source>.obj`.
    #[must_use]
    pub fn new(name: impl Into<String>, output: impl Into<String>, basedir: impl Into<PathBuf>, is_lib: bool) -> Self {
        Self {
            name: name.into(),
            output: output.into(),
            basedir: basedir.into(),
            is_lib,
            sources: Vec::new(),
            dependencies: Vec::new(),
            cflags: Vec::new(),
            ldflags: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_sources(mut self, sources: impl IntoIterator<Item = PathBuf>) -> Self {
        self.sources = sources
            .into_iter()
            .map(|src| SourceFile { obj: object_path(&self.name, &self.basedir, &src), is_cxx: cc::is_cxx_source(&src), src })
            .collect();
        self
    }

    #[must_use]
    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    #[must_use]
    pub fn with_flags(mut self, cflags: Vec<String>, ldflags: Vec<String>) -> Self {
        self.cflags = cflags;
        self.ldflags = ldflags;
        self
    }

    /// Whether any source is C++, so the C++ driver links.
    #[must_use]
    pub fn has_cxx(&self) -> bool {
        self.sources.iter().any(|s| s.is_cxx)
    }
}

/// `QobsFiles/<target>.dir/<src relative to basedir>.obj`
#[must_use]
pub fn object_path(target: &str, basedir: &Path, src: &Path) -> PathBuf {
    let relative = src.strip_prefix(basedir).map(Path::to_path_buf).unwrap_or_else(|_| {
        warn!(src = %src.display(), basedir = %basedir.display(), "source file is outside of its package directory");
        src.file_name().map(PathBuf::from).unwrap_or_default()
    });
    let mut obj = Path::new(OBJECT_DIR).join(format!("{target}.dir")).join(relative).into_os_string();
    obj.push(".obj");
    PathBuf::from(obj)
}

/// Turns build units into artifacts.
pub trait Generator {
    fn set_toolchain(&mut self, toolchain: Toolchain);

    fn add_target(&mut self, unit: BuildUnit);

    /// Main file this generator writes into the build directory, if any.
    fn build_file(&self) -> Option<String>;

    /// Writes the build file(s).
    ///
    /// # Errors
    /// Returns an error if a file cannot be written.
    fn generate(&self, build_dir: &Path) -> Result<()>;

    /// Runs the build.
    ///
    /// # Errors
    /// Returns an error if the build fails.
    fn invoke(&mut self, build_dir: &Path) -> Result<()>;

    /// Directory the artifacts land in.
    fn output_dir(&self, build_dir: &Path) -> PathBuf {
        build_dir.to_path_buf()
    }
}

/// Runs a build tool with inherited stdio and fails on a non-zero exit.
pub(crate) fn run_tool(mut cmd: Command) -> Result<()> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    debug!(command = ?cmd, "running build tool");
    let status = cmd.status().context(format!("Failed to run `{program}`"))?;
    if !status.success() {
        return Err(BuilderError::command_failed(program, status.code()));
    }
    Ok(())
}
