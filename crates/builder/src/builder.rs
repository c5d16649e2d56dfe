//! # Builder
//!
//! Ties everything together: parses the root manifest, resolves the graph,
//! turns every package into a [`BuildUnit`] and hands the units to a
//! [`Generator`].

use crate::cc::Toolchain;
use crate::config::{ConfigEnv, MANIFEST_FILENAME, Manifest};
use crate::error::{BuilderError, BuilderErrorExt, Result};
use crate::files;
use crate::r#gen::{self, BuildUnit, Generator, GeneratorKind};
use crate::graph::{self, Graph, Package};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Directory (inside the package) that receives all build output.
pub const BUILD_DIR: &str = "build";
/// Directory (inside [`BUILD_DIR`]) remote dependencies are fetched into.
pub const DEPS_DIR: &str = "_deps";

/// How to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub profile: String,
    pub generator: GeneratorKind,
    /// Parallel jobs for the native builder. `None` uses every core.
    pub jobs: Option<usize>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { profile: "debug".to_owned(), generator: GeneratorKind::default(), jobs: None }
    }
}

/// A package ready to be built.
#[derive(Debug, Clone)]
pub struct Builder {
    root: Package,
    env: ConfigEnv,
}

impl Builder {
    /// Loads the package in `path` with the host environment.
    ///
    /// # Errors
    /// Returns an error if `Qobs.toml` is missing or invalid.
    pub fn in_directory(path: impl AsRef<Path>, features: &[String], default_features: bool) -> Result<Self> {
        let dir = absolute_dir(path.as_ref())?;
        let env = ConfigEnv::new(&dir);
        Self::with_env(dir, env, features, default_features)
    }

    /// Loads the package in `path`, evaluating the manifest in `env`.
    ///
    /// # Errors
    /// Returns an error if `Qobs.toml` is missing or invalid.
    pub fn with_env(path: impl AsRef<Path>, env: ConfigEnv, features: &[String], default_features: bool) -> Result<Self> {
        let dir = absolute_dir(path.as_ref())?;
        let env = env.rebase(&dir);
        let requested: BTreeSet<String> = features.iter().filter(|f| !f.is_empty()).cloned().collect();
        let manifest = Manifest::from_file(dir.join(MANIFEST_FILENAME), &env, &requested, default_features)?;
        debug!(package = %manifest.package.name, features = ?manifest.enabled_features, "loaded root manifest");

        let root = Package { name: manifest.package.name.clone(), path: dir, manifest, is_root: true };
        Ok(Self { root, env })
    }

    #[must_use]
    pub const fn root(&self) -> &Package {
        &self.root
    }

    #[must_use]
    pub fn build_dir(&self) -> PathBuf {
        self.root.path.join(BUILD_DIR)
    }

    /// Compiler flags of `profile`, as declared by the root package.
    ///
    /// # Errors
    /// Returns an error for an unknown profile.
    pub fn profile_flags(&self, profile: &str) -> Result<Vec<String>> {
        let Some(section) = self.root.manifest.profile.get(profile) else {
            return Err(BuilderError::manifest(format!(
                "unknown profile `{profile}`, known profiles: {}",
                self.root.manifest.profiles().join(", ")
            )));
        };
        Ok(section.cflags())
    }

    /// Resolves dependencies into `build/_deps`.
    ///
    /// # Errors
    /// Returns an error if a dependency cannot be fetched or parsed.
    pub fn resolve(&self) -> Result<Graph> {
        let deps_dir = self.build_dir().join(DEPS_DIR);
        fs::create_dir_all(&deps_dir).context(format!("Creating {}", deps_dir.display()))?;
        graph::resolve(self.root.clone(), &self.env, &deps_dir)
    }

    /// Runs build scripts and computes the build units of `graph`.
    ///
    /// Header-only packages run their build script but produce no unit.
    ///
    /// # Errors
    /// Returns an error for a failing build script, an invalid glob or a
    /// dependency that is neither a library nor header-only.
    pub fn units(&self, graph: &Graph, profile: &str) -> Result<Vec<BuildUnit>> {
        let profile_flags = self.profile_flags(profile)?;

        for package in graph.iter() {
            package.manifest.run_build_script(&self.env.rebase(&package.path))?;
        }

        let mut include_dirs: BTreeMap<&str, Vec<PathBuf>> = BTreeMap::new();
        for package in graph.iter() {
            let dirs = files::collect_include_dirs(&package.path, &package.manifest.target.headers)
                .context(format!("Collecting headers of `{}`", package.name))?;
            include_dirs.insert(&package.name, dirs);
        }

        let mut units = Vec::new();
        for package in graph.iter() {
            if package.manifest.is_header_only() {
                debug!(package = %package.name, "header-only, nothing to build");
                continue;
            }
            let target = &package.manifest.target;

            let sources = files::collect_sources(&package.path, &target.sources)
                .context(format!("Collecting sources of `{}`", package.name))?;
            if sources.is_empty() {
                info!(package = %package.name, "package has no source files");
            }

            let mut cflags = profile_flags.clone();
            cflags.extend(target.cflags.iter().cloned());
            let own = include_dirs.get(package.name.as_str()).into_iter().flatten();
            let direct = graph.direct_dependencies(&package.name)?;
            let from_deps = direct.iter().filter_map(|dep| include_dirs.get(dep.name.as_str())).flatten();
            cflags.extend(own.chain(from_deps).map(|dir| format!("-I{}", dir.display())));
            cflags.extend(target.defines.iter().map(|(name, value)| {
                if value.is_empty() { format!("-D{name}") } else { format!("-D{name}={value}") }
            }));

            let transitive = graph.transitive_dependencies(&package.name)?;
            let mut dependencies = Vec::new();
            let mut ldflags: Vec<String> = Vec::new();
            for link in target.links.iter().chain(transitive.iter().flat_map(|dep| &dep.manifest.target.links)) {
                let flag = format!("-l{link}");
                if !ldflags.contains(&flag) {
                    ldflags.push(flag);
                }
            }
            for dep in transitive {
                if dep.manifest.is_header_only() {
                    continue;
                }
                if !dep.manifest.target.lib {
                    return Err(BuilderError::graph(format!(
                        "dependency `{}` of `{}` is not a library, set `lib` or `header-only` in its [target]",
                        dep.name, package.name
                    )));
                }
                dependencies.push(dep.name.clone());
            }

            let unit = BuildUnit::new(
                package.name.clone(),
                package.output_name(&self.env.target_os),
                package.path.clone(),
                target.lib,
            )
            .with_sources(sources)
            .with_dependencies(dependencies)
            .with_flags(cflags, ldflags);
            debug!(target = %unit.name, sources = unit.sources.len(), cflags = ?unit.cflags, ldflags = ?unit.ldflags, "build unit");
            units.push(unit);
        }
        Ok(units)
    }

    /// Builds the package and its dependencies.
    ///
    /// Returns the path of the root package's artifact.
    ///
    /// # Errors
    /// Returns an error if any step of the build fails.
    pub fn build(&self, options: &BuildOptions) -> Result<PathBuf> {
        let build_dir = self.build_dir();
        fs::create_dir_all(&build_dir).context(format!("Creating {}", build_dir.display()))?;
        self.profile_flags(&options.profile)?;

        let graph = self.resolve()?;
        let units = self.units(&graph, &options.profile)?;

        let mut generator = options.generator.create(&options.profile, options.jobs);
        let toolchain = match options.generator {
            GeneratorKind::Vs2022 => Toolchain::default(),
            GeneratorKind::Qobs | GeneratorKind::Ninja => Toolchain::detect()?,
        };
        generator.set_toolchain(toolchain);
        for unit in units {
            generator.add_target(unit);
        }

        info!(package = %self.root.name, generator = %options.generator, profile = %options.profile, "building");
        generator.generate(&build_dir)?;
        generator.invoke(&build_dir)?;

        Ok(generator.output_dir(&build_dir).join(self.root.output_name(&self.env.target_os)))
    }

    /// Builds the package, then runs it with `args`.
    ///
    /// # Errors
    /// Returns an error for a library package, a failed build, or a
    /// non-zero exit of the program.
    pub fn build_and_run(&self, args: &[String], options: &BuildOptions) -> Result<()> {
        if self.root.manifest.target.lib {
            return Err(BuilderError::CantRunLibrary { context: None });
        }
        let artifact = self.build(options)?;

        info!(program = %artifact.display(), ?args, "running");
        let mut cmd = Command::new(&artifact);
        cmd.args(args);
        r#gen::run_tool(cmd)
    }
}

fn absolute_dir(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path).context(format!("Resolving {}", path.display()))?;
    Ok(files::clean_path(&absolute))
}
