//! # Build graph
//!
//! Resolution runs in two passes:
//!
//! 1. Breadth-first discovery. Every dependency is fetched (or found in place)
//!    and its manifest parsed with no features.
//! 2. Feature fixpoint. Each package is re-parsed with the union of what its
//!    parents request until nothing changes. A re-parse can add dependencies,
//!    which go through pass 1 before the next round.

use crate::config::{ConfigEnv, Dependency, MANIFEST_FILENAME, Manifest};
use crate::error::{BuilderError, BuilderErrorExt, Result};
use crate::fetch;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Upper bound on feature fixpoint rounds.
pub const MAX_FEATURE_PASSES: usize = 64;

/// A package in the build graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    /// Name the package is known by in the graph: the dependency key, or the
    /// package name for the root.
    pub name: String,
    pub path: PathBuf,
    pub manifest: Manifest,
    pub is_root: bool,
}

impl Package {
    /// Artifact file name: `libfoo.a`/`foo.lib` for libraries, `foo`/`foo.exe` otherwise.
    #[must_use]
    pub fn output_name(&self, target_os: &str) -> String {
        let name = &self.manifest.package.name;
        let windows = target_os == "windows";
        match (self.manifest.target.lib, windows) {
            (true, true) => format!("{name}.lib"),
            (true, false) => format!("lib{name}.a"),
            (false, true) => format!("{name}.exe"),
            (false, false) => name.clone(),
        }
    }

    /// Whether this package produces something to link against.
    #[must_use]
    pub const fn has_artifact(&self) -> bool {
        !self.manifest.target.header_only
    }
}

/// Resolved packages, keyed by graph name.
#[derive(Debug, Clone)]
pub struct Graph {
    packages: BTreeMap<String, Package>,
    root: String,
}

impl Graph {
    #[must_use]
    pub fn root(&self) -> &Package {
        &self.packages[&self.root]
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    #[must_use]
    pub const fn packages(&self) -> &BTreeMap<String, Package> {
        &self.packages
    }

    pub fn iter(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Direct dependencies of `name`.
    ///
    /// # Errors
    /// Returns an error if a dependency is missing from the graph.
    pub fn direct_dependencies(&self, name: &str) -> Result<Vec<&Package>> {
        let Some(package) = self.packages.get(name) else {
            return Err(BuilderError::graph(format!("package `{name}` is not in the graph")));
        };
        package
            .manifest
            .dependencies
            .keys()
            .map(|dep| {
                self.packages.get(dep).ok_or_else(|| {
                    BuilderError::graph(format!("resolved dependency `{dep}` of `{name}` not found"))
                })
            })
            .collect()
    }

    /// All dependencies reachable from `name`, depth first, each listed once.
    ///
    /// # Errors
    /// Returns an error if a dependency is missing from the graph.
    pub fn transitive_dependencies(&self, name: &str) -> Result<Vec<&Package>> {
        let mut seen = BTreeSet::from([name.to_owned()]);
        let mut out = Vec::new();
        let mut stack: Vec<&Package> = self.direct_dependencies(name)?.into_iter().rev().collect();
        while let Some(package) = stack.pop() {
            if !seen.insert(package.name.clone()) {
                continue;
            }
            out.push(package);
            stack.extend(self.direct_dependencies(&package.name)?.into_iter().rev());
        }
        Ok(out)
    }
}

/// Resolves the dependency graph below `root`.
///
/// `deps_dir` receives remote dependencies as `<deps_dir>/<name>`.
///
/// # Errors
/// Fails when a dependency cannot be fetched or parsed, or when feature
/// resolution does not settle within [`MAX_FEATURE_PASSES`] rounds.
pub fn resolve(root: Package, root_env: &ConfigEnv, deps_dir: &Path) -> Result<Graph> {
    let root_name = root.name.clone();
    let mut resolver = Resolver {
        env: root_env.clone(),
        deps_dir: deps_dir.to_path_buf(),
        specs: BTreeMap::new(),
        root: root_name.clone(),
        packages: BTreeMap::from([(root_name.clone(), root)]),
    };

    resolver.discover(&root_name)?;
    resolver.settle_features()?;

    let mut graph = Graph { packages: resolver.packages, root: root_name };
    prune_unreachable(&mut graph);
    Ok(graph)
}

struct Resolver {
    env: ConfigEnv,
    deps_dir: PathBuf,
    /// The first spec seen for every dependency name.
    specs: BTreeMap<String, Dependency>,
    root: String,
    packages: BTreeMap<String, Package>,
}

impl Resolver {
    /// Fetches and parses everything reachable from `from` that is not yet in the graph.
    fn discover(&mut self, from: &str) -> Result<()> {
        let mut queue = VecDeque::new();
        self.enqueue_children(from, &mut queue);

        while let Some((name, parent_dir)) = queue.pop_front() {
            if self.packages.contains_key(&name) {
                continue;
            }
            let Some(spec) = self.specs.get(&name) else {
                return Err(BuilderError::graph(format!("dependency `{name}` has no source")));
            };

            let dest = self.deps_dir.join(&name);
            let fetched = fetch::fetch_dependency(&spec.source, &dest, &parent_dir)
                .context(format!("Failed to fetch dependency `{name}`"))?;
            debug!(dependency = %name, source = %fetched.source, path = %fetched.path.display(), "fetched");

            let manifest = self
                .parse(&fetched.path, &BTreeSet::new(), false)
                .context(format!("Failed to parse initial config for dependency `{name}`"))?;
            if manifest.package.name != name {
                warn!(dependency = %name, package = %manifest.package.name, "dependency has a mismatched package name");
            }

            self.packages.insert(
                name.clone(),
                Package { name: name.clone(), path: fetched.path, manifest, is_root: false },
            );
            self.enqueue_children(&name, &mut queue);
        }
        Ok(())
    }

    fn enqueue_children(&mut self, parent: &str, queue: &mut VecDeque<(String, PathBuf)>) {
        let Some(package) = self.packages.get(parent) else { return };
        for (name, spec) in &package.manifest.dependencies {
            self.specs.entry(name.clone()).or_insert_with(|| spec.clone());
            queue.push_back((name.clone(), package.path.clone()));
        }
    }

    fn parse(&self, dir: &Path, features: &BTreeSet<String>, default_features: bool) -> Result<Manifest> {
        let env = self.env.rebase(dir);
        Manifest::from_file(dir.join(MANIFEST_FILENAME), &env, features, default_features)
    }

    /// What every reachable parent asks of `name`: features and whether defaults are on.
    fn requests_for(&self, name: &str, reachable: &BTreeSet<String>) -> (BTreeSet<String>, bool) {
        let mut features = BTreeSet::new();
        let mut use_default = false;
        for parent in self.packages.values().filter(|p| reachable.contains(&p.name)) {
            let Some(dep) = parent.manifest.dependencies.get(name) else { continue };
            use_default |= dep.default_features;
            features.extend(dep.features.iter().cloned());
            if let Some(extra) = parent.manifest.enabled_dep_features.get(name) {
                features.extend(extra.iter().cloned());
            }
        }
        (features, use_default)
    }

    fn settle_features(&mut self) -> Result<()> {
        let mut applied: BTreeMap<String, (BTreeSet<String>, bool)> = BTreeMap::new();

        for pass in 1..=MAX_FEATURE_PASSES {
            let mut changed = false;
            let names: Vec<String> =
                self.packages.values().filter(|p| !p.is_root).map(|p| p.name.clone()).collect();

            for name in names {
                // a re-parse earlier in this pass may have cut packages off
                let reachable = reachable_from(&self.packages, &self.root);
                if !reachable.contains(&name) {
                    continue;
                }
                let request = self.requests_for(&name, &reachable);
                if applied.get(&name) == Some(&request) {
                    continue;
                }
                changed = true;

                let (features, use_default) = &request;
                debug!(package = %name, ?features, use_default, pass, "re-parsing with features");
                let path = self.packages[&name].path.clone();
                let manifest = self
                    .parse(&path, features, *use_default)
                    .context(format!("Failed to parse config for package `{name}`"))?;
                if let Some(package) = self.packages.get_mut(&name) {
                    package.manifest = manifest;
                }
                applied.insert(name.clone(), request);

                // features can pull in new dependencies
                self.discover(&name)?;
            }

            if !changed {
                return Ok(());
            }
        }

        Err(BuilderError::graph(format!(
            "feature resolution did not settle after {MAX_FEATURE_PASSES} passes"
        )))
    }
}

/// Names of `root` and every package reachable from it.
fn reachable_from(packages: &BTreeMap<String, Package>, root: &str) -> BTreeSet<String> {
    let mut reachable = BTreeSet::from([root.to_owned()]);
    let mut stack = vec![root.to_owned()];
    while let Some(name) = stack.pop() {
        let Some(package) = packages.get(&name) else { continue };
        for dep in package.manifest.dependencies.keys() {
            if reachable.insert(dep.clone()) {
                stack.push(dep.clone());
            }
        }
    }
    reachable
}

/// Drops packages no longer reachable from the root after feature resolution.
fn prune_unreachable(graph: &mut Graph) {
    let reachable = reachable_from(&graph.packages, &graph.root);
    graph.packages.retain(|name, _| {
        let keep = reachable.contains(name);
        if !keep {
            debug!(package = %name, "dropping unreachable package");
        }
        keep
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_package(dir: &Path, manifest: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(MANIFEST_FILENAME), manifest).unwrap();
    }

    fn root_package(dir: &Path, env: &ConfigEnv, features: &[&str]) -> Package {
        let features = features.iter().map(|s| (*s).to_owned()).collect();
        let manifest = Manifest::from_file(dir.join(MANIFEST_FILENAME), env, &features, true).unwrap();
        Package { name: manifest.package.name.clone(), path: dir.to_path_buf(), manifest, is_root: true }
    }

    fn linux_env(dir: &Path) -> ConfigEnv {
        let mut env = ConfigEnv::new(dir);
        env.target_os = "linux".into();
        env
    }

    /// app -> world -> extra (only with world's `extra` feature)
    fn sandbox() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write_package(
            &dir.path().join("app"),
            r#"
            [package]
            name = "app"
            [features]
            default = ["world/shout"]
            big = ["world/extra"]
            [dependencies]
            world = { source = "../world", features = ["loud"], default-features = false }
            "#,
        );
        write_package(
            &dir.path().join("world"),
            r#"
            [package]
            name = "world"
            [features]
            default = ["quiet"]
            quiet = []
            loud = []
            shout = ["loud"]
            extra = []
            [target]
            lib = true
            [target.'features.loud']
            defines = { LOUD = "" }
            [target.'features.quiet']
            defines = { QUIET = "" }
            [dependencies.'features.extra']
            extra = "../extra"
            "#,
        );
        write_package(&dir.path().join("extra"), "[package]\nname = \"extra\"\n[target]\nlib = true\n");
        dir
    }

    #[test]
    fn test_features_flow_to_dependencies() {
        let dir = sandbox();
        let app_dir = dir.path().join("app");
        let env = linux_env(&app_dir);
        let graph = resolve(root_package(&app_dir, &env, &[]), &env, &app_dir.join("build/_deps")).unwrap();

        assert_eq!(graph.len(), 2);
        let world = graph.get("world").unwrap();
        assert_eq!(
            world.manifest.enabled_features,
            ["loud", "shout"].into_iter().map(String::from).collect()
        );
        assert_eq!(world.manifest.target.defines.keys().collect::<Vec<_>>(), ["LOUD"]);
        assert_eq!(world.path, app_dir.join("../world"));
        assert!(!app_dir.join("build/_deps/world").exists());
    }

    #[test]
    fn test_feature_introduced_dependency_is_fetched() {
        let dir = sandbox();
        let app_dir = dir.path().join("app");
        let env = linux_env(&app_dir);
        let graph =
            resolve(root_package(&app_dir, &env, &["big"]), &env, &app_dir.join("build/_deps")).unwrap();

        assert_eq!(graph.packages().keys().collect::<Vec<_>>(), ["app", "extra", "world"]);
        let names: Vec<_> = graph.transitive_dependencies("app").unwrap().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["world", "extra"]);
    }

    /// app -> old (while `fresh` is off) -> leaf[hot]. app enables `fresh`, which drops `old`.
    #[test]
    fn test_unreachable_parent_requests_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let app_dir = dir.path().join("app");
        write_package(
            &app_dir,
            r#"
            [package]
            name = "app"
            [dependencies]
            mid = { source = "../mid", features = ["fresh"] }
            leaf = "../leaf"
            "#,
        );
        write_package(
            &dir.path().join("mid"),
            r#"
            [package]
            name = "mid"
            [features]
            fresh = []
            [target]
            lib = true
            [dependencies.'features.fresh == nil']
            old = "../old"
            "#,
        );
        write_package(
            &dir.path().join("old"),
            "[package]\nname = \"old\"\n[target]\nlib = true\n[dependencies]\nleaf = { source = \"../leaf\", features = [\"hot\"] }\n",
        );
        write_package(
            &dir.path().join("leaf"),
            "[package]\nname = \"leaf\"\n[features]\nhot = []\n[target]\nlib = true\n",
        );

        let env = linux_env(&app_dir);
        let graph = resolve(root_package(&app_dir, &env, &[]), &env, &app_dir.join("build/_deps")).unwrap();

        assert_eq!(graph.packages().keys().collect::<Vec<_>>(), ["app", "leaf", "mid"]);
        assert!(graph.get("leaf").unwrap().manifest.enabled_features.is_empty());
    }

    #[test]
    fn test_output_names() {
        let dir = sandbox();
        let app_dir = dir.path().join("app");
        let env = linux_env(&app_dir);
        let graph = resolve(root_package(&app_dir, &env, &[]), &env, &app_dir.join("build/_deps")).unwrap();

        assert_eq!(graph.root().output_name("linux"), "app");
        assert_eq!(graph.root().output_name("windows"), "app.exe");
        let world = graph.get("world").unwrap();
        assert_eq!(world.output_name("linux"), "libworld.a");
        assert_eq!(world.output_name("windows"), "world.lib");
    }

    #[test]
    fn test_unknown_dependency_feature_fails() {
        let dir = tempfile::tempdir().unwrap();
        let app_dir = dir.path().join("app");
        write_package(
            &app_dir,
            "[package]\nname = \"app\"\n[dependencies]\nlib = { source = \"../lib\", features = [\"nope\"] }\n",
        );
        write_package(&dir.path().join("lib"), "[package]\nname = \"lib\"\n[target]\nlib = true\n");

        let env = linux_env(&app_dir);
        let err = resolve(root_package(&app_dir, &env, &[]), &env, &app_dir.join("build/_deps")).unwrap_err();
        assert!(err.to_string().contains("unknown feature `nope`"));
    }

    #[test]
    fn test_missing_dependency_fails() {
        let dir = tempfile::tempdir().unwrap();
        let app_dir = dir.path().join("app");
        write_package(&app_dir, "[package]\nname = \"app\"\n[dependencies]\ngone = \"../gone\"\n");

        let env = linux_env(&app_dir);
        let err = resolve(root_package(&app_dir, &env, &[]), &env, &app_dir.join("build/_deps")).unwrap_err();
        assert!(matches!(err, BuilderError::Fetch { .. }));
        assert_eq!(err.context_message(), Some("Failed to fetch dependency `gone`"));
    }
}
