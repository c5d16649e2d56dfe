//! # Native builder
//!
//! Builds targets directly. Sources are hashed with sha256 and the hashes,
//! together with the flags each target was built with, are stored in
//! `build/qobs_build_state.json`. The next build only recompiles and
//! relinks what changed.

mod exec;
mod plan;
mod state;

pub use plan::{CompileJob, LinkJob, Plan, Planner, topological_order};
pub use state::{BuildState, HashCache, TargetState};

use super::{BuildUnit, Generator};
use crate::cc::Toolchain;
use crate::error::{BuilderErrorExt, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::thread::available_parallelism;
use tracing::{debug, warn};

pub const STATE_FILE: &str = "qobs_build_state.json";

/// Job count when the parallelism of the machine cannot be detected.
const DEFAULT_JOBS: usize = 4;

#[derive(Debug)]
pub struct QobsBuilder {
    toolchain: Toolchain,
    targets: BTreeMap<String, BuildUnit>,
    jobs: usize,
}

impl Default for QobsBuilder {
    fn default() -> Self {
        Self::new(None)
    }
}

impl QobsBuilder {
    /// `jobs` defaults to the available parallelism.
    #[must_use]
    pub fn new(jobs: Option<usize>) -> Self {
        let jobs = jobs.filter(|&n| n > 0).unwrap_or_else(|| {
            available_parallelism().map(std::num::NonZero::get).unwrap_or(DEFAULT_JOBS)
        });
        Self { toolchain: Toolchain::default(), targets: BTreeMap::new(), jobs }
    }

    #[must_use]
    pub const fn jobs(&self) -> usize {
        self.jobs
    }

    /// Works out what is out of date in `build_dir`.
    ///
    /// # Errors
    /// Returns an error for a broken target graph or an unreadable source.
    pub fn plan(&self, build_dir: &Path, state: &BuildState, cache: &mut HashCache) -> Result<Plan> {
        let order = topological_order(&self.targets)?;
        let planner = Planner { targets: &self.targets, state, toolchain: &self.toolchain, build_dir };
        planner.plan(&order, cache)
    }

    /// State of `unit` as it is on disk right now.
    fn current_state(&self, unit: &BuildUnit, build_dir: &Path, cache: &mut HashCache) -> Result<TargetState> {
        let mut state =
            TargetState { cflags: unit.cflags.clone(), ldflags: unit.ldflags.clone(), ..TargetState::default() };
        for source in &unit.sources {
            let hash = cache.hash(&source.src).context(format!("Failed to hash {}", source.src.display()))?;
            state.sources.insert(source.src.to_string_lossy().into_owned(), hash);
        }
        for dep in &unit.dependencies {
            let Some(dep_unit) = self.targets.get(dep) else { continue };
            match cache.hash(&build_dir.join(&dep_unit.output)) {
                Ok(hash) => {
                    state.dependencies.insert(dep.clone(), hash);
                },
                Err(e) => warn!(target = %unit.name, %dep, error = %e, "could not hash dependency"),
            }
        }
        Ok(state)
    }
}

impl Generator for QobsBuilder {
    fn set_toolchain(&mut self, toolchain: Toolchain) {
        self.toolchain = toolchain;
    }

    fn add_target(&mut self, unit: BuildUnit) {
        self.targets.insert(unit.name.clone(), unit);
    }

    fn build_file(&self) -> Option<String> {
        Some(STATE_FILE.to_owned())
    }

    fn generate(&self, _build_dir: &Path) -> Result<()> {
        Ok(())
    }

    fn invoke(&mut self, build_dir: &Path) -> Result<()> {
        let state_path = build_dir.join(STATE_FILE);
        let mut state = BuildState::load(&state_path).unwrap_or_else(|e| {
            warn!(error = %e, "failed to load build state");
            BuildState::default()
        });

        let mut cache = HashCache::default();
        let plan = self.plan(build_dir, &state, &mut cache)?;
        if plan.is_empty() {
            println!("qobs: no work to do.");
            return Ok(());
        }

        let linked: Vec<String> = plan.link.iter().map(|job| job.target.clone()).collect();
        for job in &plan.link {
            cache.invalidate(&job.out);
        }
        exec::run(plan, self.jobs)?;

        for name in linked {
            let Some(unit) = self.targets.get(&name) else { continue };
            match self.current_state(unit, build_dir, &mut cache) {
                Ok(target_state) => state.insert(name, target_state),
                Err(e) => warn!(target = %name, error = %e, "failed to update build state"),
            }
        }
        if let Err(e) = state.save(&state_path) {
            warn!(error = %e, "failed to save build state");
        }
        debug!(state = %state_path.display(), "build state saved");
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::BuilderError;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    /// Writes whatever follows `-o` (or `rcs`) so the artifacts exist.
    const FAKE_TOOL: &str = r#"#!/bin/sh
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o|rcs) out="$2" ;;
  esac
  shift
done
echo built > "$out"
"#;

    fn script(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn builder(root: &Path, cc: &str) -> QobsBuilder {
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/lib.c"), "int lib;").unwrap();
        fs::write(root.join("src/main.c"), "int main;").unwrap();

        let mut builder = QobsBuilder::new(Some(2));
        builder.set_toolchain(Toolchain { cc: cc.to_owned(), cxx: cc.to_owned(), ar: cc.to_owned(), ..Toolchain::default() });
        builder.add_target(BuildUnit::new("lib", "liblib.a", root, true).with_sources([root.join("src/lib.c")]));
        builder.add_target(
            BuildUnit::new("app", "app", root, false)
                .with_sources([root.join("src/main.c")])
                .with_dependencies(vec!["lib".into()]),
        );
        builder
    }

    #[test]
    fn test_jobs_default() {
        assert!(QobsBuilder::new(None).jobs() >= 1);
        assert_eq!(QobsBuilder::new(Some(0)).jobs(), QobsBuilder::new(None).jobs());
        assert_eq!(QobsBuilder::new(Some(3)).jobs(), 3);
    }

    #[test]
    fn test_build_then_nothing_to_do() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let tool = script(root, "tool.sh", FAKE_TOOL);
        let build_dir = root.join("build");
        fs::create_dir_all(&build_dir).unwrap();

        let mut builder = builder(root, &tool);
        builder.invoke(&build_dir).unwrap();

        assert!(build_dir.join("app").is_file());
        assert!(build_dir.join("liblib.a").is_file());
        assert!(build_dir.join("QobsFiles/app.dir/src/main.c.obj").is_file());

        let state = BuildState::load(&build_dir.join(STATE_FILE)).unwrap();
        assert!(state.get("app").unwrap().dependencies.contains_key("lib"));
        let plan = builder.plan(&build_dir, &state, &mut HashCache::default()).unwrap();
        assert!(plan.is_empty());

        fs::write(root.join("src/main.c"), "int main2;").unwrap();
        let plan = builder.plan(&build_dir, &state, &mut HashCache::default()).unwrap();
        let sources: Vec<PathBuf> = plan.compile.iter().map(|j| j.src.clone()).collect();
        assert_eq!(sources, [root.join("src/main.c")]);
        assert_eq!(plan.link.len(), 1);
    }

    #[test]
    fn test_failing_compiler() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let tool = script(root, "fail.sh", "#!/bin/sh\nexit 3\n");
        let build_dir = root.join("build");
        fs::create_dir_all(&build_dir).unwrap();

        let err = builder(root, &tool).invoke(&build_dir).unwrap_err();
        assert!(matches!(err, BuilderError::CommandFailed { code: Some(3), .. }));
        assert!(!build_dir.join(STATE_FILE).exists());
    }

    #[test]
    fn test_unreadable_state_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let tool = script(root, "tool.sh", FAKE_TOOL);
        let build_dir = root.join("build");
        fs::create_dir_all(&build_dir).unwrap();
        fs::write(build_dir.join(STATE_FILE), "garbage").unwrap();

        builder(root, &tool).invoke(&build_dir).unwrap();
        assert!(BuildState::load(&build_dir.join(STATE_FILE)).unwrap().get("lib").is_some());
    }
}
