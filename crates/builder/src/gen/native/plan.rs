use super::state::{BuildState, HashCache};
use crate::cc::Toolchain;
use crate::error::{BuilderError, BuilderErrorExt, Result};
use crate::r#gen::BuildUnit;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One object to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileJob {
    pub src: PathBuf,
    pub obj: PathBuf,
    pub command: Vec<String>,
}

/// One library to archive or executable to link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkJob {
    pub target: String,
    pub out: PathBuf,
    pub is_lib: bool,
    pub command: Vec<String>,
}

#[derive(Debug, Default)]
pub struct Plan {
    pub compile: Vec<CompileJob>,
    /// In topological order.
    pub link: Vec<LinkJob>,
}

impl Plan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.compile.is_empty() && self.link.is_empty()
    }
}

/// Orders targets so every dependency comes before its dependents.
///
/// Ties are broken by name.
///
/// # Errors
/// Returns an error for an unknown dependency or a cycle.
pub fn topological_order(targets: &BTreeMap<String, BuildUnit>) -> Result<Vec<String>> {
    let mut dependents: BTreeMap<&str, Vec<&str>> = targets.keys().map(|name| (name.as_str(), Vec::new())).collect();
    let mut in_degree: BTreeMap<&str, usize> = targets.keys().map(|name| (name.as_str(), 0)).collect();

    for (name, unit) in targets {
        for dep in &unit.dependencies {
            let Some(list) = dependents.get_mut(dep.as_str()) else {
                return Err(BuilderError::graph(format!("target `{name}` lists a non-existent dependency: `{dep}`")));
            };
            list.push(name);
            *in_degree.entry(name).or_default() += 1;
        }
    }

    let mut queue: VecDeque<&str> = in_degree.iter().filter(|(_, d)| **d == 0).map(|(n, _)| *n).collect();
    let mut order = Vec::with_capacity(targets.len());
    while let Some(name) = queue.pop_front() {
        order.push(name.to_owned());
        let mut next = dependents.remove(name).unwrap_or_default();
        next.sort_unstable();
        for dependent in next {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(dependent);
                }
            }
        }
    }

    if order.len() != targets.len() {
        let cycle: Vec<&str> = in_degree.iter().filter(|(_, d)| **d > 0).map(|(n, _)| *n).collect();
        return Err(BuilderError::graph(format!(
            "dependency cycle detected involving targets: [{}]",
            cycle.join(" ")
        )));
    }
    Ok(order)
}

/// Decides what is out of date.
#[derive(Debug)]
pub struct Planner<'a> {
    pub targets: &'a BTreeMap<String, BuildUnit>,
    pub state: &'a BuildState,
    pub toolchain: &'a Toolchain,
    pub build_dir: &'a Path,
}

impl Planner<'_> {
    /// Plans the compile and link jobs for targets in `order`.
    ///
    /// # Errors
    /// Returns an error if a source is missing or a file cannot be hashed.
    pub fn plan(&self, order: &[String], cache: &mut HashCache) -> Result<Plan> {
        let mut plan = Plan::default();
        let mut rebuilt = BTreeSet::new();

        for name in order {
            let Some(unit) = self.targets.get(name) else { continue };
            let old = self.state.get(name);

            let mut relink = !self.build_dir.join(&unit.output).exists();
            if relink {
                debug!(target = %name, "output is missing");
            }
            if old.is_some_and(|old| old.cflags != unit.cflags || old.ldflags != unit.ldflags) {
                debug!(target = %name, "flags changed");
                relink = true;
            }
            if !relink {
                relink = self.dependency_changed(unit, &rebuilt, cache)?;
            }

            let flags_changed = old.is_some_and(|old| old.cflags != unit.cflags);
            for source in &unit.sources {
                let obj = self.build_dir.join(&source.obj);
                let dirty = flags_changed || Self::source_dirty(&source.src, &obj, old.map(|o| &o.sources), cache)?;
                if dirty {
                    let command = self.toolchain.compile_command(
                        source.is_cxx,
                        &unit.cflags,
                        &source.src.to_string_lossy(),
                        &obj.to_string_lossy(),
                    );
                    plan.compile.push(CompileJob { src: source.src.clone(), obj, command });
                    relink = true;
                }
            }

            if relink {
                rebuilt.insert(name.as_str());
                plan.link.push(self.link_job(unit)?);
            }
        }
        Ok(plan)
    }

    fn dependency_changed(&self, unit: &BuildUnit, rebuilt: &BTreeSet<&str>, cache: &mut HashCache) -> Result<bool> {
        let old = self.state.get(&unit.name);
        for dep in &unit.dependencies {
            if rebuilt.contains(dep.as_str()) {
                debug!(target = %unit.name, %dep, "dependency was rebuilt");
                return Ok(true);
            }
            let path = self.dependency_output(unit, dep)?;
            let hash = match cache.hash(&path) {
                Ok(hash) => hash,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
                Err(e) => return Err(e).context(format!("Failed to hash dependency {dep}")),
            };
            if old.and_then(|o| o.dependencies.get(dep)) != Some(&hash) {
                debug!(target = %unit.name, %dep, "dependency changed");
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn source_dirty(
        src: &Path,
        obj: &Path,
        old: Option<&BTreeMap<String, String>>,
        cache: &mut HashCache,
    ) -> Result<bool> {
        let hash = match cache.hash(src) {
            Ok(hash) => hash,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(BuilderError::graph(format!("source file {} not found", src.display())));
            },
            Err(e) => return Err(e).context(format!("Could not check status of {}", src.display())),
        };
        if !obj.exists() {
            return Ok(true);
        }
        Ok(old.and_then(|sources| sources.get(src.to_string_lossy().as_ref())) != Some(&hash))
    }

    fn dependency_output(&self, unit: &BuildUnit, dep: &str) -> Result<PathBuf> {
        self.targets.get(dep).map(|d| self.build_dir.join(&d.output)).ok_or_else(|| {
            BuilderError::graph(format!("target `{}` lists a non-existent dependency: `{dep}`", unit.name))
        })
    }

    fn link_job(&self, unit: &BuildUnit) -> Result<LinkJob> {
        let out = self.build_dir.join(&unit.output);
        let out_text = out.to_string_lossy().into_owned();
        let mut inputs: Vec<String> =
            unit.sources.iter().map(|s| self.build_dir.join(&s.obj).to_string_lossy().into_owned()).collect();

        let command = if unit.is_lib {
            self.toolchain.archive_command(&out_text, &inputs)
        } else {
            let mut cxx = unit.has_cxx();
            for dep in &unit.dependencies {
                inputs.push(self.dependency_output(unit, dep)?.to_string_lossy().into_owned());
                cxx |= self.targets.get(dep).is_some_and(BuildUnit::has_cxx);
            }
            self.toolchain.link_command(cxx, &out_text, &inputs, &unit.ldflags)
        };
        Ok(LinkJob { target: unit.name.clone(), out, is_lib: unit.is_lib, command })
    }
}
