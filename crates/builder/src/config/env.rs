//! The environment manifests are evaluated in.

use crate::expr::{Environment, ExprError, ExprErrorExt, Result, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Variables and host functions available to `Qobs.toml` expressions.
///
/// | name          | value                                            |
/// |---------------|--------------------------------------------------|
/// | `target_os`   | `windows`, `linux`, `darwin`, `freebsd`, ...     |
/// | `target_arch` | `amd64`, `386`, `arm64`, `arm`, ...              |
/// | `environ`     | map of the process environment                   |
/// | `features`    | map of enabled features to `true`                |
///
/// Functions: `patch(path, diff)`, `read_file(path)` and `env(name)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEnv {
    pub target_os: String,
    pub target_arch: String,
    pub environ: BTreeMap<String, String>,
    pub features: BTreeSet<String>,
    basedir: PathBuf,
}

impl ConfigEnv {
    /// Environment of the host platform with no features enabled.
    pub fn new(basedir: impl Into<PathBuf>) -> Self {
        Self {
            target_os: target_os().to_owned(),
            target_arch: target_arch().to_owned(),
            environ: std::env::vars().collect(),
            features: BTreeSet::new(),
            basedir: basedir.into(),
        }
    }

    pub fn with_features<I, S>(basedir: impl Into<PathBuf>, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut env = Self::new(basedir);
        env.features = features.into_iter().map(Into::into).collect();
        env
    }

    /// The same environment with `features` as the enabled set.
    #[must_use]
    pub fn enable(&self, features: BTreeSet<String>) -> Self {
        Self { features, ..self.clone() }
    }

    /// The same environment rooted at another package directory.
    #[must_use]
    pub fn rebase(&self, basedir: impl Into<PathBuf>) -> Self {
        Self { basedir: basedir.into(), ..self.clone() }
    }

    #[must_use]
    pub fn basedir(&self) -> &Path {
        &self.basedir
    }

    /// Applies a unified diff to `path` (relative to the package directory).
    ///
    /// Returns `true` when the file was changed and `false` when the diff is
    /// already applied, so build scripts can call it on every build.
    ///
    /// # Errors
    /// Fails when the path escapes the package, the file cannot be read or
    /// written, or the diff applies neither forwards nor in reverse.
    pub fn patch(&self, path: &str, diff: &str) -> Result<bool> {
        let full = self.resolve(path)?;
        let original = fs::read_to_string(&full).context(format!("Reading {}", full.display()))?;

        let patch = diffy::Patch::from_str(diff)
            .map_err(|e| ExprError::Patch { message: e.to_string().into(), context: Some(path.to_owned().into()) })?;

        match diffy::apply(&original, &patch) {
            Ok(patched) if patched == original => Ok(false),
            Ok(patched) => {
                fs::write(&full, patched).context(format!("Writing {}", full.display()))?;
                debug!("patched {}", full.display());
                Ok(true)
            },
            Err(err) => {
                if diffy::apply(&original, &patch.reverse()).is_ok() {
                    debug!("patch for {} is already applied", full.display());
                    return Ok(false);
                }
                Err(ExprError::Patch { message: err.to_string().into(), context: Some(path.to_owned().into()) })
            },
        }
    }

    /// Reads a file inside the package directory.
    ///
    /// # Errors
    /// Fails when the path escapes the package or the file cannot be read.
    pub fn read_file(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        fs::read_to_string(&full).context(format!("Reading {}", full.display()))
    }

    /// Joins `path` onto the package directory, rejecting absolute paths and
    /// `..` components that climb above it.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let escape = || ExprError::PathEscape { path: path.to_owned().into(), context: None };

        let mut depth = 0usize;
        for component in Path::new(path).components() {
            match component {
                Component::Normal(_) => depth += 1,
                Component::CurDir => {},
                Component::ParentDir => depth = depth.checked_sub(1).ok_or_else(escape)?,
                Component::RootDir | Component::Prefix(_) => return Err(escape()),
            }
        }
        Ok(self.basedir.join(path))
    }

    fn features_value(&self) -> Value {
        Value::Map(self.features.iter().map(|f| (f.clone(), Value::Bool(true))).collect())
    }
}

impl Environment for ConfigEnv {
    fn lookup(&self, name: &str) -> Option<Value> {
        match name {
            "target_os" => Some(Value::from(self.target_os.as_str())),
            "target_arch" => Some(Value::from(self.target_arch.as_str())),
            "environ" => Some(Value::Map(
                self.environ.iter().map(|(k, v)| (k.clone(), Value::from(v.as_str()))).collect(),
            )),
            "features" => Some(self.features_value()),
            _ => None,
        }
    }

    fn has_variable(&self, name: &str) -> bool {
        matches!(name, "target_os" | "target_arch" | "environ" | "features")
    }

    fn has_function(&self, name: &str) -> bool {
        matches!(name, "patch" | "read_file" | "env")
    }

    fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        match (name, args) {
            ("patch", [Value::Str(path), Value::Str(diff)]) => self.patch(path, diff).map(Value::Bool),
            ("read_file", [Value::Str(path)]) => self.read_file(path).map(Value::Str),
            ("env", [Value::Str(key)]) => {
                Ok(Value::Str(self.environ.get(key).cloned().unwrap_or_default()))
            },
            _ => {
                let types = args.iter().map(Value::type_name).collect::<Vec<_>>().join(", ");
                Err(ExprError::type_mismatch(format!("{name}() does not accept ({types})")))
            },
        }
    }
}

/// Operating system name in the spelling existing manifests use.
#[must_use]
pub fn target_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

/// Architecture name in the spelling existing manifests use.
#[must_use]
pub fn target_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "powerpc64" => "ppc64",
        "s390x" => "s390x",
        other => other,
    }
}
