//! # Manifest
//!
//! Parsing of `Qobs.toml`:
//!
//! ```toml
//! [package]
//! name = "hello"
//! build = 'patch("src/vendor.c", read_file("fix.diff"))'
//!
//! [target]
//! sources = ["src/**.c"]
//! headers = ["include"]
//!
//! [target.'target_os == "windows"']
//! links = ["gdi32", "user32"]
//!
//! [dependencies]
//! zlib = "gh:madler/zlib#v1.3.1"
//! ```
//!
//! `[target]`, `[dependencies]` and `[profile]` are conditional sections: a
//! sub-table whose key compiles as an expression is merged in when it evaluates
//! to `true`. Every string value may contain `{{ expr }}` templates.

mod env;
pub mod features;
pub(crate) mod merge;
pub mod template;

pub use env::{ConfigEnv, target_arch, target_os};
pub use features::ResolvedFeatures;
pub use merge::Merge;

use crate::error::{BuilderError, BuilderErrorExt, Result};
use crate::expr;
use merge::merge_fields;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, trace};

/// File name of a package manifest.
pub const MANIFEST_FILENAME: &str = "Qobs.toml";

/// `[package]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PackageSection {
    pub name: String,
    pub description: String,
    pub authors: Vec<String>,
    /// Build script: an expression that must evaluate to `true`.
    pub build: Option<String>,
}

/// `[target]` and its conditional sub-tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TargetSection {
    pub lib: bool,
    pub header_only: bool,
    pub sources: Vec<String>,
    pub headers: Vec<String>,
    pub defines: BTreeMap<String, String>,
    pub links: Vec<String>,
    pub cflags: Vec<String>,
}

merge_fields!(TargetSection { lib, header_only, sources, headers, defines, links, cflags });

/// `opt-level = 3` or `opt-level = "s"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OptLevel {
    Int(i64),
    Str(String),
}

impl fmt::Display for OptLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(level) => write!(f, "{level}"),
            Self::Str(level) => f.write_str(level),
        }
    }
}

/// `[profile.<name>]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProfileSection {
    pub opt_level: Option<OptLevel>,
    /// Emit debug information (`-g`).
    pub debug: Option<bool>,
}

merge_fields!(ProfileSection { opt_level, debug });

impl ProfileSection {
    /// Compiler flags for this profile, in GNU spelling.
    #[must_use]
    pub fn cflags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        if let Some(level) = &self.opt_level {
            let level = level.to_string();
            if !level.is_empty() {
                flags.push(format!("-O{level}"));
            }
        }
        if self.debug == Some(true) {
            flags.push("-g".to_owned());
        }
        flags
    }
}

/// A dependency: either a bare source string or a table.
///
/// ```toml
/// [dependencies]
/// hello = "gh:qobs-build/libhelloworld"
/// zlib = { source = "gh:madler/zlib", features = ["asm"], default-features = false }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawDependency")]
pub struct Dependency {
    pub source: String,
    pub features: Vec<String>,
    pub default_features: bool,
}

impl Dependency {
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into(), features: Vec::new(), default_features: true }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDependency {
    Source(String),
    Detailed {
        source: String,
        #[serde(default)]
        features: Vec<String>,
        #[serde(default = "default_true", rename = "default-features")]
        default_features: bool,
    },
}

const fn default_true() -> bool {
    true
}

impl From<RawDependency> for Dependency {
    fn from(raw: RawDependency) -> Self {
        match raw {
            RawDependency::Source(source) => Self::new(source),
            RawDependency::Detailed { source, features, default_features } => {
                Self { source, features, default_features }
            },
        }
    }
}

/// A fully evaluated `Qobs.toml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub package: PackageSection,
    pub target: TargetSection,
    pub dependencies: BTreeMap<String, Dependency>,
    pub profile: BTreeMap<String, ProfileSection>,
    pub features: BTreeMap<String, Vec<String>>,
    pub enabled_features: BTreeSet<String>,
    pub enabled_dep_features: BTreeMap<String, BTreeSet<String>>,
}

/// The `debug` and `release` profiles every package starts from.
#[must_use]
pub fn default_profiles() -> BTreeMap<String, ProfileSection> {
    BTreeMap::from([
        ("debug".to_owned(), ProfileSection { opt_level: None, debug: Some(true) }),
        ("release".to_owned(), ProfileSection { opt_level: Some(OptLevel::Int(3)), debug: None }),
    ])
}

impl Manifest {
    /// Parses a manifest.
    ///
    /// Features are resolved first, so templates and conditions can see
    /// `features.<name>`.
    ///
    /// # Errors
    /// Returns an error for invalid TOML, unknown features, failing
    /// expressions, or sections of the wrong shape.
    pub fn parse(
        text: &str,
        env: &ConfigEnv,
        requested_features: &BTreeSet<String>,
        default_features: bool,
    ) -> Result<Self> {
        let mut doc: toml::Table = text.parse()?;

        let features = features::table(&doc)?;
        let resolved = features::resolve(&features, requested_features, default_features)?;
        let env = env.enable(resolved.enabled.clone());
        trace!(features = ?resolved.enabled, "resolved features");

        for (key, value) in &mut doc {
            if key != "features" {
                template::expand_value(value, &env).context(format!("Expanding templates in [{key}]"))?;
            }
        }

        let package: PackageSection = section(&doc, "package")?;
        let target: TargetSection = conditional_section(&doc, "target", &env)?;
        let dependencies: BTreeMap<String, Dependency> = conditional_section(&doc, "dependencies", &env)?;

        let mut profile = default_profiles();
        let user_profiles: BTreeMap<String, ProfileSection> = conditional_section(&doc, "profile", &env)?;
        for (name, section) in user_profiles {
            profile.entry(name).or_default().merge(section);
        }

        if package.name.is_empty() {
            return Err(BuilderError::manifest("[package] has no `name`"));
        }
        if target.lib && target.header_only {
            debug!(package = %package.name, "header-only target also sets lib, header-only wins");
        }

        Ok(Self {
            package,
            target,
            dependencies,
            profile,
            features,
            enabled_features: resolved.enabled,
            enabled_dep_features: resolved.dep_features,
        })
    }

    /// Reads and parses a manifest file.
    ///
    /// # Errors
    /// See [`Manifest::parse`]. The error context names the file.
    pub fn from_file(
        path: impl AsRef<Path>,
        env: &ConfigEnv,
        requested_features: &BTreeSet<String>,
        default_features: bool,
    ) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).context(format!("Reading {}", path.display()))?;
        Self::parse(&text, env, requested_features, default_features)
            .context(format!("Parsing {}", path.display()))
    }

    /// Known profile names, sorted.
    #[must_use]
    pub fn profiles(&self) -> Vec<&str> {
        self.profile.keys().map(String::as_str).collect()
    }

    /// Runs `package.build`, if any.
    ///
    /// # Errors
    /// Fails when the script does not compile, fails at runtime, or evaluates
    /// to anything other than `true`.
    pub fn run_build_script(&self, env: &ConfigEnv) -> Result<()> {
        let Some(script) = self.package.build.as_deref().filter(|s| !s.trim().is_empty()) else {
            return Ok(());
        };

        let env = env.enable(self.enabled_features.clone());
        let name = &self.package.name;
        let result = expr::run(script, &env)
            .context(format!("Running build script for package `{name}`"))?;

        if !result.is_true() {
            return Err(BuilderError::manifest(format!(
                "build script for package `{name}` returned {result}\n{script}"
            )));
        }
        Ok(())
    }

    /// Whether the package produces a linkable artifact.
    #[must_use]
    pub const fn is_header_only(&self) -> bool {
        self.target.header_only
    }
}

/// Parses a plain section.
fn section<T: DeserializeOwned + Default>(doc: &toml::Table, name: &str) -> Result<T> {
    let Some(value) = doc.get(name) else {
        return Ok(T::default());
    };
    value.clone().try_into().context(format!("Parsing [{name}]"))
}

/// Parses a section whose sub-tables may be conditions.
fn conditional_section<T>(doc: &toml::Table, name: &str, env: &ConfigEnv) -> Result<T>
where
    T: DeserializeOwned + Default + Merge,
{
    let Some(value) = doc.get(name) else {
        return Ok(T::default());
    };
    let toml::Value::Table(table) = value else {
        return Err(BuilderError::manifest(format!("[{name}] must be a table")));
    };

    let mut base = toml::Table::new();
    let mut conditions = Vec::new();
    for (key, value) in table {
        match value {
            toml::Value::Table(sub) => match expr::compile(key, env) {
                Ok(program) => conditions.push((key, program, sub)),
                Err(err) => {
                    trace!(section = name, key = %key, "not a condition: {err}");
                    base.insert(key.clone(), value.clone());
                },
            },
            _ => {
                base.insert(key.clone(), value.clone());
            },
        }
    }

    let mut parsed: T = toml::Value::Table(base).try_into().context(format!("Parsing [{name}]"))?;

    for (key, program, sub) in conditions {
        let matched = expr::eval(&program, env).context(format!("Evaluating [{name}.'{key}']"))?;
        if !matched.is_true() {
            trace!(section = name, key = %key, "condition is {matched}");
            continue;
        }
        debug!(section = name, key = %key, "condition matched");

        let extra: T = toml::Value::Table(sub.clone())
            .try_into()
            .context(format!("Parsing conditional section [{name}.'{key}']"))?;
        parsed.merge(extra);
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux_env() -> ConfigEnv {
        let mut env = ConfigEnv::new("/tmp/pkg");
        env.target_os = "linux".into();
        env.target_arch = "amd64".into();
        env
    }

    fn parse(text: &str, features: &[&str], default_features: bool) -> Result<Manifest> {
        let requested = features.iter().map(|s| (*s).to_owned()).collect();
        Manifest::parse(text, &linux_env(), &requested, default_features)
    }

    const HELLO: &str = r#"
        [package]
        name = "hello"
        authors = ["AzureDiamond"]

        [target]
        sources = ["src/**.c"]
        defines = { BASE = "" }

        [target.'target_os == "linux"']
        links = ["m"]
        defines = { ON_LINUX = "1" }

        [target.'target_os == "windows"']
        links = ["gdi32"]

        [dependencies]
        world = "gh:qobs-build/libworld"
        zlib = { source = "gh:madler/zlib", features = ["asm"], default-features = false }

        [dependencies.'target_os == "windows"']
        winapi = "gh:someone/winapi"

        [profile.release]
        debug = true

        [profile.small]
        opt-level = "s"
    "#;

    #[test]
    fn test_parse_sections() {
        let manifest = parse(HELLO, &[], true).unwrap();
        assert_eq!(manifest.package.name, "hello");
        assert_eq!(manifest.package.authors, ["AzureDiamond"]);
        assert_eq!(manifest.target.sources, ["src/**.c"]);
        assert_eq!(manifest.target.links, ["m"]);
        assert_eq!(manifest.target.defines.keys().collect::<Vec<_>>(), ["BASE", "ON_LINUX"]);
        assert!(!manifest.target.lib);
    }

    #[test]
    fn test_parse_dependencies() {
        let manifest = parse(HELLO, &[], true).unwrap();
        assert_eq!(manifest.dependencies.len(), 2);
        assert_eq!(manifest.dependencies["world"], Dependency::new("gh:qobs-build/libworld"));
        let zlib = &manifest.dependencies["zlib"];
        assert_eq!(zlib.features, ["asm"]);
        assert!(!zlib.default_features);
    }

    #[test]
    fn test_profiles_merge_over_defaults() {
        let manifest = parse(HELLO, &[], true).unwrap();
        assert_eq!(manifest.profiles(), ["debug", "release", "small"]);
        assert_eq!(manifest.profile["debug"].cflags(), ["-g"]);
        assert_eq!(manifest.profile["release"].cflags(), ["-O3", "-g"]);
        assert_eq!(manifest.profile["small"].cflags(), ["-Os"]);
    }

    #[test]
    fn test_features_drive_conditions() {
        let text = r#"
            [package]
            name = "features"

            [features]
            default = []
            cats = []
            dogs = []
            cats_and_dogs = ["cats", "dogs"]

            [target]
            sources = ["src/**.c"]

            [target.'features.cats']
            defines = { CATS = "" }
            [target.'features.dogs']
            defines = { DOGS = "" }
            [target.'features.cats_and_dogs']
            defines = { CATS_AND_DOGS = "" }
        "#;
        let manifest = parse(text, &["cats", "dogs"], true).unwrap();
        assert_eq!(manifest.target.defines.keys().collect::<Vec<_>>(), ["CATS", "DOGS"]);

        let manifest = parse(text, &["cats_and_dogs"], true).unwrap();
        assert_eq!(manifest.target.defines.keys().collect::<Vec<_>>(), ["CATS", "CATS_AND_DOGS", "DOGS"]);

        let manifest = parse(text, &[], true).unwrap();
        assert!(manifest.target.defines.is_empty());
    }

    #[test]
    fn test_templates_expand_before_parsing() {
        let text = r#"
            [package]
            name = "tmpl"
            description = "built for {{ target_os }}/{{ target_arch }}"
            [target]
            cflags = ["-DPLATFORM={{ upper(target_os) }}"]
        "#;
        let manifest = parse(text, &[], true).unwrap();
        assert_eq!(manifest.package.description, "built for linux/amd64");
        assert_eq!(manifest.target.cflags, ["-DPLATFORM=LINUX"]);
    }

    #[test]
    fn test_errors() {
        let err = parse("[package\nname = 1", &[], true).unwrap_err();
        assert!(matches!(err, BuilderError::Toml { .. }));

        let err = parse("[package]\nname = \"x\"\n[target]\nlib = \"yes\"", &[], true).unwrap_err();
        assert!(matches!(err, BuilderError::Toml { .. }));

        let err = parse("[package]\nname = \"x\"\n[target.'1 / 0 == 1']\nlib = true", &[], true).unwrap_err();
        assert!(matches!(err, BuilderError::Expr { .. }));
        assert!(err.to_string().contains("[target.'1 / 0 == 1']"));

        let err = parse("[package]\nname = \"x\"", &["nope"], true).unwrap_err();
        assert!(matches!(err, BuilderError::Feature { .. }));

        let err = parse("[package]\ndescription = \"no name\"", &[], true).unwrap_err();
        assert!(matches!(err, BuilderError::Manifest { .. }));
    }

    #[test]
    fn test_build_script() {
        let ok = parse("[package]\nname = \"x\"\nbuild = 'target_os == \"linux\"'", &[], true).unwrap();
        ok.run_build_script(&linux_env()).unwrap();

        let bad = parse("[package]\nname = \"x\"\nbuild = '1 + 1'", &[], true).unwrap();
        let err = bad.run_build_script(&linux_env()).unwrap_err();
        assert!(err.to_string().contains("returned 2"));
    }
}
