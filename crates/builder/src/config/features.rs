//! Feature resolution inside a single package.
//!
//! ```toml
//! [features]
//! default = ["cats"]
//! cats = []
//! dogs = []
//! cats_and_dogs = ["cats", "dogs"]
//! fast = ["zlib/asm"]   # enables `asm` on dependency `zlib`
//! ```

use crate::error::{BuilderError, Result};
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_FEATURE: &str = "default";

/// The outcome of resolving a package's features.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedFeatures {
    pub enabled: BTreeSet<String>,
    /// dependency name -> features requested on it through `dep/feature` items
    pub dep_features: BTreeMap<String, BTreeSet<String>>,
}

/// Reads the `[features]` table.
///
/// # Errors
/// Returns an error if the table is not a map of string lists.
pub fn table(doc: &toml::Table) -> Result<BTreeMap<String, Vec<String>>> {
    let Some(features) = doc.get("features") else {
        return Ok(BTreeMap::new());
    };
    features
        .clone()
        .try_into()
        .map_err(|e: toml::de::Error| BuilderError::manifest(format!("invalid [features] section: {}", e.message())))
}

/// Closes `requested` (plus `default` when `use_default` is set) over the feature table.
///
/// # Errors
/// Returns [`BuilderError::Feature`] for a requested or referenced feature the
/// table does not define.
pub fn resolve(
    table: &BTreeMap<String, Vec<String>>,
    requested: &BTreeSet<String>,
    use_default: bool,
) -> Result<ResolvedFeatures> {
    let mut resolved = ResolvedFeatures::default();
    let mut stack: Vec<(String, Option<&str>)> = requested.iter().map(|f| (f.clone(), None)).collect();
    if use_default && table.contains_key(DEFAULT_FEATURE) {
        stack.push((DEFAULT_FEATURE.to_owned(), None));
    }

    while let Some((feature, parent)) = stack.pop() {
        if resolved.enabled.contains(&feature) {
            continue;
        }
        let Some((key, items)) = table.get_key_value(&feature) else {
            let message = match parent {
                Some(parent) => format!("feature `{parent}` enables unknown feature `{feature}`"),
                None => format!("unknown feature `{feature}`"),
            };
            return Err(BuilderError::feature(message));
        };

        for item in items {
            if let Some((dep, dep_feature)) = item.split_once('/') {
                resolved.dep_features.entry(dep.to_owned()).or_default().insert(dep_feature.to_owned());
            } else if !resolved.enabled.contains(item) {
                stack.push((item.clone(), Some(key.as_str())));
            }
        }
        resolved.enabled.insert(feature);
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BTreeMap<String, Vec<String>> {
        let doc: toml::Table = toml::from_str(
            r#"
            [features]
            default = ["cats"]
            cats = []
            dogs = []
            whales = ["zlib/asm"]
            cats_and_dogs = ["cats", "dogs", "zlib/small"]
            "#,
        )
        .unwrap();
        table(&doc).unwrap()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_defaults() {
        let resolved = resolve(&sample(), &BTreeSet::new(), true).unwrap();
        assert_eq!(resolved.enabled, set(&["cats", "default"]));
        assert!(resolved.dep_features.is_empty());

        let resolved = resolve(&sample(), &BTreeSet::new(), false).unwrap();
        assert!(resolved.enabled.is_empty());
    }

    #[test]
    fn test_transitive_and_dependency_features() {
        let resolved = resolve(&sample(), &set(&["cats_and_dogs", "whales"]), false).unwrap();
        assert_eq!(resolved.enabled, set(&["cats", "cats_and_dogs", "dogs", "whales"]));
        assert_eq!(resolved.dep_features["zlib"], set(&["asm", "small"]));
    }

    #[test]
    fn test_unknown_features() {
        let err = resolve(&sample(), &set(&["birds"]), true).unwrap_err();
        assert!(err.to_string().contains("unknown feature `birds`"));

        let mut broken = sample();
        broken.insert("broken".into(), vec!["missing".into()]);
        let err = resolve(&broken, &set(&["broken"]), false).unwrap_err();
        assert!(err.to_string().contains("feature `broken` enables unknown feature `missing`"));
    }

    #[test]
    fn test_invalid_table() {
        let doc: toml::Table = toml::from_str("features = { cats = 1 }").unwrap();
        assert!(matches!(table(&doc), Err(BuilderError::Manifest { .. })));
    }
}
