//! Source and include directory collection.
//!
//! Patterns are relative to the package directory. `**` matches across
//! directories, and `src/**.c` is shorthand for `src/**/*.c`. Absolute
//! patterns are taken literally.

use crate::error::{BuilderErrorExt, Result};
use globset::{GlobBuilder, GlobMatcher};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

const GLOB_META: [char; 4] = ['*', '?', '[', '{'];

/// Files matched by `patterns`, sorted and without duplicates.
///
/// # Errors
/// Returns an error for an invalid pattern or an unreadable directory.
pub fn collect_sources(base: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = BTreeSet::new();
    for pattern in patterns {
        if Path::new(pattern).is_absolute() {
            files.insert(clean_path(Path::new(pattern)));
            continue;
        }
        for (path, is_dir) in matches(base, pattern)? {
            if !is_dir {
                files.insert(path);
            }
        }
    }
    Ok(files.into_iter().collect())
}

/// Include directories for `patterns`: matched directories, and the parent
/// directory of every matched file.
///
/// # Errors
/// Returns an error for an invalid pattern or an unreadable directory.
pub fn collect_include_dirs(base: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut dirs = BTreeSet::new();
    for pattern in patterns {
        if Path::new(pattern).is_absolute() {
            dirs.insert(clean_path(Path::new(pattern)));
            continue;
        }
        for (path, is_dir) in matches(base, pattern)? {
            if is_dir {
                dirs.insert(path);
            } else if let Some(parent) = path.parent() {
                dirs.insert(parent.to_path_buf());
            }
        }
    }
    Ok(dirs.into_iter().collect())
}

/// Rewrites `**` glued to a suffix (`**.c`) into `**/*.c`.
#[must_use]
pub fn normalize_glob(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 4);
    let mut rest = pattern;
    while let Some(at) = rest.find("**") {
        out.push_str(&rest[..at + 2]);
        rest = &rest[at + 2..];
        if !rest.is_empty() && !rest.starts_with('/') {
            out.push_str("/*");
        }
    }
    out.push_str(rest);
    out
}

/// Resolves `.` and `..` without touching the filesystem.
#[must_use]
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            },
            other => out.push(other),
        }
    }
    out
}

/// Every path under `base` matching `pattern`, with whether it is a directory.
fn matches(base: &Path, pattern: &str) -> Result<Vec<(PathBuf, bool)>> {
    let pattern = normalize_glob(pattern.trim_start_matches("./"));
    let matcher = compile(&pattern)?;

    let prefix: PathBuf =
        pattern.split('/').take_while(|part| !part.contains(GLOB_META)).collect();
    let root = base.join(&prefix);
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry.context(format!("Matching `{pattern}`"))?;
        let Ok(relative) = entry.path().strip_prefix(base) else { continue };
        if matcher.is_match(relative) {
            found.push((clean_path(entry.path()), entry.file_type().is_dir()));
        }
    }
    Ok(found)
}

fn compile(pattern: &str) -> Result<GlobMatcher> {
    let glob = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .context(format!("Compiling `{pattern}`"))?;
    Ok(glob.compile_matcher())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(base: &Path, rel: &str) {
        let path = base.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    fn sandbox() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for rel in [
            "src/main.c",
            "src/util/strings.c",
            "src/util/strings.h",
            "src/gui/window.cpp",
            "include/pkg/api.h",
            "build/_deps/x/src/other.c",
            "README.md",
        ] {
            touch(dir.path(), rel);
        }
        dir
    }

    fn rel(base: &Path, paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.strip_prefix(base).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_normalize_glob() {
        assert_eq!(normalize_glob("src/**.c"), "src/**/*.c");
        assert_eq!(normalize_glob("src/**/*.c"), "src/**/*.c");
        assert_eq!(normalize_glob("src/**"), "src/**");
        assert_eq!(normalize_glob("a/**.c/**.h"), "a/**/*.c/**/*.h");
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path(Path::new("/a/app/../world/./src")), PathBuf::from("/a/world/src"));
        assert_eq!(clean_path(Path::new("../x")), PathBuf::from("../x"));
    }

    #[test]
    fn test_collect_sources() {
        let dir = sandbox();
        let base = dir.path();
        let patterns = ["src/**.cpp", "src/**.c", "src/**.c"].map(String::from);
        let sources = collect_sources(base, &patterns).unwrap();
        assert_eq!(rel(base, &sources), ["src/gui/window.cpp", "src/main.c", "src/util/strings.c"]);
    }

    #[test]
    fn test_collect_sources_skips_directories() {
        let dir = sandbox();
        let sources = collect_sources(dir.path(), &["src/*".to_owned()]).unwrap();
        assert_eq!(rel(dir.path(), &sources), ["src/main.c"]);
    }

    #[test]
    fn test_collect_include_dirs() {
        let dir = sandbox();
        let base = dir.path();
        let patterns = ["include", "src/**.h", "missing/**"].map(String::from);
        let dirs = collect_include_dirs(base, &patterns).unwrap();
        assert_eq!(rel(base, &dirs), ["include", "src/util"]);
    }

    #[test]
    fn test_absolute_patterns_are_literal() {
        let dir = sandbox();
        let absolute = dir.path().join("nowhere/x.c").to_string_lossy().into_owned();
        let sources = collect_sources(dir.path(), &[absolute]).unwrap();
        assert_eq!(sources, [dir.path().join("nowhere/x.c")]);
    }

    #[test]
    fn test_invalid_pattern() {
        let dir = sandbox();
        assert!(collect_sources(dir.path(), &["src/[.c".to_owned()]).is_err());
    }
}
