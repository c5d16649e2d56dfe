//! # Dependency sources
//!
//! | source                                   | fetched as          |
//! |------------------------------------------|---------------------|
//! | `git:<url>`, `<url>.git`                 | git clone           |
//! | `gh:`, `gl:`, `bb:`, `sr:`, `cb:` + path | git clone           |
//! | `https://host/file.zip[#MD5=<hex>]`      | archive download    |
//! | anything else                            | local path, in place |
//!
//! Git sources accept `repo[@branch][#commit-or-tag]`.

pub mod archive;
pub mod git;
mod progress;

pub use progress::ProgressBar;

use crate::config::MANIFEST_FILENAME;
use crate::error::{BuilderError, BuilderErrorExt, Result};
use qobs_index::Index;
use std::fs;
use std::path::{Path, PathBuf};
use strum_macros::Display;
use tracing::{debug, info, warn};

/// Short prefixes for well-known forges.
pub const SHORTCUTS: [(&str, &str); 5] = [
    ("gh:", "https://github.com/"),
    ("gl:", "https://gitlab.com/"),
    ("bb:", "https://bitbucket.org/"),
    ("sr:", "https://sr.ht/"),
    ("cb:", "https://codeberg.org/"),
];

const GIT_PREFIX: &str = "git:";

/// Where a dependency comes from.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Source {
    #[strum(to_string = "git repository {0}")]
    Git(String),
    #[strum(to_string = "archive {0}")]
    Archive(String),
    #[strum(to_string = "path {0}")]
    Path(String),
}

impl Source {
    /// Classifies a dependency string.
    ///
    /// # Errors
    /// Returns an error for an empty string.
    pub fn parse(source: &str) -> Result<Self> {
        let source = source.trim();
        if source.is_empty() {
            return Err(BuilderError::fetch("empty or illegal dependency string"));
        }

        if let Some(url) = source.strip_prefix(GIT_PREFIX) {
            return Ok(Self::Git(url.to_owned()));
        }
        if names_git_repo(source) {
            return Ok(Self::Git(source.to_owned()));
        }
        for (shortcut, base) in SHORTCUTS {
            if let Some(path) = source.strip_prefix(shortcut) {
                return Ok(Self::Git(format!("{base}{path}")));
            }
        }
        if is_url(source) {
            return Ok(Self::Archive(source.to_owned()));
        }
        Ok(Self::Path(source.to_owned()))
    }

    /// Remote sources are downloaded into the dependency directory.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        !matches!(self, Self::Path(_))
    }
}

/// `<...>.git`, optionally followed by `@branch` and `#rev`.
fn names_git_repo(source: &str) -> bool {
    let base = source.split('#').next().unwrap_or(source);
    let name_start = base.rfind('/').map_or(0, |i| i + 1);
    let base = match base[name_start..].find('@') {
        Some(at) => &base[..name_start + at],
        None => base,
    };
    base.ends_with(".git")
}

/// `scheme://host...`
fn is_url(source: &str) -> bool {
    source.split_once("://").is_some_and(|(scheme, rest)| {
        !scheme.is_empty()
            && scheme.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
            && rest.split(['/', '?', '#']).next().is_some_and(|host| !host.is_empty())
    })
}

/// A fetched dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    /// Directory holding the package's `Qobs.toml`.
    pub path: PathBuf,
    pub source: Source,
    /// `false` when `dest` already held a previous download.
    pub downloaded: bool,
}

/// Makes `source` available on disk.
///
/// Remote sources are downloaded into `dest` unless it already exists. Local
/// paths are resolved against `parent_dir` and used in place. A package
/// without a manifest gets one from the global index overlay, if the index
/// has an entry for it.
///
/// # Errors
/// Returns an error if the download fails or the package has no manifest.
pub fn fetch_dependency(source: &str, dest: &Path, parent_dir: &Path) -> Result<Fetched> {
    let parsed = Source::parse(source)?;

    let (path, downloaded) = match &parsed {
        Source::Path(path) => {
            let path = parent_dir.join(path);
            if !path.is_dir() {
                return Err(BuilderError::fetch(format!("{} is not a directory", path.display())));
            }
            (path, false)
        },
        _ if dest.is_dir() => {
            debug!(dest = %dest.display(), "dependency already fetched");
            (dest.to_path_buf(), false)
        },
        remote => {
            fs::create_dir_all(dest).context(format!("Creating {}", dest.display()))?;
            let result = match remote {
                Source::Git(url) => git::clone_repo(url, dest),
                Source::Archive(url) => archive::download_and_extract(url, dest),
                Source::Path(_) => Ok(()),
            };
            if let Err(err) = result {
                discard_partial(dest);
                return Err(err);
            }
            (dest.to_path_buf(), true)
        },
    };

    if !path.join(MANIFEST_FILENAME).is_file() {
        match Index::global() {
            Ok(index) => {
                apply_overlay(&index, &path, source)?;
            },
            Err(err) => warn!("could not load the qobs index: {err}"),
        }
    }

    if !path.join(MANIFEST_FILENAME).is_file() {
        return Err(BuilderError::fetch(format!(
            "{} has no {MANIFEST_FILENAME} and the qobs index has no entry for `{source}`",
            path.display()
        )));
    }

    Ok(Fetched { path, source: parsed, downloaded })
}

/// Removes what a failed fetch left in `dest`. Returns `false` if something remains.
///
/// A leftover directory is taken for a finished fetch on the next run.
fn discard_partial(dest: &Path) -> bool {
    match fs::remove_dir_all(dest) {
        Ok(()) => true,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => true,
        Err(err) => {
            warn!(
                dest = %dest.display(),
                "could not remove a partially fetched dependency, delete it before building again: {err}"
            );
            false
        },
    }
}

/// Copies the index overlay for `source` into `dir`.
///
/// Entries are keyed by the source string as written, then by its bare
/// repository URL. Returns `true` when an overlay was applied.
///
/// # Errors
/// Returns an error if copying the overlay fails.
pub fn apply_overlay(index: &Index, dir: &Path, source: &str) -> Result<bool> {
    let bare = source.split(['#', '@']).next().unwrap_or(source);
    let Some(key) = [source, bare].into_iter().find(|key| index.has_dep(key)) else {
        return Ok(false);
    };

    info!(source = key, dir = %dir.display(), "applying index overlay");
    index.copy_into(dir, key).context(format!("Applying index overlay for `{key}`"))?;
    Ok(true)
}
