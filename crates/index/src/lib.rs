//! # Index
//!
//! The qobs index maps upstream dependency URLs to directories that hold a
//! `Qobs.toml` (and whatever else is needed) for projects that do not ship one.
//! When a fetched dependency has no manifest, the builder copies the overlay
//! from the index into it.
//!
//! The index itself is a git repository with a `qobs_index.json` at its root:
//!
//! ```json
//! {
//!   "https://github.com/madler/zlib.git": "zlib"
//! }
//! ```
//!
//! The global copy lives in `<user cache dir>/qobs/index` (override with `QOBS_INDEX_DIR`).

mod error;

pub use error::{IndexError, IndexErrorExt};

use crate::error::Result;

use qobs_git::{CloneOptions, Git};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Name of the index file at the root of an index directory.
pub const INDEX_FILENAME: &str = "qobs_index.json";
/// Environment variable overriding the global index location.
pub const INDEX_DIR_ENV: &str = "QOBS_INDEX_DIR";

const INDEX_REPO_URL: &str = "https://github.com/qobs-build/index.git";
const INDEX_BRANCH: &str = "main";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Index {
    base_path: PathBuf,
    /// dependency URL -> path inside the index
    deps: BTreeMap<String, String>,
}

impl Index {
    /// Creates an empty index rooted at `base_path`.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self { base_path: base_path.into(), deps: BTreeMap::new() }
    }

    /// Parses an index from JSON.
    ///
    /// # Errors
    /// Returns [`IndexError::Json`] if the content is not a string-to-string object.
    pub fn parse(reader: impl Read, base_path: impl Into<PathBuf>) -> Result<Self> {
        let deps: BTreeMap<String, String> = serde_json::from_reader(BufReader::new(reader))?;
        Ok(Self { base_path: base_path.into(), deps })
    }

    /// Loads `qobs_index.json` from `base_path`.
    ///
    /// # Errors
    /// Returns an error if the file is missing or malformed.
    pub fn load(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref();
        let path = base_path.join(INDEX_FILENAME);
        let file = fs::File::open(&path).context(format!("Opening {}", path.display()))?;
        Self::parse(file, base_path).context(format!("Parsing {}", path.display()))
    }

    /// Writes the index as pretty JSON into `base_path/qobs_index.json`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save(&self, base_path: impl AsRef<Path>) -> Result<()> {
        let path = base_path.as_ref().join(INDEX_FILENAME);
        let file = fs::File::create(&path).context(format!("Creating {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.deps)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Clones the index repository into `base_path`, or pulls it if a clone exists.
    ///
    /// # Errors
    /// Returns an error if git fails or the fetched index cannot be parsed.
    pub fn fetch(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref();
        fs::create_dir_all(base_path)?;

        let git = Git::new();
        if Git::is_repository(base_path) {
            info!("Updating qobs index in {}", base_path.display());
            git.pull(base_path, INDEX_BRANCH, Some(1)).context("Updating the qobs index")?;
        } else {
            println!("  Fetching qobs index");
            git.clone_repo(INDEX_REPO_URL, base_path, &CloneOptions::shallow(INDEX_BRANCH))
                .context("Cloning the qobs index")?;
        }

        Self::load(base_path)
    }

    /// Loads the index at `base_path`, fetching it first if it is missing.
    ///
    /// # Errors
    /// Returns an error if the index can neither be loaded nor fetched.
    pub fn load_or_fetch(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref();
        if base_path.join(INDEX_FILENAME).is_file() {
            return Self::load(base_path);
        }
        Self::fetch(base_path)
    }

    /// Location of the global index.
    ///
    /// # Errors
    /// Returns an error if the platform has no user cache directory.
    pub fn global_dir() -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os(INDEX_DIR_ENV).filter(|d| !d.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        dirs::cache_dir()
            .map(|dir| dir.join("qobs").join("index"))
            .ok_or_else(|| "Could not determine the user cache directory".into())
    }

    /// Loads the global index, fetching it on first use.
    ///
    /// # Errors
    /// Returns an error if the index can neither be loaded nor fetched.
    pub fn global() -> Result<Self> {
        Self::load_or_fetch(Self::global_dir()?)
    }

    /// Fetches the latest global index.
    ///
    /// # Errors
    /// Returns an error if the fetch fails.
    pub fn update_global() -> Result<Self> {
        Self::fetch(Self::global_dir()?)
    }

    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    #[must_use]
    pub const fn deps(&self) -> &BTreeMap<String, String> {
        &self.deps
    }

    /// Returns the index directory registered for `url`.
    #[must_use]
    pub fn lookup(&self, url: &str) -> Option<&str> {
        self.deps.get(url).map(String::as_str)
    }

    pub fn set_dep(&mut self, url: impl Into<String>, path: impl Into<String>) {
        self.deps.insert(url.into(), path.into());
    }

    #[must_use]
    pub fn has_dep(&self, url: &str) -> bool {
        self.deps.contains_key(url)
    }

    /// Removes `url`, returning `true` if it was present.
    pub fn remove_dep(&mut self, url: &str) -> bool {
        self.deps.remove(url).is_some()
    }

    /// Case-insensitive search over URLs and index paths, sorted by URL.
    #[must_use]
    pub fn search(&self, term: &str) -> Vec<(&str, &str)> {
        let term = term.to_lowercase();
        self.deps
            .iter()
            .filter(|(url, path)| {
                url.to_lowercase().contains(&term) || path.to_lowercase().contains(&term)
            })
            .map(|(url, path)| (url.as_str(), path.as_str()))
            .collect()
    }

    /// Copies the overlay registered for `url` into `dest`, overwriting existing files.
    ///
    /// # Errors
    /// Returns [`IndexError::NotFound`] when `url` has no entry, and
    /// [`IndexError::InvalidEntry`] when the entry points outside the index.
    pub fn copy_into(&self, dest: impl AsRef<Path>, url: &str) -> Result<()> {
        let dest = dest.as_ref();
        let entry = self
            .lookup(url)
            .ok_or_else(|| IndexError::NotFound { url: url.to_owned().into(), context: None })?;

        let relative = Path::new(entry);
        if relative.components().any(|c| !matches!(c, Component::Normal(_) | Component::CurDir)) {
            return Err(IndexError::InvalidEntry {
                message: format!("{url} -> {entry}").into(),
                context: Some("Index paths must stay inside the index".into()),
            });
        }

        let from = self.base_path.join(relative);
        if !from.is_dir() {
            return Err(IndexError::InvalidEntry {
                message: format!("{} is not a directory", from.display()).into(),
                context: None,
            });
        }

        for entry in WalkDir::new(&from).min_depth(1) {
            let entry = entry?;
            let rel = entry.path().strip_prefix(&from).map_err(|e| IndexError::Internal {
                message: e.to_string().into(),
                context: None,
            })?;
            let target = dest.join(rel);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)?;
            } else {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(entry.path(), &target)
                    .context(format!("Copying {}", entry.path().display()))?;
                debug!("copied {} -> {}", entry.path().display(), target.display());
            }
        }
        Ok(())
    }
}
