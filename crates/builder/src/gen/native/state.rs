use crate::error::{BuilderErrorExt, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// What a target was last built from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetState {
    /// Source path -> sha256.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sources: BTreeMap<String, String>,
    /// Dependency target -> sha256 of its artifact.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cflags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ldflags: Vec<String>,
}

/// Contents of `qobs_build_state.json`, keyed by target name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildState {
    targets: BTreeMap<String, TargetState>,
}

impl BuildState {
    /// Loads the state file. A missing file is an empty state.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e).context(format!("Reading {}", path.display())),
        };
        let state = serde_json::from_str(&text).context(format!("Parsing {}", path.display()))?;
        Ok(state)
    }

    /// Writes the state with two-space indentation.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text).context(format!("Writing {}", path.display()))?;
        Ok(())
    }

    #[must_use]
    pub fn get(&self, target: &str) -> Option<&TargetState> {
        self.targets.get(target)
    }

    pub fn insert(&mut self, target: impl Into<String>, state: TargetState) {
        self.targets.insert(target.into(), state);
    }
}

/// Memoised sha256 of files, hex encoded.
#[derive(Debug, Default)]
pub struct HashCache {
    hashes: HashMap<PathBuf, String>,
}

impl HashCache {
    /// # Errors
    /// Returns the I/O error if the file cannot be read.
    pub fn hash(&mut self, path: &Path) -> io::Result<String> {
        if let Some(hash) = self.hashes.get(path) {
            return Ok(hash.clone());
        }
        let bytes = fs::read(path)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let hash = hex::encode(hasher.finalize());
        self.hashes.insert(path.to_path_buf(), hash.clone());
        Ok(hash)
    }

    /// Forgets `path`, so a rewritten file is hashed again.
    pub fn invalidate(&mut self, path: &Path) {
        self.hashes.remove(path);
    }
}
