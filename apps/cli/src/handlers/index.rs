//! `qobs index ...`

use anyhow::{Result, bail};
use qobs_index::{INDEX_FILENAME, Index};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

/// The index checkout in the current directory.
fn local_index() -> Result<(Index, PathBuf)> {
    let cwd = env::current_dir()?;
    if !cwd.join(INDEX_FILENAME).is_file() {
        bail!(
            "no {INDEX_FILENAME} found in current directory (must run inside the qobs index; create it if you need a new index)"
        );
    }
    Ok((Index::load(&cwd)?, cwd))
}

/// # Errors
/// Returns an error outside an index checkout or if saving fails.
pub fn add(url: &str, dir: &str) -> Result<()> {
    let (mut index, cwd) = local_index()?;
    if index.has_dep(url) {
        warn!("overwriting existing dependency for {url}");
    }
    index.set_dep(url, dir);
    index.save(&cwd)?;
    info!("added dependency {url} -> {dir}");
    Ok(())
}

/// # Errors
/// Returns an error outside an index checkout or if saving fails.
pub fn remove(url: &str) -> Result<()> {
    let (mut index, cwd) = local_index()?;
    if index.remove_dep(url) {
        info!("removed dependency {url}");
    } else {
        warn!("dependency {url} not found");
    }
    index.save(&cwd)?;
    Ok(())
}

/// # Errors
/// Returns an error if the global index cannot be fetched.
pub fn update() -> Result<()> {
    let index = Index::update_global()?;
    info!(entries = index.deps().len(), "updated global index successfully");
    Ok(())
}

/// # Errors
/// Returns an error if the global index cannot be loaded.
pub fn search(term: &str) -> Result<()> {
    let index = Index::global()?;
    let matches = index.search(term);
    for (i, (url, path)) in matches.iter().enumerate() {
        println!("{}. {url} -> {path}", i + 1);
    }
    if matches.is_empty() {
        warn!("no matches found for {term:?}");
    } else {
        info!("found {} matches for {term:?}", matches.len());
    }
    Ok(())
}
