//! Workspace root discovery
//!
//! The integration workspace is the directory holding the base compose file
//! and/or the service registry. Commands may be run from any subdirectory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// Find the workspace root by looking for any of `markers`
///
/// Search order:
/// 1. Current directory
/// 2. Parent directories (up to 10 levels)
/// 3. REPO_ROOT environment variable
/// 4. Current directory as a last resort (fresh workspace before `setup --create-config`)
pub fn find_workspace_root(markers: &[&str]) -> Result<PathBuf> {
    let current = std::env::current_dir().context("Failed to get current directory")?;

    debug!("Searching for workspace root from: {}", current.display());

    if let Some(root) = search_upwards(&current, markers, 10) {
        return Ok(root);
    }

    if let Ok(repo_root) = std::env::var("REPO_ROOT") {
        let path = PathBuf::from(&repo_root);
        if has_marker(&path, markers) {
            debug!("Found workspace via REPO_ROOT env var: {}", path.display());
            return Ok(path);
        }
        debug!("REPO_ROOT set to {} but no marker found there", repo_root);
    }

    debug!(
        "No {} found, using current directory as workspace root",
        markers.join(" / ")
    );
    Ok(current)
}

/// Walk from `start` up to `max_levels` parents looking for a marker file
pub fn search_upwards(start: &Path, markers: &[&str], max_levels: usize) -> Option<PathBuf> {
    start
        .ancestors()
        .take(max_levels + 1)
        .enumerate()
        .find(|(_, dir)| has_marker(dir, markers))
        .map(|(level, dir)| {
            debug!("Found workspace marker {} level(s) up at: {}", level, dir.display());
            dir.to_path_buf()
        })
}

fn has_marker(dir: &Path, markers: &[&str]) -> bool {
    markers.iter().any(|m| dir.join(m).is_file())
}
