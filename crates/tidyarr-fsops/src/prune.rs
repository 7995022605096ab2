//! Empty-directory pruning beneath the media root.
//!
//! # Design
//! - The walk is contents-first, so a directory is examined only after its children have
//!   been pruned and parents emptied by the run are removed in the same pass.
//! - The root itself is never removed and symlinks are never followed.
//! - A directory that cannot be removed is logged and left in place.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{FsOpsError, FsOpsResult};

/// Remove every empty directory strictly beneath `root`, deepest first.
///
/// Returns the removed directories in removal order.
///
/// # Errors
///
/// Returns an error when `root` is not a directory or cannot be traversed.
pub fn prune_empty_dirs(root: &Path) -> FsOpsResult<Vec<PathBuf>> {
    let metadata = fs::metadata(root).map_err(|err| FsOpsError::io("stat_root", root, err))?;
    if !metadata.is_dir() {
        return Err(FsOpsError::InvalidInput {
            field: "media_root",
            reason: "not a directory",
            value: Some(root.display().to_string()),
        });
    }

    let mut removed = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                return Err(FsOpsError::walkdir("walk", root, err));
            }
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry while pruning");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        match is_empty_dir(path) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot inspect directory");
                continue;
            }
        }
        match fs::remove_dir(path) {
            Ok(()) => {
                debug!(path = %path.display(), "removed empty directory");
                removed.push(path.to_path_buf());
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to remove empty directory");
            }
        }
    }

    info!(root = %root.display(), removed = removed.len(), "empty directories pruned");
    Ok(removed)
}

fn is_empty_dir(path: &Path) -> FsOpsResult<bool> {
    let mut entries = fs::read_dir(path).map_err(|err| FsOpsError::io("read_dir", path, err))?;
    Ok(entries.next().is_none())
}
