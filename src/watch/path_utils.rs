// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::{Path, PathBuf};

use crate::fs::FileSystem;

/// Resolve `path` into the form used as a command-map key.
///
/// This is intentionally robust:
/// - First we try to canonicalize the full path.
/// - If that fails (the file does not exist yet, or was just renamed away),
///   we canonicalize the parent directory and re-attach the file name.
/// - Only if both attempts fail do we fall back to a lexical absolute path.
///
/// Configuration entries and notification paths both go through this
/// function, so a file that is created after startup still matches its
/// entry.
pub fn canonical_path(fs: &dyn FileSystem, path: &Path) -> PathBuf {
    if let Ok(canon) = fs.canonicalize(path) {
        return canon;
    }

    if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
        if !parent.as_os_str().is_empty() {
            if let Ok(parent_canon) = fs.canonicalize(parent) {
                return parent_canon.join(name);
            }
        }
    }

    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Directory that must be registered with the notification source to see
/// changes of `path`.
pub fn watch_dir_of(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
