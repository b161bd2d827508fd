//! Directory operations for creating, copying over, and removing directories.
//!
//! The full update strategy copies an extracted release tree over the live
//! installation, and both strategies repeatedly clear the scratch workspace, so
//! these helpers are written to be safe to call on paths that may or may not
//! exist.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Create `path` and all its parents if missing.
///
/// Fails if `path` exists but is not a directory.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).with_context(|| {
            let platform_help = if crate::utils::platform::is_windows() {
                "On Windows: Check that the path length is < 260 chars or that long path support is enabled"
            } else {
                "Check directory permissions and path validity"
            };

            format!("Failed to create directory: {}\n\n{}", path.display(), platform_help)
        })?;
    } else if !path.is_dir() {
        return Err(anyhow::anyhow!("Path exists but is not a directory: {}", path.display()));
    }
    Ok(())
}

/// Create the parent directory of `path` if it has one.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        ensure_dir(parent)?;
    }
    Ok(())
}

/// Recursively copy the contents of `src` into `dst`, overwriting existing files.
///
/// Files in `dst` that do not exist in `src` are left untouched. Symlinks and other
/// special entries are skipped. Returns the number of files copied.
///
/// This is not transactional: a failure part-way leaves `dst` with a mix of old
/// and new files.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<usize> {
    ensure_dir(dst)?;

    let mut copied = 0;
    for entry in WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry =
            entry.with_context(|| format!("Failed to read directory: {}", src.display()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("Entry outside source tree: {}", entry.path().display()))?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            ensure_dir(&target)?;
        } else if file_type.is_file() {
            ensure_parent_dir(&target)?;
            fs::copy(entry.path(), &target).with_context(|| {
                format!(
                    "Failed to copy file from {} to {}",
                    entry.path().display(),
                    target.display()
                )
            })?;
            copied += 1;
        }
        // Skip symlinks and other file types
    }

    Ok(copied)
}

/// Remove `path` recursively. A missing path is not an error.
pub fn remove_dir_all(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}
