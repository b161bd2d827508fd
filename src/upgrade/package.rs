//! Locating the root of an extracted package.
//!
//! Archives from the release manifest extract to a directory named after the
//! archive itself (`app-1.2.3.7z` → `app-1.2.3`). Archives from the GitHub
//! fallback have a fixed file name while the directory inside carries the real
//! release name, so when the derived directory does not exist the extraction
//! root is scanned for its single subdirectory.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::archive::strip_archive_suffix;
use crate::core::UpdaterError;

/// Resolve the package root for an archive extracted next to itself.
///
/// Fails with [`UpdaterError::PackageRootNotFound`] unless exactly one
/// plausible directory is found, rather than guessing.
pub fn resolve_package_root(archive: &Path) -> Result<PathBuf, UpdaterError> {
    let root = archive.parent().unwrap_or_else(|| Path::new("."));

    if let Some(stem) =
        archive.file_name().and_then(|name| name.to_str()).and_then(strip_archive_suffix)
    {
        let derived = root.join(stem);
        if derived.is_dir() {
            debug!("Package root derived from archive name: {}", derived.display());
            return Ok(derived);
        }
    }

    let not_found = |candidates| UpdaterError::PackageRootNotFound {
        root: root.display().to_string(),
        candidates,
    };

    let entries = std::fs::read_dir(root).map_err(|_| not_found(0))?;
    let directories: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();

    match directories.as_slice() {
        [single] => {
            debug!("Package root found by scanning: {}", single.display());
            Ok(single.clone())
        }
        _ => Err(not_found(directories.len())),
    }
}
