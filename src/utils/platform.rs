//! Platform helpers.
//!
//! The updater mostly runs on Windows next to the desktop app it maintains, but
//! every code path is also exercised on Unix so that the test suite runs in CI.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Whether this build targets Windows.
#[must_use]
pub const fn is_windows() -> bool {
    cfg!(windows)
}

/// Append the platform executable suffix to `name` when it has none.
///
/// `helper` becomes `helper.exe` on Windows and stays `helper` elsewhere.
/// Names that already carry an extension are returned unchanged.
#[must_use]
pub fn executable_name(name: &str) -> String {
    if is_windows() && Path::new(name).extension().is_none() {
        format!("{name}.exe")
    } else {
        name.to_string()
    }
}

/// Whether `cmd` can be found on `PATH`.
#[must_use]
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Locate an external tool.
///
/// A `configured` path wins when it points at an existing file. Otherwise each
/// name in `candidates` is searched on `PATH` in order.
pub fn find_tool(configured: Option<&Path>, candidates: &[&str]) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        anyhow::bail!("Configured tool does not exist: {}", path.display());
    }

    candidates
        .iter()
        .find_map(|name| which::which(name).ok())
        .with_context(|| format!("None of [{}] found on PATH", candidates.join(", ")))
}
