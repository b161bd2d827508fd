//! Binary patch application.
//!
//! Patch sets are produced by `hdiffz` and applied with its companion `hpatchz`,
//! which ships inside the installation (`utils/hpatchz.exe`). The applier is a
//! trait so tests can substitute an in-process fake for the real binary.

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::core::UpdaterError;
use crate::utils::platform::find_tool;

/// Default upper bound for a single patch run.
pub const DEFAULT_PATCH_TIMEOUT: Duration = Duration::from_secs(600);

/// Result of running the patch applier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The applier exited with status zero.
    Applied,
    /// The applier ran and failed. `code` is `None` when it was killed or timed out.
    Failed { code: Option<i32> },
}

impl PatchOutcome {
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Applies a directory diff to an installation.
#[async_trait]
pub trait PatchApplier: Send + Sync {
    /// Apply `patch_file` to `target_dir`, writing the result to `output_dir`.
    ///
    /// `Err` is reserved for failures to run the applier at all, such as a missing
    /// binary. An applier that runs and reports failure yields [`PatchOutcome::Failed`].
    async fn apply(&self, target_dir: &Path, patch_file: &Path, output_dir: &Path)
    -> Result<PatchOutcome>;
}

/// [`PatchApplier`] that runs the `hpatchz` binary in directory-diff mode.
#[derive(Debug, Clone)]
pub struct HpatchzApplier {
    binary: PathBuf,
    timeout: Duration,
}

impl HpatchzApplier {
    /// Use the binary at `binary`, falling back to `hpatchz` on `PATH` if it is missing.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: DEFAULT_PATCH_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn resolve_binary(&self) -> Result<PathBuf> {
        if self.binary.is_file() {
            return Ok(self.binary.clone());
        }
        debug!("{} not found, looking for hpatchz on PATH", self.binary.display());
        find_tool(None, &["hpatchz"]).map_err(|_| {
            UpdaterError::ToolNotFound {
                tool: self.binary.display().to_string(),
            }
            .into()
        })
    }
}

#[async_trait]
impl PatchApplier for HpatchzApplier {
    async fn apply(
        &self,
        target_dir: &Path,
        patch_file: &Path,
        output_dir: &Path,
    ) -> Result<PatchOutcome> {
        let binary = self.resolve_binary()?;
        info!("Applying {} to {}", patch_file.display(), target_dir.display());

        let mut child = Command::new(&binary)
            .arg("-C-diff")
            .arg("-f")
            .arg(target_dir)
            .arg(patch_file)
            .arg(output_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| UpdaterError::ProcessError {
                operation: format!("run {}", binary.display()),
                reason: e.to_string(),
            })?;

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => status.map_err(|e| UpdaterError::ProcessError {
                operation: format!("wait for {}", binary.display()),
                reason: e.to_string(),
            })?,
            Err(_) => {
                error!("Patch applier did not finish within {}s", self.timeout.as_secs());
                // kill_on_drop reaps it if this fails
                let _ = child.kill().await;
                return Ok(PatchOutcome::Failed {
                    code: None,
                });
            }
        };

        if status.success() {
            Ok(PatchOutcome::Applied)
        } else {
            error!("Patch applier failed with {status}");
            Ok(PatchOutcome::Failed {
                code: status.code(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_outcome() {
        assert!(PatchOutcome::Applied.is_applied());
        assert!(!PatchOutcome::Failed { code: Some(1) }.is_applied());
    }

    #[tokio::test]
    async fn test_missing_binary_is_tool_not_found() {
        let temp = TempDir::new().unwrap();
        let applier = HpatchzApplier::new(temp.path().join("no-such-hpatchz"));
        if crate::utils::command_exists("hpatchz") {
            return;
        }

        let err = applier
            .apply(temp.path(), &temp.path().join("1.0.0.patch"), temp.path())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<UpdaterError>(),
            Some(UpdaterError::ToolNotFound { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_zero_exit_is_applied_and_args_are_passed() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("args.txt");
        let script = write_script(temp.path(), "hpatchz", &format!("echo \"$@\" > {}", log.display()));

        let outcome = HpatchzApplier::new(&script)
            .apply(Path::new("/install"), Path::new("/ws/1.0.0.patch"), Path::new("/install"))
            .await
            .unwrap();

        assert_eq!(outcome, PatchOutcome::Applied);
        let args = std::fs::read_to_string(log).unwrap();
        assert_eq!(args.trim(), "-C-diff -f /install /ws/1.0.0.patch /install");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_failed() {
        let temp = TempDir::new().unwrap();
        let script = write_script(temp.path(), "hpatchz", "exit 3");

        let outcome = HpatchzApplier::new(&script)
            .apply(temp.path(), &temp.path().join("x.patch"), temp.path())
            .await
            .unwrap();
        assert_eq!(outcome, PatchOutcome::Failed { code: Some(3) });
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_is_failed_without_code() {
        let temp = TempDir::new().unwrap();
        let script = write_script(temp.path(), "hpatchz", "sleep 30");

        let outcome = HpatchzApplier::new(&script)
            .with_timeout(Duration::from_millis(200))
            .apply(temp.path(), &temp.path().join("x.patch"), temp.path())
            .await
            .unwrap();
        assert_eq!(outcome, PatchOutcome::Failed { code: None });
    }
}
