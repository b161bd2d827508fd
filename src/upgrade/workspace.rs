use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// The scratch directory used while an update attempt downloads and extracts.
///
/// Exactly one attempt owns the workspace at a time. It is cleared before every
/// attempt, so leftovers from a crashed run never accumulate, and again once an
/// attempt is over.
#[derive(Debug, Clone)]
pub struct Workspace {
    path: PathBuf,
}

impl Workspace {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Remove the workspace if it exists, logging `reason`.
    ///
    /// Never fails. A directory that cannot be removed is logged and left for the
    /// next reset to retry.
    pub async fn reset(&self, reason: &str) {
        info!("{reason}: clearing {}", self.path.display());

        let path = self.path.clone();
        match tokio::task::spawn_blocking(move || crate::utils::remove_dir_all(&path)).await {
            Ok(Ok(())) => debug!("Removed workspace {}", self.path.display()),
            Ok(Err(e)) => warn!("{e:#}"),
            Err(e) => warn!("Workspace removal task failed for {}: {e}", self.path.display()),
        }
    }

    /// Create the workspace if needed and return its path.
    pub async fn ensure(&self) -> Result<&Path> {
        fs::create_dir_all(&self.path)
            .await
            .with_context(|| format!("Failed to create workspace: {}", self.path.display()))?;
        Ok(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reset_removes_contents() {
        let temp = TempDir::new().unwrap();
        let workspace = Workspace::new(temp.path().join("_update_temp_dir"));

        let path = workspace.ensure().await.unwrap().to_path_buf();
        std::fs::create_dir_all(path.join("pkg/utils")).unwrap();
        std::fs::write(path.join("pkg/utils/a.bin"), "x").unwrap();
        assert!(workspace.exists());

        workspace.reset("test").await;
        assert!(!workspace.exists());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let workspace = Workspace::new(temp.path().join("never_created"));

        workspace.reset("first").await;
        workspace.reset("second").await;
        assert!(!workspace.exists());

        workspace.ensure().await.unwrap();
        workspace.reset("third").await;
        workspace.reset("fourth").await;
        assert!(!workspace.exists());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_reset_removes_symlink_without_following_it() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("install");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("helper.exe"), "live binary").unwrap();

        let link = temp.path().join("_update_temp_dir");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        Workspace::new(&link).reset("test").await;
        assert!(std::fs::symlink_metadata(&link).is_err());
        assert!(target.join("helper.exe").is_file());
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let workspace = Workspace::new(temp.path().join("ws"));

        workspace.ensure().await.unwrap();
        std::fs::write(workspace.path().join("keep.txt"), "x").unwrap();
        workspace.ensure().await.unwrap();
        assert!(workspace.path().join("keep.txt").exists());
    }
}
