//! Full update: copy a complete release over the installation.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::context::{UpdateContext, UpdateRequest};
use super::package::resolve_package_root;
use crate::core::UpdaterError;
use crate::process::MainProcess;
use crate::utils::fs::copy_dir;

/// Download the latest full release and copy it over the installation.
///
/// The primary store is tried first and the fallback source second. Every
/// failure is fatal because there is nothing left to fall back to.
///
/// The copy is not transactional. If it is interrupted the installation is left
/// with a mix of old and new files.
pub async fn run_full(
    ctx: &UpdateContext,
    request: &UpdateRequest,
    main_process: &MainProcess,
) -> Result<()> {
    let workspace = &ctx.workspace;
    workspace.reset("Before full update").await;
    let workspace_dir = workspace.ensure().await?;

    let archive = download_full_release(ctx, workspace_dir).await?;

    info!("Extracting {}", archive.display());
    ctx.collaborators.decompressor.extract(&archive, workspace_dir).await?;
    let package_root = resolve_package_root(&archive)?;

    remove_transient_files(&package_root, &ctx.settings.transient_files).await;

    ctx.terminate_main_process(main_process).await?;

    if ctx.settings.dry_run {
        warn!(
            "Dry run: not copying {} over {}",
            package_root.display(),
            request.install_dir.display()
        );
    } else {
        info!("Copying {} over {}", package_root.display(), request.install_dir.display());
        let install_dir = request.install_dir.clone();
        let copied = tokio::task::spawn_blocking(move || copy_dir(&package_root, &install_dir))
            .await
            .context("Copy task panicked")??;
        info!("Copied {copied} files");
    }

    workspace.reset("Full update finished").await;
    Ok(())
}

async fn download_full_release(ctx: &UpdateContext, workspace_dir: &Path) -> Result<PathBuf> {
    let store = &ctx.collaborators.store;
    info!("Downloading latest release from {}", store.name());

    let primary = match store.download_latest_full(workspace_dir).await {
        Ok(archive) => return Ok(archive),
        Err(e) => e,
    };
    warn!("Download from {} failed, trying {}: {primary:#}", store.name(), ctx.collaborators.fallback.name());

    match ctx.collaborators.fallback.download_latest_full(workspace_dir).await {
        Ok(archive) => Ok(archive),
        Err(fallback) => Err(UpdaterError::AllSourcesFailed {
            primary: format!("{primary:#}"),
            fallback: format!("{fallback:#}"),
        }
        .into()),
    }
}

/// Delete files from the package that must not overwrite the installation.
/// Failures are logged and ignored.
async fn remove_transient_files(package_root: &Path, files: &[PathBuf]) {
    for file in files {
        let path = package_root.join(file);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => info!("Removed {} from package", path.display()),
            Err(e) => debug!("Could not remove {}: {e}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_remove_transient_files_is_best_effort() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("utils")).unwrap();
        std::fs::write(temp.path().join("config.toml"), "template").unwrap();
        std::fs::write(temp.path().join("app.exe"), "binary").unwrap();

        remove_transient_files(
            temp.path(),
            &[PathBuf::from("config.toml"), PathBuf::from("utils/auto_updater.exe")],
        )
        .await;

        assert!(!temp.path().join("config.toml").exists());
        assert!(temp.path().join("app.exe").exists());
    }
}
