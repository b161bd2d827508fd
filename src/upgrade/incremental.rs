//! Incremental update: apply a binary patch set to the installation.

use anyhow::Result;
use tracing::{info, warn};

use super::context::{StrategyOutcome, UpdateContext, UpdateRequest};
use super::package::resolve_package_root;
use crate::constants::PATCH_FILE_SUFFIX;
use crate::core::UpdaterError;
use crate::patch::PatchOutcome;
use crate::process::MainProcess;

/// Download the latest patch set and apply the patch for the installed version.
///
/// Expected failures (the patch set cannot be downloaded, has no patch for this
/// version, or the applier exits non-zero) return [`StrategyOutcome::Failed`] so
/// the caller can fall back to a full update. A failed patch run may leave the
/// installation partially patched; nothing is rolled back.
///
/// Other failures, such as a corrupt archive, are returned as errors.
pub async fn run_incremental(
    ctx: &UpdateContext,
    request: &UpdateRequest,
    main_process: &MainProcess,
) -> Result<StrategyOutcome> {
    let workspace = &ctx.workspace;
    workspace.reset("Before incremental update").await;
    let workspace_dir = workspace.ensure().await?;

    info!("Downloading patch set");
    let archive = match ctx.collaborators.store.download_latest_patches(workspace_dir).await {
        Ok(archive) => archive,
        Err(e) => {
            return Ok(StrategyOutcome::Failed {
                reason: format!("patch set download failed: {e:#}"),
            });
        }
    };

    info!("Extracting {}", archive.display());
    ctx.collaborators.decompressor.extract(&archive, workspace_dir).await?;

    let package_root = resolve_package_root(&archive)?;
    let patch_file =
        package_root.join(format!("{}{PATCH_FILE_SUFFIX}", request.current_version));
    if !patch_file.is_file() {
        let missing = UpdaterError::PatchFileMissing {
            path: patch_file.display().to_string(),
        };
        return Ok(StrategyOutcome::Failed {
            reason: missing.to_string(),
        });
    }

    ctx.terminate_main_process(main_process).await?;

    if ctx.settings.dry_run {
        warn!("Dry run: not applying {}", patch_file.display());
    } else {
        info!("Applying patch {}", patch_file.display());
        let outcome = ctx
            .collaborators
            .patcher
            .apply(&request.install_dir, &patch_file, &request.install_dir)
            .await?;

        if let PatchOutcome::Failed { code } = outcome {
            let code = code.map_or_else(|| "none".to_string(), |c| c.to_string());
            return Ok(StrategyOutcome::Failed {
                reason: format!("patch applier exited with code {code}"),
            });
        }
    }

    workspace.reset("Incremental update finished").await;
    Ok(StrategyOutcome::Completed)
}
