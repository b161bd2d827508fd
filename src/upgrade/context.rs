use anyhow::Result;
use std::path::PathBuf;
use tracing::warn;

use super::workspace::Workspace;
use crate::archive::Decompressor;
use crate::config::UpdateSettings;
use crate::patch::PatchApplier;
use crate::process::{MainProcess, ProcessControl};
use crate::source::{FullReleaseSource, ReleaseStore};

/// What the main application asked the updater to do.
///
/// Built once from the command line and never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    /// PID of the application that started the updater. 0 when unknown.
    pub main_process_id: u32,
    /// Version the application reports for itself.
    pub current_version: String,
    /// Directory containing the installed application.
    pub install_dir: PathBuf,
    /// File name of the application binary inside `install_dir`.
    pub executable_name: String,
}

impl UpdateRequest {
    /// The executable to start after a successful update.
    pub fn executable_path(&self) -> PathBuf {
        self.install_dir.join(&self.executable_name)
    }
}

/// Result of a strategy that ran to a decision.
///
/// `Failed` covers expected failures that should trigger a fallback. Anything
/// unexpected is returned as an error instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyOutcome {
    Completed,
    Failed { reason: String },
}

/// External collaborators the update flow depends on.
pub struct Collaborators {
    pub store: Box<dyn ReleaseStore>,
    pub fallback: Box<dyn FullReleaseSource>,
    pub decompressor: Box<dyn Decompressor>,
    pub patcher: Box<dyn PatchApplier>,
    pub process: Box<dyn ProcessControl>,
}

/// Everything one update run needs besides the request itself.
pub struct UpdateContext {
    pub settings: UpdateSettings,
    pub workspace: Workspace,
    pub collaborators: Collaborators,
}

impl UpdateContext {
    pub fn new(settings: UpdateSettings, collaborators: Collaborators) -> Self {
        let workspace = Workspace::new(settings.workspace_dir.clone());
        Self {
            settings,
            workspace,
            collaborators,
        }
    }

    /// Stop the main application before its files are modified.
    pub(crate) async fn terminate_main_process(&self, main_process: &MainProcess) -> Result<()> {
        if self.settings.dry_run {
            warn!("Dry run: not terminating main process {}", main_process.pid());
            return Ok(());
        }
        main_process.terminate(self.collaborators.process.as_ref()).await
    }
}
