//! The end-to-end update flow.
//!
//! ```text
//! Checking ──(up to date)──────────────────────────────▶ NoUpdate
//!    ├──(no latest version from any source)──▶ Failed
//!    │
//!    ▼
//! Updating ──(patch range ok, eligible)──▶ IncrementalAttempt ──(ok)──▶ DoneRestart
//!    │                                          │
//!    │ (range unavailable / not eligible)       │ (failed / error)
//!    ▼                                          ▼
//! FullAttempt ◀─────────────────────────────────┘
//!    ├──(ok)──▶ DoneRestart
//!    └──(error)──▶ Failed
//! ```
//!
//! `Failed` is the only unrecoverable state. After a failed full update the main
//! application has usually been terminated already, so the error must reach the
//! operator.

use anyhow::{Context, Result};
use std::fmt;
use tracing::{debug, error, info, warn};

use super::context::{StrategyOutcome, UpdateContext, UpdateRequest};
use super::full::run_full;
use super::incremental::run_incremental;
use crate::core::UpdaterError;
use crate::process::MainProcess;
use crate::version::{is_eligible, need_update};

/// States of the update state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    Checking,
    NoUpdate,
    Updating,
    IncrementalAttempt,
    FullAttempt,
    DoneRestart,
    Failed,
}

/// The strategy that brought the installation up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStrategy {
    Incremental,
    Full,
}

impl fmt::Display for UpdateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incremental => f.write_str("incremental"),
            Self::Full => f.write_str("full"),
        }
    }
}

/// How a successful run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateReport {
    /// Nothing to do. The main application keeps running.
    UpToDate { current: String, latest: String },
    /// The installation was updated. `relaunched` is false in dry-run mode.
    Updated {
        from: String,
        to: String,
        strategy: UpdateStrategy,
        relaunched: bool,
    },
}

/// Drives a single update run from version check to relaunch.
pub struct UpdateOrchestrator {
    ctx: UpdateContext,
    history: Vec<UpdateState>,
}

impl UpdateOrchestrator {
    pub fn new(ctx: UpdateContext) -> Self {
        Self {
            ctx,
            history: Vec::new(),
        }
    }

    /// States visited so far, in order.
    pub fn history(&self) -> &[UpdateState] {
        &self.history
    }

    pub fn state(&self) -> Option<UpdateState> {
        self.history.last().copied()
    }

    pub fn context(&self) -> &UpdateContext {
        &self.ctx
    }

    fn transition(&mut self, state: UpdateState) {
        debug!("Update state: {:?} -> {state:?}", self.state());
        self.history.push(state);
    }

    /// Run the update flow once.
    ///
    /// The latest version comes from the release store, or from the fallback
    /// source when the store is unconfigured or unreachable.
    ///
    /// Returns an error if the latest version cannot be determined, if the full
    /// update fails, or if the relaunch fails. An orchestrator runs at most once.
    pub async fn run(&mut self, request: &UpdateRequest) -> Result<UpdateReport> {
        if !self.history.is_empty() {
            return Err(UpdaterError::Other {
                message: "an update orchestrator can only run once".to_string(),
            }
            .into());
        }

        self.transition(UpdateState::Checking);
        let latest = match self.latest_version().await {
            Ok(latest) => latest,
            Err(e) => {
                self.transition(UpdateState::Failed);
                return Err(e);
            }
        };
        info!("Installed version {}, latest version {latest}", request.current_version);

        if !need_update(&request.current_version, &latest) {
            self.transition(UpdateState::NoUpdate);
            info!("Already up to date");
            return Ok(UpdateReport::UpToDate {
                current: request.current_version.clone(),
                latest,
            });
        }

        self.transition(UpdateState::Updating);
        let main_process = MainProcess::new(request.main_process_id);
        let strategy = match self.update(request, &main_process).await {
            Ok(strategy) => strategy,
            Err(e) => {
                self.transition(UpdateState::Failed);
                error!("Update failed: {e:#}");
                self.ctx.workspace.reset("Update failed").await;
                return Err(e);
            }
        };
        info!("{strategy} update to {latest} complete");

        self.transition(UpdateState::DoneRestart);
        let relaunched = self.relaunch(request).await?;

        Ok(UpdateReport::Updated {
            from: request.current_version.clone(),
            to: latest,
            strategy,
            relaunched,
        })
    }

    /// Ask the store for the latest version, then the fallback source.
    async fn latest_version(&self) -> Result<String> {
        let store = &self.ctx.collaborators.store;
        let fallback = &self.ctx.collaborators.fallback;

        let primary = match store.latest_version().await {
            Ok(latest) => return Ok(latest),
            Err(e) => e,
        };
        warn!(
            "Could not get the latest version from {}, asking {}: {primary:#}",
            store.name(),
            fallback.name()
        );

        fallback.latest_version().await.with_context(|| {
            format!(
                "Failed to query the latest version from {} ({primary:#}) or {}",
                store.name(),
                fallback.name()
            )
        })
    }

    async fn update(
        &mut self,
        request: &UpdateRequest,
        main_process: &MainProcess,
    ) -> Result<UpdateStrategy> {
        let patch_range = self.ctx.collaborators.store.latest_patch_range().await;
        match patch_range {
            Ok(range) if is_eligible(&request.current_version, &range) => {
                info!("Version {} is within patch range {range}", request.current_version);
                self.transition(UpdateState::IncrementalAttempt);

                match run_incremental(&self.ctx, request, main_process).await {
                    Ok(StrategyOutcome::Completed) => return Ok(UpdateStrategy::Incremental),
                    Ok(StrategyOutcome::Failed { reason }) => {
                        warn!("Incremental update failed, falling back to full update: {reason}");
                    }
                    Err(e) => {
                        warn!("Incremental update failed, falling back to full update: {e:#}");
                    }
                }
            }
            Ok(range) => {
                info!(
                    "Version {} is outside patch range {range}, using full update",
                    request.current_version
                );
            }
            Err(e) => {
                warn!("Patch range unavailable, using full update: {e:#}");
            }
        }

        self.transition(UpdateState::FullAttempt);
        run_full(&self.ctx, request, main_process).await?;
        Ok(UpdateStrategy::Full)
    }

    async fn relaunch(&self, request: &UpdateRequest) -> Result<bool> {
        let executable = request.executable_path();
        if self.ctx.settings.dry_run {
            warn!("Dry run: not starting {}", executable.display());
            return Ok(false);
        }

        info!("Starting {}", executable.display());
        self.ctx.collaborators.process.launch(&executable).await?;
        Ok(true)
    }
}
