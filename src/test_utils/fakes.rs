//! In-process stand-ins for the updater's external collaborators.
//!
//! Each fake records how it was used behind shared handles, so a test can keep a
//! clone of the fake after boxing the original into [`Collaborators`].

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::archive::ArchiveExtractor;
use crate::core::UpdaterError;
use crate::patch::{PatchApplier, PatchOutcome};
use crate::process::ProcessControl;
use crate::source::{FullReleaseSource, ReleaseStore};
use crate::upgrade::Collaborators;
use crate::version::PatchRange;

/// Shared call counter.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

fn network_error(operation: &str) -> anyhow::Error {
    UpdaterError::NetworkError {
        operation: operation.to_string(),
        reason: "simulated outage".to_string(),
    }
    .into()
}

/// Copy a prepared archive into `dest_dir`, as a download would.
async fn deliver(archive: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let name = archive.file_name().ok_or_else(|| anyhow::anyhow!("archive has no file name"))?;
    tokio::fs::create_dir_all(dest_dir).await?;
    let dest = dest_dir.join(name);
    tokio::fs::copy(archive, &dest).await?;
    Ok(dest)
}

/// A [`ReleaseStore`] serving prepared archives from disk.
///
/// Anything not configured fails with a network error.
#[derive(Debug, Clone, Default)]
pub struct FakeReleaseStore {
    pub latest_version: Option<String>,
    pub patch_range: Option<PatchRange>,
    pub full_archive: Option<PathBuf>,
    pub patch_archive: Option<PathBuf>,
    pub version_queries: CallCounter,
    pub full_downloads: CallCounter,
    pub patch_downloads: CallCounter,
}

impl FakeReleaseStore {
    pub fn new(latest_version: &str) -> Self {
        Self {
            latest_version: Some(latest_version.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_patch_range(mut self, min: &str, max: &str) -> Self {
        let parse = |v: &str| v.parse().unwrap_or_else(|e| panic!("bad test version {v}: {e}"));
        self.patch_range = Some(PatchRange::new(parse(min), parse(max)));
        self
    }

    #[must_use]
    pub fn with_full_archive(mut self, archive: impl Into<PathBuf>) -> Self {
        self.full_archive = Some(archive.into());
        self
    }

    #[must_use]
    pub fn with_patch_archive(mut self, archive: impl Into<PathBuf>) -> Self {
        self.patch_archive = Some(archive.into());
        self
    }
}

#[async_trait]
impl ReleaseStore for FakeReleaseStore {
    fn name(&self) -> &str {
        "fake store"
    }

    async fn latest_version(&self) -> Result<String> {
        self.version_queries.inc();
        self.latest_version.clone().ok_or_else(|| network_error("latest version"))
    }

    async fn latest_patch_range(&self) -> Result<PatchRange> {
        self.patch_range.clone().ok_or_else(|| network_error("patch range"))
    }

    async fn download_latest_full(&self, dest_dir: &Path) -> Result<PathBuf> {
        self.full_downloads.inc();
        match &self.full_archive {
            Some(archive) => deliver(archive, dest_dir).await,
            None => Err(network_error("download full release")),
        }
    }

    async fn download_latest_patches(&self, dest_dir: &Path) -> Result<PathBuf> {
        self.patch_downloads.inc();
        match &self.patch_archive {
            Some(archive) => deliver(archive, dest_dir).await,
            None => Err(network_error("download patch set")),
        }
    }
}

/// A [`FullReleaseSource`] serving a prepared archive, or failing when it has none.
#[derive(Debug, Clone, Default)]
pub struct FakeFullSource {
    pub latest_version: Option<String>,
    pub archive: Option<PathBuf>,
    pub version_queries: CallCounter,
    pub downloads: CallCounter,
}

impl FakeFullSource {
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn serving(archive: impl Into<PathBuf>) -> Self {
        Self {
            archive: Some(archive.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_latest_version(mut self, version: &str) -> Self {
        self.latest_version = Some(version.to_string());
        self
    }
}

#[async_trait]
impl FullReleaseSource for FakeFullSource {
    fn name(&self) -> &str {
        "fake fallback"
    }

    async fn latest_version(&self) -> Result<String> {
        self.version_queries.inc();
        self.latest_version.clone().ok_or_else(|| network_error("fallback latest version"))
    }

    async fn download_latest_full(&self, dest_dir: &Path) -> Result<PathBuf> {
        self.downloads.inc();
        match &self.archive {
            Some(archive) => deliver(archive, dest_dir).await,
            None => Err(network_error("download fallback release")),
        }
    }
}

/// One recorded patch application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchCall {
    pub target_dir: PathBuf,
    pub patch_file: PathBuf,
    pub output_dir: PathBuf,
}

/// A [`PatchApplier`] returning a fixed outcome.
///
/// On [`PatchOutcome::Applied`] the patch file's contents are written to
/// `output_dir/PATCHED`, so tests can see that the right patch was used.
#[derive(Debug, Clone)]
pub struct FakePatchApplier {
    pub outcome: PatchOutcome,
    pub calls: Arc<Mutex<Vec<PatchCall>>>,
}

impl FakePatchApplier {
    pub fn new(outcome: PatchOutcome) -> Self {
        Self {
            outcome,
            calls: Arc::default(),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(PatchOutcome::Applied)
    }

    pub fn failing(code: i32) -> Self {
        Self::new(PatchOutcome::Failed {
            code: Some(code),
        })
    }

    pub fn calls(&self) -> Vec<PatchCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PatchApplier for FakePatchApplier {
    async fn apply(
        &self,
        target_dir: &Path,
        patch_file: &Path,
        output_dir: &Path,
    ) -> Result<PatchOutcome> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(PatchCall {
                target_dir: target_dir.to_path_buf(),
                patch_file: patch_file.to_path_buf(),
                output_dir: output_dir.to_path_buf(),
            });
        }
        if self.outcome.is_applied() {
            let contents = tokio::fs::read(patch_file).await?;
            tokio::fs::write(output_dir.join("PATCHED"), contents).await?;
        }
        Ok(self.outcome)
    }
}

/// A [`ProcessControl`] that records requests instead of touching processes.
#[derive(Debug, Clone, Default)]
pub struct RecordingProcessControl {
    pub terminated: Arc<Mutex<Vec<u32>>>,
    pub launched: Arc<Mutex<Vec<PathBuf>>>,
}

impl RecordingProcessControl {
    pub fn terminated(&self) -> Vec<u32> {
        self.terminated.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn launched(&self) -> Vec<PathBuf> {
        self.launched.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ProcessControl for RecordingProcessControl {
    async fn terminate(&self, pid: u32) -> Result<()> {
        if let Ok(mut terminated) = self.terminated.lock() {
            terminated.push(pid);
        }
        Ok(())
    }

    async fn launch(&self, executable: &Path) -> Result<()> {
        if let Ok(mut launched) = self.launched.lock() {
            launched.push(executable.to_path_buf());
        }
        Ok(())
    }
}

/// Box the fakes into [`Collaborators`], extracting with the real [`ArchiveExtractor`].
pub fn fake_collaborators(
    store: &FakeReleaseStore,
    fallback: &FakeFullSource,
    patcher: &FakePatchApplier,
    process: &RecordingProcessControl,
) -> Collaborators {
    Collaborators {
        store: Box::new(store.clone()),
        fallback: Box::new(fallback.clone()),
        decompressor: Box::new(ArchiveExtractor::new()),
        patcher: Box::new(patcher.clone()),
        process: Box::new(process.clone()),
    }
}
