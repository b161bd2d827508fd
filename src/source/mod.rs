//! Where releases come from.
//!
//! The updater talks to two independent sources:
//!
//! - a primary [`ReleaseStore`] that knows the latest version, publishes full
//!   packages and patch sets, and describes which installed versions a patch set
//!   applies to
//! - a secondary [`FullReleaseSource`] used only when the primary cannot deliver a
//!   full package
//!
//! Every call may fail with a network or not-found error. The update strategies
//! decide what a failure means; the sources only report it.

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::version::PatchRange;

pub mod download;
pub mod github;
pub mod http;

pub use download::{Downloader, build_client};
pub use github::GithubReleaseSource;
pub use http::{HttpReleaseStore, ReleaseManifest};

/// The primary release store.
#[async_trait]
pub trait ReleaseStore: Send + Sync {
    /// Short name used in logs and error reports.
    fn name(&self) -> &str;

    /// Identifier of the newest published release, as published.
    async fn latest_version(&self) -> Result<String>;

    /// Installed versions the latest patch set can be applied to.
    async fn latest_patch_range(&self) -> Result<PatchRange>;

    /// Download the latest full package into `dest_dir`, returning the archive path.
    async fn download_latest_full(&self, dest_dir: &Path) -> Result<PathBuf>;

    /// Download the latest patch-set archive into `dest_dir`, returning the archive path.
    async fn download_latest_patches(&self, dest_dir: &Path) -> Result<PathBuf>;
}

/// An independent source of full packages.
#[async_trait]
pub trait FullReleaseSource: Send + Sync {
    fn name(&self) -> &str;

    /// Identifier of the newest release this source offers.
    ///
    /// Asked only when the primary store cannot answer.
    async fn latest_version(&self) -> Result<String>;

    /// Download the latest full package into `dest_dir`, returning the archive path.
    async fn download_latest_full(&self, dest_dir: &Path) -> Result<PathBuf>;
}
