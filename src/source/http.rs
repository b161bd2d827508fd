//! Primary release store backed by a JSON manifest over HTTP.
//!
//! The manifest is fetched once per run and cached:
//!
//! ```json
//! {
//!   "version": "20.1.3",
//!   "full": { "url": "DNF蚊子腿小助手_v20.1.3.7z", "sha256": "..." },
//!   "patches": {
//!     "min_version": "20.0.0",
//!     "max_version": "20.1.2",
//!     "url": "https://cdn.example.com/helper/patches_v20.1.3.7z"
//!   }
//! }
//! ```
//!
//! Artifact URLs may be relative to the manifest URL. `patches` is optional; a
//! release without a patch set can only be installed with a full update.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::ReleaseStore;
use super::download::{Downloader, file_name_from_url, safe_file_name};
use crate::core::UpdaterError;
use crate::version::{PatchRange, Version};

const STORE_NAME: &str = "release manifest";

/// A downloadable artifact in the manifest.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Artifact {
    pub url: String,
    /// File name to save as. Derived from the URL when absent.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
}

/// The latest patch set and the installed versions it applies to.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PatchSet {
    pub min_version: String,
    pub max_version: String,
    #[serde(flatten)]
    pub artifact: Artifact,
}

/// Release manifest published by the primary store.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ReleaseManifest {
    pub version: String,
    pub full: Artifact,
    #[serde(default)]
    pub patches: Option<PatchSet>,
}

/// [`ReleaseStore`] reading a [`ReleaseManifest`] from a URL.
pub struct HttpReleaseStore {
    manifest_url: String,
    downloader: Downloader,
    manifest: OnceCell<ReleaseManifest>,
}

impl HttpReleaseStore {
    /// An empty `manifest_url` yields a store whose every call fails with a
    /// configuration error.
    pub fn new(manifest_url: impl Into<String>, downloader: Downloader) -> Self {
        Self {
            manifest_url: manifest_url.into(),
            downloader,
            manifest: OnceCell::new(),
        }
    }

    /// The manifest, fetched on first use.
    pub async fn manifest(&self) -> Result<&ReleaseManifest> {
        self.manifest.get_or_try_init(|| self.fetch_manifest()).await
    }

    async fn fetch_manifest(&self) -> Result<ReleaseManifest> {
        if self.manifest_url.is_empty() {
            return Err(UpdaterError::ConfigError {
                message: "no release manifest URL is configured ([source] manifest_url)"
                    .to_string(),
            }
            .into());
        }

        debug!("Fetching release manifest from {}", self.manifest_url);
        let network_error = |reason: String| UpdaterError::NetworkError {
            operation: format!("fetch release manifest {}", self.manifest_url),
            reason,
        };

        let response = self
            .downloader
            .client()
            .get(&self.manifest_url)
            .send()
            .await
            .map_err(|e| network_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(network_error(format!("HTTP {}", response.status())).into());
        }

        let body = response.text().await.map_err(|e| network_error(e.to_string()))?;
        let manifest: ReleaseManifest =
            serde_json::from_str(&body).map_err(|e| UpdaterError::ReleaseInfoMissing {
                source_name: STORE_NAME.to_string(),
                reason: e.to_string(),
            })?;

        info!("Release manifest lists version {}", manifest.version);
        Ok(manifest)
    }

    fn resolve_url(&self, url: &str) -> Result<String> {
        if reqwest::Url::parse(url).is_ok() {
            return Ok(url.to_string());
        }
        let base = reqwest::Url::parse(&self.manifest_url)
            .with_context(|| format!("Invalid manifest URL: {}", self.manifest_url))?;
        let joined =
            base.join(url).with_context(|| format!("Invalid artifact URL in manifest: {url}"))?;
        Ok(joined.to_string())
    }

    async fn download_artifact(&self, artifact: &Artifact, dest_dir: &Path) -> Result<PathBuf> {
        let url = self.resolve_url(&artifact.url)?;
        let name = match &artifact.name {
            Some(name) => safe_file_name(name)?.to_string(),
            None => file_name_from_url(&url).ok_or_else(|| UpdaterError::ReleaseInfoMissing {
                source_name: STORE_NAME.to_string(),
                reason: format!("cannot derive a file name from {url}"),
            })?,
        };

        self.downloader.download(&url, &dest_dir.join(name), artifact.sha256.as_deref()).await
    }
}

#[async_trait]
impl ReleaseStore for HttpReleaseStore {
    fn name(&self) -> &str {
        STORE_NAME
    }

    async fn latest_version(&self) -> Result<String> {
        Ok(self.manifest().await?.version.clone())
    }

    async fn latest_patch_range(&self) -> Result<PatchRange> {
        let manifest = self.manifest().await?;
        let patches = manifest.patches.as_ref().ok_or_else(|| UpdaterError::ReleaseInfoMissing {
            source_name: STORE_NAME.to_string(),
            reason: format!("no patch set is published for {}", manifest.version),
        })?;
        let parse = |raw: &str| {
            raw.parse::<Version>().map_err(|e| UpdaterError::ReleaseInfoMissing {
                source_name: STORE_NAME.to_string(),
                reason: format!("invalid patch range bound: {e}"),
            })
        };
        Ok(PatchRange::new(parse(&patches.min_version)?, parse(&patches.max_version)?))
    }

    async fn download_latest_full(&self, dest_dir: &Path) -> Result<PathBuf> {
        let manifest = self.manifest().await?;
        self.download_artifact(&manifest.full, dest_dir).await
    }

    async fn download_latest_patches(&self, dest_dir: &Path) -> Result<PathBuf> {
        let manifest = self.manifest().await?;
        let patches = manifest.patches.as_ref().ok_or_else(|| UpdaterError::ReleaseInfoMissing {
            source_name: STORE_NAME.to_string(),
            reason: format!("no patch set is published for {}", manifest.version),
        })?;
        self.download_artifact(&patches.artifact, dest_dir).await
    }
}
