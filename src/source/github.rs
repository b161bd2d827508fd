//! Fallback source: the latest GitHub release of the application repository.
//!
//! GitHub downloads are often slow or blocked for end users, so configured
//! mirror prefixes are tried first and the direct asset URL last.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::FullReleaseSource;
use super::download::{Downloader, safe_file_name};
use crate::config::GithubConfig;
use crate::core::UpdaterError;

const SOURCE_NAME: &str = "GitHub releases";

#[derive(Debug, Deserialize)]
struct GithubRelease {
    tag_name: String,
    #[serde(default)]
    assets: Vec<GithubAsset>,
}

#[derive(Debug, Deserialize)]
struct GithubAsset {
    name: String,
    browser_download_url: String,
}

/// [`FullReleaseSource`] downloading the first matching asset of the latest release.
pub struct GithubReleaseSource {
    config: GithubConfig,
    downloader: Downloader,
}

impl GithubReleaseSource {
    pub fn new(config: GithubConfig, downloader: Downloader) -> Self {
        Self {
            config,
            downloader,
        }
    }

    fn latest_release_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/releases/latest",
            self.config.api_base.trim_end_matches('/'),
            self.config.owner,
            self.config.repo
        )
    }

    async fn latest_release(&self) -> Result<GithubRelease> {
        let url = self.latest_release_url();
        debug!("Querying {url}");
        let network_error = |reason: String| UpdaterError::NetworkError {
            operation: format!("query latest release of {}/{}", self.config.owner, self.config.repo),
            reason,
        };

        let response = self
            .downloader
            .client()
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| network_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(network_error(format!("HTTP {}", response.status())).into());
        }

        response.json::<GithubRelease>().await.map_err(|e| {
            UpdaterError::ReleaseInfoMissing {
                source_name: SOURCE_NAME.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Candidate URLs for an asset: each mirror prefix, then the direct URL.
    pub fn candidate_urls(&self, direct_url: &str) -> Vec<String> {
        self.config
            .mirrors
            .iter()
            .filter(|prefix| !prefix.is_empty())
            .map(|prefix| format!("{prefix}{direct_url}"))
            .chain(std::iter::once(direct_url.to_string()))
            .collect()
    }
}

/// Version part of a release tag: `v20.1.3` becomes `20.1.3`.
fn release_version(tag_name: &str) -> &str {
    let tag = tag_name.trim();
    tag.strip_prefix('v').or_else(|| tag.strip_prefix('V')).unwrap_or(tag)
}

#[async_trait]
impl FullReleaseSource for GithubReleaseSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn latest_version(&self) -> Result<String> {
        let release = self.latest_release().await?;
        let version = release_version(&release.tag_name);
        info!("Latest GitHub release is {}", release.tag_name);
        Ok(version.to_string())
    }

    async fn download_latest_full(&self, dest_dir: &Path) -> Result<PathBuf> {
        let release = self.latest_release().await?;
        let asset = release
            .assets
            .iter()
            .find(|asset| asset.name.ends_with(&self.config.asset_suffix))
            .ok_or_else(|| UpdaterError::ReleaseInfoMissing {
                source_name: SOURCE_NAME.to_string(),
                reason: format!(
                    "release {} has no asset ending with '{}'",
                    release.tag_name, self.config.asset_suffix
                ),
            })?;
        info!("Latest GitHub release is {}, asset {}", release.tag_name, asset.name);

        let dest = dest_dir.join(safe_file_name(&asset.name)?);
        let mut last_error = None;
        for url in self.candidate_urls(&asset.browser_download_url) {
            match self.downloader.download(&url, &dest, None).await {
                Ok(path) => return Ok(path),
                Err(e) => {
                    warn!("Download from {url} failed: {e:#}");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            UpdaterError::DownloadFailed {
                url: asset.browser_download_url.clone(),
                reason: "no download URL to try".to_string(),
            }
            .into()
        }))
    }
}
