//! Streaming HTTP downloads shared by every release source.
//!
//! Downloads are written to `<name>.part` and renamed once complete, so a
//! half-written archive is never mistaken for a finished one. Failed attempts are
//! retried with exponential backoff.

use anyhow::{Context, Result, bail};
use futures::StreamExt;
use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_retry::Retry;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::{debug, info, warn};

use crate::constants::{
    MAX_BACKOFF_DELAY, PARTIAL_DOWNLOAD_SUFFIX, STARTING_BACKOFF_DELAY_MS, USER_AGENT,
};
use crate::core::UpdaterError;
use crate::upgrade::verification::ChecksumVerifier;
use crate::utils::progress::ProgressBar;

/// Build the HTTP client used for manifests, API calls and downloads.
///
/// With `use_proxy == false` system proxy settings are ignored.
pub fn build_client(timeout: Duration, use_proxy: bool) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().timeout(timeout).user_agent(USER_AGENT);
    if !use_proxy {
        builder = builder.no_proxy();
    }
    builder.build().context("Failed to create HTTP client")
}

/// Last path segment of `url`, percent-decoded, without query or fragment.
///
/// Returns `None` when there is no usable segment or it does not decode to a
/// plain file name.
pub fn file_name_from_url(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back().filter(|segment| !segment.is_empty())?;
    let decoded = percent_decode_str(segment).decode_utf8().ok()?;
    safe_file_name(&decoded).ok().map(str::to_string)
}

/// Check that `name` can be joined onto a directory without leaving it.
///
/// Names with path separators, `.`/`..`, or a root are rejected.
pub fn safe_file_name(name: &str) -> Result<&str, UpdaterError> {
    let is_plain = !name.contains(['/', '\\'])
        && Path::new(name).file_name().is_some_and(|file_name| file_name == name);
    if is_plain {
        Ok(name)
    } else {
        Err(UpdaterError::ReleaseInfoMissing {
            source_name: "download".to_string(),
            reason: format!("'{name}' is not a plain file name"),
        })
    }
}

/// Downloads files with retries, progress output, and optional checksum verification.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
    retries: usize,
}

impl Downloader {
    pub fn new(client: reqwest::Client, retries: usize) -> Self {
        Self {
            client,
            retries,
        }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Download `url` to `dest`, replacing any existing file.
    ///
    /// When `expected_sha256` is given the finished file is verified and removed
    /// again on mismatch.
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        expected_sha256: Option<&str>,
    ) -> Result<PathBuf> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let mut part_name = dest.file_name().unwrap_or_default().to_os_string();
        part_name.push(PARTIAL_DOWNLOAD_SUFFIX);
        let part_path = dest.with_file_name(part_name);

        // 500ms, 1s, 2s, ... capped
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(STARTING_BACKOFF_DELAY_MS / 2)
            .max_delay(MAX_BACKOFF_DELAY)
            .take(self.retries);

        let mut attempt = 0usize;
        let result = Retry::spawn(strategy, || {
            attempt += 1;
            let current = attempt;
            let part_path = part_path.clone();
            async move {
                if current > 1 {
                    warn!("Retrying download of {url} (attempt {current})");
                }
                let outcome = self.download_once(url, &part_path).await;
                if outcome.is_err() {
                    let _ = tokio::fs::remove_file(&part_path).await;
                }
                outcome
            }
        })
        .await;

        if let Err(e) = result {
            return Err(UpdaterError::DownloadFailed {
                url: url.to_string(),
                reason: format!("{e:#}"),
            }
            .into());
        }

        tokio::fs::rename(&part_path, dest).await.with_context(|| {
            format!("Failed to rename {} to {}", part_path.display(), dest.display())
        })?;

        if let Some(expected) = expected_sha256 {
            if let Err(e) = ChecksumVerifier::verify_checksum(dest, expected).await {
                let _ = tokio::fs::remove_file(dest).await;
                return Err(e);
            }
        }

        info!("Downloaded {}", dest.display());
        Ok(dest.to_path_buf())
    }

    async fn download_once(&self, url: &str, dest: &Path) -> Result<()> {
        debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to connect to {url}"))?;

        if !response.status().is_success() {
            bail!("HTTP error {}: {url}", response.status());
        }

        let prefix = dest
            .file_name()
            .map(|n| n.to_string_lossy().trim_end_matches(PARTIAL_DOWNLOAD_SUFFIX).to_string())
            .unwrap_or_default();
        let progress = ProgressBar::new_download(response.content_length(), prefix);

        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("Failed to create file: {}", dest.display()))?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.with_context(|| format!("Failed to read chunk from {url}"))?;
            file.write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write to {}", dest.display()))?;
            progress.inc(chunk.len() as u64);
        }

        file.flush().await.with_context(|| format!("Failed to flush {}", dest.display()))?;
        progress.finish_and_clear();
        Ok(())
    }
}
