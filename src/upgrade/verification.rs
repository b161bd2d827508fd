use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use crate::core::UpdaterError;

/// SHA-256 verification of downloaded archives.
///
/// Release manifests may publish a checksum next to each archive URL. When they
/// do, the archive is verified before it is extracted so that a truncated or
/// tampered download never reaches the installation directory.
pub struct ChecksumVerifier;

impl ChecksumVerifier {
    /// Hex-encoded SHA-256 of a file, lowercase and without prefix.
    pub async fn compute_sha256(file_path: &Path) -> Result<String> {
        debug!("Computing SHA256 checksum for: {}", file_path.display());

        let mut file = File::open(file_path)
            .await
            .with_context(|| format!("Failed to open file: {}", file_path.display()))?;

        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; 64 * 1024];
        loop {
            let read = file
                .read(&mut buffer)
                .await
                .with_context(|| format!("Failed to read file: {}", file_path.display()))?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(hex::encode(hasher.finalize()))
    }

    /// Verify a file against an expected checksum.
    ///
    /// The expected value may carry a `sha256:` prefix and is compared
    /// case-insensitively.
    pub async fn verify_checksum(file_path: &Path, expected_checksum: &str) -> Result<()> {
        info!("Verifying checksum for: {}", file_path.display());

        let expected = normalize(expected_checksum);
        let actual = Self::compute_sha256(file_path).await?;

        if actual != expected {
            return Err(UpdaterError::ChecksumMismatch {
                name: file_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file_path.display().to_string()),
                expected,
                actual,
            }
            .into());
        }

        debug!("Checksum verification successful");
        Ok(())
    }
}

fn normalize(checksum: &str) -> String {
    let trimmed = checksum.trim();
    let hex = trimmed
        .get(..7)
        .filter(|prefix| prefix.eq_ignore_ascii_case("sha256:"))
        .map_or(trimmed, |_| &trimmed[7..]);
    hex.to_ascii_lowercase()
}
