//! Archive extraction for downloaded release and patch packages.
//!
//! Release packages are published as `.7z` archives; `.zip` and `.tar.gz` are
//! accepted as well so that alternative stores and test fixtures can use formats
//! that extract in-process. Unlike toolchain installers, entries are extracted
//! with their top-level directory intact: the package root is located afterwards
//! by [`crate::upgrade::package::resolve_package_root`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use tar::Archive;
use tokio::process::Command;
use tracing::{debug, info};

use crate::constants::ARCHIVE_SUFFIXES;
use crate::core::UpdaterError;
use crate::utils::fs::{ensure_dir, ensure_parent_dir};
use crate::utils::platform::find_tool;
use crate::utils::progress::spinner_with_message;

/// Archive formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
    SevenZip,
}

impl ArchiveFormat {
    /// Detect the format from the file name suffix.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".7z") {
            Some(Self::SevenZip)
        } else {
            None
        }
    }
}

/// Strip a known archive suffix from a file name.
///
/// `app-1.2.3.7z` becomes `app-1.2.3`. Returns `None` for unknown suffixes and
/// for names that would be empty after stripping.
pub fn strip_archive_suffix(file_name: &str) -> Option<&str> {
    let lower = file_name.to_ascii_lowercase();
    ARCHIVE_SUFFIXES.iter().find_map(|suffix| {
        if lower.ends_with(suffix) && file_name.len() > suffix.len() {
            file_name.get(..file_name.len() - suffix.len())
        } else {
            None
        }
    })
}

/// Decompresses an archive into a directory.
#[async_trait]
pub trait Decompressor: Send + Sync {
    /// Extract `archive` into `dest_dir`, creating it if needed.
    async fn extract(&self, archive: &Path, dest_dir: &Path) -> Result<()>;
}

/// [`Decompressor`] for zip and tar.gz (in-process) and 7z (external `7z` binary).
#[derive(Debug, Clone, Default)]
pub struct ArchiveExtractor {
    seven_zip: Option<PathBuf>,
}

impl ArchiveExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific 7-Zip executable instead of searching `PATH`.
    #[must_use]
    pub fn with_seven_zip(mut self, path: Option<PathBuf>) -> Self {
        self.seven_zip = path;
        self
    }

    async fn extract_seven_zip(&self, archive: &Path, dest_dir: &Path) -> Result<()> {
        let binary = find_tool(self.seven_zip.as_deref(), &["7z", "7za", "7zz"]).map_err(|_| {
            UpdaterError::ToolNotFound {
                tool: "7z".to_string(),
            }
        })?;
        debug!("Extracting with {}", binary.display());

        let mut output_flag = std::ffi::OsString::from("-o");
        output_flag.push(dest_dir.as_os_str());

        let output = Command::new(&binary)
            .arg("x")
            .arg("-y")
            .arg(output_flag)
            .arg(archive)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to run {}", binary.display()))?;

        if !output.status.success() {
            return Err(UpdaterError::ArchiveError {
                archive: archive.display().to_string(),
                reason: format!(
                    "{} exited with {}: {}",
                    binary.display(),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl Decompressor for ArchiveExtractor {
    async fn extract(&self, archive: &Path, dest_dir: &Path) -> Result<()> {
        let format = ArchiveFormat::from_path(archive).ok_or_else(|| {
            UpdaterError::UnsupportedArchive {
                archive: archive.display().to_string(),
            }
        })?;
        info!("Extracting {} into {}", archive.display(), dest_dir.display());

        tokio::fs::create_dir_all(dest_dir)
            .await
            .with_context(|| format!("Failed to create directory: {}", dest_dir.display()))?;

        let spinner = spinner_with_message(format!("Extracting {}", file_label(archive)));
        let result = match format {
            ArchiveFormat::SevenZip => self.extract_seven_zip(archive, dest_dir).await,
            ArchiveFormat::Zip | ArchiveFormat::TarGz => {
                let archive = archive.to_path_buf();
                let dest_dir = dest_dir.to_path_buf();
                tokio::task::spawn_blocking(move || match format {
                    ArchiveFormat::Zip => extract_zip(&archive, &dest_dir),
                    _ => extract_tar_gz(&archive, &dest_dir),
                })
                .await
                .context("Extraction task panicked")?
            }
        };
        spinner.finish_and_clear();

        result.map_err(|e| match e.downcast::<UpdaterError>() {
            Ok(typed) => typed.into(),
            Err(e) => UpdaterError::ArchiveError {
                archive: archive.display().to_string(),
                reason: format!("{e:#}"),
            }
            .into(),
        })
    }
}

fn file_label(path: &Path) -> String {
    path.file_name().map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

fn reject_unsafe_path(path: &Path) -> Result<()> {
    if path.is_absolute() || path.components().any(|c| matches!(c, Component::ParentDir)) {
        anyhow::bail!(
            "Refusing to extract path with parent directory or absolute reference: {}",
            path.display()
        );
    }
    Ok(())
}

/// Extract a zip archive, keeping entry paths as stored.
pub fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let file = std::fs::File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read ZIP archive: {}", archive_path.display()))?;

    for i in 0..archive.len() {
        let mut entry =
            archive.by_index(i).with_context(|| format!("Failed to read archive entry {i}"))?;
        let entry_path = entry
            .enclosed_name()
            .with_context(|| format!("Invalid entry path in archive: {}", entry.name()))?;
        reject_unsafe_path(&entry_path)?;

        let output_path = dest_dir.join(&entry_path);
        if entry.is_dir() {
            ensure_dir(&output_path)?;
        } else {
            ensure_parent_dir(&output_path)?;
            let mut outfile = std::fs::File::create(&output_path)
                .with_context(|| format!("Failed to create file: {}", output_path.display()))?;
            std::io::copy(&mut entry, &mut outfile)
                .with_context(|| format!("Failed to extract: {}", output_path.display()))?;
        }
    }
    Ok(())
}

/// Extract a gzip-compressed tarball, keeping entry paths as stored.
pub fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let file = std::fs::File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    let mut archive = Archive::new(GzDecoder::new(file));

    for entry in archive
        .entries()
        .with_context(|| format!("Failed to read tar entries: {}", archive_path.display()))?
    {
        let mut entry = entry
            .with_context(|| format!("Failed to read tar entry: {}", archive_path.display()))?;
        let entry_path = entry.path().context("Failed to get entry path")?.into_owned();
        reject_unsafe_path(&entry_path)?;

        let output_path = dest_dir.join(&entry_path);
        if entry.header().entry_type().is_dir() {
            ensure_dir(&output_path)?;
        } else {
            ensure_parent_dir(&output_path)?;
            entry
                .unpack(&output_path)
                .with_context(|| format!("Failed to extract: {}", output_path.display()))?;
        }
    }
    Ok(())
}
