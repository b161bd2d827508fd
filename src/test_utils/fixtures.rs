//! Release package fixtures.
//!
//! Packages are built as zip archives so they extract in-process with the real
//! [`ArchiveExtractor`](crate::archive::ArchiveExtractor).

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A release or patch-set package: a top-level directory with files inside.
#[derive(Debug, Clone)]
pub struct PackageFixture {
    root_dir: String,
    files: Vec<(String, Vec<u8>)>,
}

impl PackageFixture {
    /// A package whose files live under `root_dir/` inside the archive.
    pub fn new(root_dir: impl Into<String>) -> Self {
        Self {
            root_dir: root_dir.into(),
            files: Vec::new(),
        }
    }

    /// A full release containing the main executable, a helper, and the files
    /// a full update must strip before copying.
    pub fn full_release(root_dir: &str, executable_name: &str, version: &str) -> Self {
        Self::new(root_dir)
            .with_file(executable_name, format!("main binary {version}"))
            .with_file("utils/helper.dll", format!("helper {version}"))
            .with_file("config.toml", "# packaged config template")
            .with_file(
                crate::utils::platform::executable_name(crate::constants::UPDATER_BINARY_STEM),
                "packaged updater",
            )
    }

    /// A patch set with one patch per listed source version.
    pub fn patch_set(root_dir: &str, source_versions: &[&str]) -> Self {
        source_versions.iter().fold(Self::new(root_dir), |fixture, version| {
            fixture.with_file(format!("{version}.patch"), format!("patch from {version}"))
        })
    }

    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.files.push((path.into(), contents.into()));
        self
    }

    /// Write the package as `dir/archive_name` and return the archive path.
    pub fn write_zip(&self, dir: &Path, archive_name: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let archive_path = dir.join(archive_name);
        let file = std::fs::File::create(&archive_path)
            .with_context(|| format!("Failed to create {}", archive_path.display()))?;

        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        zip.add_directory(format!("{}/", self.root_dir), options)?;
        for (path, contents) in &self.files {
            zip.start_file(format!("{}/{path}", self.root_dir), options)?;
            zip.write_all(contents)?;
        }
        zip.finish()?;

        Ok(archive_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::extract_zip;
    use tempfile::TempDir;

    #[test]
    fn test_package_fixture_round_trips_through_extractor() {
        let temp = TempDir::new().unwrap();
        let archive = PackageFixture::patch_set("patches", &["1.0.0", "1.0.1"])
            .write_zip(temp.path(), "patches.zip")
            .unwrap();

        let out = temp.path().join("out");
        extract_zip(&archive, &out).unwrap();
        assert_eq!(
            std::fs::read_to_string(out.join("patches/1.0.1.patch")).unwrap(),
            "patch from 1.0.1"
        );
    }
}
