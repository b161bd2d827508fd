//! A throwaway installation to run updates against.

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::UpdateSettings;
use crate::constants::WORKSPACE_DIR_NAME;
use crate::upgrade::UpdateRequest;

/// PID passed as the main process in test requests. Only fakes ever see it.
pub const TEST_MAIN_PID: u32 = 4242;

/// Executable name used by test installations.
pub const TEST_EXE_NAME: &str = "helper.exe";

/// Temporary directory holding an installed application and a staging area for
/// archives that fake sources serve.
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub install_dir: PathBuf,
    pub staging_dir: PathBuf,
}

impl TestEnvironment {
    /// An installation of version `1.0.0` with a main binary and a user config.
    pub fn new() -> Result<Self> {
        super::init_test_logging(None);

        let temp_dir = TempDir::new()?;
        let install_dir = temp_dir.path().join("install");
        let staging_dir = temp_dir.path().join("staging");
        fs::create_dir_all(install_dir.join("utils"))?;
        fs::create_dir_all(&staging_dir)?;

        fs::write(install_dir.join(TEST_EXE_NAME), "main binary 1.0.0")?;
        fs::write(install_dir.join("utils/helper.dll"), "helper 1.0.0")?;
        fs::write(install_dir.join("config.toml"), "# user settings")?;

        Ok(Self {
            temp_dir,
            install_dir,
            staging_dir,
        })
    }

    pub fn request(&self, current_version: &str) -> UpdateRequest {
        UpdateRequest {
            main_process_id: TEST_MAIN_PID,
            current_version: current_version.to_string(),
            install_dir: self.install_dir.clone(),
            executable_name: TEST_EXE_NAME.to_string(),
        }
    }

    pub fn settings(&self) -> UpdateSettings {
        UpdateSettings::new(&self.install_dir)
    }

    pub fn workspace_dir(&self) -> PathBuf {
        self.install_dir.join(WORKSPACE_DIR_NAME)
    }

    pub fn install_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.install_dir.join(relative)
    }

    /// Contents of an installed file, or `None` if it does not exist.
    pub fn read_installed(&self, relative: impl AsRef<Path>) -> Option<String> {
        fs::read_to_string(self.install_path(relative)).ok()
    }
}
