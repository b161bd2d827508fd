//! Updater configuration.
//!
//! Configuration is optional: with no file every value falls back to a default
//! and the updater still runs, taking both the latest version and the full release
//! from GitHub. The file is looked up in this order:
//!
//! 1. the `--config <path>` argument
//! 2. the `AUTO_UPDATER_CONFIG` environment variable
//! 3. `updater.toml` in the install directory
//!
//! An explicitly named file (1 or 2) must exist. The install-dir file may be absent.
//!
//! # Example
//!
//! ```toml
//! [source]
//! manifest_url = "https://releases.example.com/helper/latest.json"
//! timeout_secs = 120
//! retries = 2
//!
//! [github]
//! owner = "fzls"
//! repo = "djc_helper"
//! mirrors = ["https://ghproxy.example.com/"]
//!
//! [tools]
//! seven_zip = "C:/Program Files/7-Zip/7z.exe"
//!
//! [update]
//! transient_files = ["config.toml", "utils/auto_updater.exe"]
//! ```
//!
//! The loaded [`UpdaterConfig`] is turned into an [`UpdateSettings`] value that
//! is passed explicitly to the orchestrator and the strategies.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::debug;

use crate::constants::{
    CONFIG_ENV_VAR, CONFIG_FILE_NAME, DEFAULT_DOWNLOAD_RETRIES, DEFAULT_REQUEST_TIMEOUT,
    HPATCHZ_STEM, PACKAGED_CONFIG_FILE, UPDATER_BINARY_STEM, USE_PROXY_FLAG, WORKSPACE_DIR_NAME,
};
use crate::core::UpdaterError;
use crate::utils::platform::executable_name;

/// Root of `updater.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UpdaterConfig {
    pub source: SourceConfig,
    pub github: GithubConfig,
    pub tools: ToolsConfig,
    pub update: UpdateConfig,
}

/// `[source]`: the primary release store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceConfig {
    /// URL of the JSON release manifest. Empty means no primary store is configured,
    /// in which case every primary query fails and the full update goes straight
    /// to the fallback source.
    #[serde(default)]
    pub manifest_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Download retries after the first attempt.
    #[serde(default = "default_retries")]
    pub retries: usize,
}

/// `[github]`: the fallback source for full releases.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GithubConfig {
    #[serde(default = "default_github_owner")]
    pub owner: String,

    #[serde(default = "default_github_repo")]
    pub repo: String,

    /// Base URL of the GitHub REST API.
    #[serde(default = "default_github_api_base")]
    pub api_base: String,

    /// The release asset to download is the first one whose name ends with this.
    #[serde(default = "default_asset_suffix")]
    pub asset_suffix: String,

    /// Download mirror prefixes, tried in order before the direct asset URL.
    /// Each prefix is prepended verbatim to the asset URL.
    #[serde(default)]
    pub mirrors: Vec<String>,
}

/// `[tools]`: external binaries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolsConfig {
    /// Patch applier. Relative paths are resolved against the install dir.
    #[serde(default = "default_hpatchz")]
    pub hpatchz: PathBuf,

    /// 7-Zip executable for `.7z` archives. Looked up on `PATH` when unset.
    #[serde(default)]
    pub seven_zip: Option<PathBuf>,
}

/// `[update]`: behaviour of the update strategies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateConfig {
    /// Scratch directory, relative to the install dir.
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: PathBuf,

    /// Files removed from an extracted full release before it is copied over the
    /// installation, relative to the package root.
    #[serde(default = "default_transient_files")]
    pub transient_files: Vec<PathBuf>,

    /// Name of the flag file that keeps system proxies enabled.
    #[serde(default = "default_use_proxy_flag")]
    pub use_proxy_flag: String,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}

fn default_retries() -> usize {
    DEFAULT_DOWNLOAD_RETRIES
}

fn default_github_owner() -> String {
    "fzls".to_string()
}

fn default_github_repo() -> String {
    "djc_helper".to_string()
}

fn default_github_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_asset_suffix() -> String {
    ".7z".to_string()
}

fn default_hpatchz() -> PathBuf {
    PathBuf::from(executable_name(HPATCHZ_STEM))
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from(WORKSPACE_DIR_NAME)
}

fn default_transient_files() -> Vec<PathBuf> {
    vec![PathBuf::from(PACKAGED_CONFIG_FILE), PathBuf::from(executable_name(UPDATER_BINARY_STEM))]
}

fn default_use_proxy_flag() -> String {
    USE_PROXY_FLAG.to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            manifest_url: String::new(),
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
        }
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            owner: default_github_owner(),
            repo: default_github_repo(),
            api_base: default_github_api_base(),
            asset_suffix: default_asset_suffix(),
            mirrors: Vec::new(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            hpatchz: default_hpatchz(),
            seven_zip: None,
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            workspace_dir: default_workspace_dir(),
            transient_files: default_transient_files(),
            use_proxy_flag: default_use_proxy_flag(),
        }
    }
}

/// Pick the config file to read, if any.
///
/// Returns the path together with whether it was named explicitly. Explicit paths
/// must exist; the implicit install-dir path is only a candidate.
pub fn resolve_config_path(
    explicit: Option<&Path>,
    env_value: Option<OsString>,
    install_dir: &Path,
) -> (PathBuf, bool) {
    if let Some(path) = explicit {
        return (path.to_path_buf(), true);
    }
    if let Some(value) = env_value.filter(|v| !v.is_empty()) {
        return (PathBuf::from(value), true);
    }
    (install_dir.join(CONFIG_FILE_NAME), false)
}

impl UpdaterConfig {
    /// Load the configuration for an installation, following the lookup order
    /// described in the module docs.
    pub async fn load(explicit: Option<&Path>, install_dir: &Path) -> Result<Self> {
        let (path, required) =
            resolve_config_path(explicit, std::env::var_os(CONFIG_ENV_VAR), install_dir);

        if path.exists() {
            Self::load_from(&path).await
        } else if required {
            Err(UpdaterError::ConfigError {
                message: format!("Config file does not exist: {}", path.display()),
            }
            .into())
        } else {
            debug!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load and parse a specific file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = toml::from_str(&content).map_err(|e| UpdaterError::ConfigParseError {
            file: path.display().to_string(),
            reason: e.to_string(),
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.source.timeout_secs)
    }

    /// Whether the proxy flag file exists in `install_dir`.
    ///
    /// Without it, HTTP clients ignore system proxy settings; a stale VPN proxy is
    /// the most common reason downloads fail on end-user machines.
    pub fn proxy_enabled(&self, install_dir: &Path) -> bool {
        install_dir.join(&self.update.use_proxy_flag).exists()
    }

    /// Path to the patch applier, absolute if configured relative.
    pub fn hpatchz_path(&self, install_dir: &Path) -> PathBuf {
        install_dir.join(&self.tools.hpatchz)
    }

    /// Build the per-run settings for an installation.
    pub fn settings(&self, install_dir: &Path, dry_run: bool) -> UpdateSettings {
        UpdateSettings {
            workspace_dir: install_dir.join(&self.update.workspace_dir),
            transient_files: self.update.transient_files.clone(),
            dry_run,
        }
    }
}

/// Explicit context for one update run.
///
/// Replaces process-wide flags: everything a strategy needs to know about its
/// scratch space and whether it may touch the installation is carried here. The
/// installation directory itself comes from the update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSettings {
    /// Scratch directory for downloads and extraction.
    pub workspace_dir: PathBuf,
    /// Files stripped from a full release before copy-over, relative to its root.
    pub transient_files: Vec<PathBuf>,
    /// Download and extract, but never copy, patch, terminate, or relaunch.
    pub dry_run: bool,
}

impl UpdateSettings {
    /// Settings with default workspace and transient files for `install_dir`.
    pub fn new(install_dir: impl AsRef<Path>) -> Self {
        UpdaterConfig::default().settings(install_dir.as_ref(), false)
    }

    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}
