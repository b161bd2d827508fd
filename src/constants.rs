//! Constants shared across the updater.
//!
//! Names of on-disk artifacts live here so that the workspace, the strategies,
//! and the tests agree on them.

use std::time::Duration;

/// Scratch directory, relative to the install dir, used for downloads and extraction.
pub const WORKSPACE_DIR_NAME: &str = "_update_temp_dir";

/// Default `--cwd` value. Seeing it means the updater was started by hand rather
/// than by the main application.
pub const INVALID_CWD: &str = "./invalid_cwd";

/// Default `--exe-name`: the main application binary.
pub const DEFAULT_EXE_NAME: &str = "DNF蚊子腿小助手.exe";

/// Default `--version` when the caller did not pass one.
pub const DEFAULT_CURRENT_VERSION: &str = "1.0.0";

/// Flag file (or directory) in the install dir that keeps system proxies enabled.
pub const USE_PROXY_FLAG: &str = ".use_proxy";

/// Config file looked up in the install dir when neither `--config` nor the env var is set.
pub const CONFIG_FILE_NAME: &str = "updater.toml";

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "AUTO_UPDATER_CONFIG";

/// Log directory, relative to the install dir.
pub const LOG_DIR_NAME: &str = "logs";

/// Log file written inside [`LOG_DIR_NAME`].
pub const LOG_FILE_NAME: &str = "auto_updater.log";

/// Packaged configuration template. Copying it would overwrite the user's settings.
pub const PACKAGED_CONFIG_FILE: &str = "config.toml";

/// The updater's own binary inside a release package, without the platform suffix.
/// It is running during the update and cannot be overwritten.
pub const UPDATER_BINARY_STEM: &str = "utils/auto_updater";

/// Binary patch applier shipped next to the main application, without the platform suffix.
pub const HPATCHZ_STEM: &str = "utils/hpatchz";

/// Suffix of a per-version patch inside the patch-set package.
pub const PATCH_FILE_SUFFIX: &str = ".patch";

/// Archive suffixes the updater can strip to find the extracted package root.
/// Longest first so `.tar.gz` wins over a hypothetical `.gz`.
pub const ARCHIVE_SUFFIXES: &[&str] = &[".tar.gz", ".tgz", ".zip", ".7z"];

/// Suffix appended to in-flight downloads before they are renamed into place.
pub const PARTIAL_DOWNLOAD_SUFFIX: &str = ".part";

/// Default request timeout for the release store and the fallback source.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Default number of download retries after the first attempt.
pub const DEFAULT_DOWNLOAD_RETRIES: usize = 3;

/// Starting delay for download retry backoff.
pub const STARTING_BACKOFF_DELAY_MS: u64 = 500;

/// Maximum delay between download retries.
pub const MAX_BACKOFF_DELAY: Duration = Duration::from_secs(10);

/// How long to wait for a terminated process to disappear.
pub const PROCESS_EXIT_TIMEOUT: Duration = Duration::from_secs(10);

/// User agent sent with every HTTP request.
pub const USER_AGENT: &str = concat!("auto-updater/", env!("CARGO_PKG_VERSION"));
