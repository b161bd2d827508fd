//! Self-updater for an installed desktop helper application.
//!
//! The main application launches the updater with its PID, its version, and its
//! installation directory. The updater then:
//!
//! 1. asks the release store for the latest version and stops if the installed
//!    one is current
//! 2. applies a binary patch when the installed version is inside the published
//!    patch range
//! 3. otherwise, or when patching fails, copies a full release over the
//!    installation, downloading it from a fallback source if the store fails
//! 4. restarts the application
//!
//! # Modules
//!
//! - [`version`] - Version comparison and patch-range eligibility
//! - [`upgrade`] - Workspace, update strategies, and the orchestrating state machine
//! - [`source`] - Release store and fallback source over HTTP
//! - [`archive`] - Archive extraction
//! - [`patch`] - Binary patch application through `hpatchz`
//! - [`process`] - Stopping and starting the main application
//! - [`config`] - `updater.toml` and per-run settings
//! - [`cli`] - Command-line arguments, logging, and output
//! - [`core`] - Error types and operator-facing error reports
//! - [`utils`] - File system, platform, and progress helpers

pub mod archive;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod patch;
pub mod process;
pub mod source;
pub mod upgrade;
pub mod utils;
pub mod version;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
