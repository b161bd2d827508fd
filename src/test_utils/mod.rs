//! Test utilities for the updater.
//!
//! Available to unit tests and, through the `test-utils` feature, to the
//! integration suite:
//!
//! - [`TestEnvironment`]: a temporary installation plus a staging area
//! - [`PackageFixture`]: builds release and patch-set archives
//! - [`fakes`]: recording stand-ins for every external collaborator

pub mod environment;
pub mod fakes;
pub mod fixtures;

pub use environment::{TEST_EXE_NAME, TEST_MAIN_PID, TestEnvironment};
pub use fakes::{
    CallCounter, FakeFullSource, FakePatchApplier, FakeReleaseStore, PatchCall,
    RecordingProcessControl, fake_collaborators,
};
pub use fixtures::PackageFixture;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialise logging for tests once per process.
///
/// Uses `level` if given, otherwise `RUST_LOG`; with neither, tests stay silent.
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
