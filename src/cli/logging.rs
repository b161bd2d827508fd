//! Console and file logging.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::constants::{LOG_DIR_NAME, LOG_FILE_NAME};

/// Console verbosity chosen on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Info,
    Debug,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

/// Build the filter, letting `RUST_LOG` override the command line.
pub fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()))
}

/// Install the global subscriber.
///
/// Logs go to stderr and, when `install_dir` is given, to
/// `<install_dir>/logs/auto_updater.log`. The returned guard flushes the file
/// writer on drop and must be kept alive for the whole run. Calling this twice
/// leaves the first subscriber in place.
pub fn init_logging(level: LogLevel, install_dir: Option<&Path>) -> Option<WorkerGuard> {
    let console = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let log_dir = install_dir.map(|dir| dir.join(LOG_DIR_NAME));
    let file = log_dir
        .filter(|dir| std::fs::create_dir_all(dir).is_ok())
        .map(|dir| tracing_appender::non_blocking(tracing_appender::rolling::never(dir, LOG_FILE_NAME)));

    match file {
        Some((writer, guard)) => {
            let file_layer = fmt::layer().with_writer(writer).with_ansi(false);
            let _ = tracing_subscriber::registry()
                .with(env_filter(level))
                .with(console)
                .with(file_layer)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::registry().with(env_filter(level)).with(console).try_init();
            None
        }
    }
}
