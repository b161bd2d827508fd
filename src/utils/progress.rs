//! Progress indicators for downloads and long-running steps.
//!
//! Thin wrapper over `indicatif` with a consistent style. Progress output goes to
//! stderr and is suppressed entirely when `AUTO_UPDATER_NO_PROGRESS` is set, which
//! the integration tests and unattended runs rely on.

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::time::Duration;

/// Environment variable that disables every progress indicator.
pub const NO_PROGRESS_ENV: &str = "AUTO_UPDATER_NO_PROGRESS";

fn is_progress_disabled() -> bool {
    std::env::var(NO_PROGRESS_ENV).is_ok()
}

/// A progress bar with consistent styling.
///
/// When progress is disabled the bar is hidden and every call is a no-op.
#[derive(Clone)]
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// Bar for a byte download. `total` is the expected length if the server sent one;
    /// without it the bar degrades to a spinner showing bytes received.
    pub fn new_download(total: Option<u64>, prefix: impl Into<String>) -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            match total {
                Some(len) => {
                    let bar = IndicatifBar::new(len);
                    bar.set_style(ProgressStyle::download());
                    bar
                }
                None => {
                    let bar = IndicatifBar::new_spinner();
                    bar.set_style(ProgressStyle::download_unknown());
                    bar.enable_steady_tick(Duration::from_millis(100));
                    bar
                }
            }
        };
        bar.set_prefix(prefix.into());
        Self {
            inner: bar,
        }
    }

    /// Spinner for work of unknown length such as extraction or patching.
    pub fn new_spinner() -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new_spinner();
            bar.set_style(ProgressStyle::spinner());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };
        Self {
            inner: bar,
        }
    }

    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    pub fn inc(&self, delta: u64) {
        self.inner.inc(delta);
    }

    pub fn position(&self) -> u64 {
        self.inner.position()
    }

    pub fn finish_with_message(&self, msg: impl Into<String>) {
        self.inner.finish_with_message(msg.into());
    }

    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }

    pub fn is_hidden(&self) -> bool {
        self.inner.is_hidden()
    }
}

/// Named progress styles.
pub struct ProgressStyle;

impl ProgressStyle {
    pub fn spinner() -> IndicatifStyle {
        IndicatifStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| IndicatifStyle::default_spinner())
    }

    pub fn download() -> IndicatifStyle {
        IndicatifStyle::default_bar()
            .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .unwrap_or_else(|_| IndicatifStyle::default_bar())
            .progress_chars("━╸━")
    }

    pub fn download_unknown() -> IndicatifStyle {
        IndicatifStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.cyan} {bytes} ({bytes_per_sec})")
            .unwrap_or_else(|_| IndicatifStyle::default_spinner())
    }
}

/// Spinner that already shows `msg`.
pub fn spinner_with_message(msg: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_message(msg);
    spinner
}
