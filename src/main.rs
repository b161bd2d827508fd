//! Updater entry point.
//!
//! Started by the main application with its PID, version, and installation
//! directory. Exits 0 when the application is up to date or has been updated and
//! restarted, and 1 after printing a report when the update failed.

use auto_updater::cli::{self, Cli};
use auto_updater::core::error::user_friendly_error;
use clap::Parser;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let pause_on_exit = cli.pause_on_exit();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    if let Err(e) = cli.execute().await {
        let error_ctx = user_friendly_error(e);
        error_ctx.display();
        cli::pause(pause_on_exit);
        std::process::exit(1);
    }
}
