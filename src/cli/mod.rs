//! Command-line entry point of the updater.
//!
//! The main application starts the updater with everything it knows about
//! itself:
//!
//! ```bash
//! auto_updater --pid 1234 --version 1.2.3 --cwd "C:/Apps/Helper" --exe_name helper.exe
//! ```
//!
//! Started any other way (for example by double-clicking the binary), `--cwd`
//! keeps its sentinel default and the updater only explains how it is meant to
//! be used.
//!
//! # Global Options
//!
//! - `--config` - Path to an `updater.toml` outside the install directory
//! - `--dry-run` - Download and extract, but change nothing
//! - `--no-pause` - Never wait for Enter before exiting
//! - `--verbose` / `--quiet` - Log level for the console

mod logging;


use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::archive::ArchiveExtractor;
use crate::config::UpdaterConfig;
use crate::constants::{DEFAULT_CURRENT_VERSION, DEFAULT_EXE_NAME, INVALID_CWD};
use crate::core::UpdaterError;
use crate::patch::HpatchzApplier;
use crate::process::SystemProcessControl;
use crate::source::{Downloader, GithubReleaseSource, HttpReleaseStore, build_client};
use crate::upgrade::{
    Collaborators, UpdateContext, UpdateOrchestrator, UpdateReport, UpdateRequest,
};

pub use logging::{LogLevel, init_logging};

/// Arguments passed by the main application.
#[derive(Parser, Debug)]
#[command(
    name = "auto_updater",
    about = "Updates an installed helper application and restarts it",
    version = env!("CARGO_PKG_VERSION"),
    disable_version_flag = true
)]
pub struct Cli {
    /// PID of the running main application. 0 if there is none.
    #[arg(long, default_value_t = 0)]
    pid: u32,

    /// Version of the installed application.
    #[arg(long = "version", default_value = DEFAULT_CURRENT_VERSION)]
    current_version: String,

    /// Installation directory of the application.
    #[arg(long, default_value = INVALID_CWD)]
    cwd: PathBuf,

    /// File name of the application binary inside the installation directory.
    #[arg(long = "exe_name", alias = "exe-name", default_value = DEFAULT_EXE_NAME)]
    exe_name: String,

    /// Path to the updater configuration file.
    ///
    /// Defaults to `AUTO_UPDATER_CONFIG`, then `updater.toml` in the installation
    /// directory.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Download and extract updates without modifying the installation,
    /// stopping the application, or restarting it.
    #[arg(long)]
    dry_run: bool,

    /// Exit without waiting for Enter.
    #[arg(long)]
    no_pause: bool,

    /// Enable debug output.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    /// Whether the process should wait for Enter before exiting.
    pub fn pause_on_exit(&self) -> bool {
        !self.no_pause
    }

    /// Whether the updater was started without a real installation directory.
    pub fn is_invalid_launch(&self) -> bool {
        self.cwd == Path::new(INVALID_CWD)
    }

    pub fn log_level(&self) -> LogLevel {
        if self.verbose {
            LogLevel::Debug
        } else if self.quiet {
            LogLevel::Error
        } else {
            LogLevel::Info
        }
    }

    /// The update request described by the arguments.
    pub fn request(&self) -> UpdateRequest {
        UpdateRequest {
            main_process_id: self.pid,
            current_version: self.current_version.clone(),
            install_dir: self.cwd.clone(),
            executable_name: self.exe_name.clone(),
        }
    }

    /// Run the updater.
    ///
    /// Logging is initialized here, so callers only parse and report errors.
    pub async fn execute(self) -> Result<()> {
        if self.is_invalid_launch() {
            let _guard = init_logging(self.log_level(), None);
            println!("{}", invalid_launch_message());
            pause(self.pause_on_exit());
            return Ok(());
        }

        if !self.cwd.is_dir() {
            return Err(UpdaterError::InvalidLaunch {
                cwd: self.cwd.display().to_string(),
            }
            .into());
        }

        let _guard = init_logging(self.log_level(), Some(&self.cwd));
        info!(
            "Updater {} started: pid={} version={} cwd={} exe={}",
            env!("CARGO_PKG_VERSION"),
            self.pid,
            self.current_version,
            self.cwd.display(),
            self.exe_name
        );

        let config = UpdaterConfig::load(self.config.as_deref(), &self.cwd).await?;
        let request = self.request();
        let ctx = build_context(&config, &request.install_dir, self.dry_run)?;

        let mut orchestrator = UpdateOrchestrator::new(ctx);
        let report = orchestrator.run(&request).await?;
        print_report(&report);
        Ok(())
    }
}

/// Wire the production collaborators for an installation.
pub fn build_context(
    config: &UpdaterConfig,
    install_dir: &Path,
    dry_run: bool,
) -> Result<UpdateContext> {
    let use_proxy = config.proxy_enabled(install_dir);
    if use_proxy {
        info!("Proxy flag found, using system proxy settings");
    } else {
        info!(
            "No {} in {}, ignoring system proxy settings",
            config.update.use_proxy_flag,
            install_dir.display()
        );
    }

    let client =
        build_client(config.request_timeout(), use_proxy).context("Failed to build HTTP client")?;
    let downloader = Downloader::new(client, config.source.retries);

    if config.source.manifest_url.is_empty() {
        warn!("No release manifest configured, using the latest GitHub release");
    }

    let collaborators = Collaborators {
        store: Box::new(HttpReleaseStore::new(
            config.source.manifest_url.clone(),
            downloader.clone(),
        )),
        fallback: Box::new(GithubReleaseSource::new(config.github.clone(), downloader)),
        decompressor: Box::new(
            ArchiveExtractor::new().with_seven_zip(config.tools.seven_zip.clone()),
        ),
        patcher: Box::new(HpatchzApplier::new(config.hpatchz_path(install_dir))),
        process: Box::new(SystemProcessControl::new()),
    };

    Ok(UpdateContext::new(config.settings(install_dir, dry_run), collaborators))
}

fn invalid_launch_message() -> String {
    format!(
        "{}\n{}",
        "The updater was started without an installation directory.".yellow().bold(),
        "It is started by the main application when an update is available; \
         run the main application instead."
    )
}

fn print_report(report: &UpdateReport) {
    match report {
        UpdateReport::UpToDate {
            current,
            latest,
        } => {
            println!(
                "{} Version {current} is up to date (latest {latest})",
                "✓".green().bold()
            );
        }
        UpdateReport::Updated {
            from,
            to,
            strategy,
            relaunched,
        } => {
            println!(
                "{} Updated {from} → {to} ({strategy} update)",
                "✓".green().bold()
            );
            if !relaunched {
                println!("{}", "Dry run: the application was not restarted".yellow());
            }
        }
    }
}

/// Wait for Enter so a console window stays open long enough to be read.
///
/// Does nothing when disabled or when stdin is not a terminal.
pub fn pause(enabled: bool) {
    let stdin = std::io::stdin();
    if !enabled || !stdin.is_terminal() {
        return;
    }

    print!("Press Enter to exit...");
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    let _ = stdin.lock().read_line(&mut line);
}
