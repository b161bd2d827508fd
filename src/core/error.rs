//! Error handling for the updater
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** so the orchestrator can tell expected fallback
//!    conditions apart from genuine failures
//! 2. **Operator-facing reports** with actionable suggestions, because a failed
//!    update usually leaves the user without a running application
//!
//! # Architecture
//!
//! - [`UpdaterError`] - Enumerated error types for every failure the updater knows about
//! - [`ErrorContext`] - Wrapper that adds details and a suggestion for display
//! - [`user_friendly_error`] - Converts any [`anyhow::Error`] into an [`ErrorContext`]
//!
//! # Error Categories
//!
//! - **Launch**: [`UpdaterError::InvalidLaunch`]
//! - **Retrieval**: [`UpdaterError::NetworkError`], [`UpdaterError::DownloadFailed`],
//!   [`UpdaterError::AllSourcesFailed`], [`UpdaterError::ChecksumMismatch`]
//! - **Packages**: [`UpdaterError::ArchiveError`], [`UpdaterError::UnsupportedArchive`],
//!   [`UpdaterError::PackageRootNotFound`], [`UpdaterError::PatchFileMissing`]
//! - **External tools and processes**: [`UpdaterError::ToolNotFound`],
//!   [`UpdaterError::ProcessError`]
//! - **Configuration**: [`UpdaterError::ConfigError`], [`UpdaterError::ConfigParseError`]
//!
//! # Examples
//!
//! ```rust,no_run
//! use auto_updater::core::{UpdaterError, user_friendly_error};
//!
//! let err = anyhow::Error::from(UpdaterError::AllSourcesFailed {
//!     primary: "timed out".to_string(),
//!     fallback: "404 Not Found".to_string(),
//! });
//! user_friendly_error(err).display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// Every failure the updater reports with a dedicated message.
///
/// Variants carry owned strings rather than paths so they can be cloned into an
/// [`ErrorContext`] after being downcast out of an [`anyhow::Error`].
#[derive(Error, Debug)]
pub enum UpdaterError {
    /// The updater was started directly instead of by the main application.
    #[error("The updater was not launched by the main application (working directory: {cwd})")]
    InvalidLaunch {
        /// The working directory argument that was received.
        cwd: String,
    },

    /// A version string could not be parsed as a dotted numeric version.
    #[error("Invalid version: '{version}'")]
    InvalidVersion {
        /// The rejected input.
        version: String,
    },

    /// A request to a release store failed.
    #[error("Network error: {operation}")]
    NetworkError {
        /// What was being requested.
        operation: String,
        /// The underlying failure.
        reason: String,
    },

    /// Downloading an archive failed after all retries.
    #[error("Failed to download {url}")]
    DownloadFailed {
        /// The URL that could not be fetched.
        url: String,
        /// The last failure observed.
        reason: String,
    },

    /// Both the primary store and the fallback source failed to provide a full release.
    #[error("Could not download the latest release from any source")]
    AllSourcesFailed {
        /// Failure reported by the primary store.
        primary: String,
        /// Failure reported by the fallback source.
        fallback: String,
    },

    /// A release manifest or API response did not contain what was expected.
    #[error("Release information from '{source_name}' is incomplete: {reason}")]
    ReleaseInfoMissing {
        /// Name of the store that answered.
        source_name: String,
        /// What was missing.
        reason: String,
    },

    /// An archive could not be decompressed.
    #[error("Failed to extract archive {archive}")]
    ArchiveError {
        /// The archive path.
        archive: String,
        /// The underlying failure.
        reason: String,
    },

    /// The archive's format is not one the updater can extract.
    #[error("Unsupported archive format: {archive}")]
    UnsupportedArchive {
        /// The archive path.
        archive: String,
    },

    /// No single package directory could be identified after extraction.
    #[error("Could not locate the extracted package in {root} ({candidates} candidate directories)")]
    PackageRootNotFound {
        /// The extraction root that was scanned.
        root: String,
        /// How many subdirectories were found.
        candidates: usize,
    },

    /// The patch set does not contain a patch for the installed version.
    #[error("Patch file not found: {path}")]
    PatchFileMissing {
        /// The expected patch file path.
        path: String,
    },

    /// A required external tool is not available.
    #[error("Required tool '{tool}' was not found")]
    ToolNotFound {
        /// Name of the tool.
        tool: String,
    },

    /// Terminating or launching a process failed.
    #[error("Process operation failed: {operation}")]
    ProcessError {
        /// What was attempted.
        operation: String,
        /// The underlying failure.
        reason: String,
    },

    /// A downloaded file did not match its published checksum.
    #[error("Checksum mismatch for '{name}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The file name.
        name: String,
        /// The published checksum.
        expected: String,
        /// The computed checksum.
        actual: String,
    },

    /// Configuration is present but unusable.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the problem.
        message: String,
    },

    /// The configuration file could not be parsed.
    #[error("Invalid configuration file syntax in {file}")]
    ConfigParseError {
        /// The configuration file path.
        file: String,
        /// Parser output.
        reason: String,
    },

    /// A filesystem operation failed.
    #[error("File system error: {operation}")]
    FileSystemError {
        /// What was attempted.
        operation: String,
        /// The path involved.
        path: String,
    },

    /// Wrapped I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Wrapped TOML parse error.
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Anything else.
    #[error("{message}")]
    Other {
        /// The message to show.
        message: String,
    },
}

impl Clone for UpdaterError {
    fn clone(&self) -> Self {
        match self {
            Self::InvalidLaunch {
                cwd,
            } => Self::InvalidLaunch {
                cwd: cwd.clone(),
            },
            Self::InvalidVersion {
                version,
            } => Self::InvalidVersion {
                version: version.clone(),
            },
            Self::NetworkError {
                operation,
                reason,
            } => Self::NetworkError {
                operation: operation.clone(),
                reason: reason.clone(),
            },
            Self::DownloadFailed {
                url,
                reason,
            } => Self::DownloadFailed {
                url: url.clone(),
                reason: reason.clone(),
            },
            Self::AllSourcesFailed {
                primary,
                fallback,
            } => Self::AllSourcesFailed {
                primary: primary.clone(),
                fallback: fallback.clone(),
            },
            Self::ReleaseInfoMissing {
                source_name,
                reason,
            } => Self::ReleaseInfoMissing {
                source_name: source_name.clone(),
                reason: reason.clone(),
            },
            Self::ArchiveError {
                archive,
                reason,
            } => Self::ArchiveError {
                archive: archive.clone(),
                reason: reason.clone(),
            },
            Self::UnsupportedArchive {
                archive,
            } => Self::UnsupportedArchive {
                archive: archive.clone(),
            },
            Self::PackageRootNotFound {
                root,
                candidates,
            } => Self::PackageRootNotFound {
                root: root.clone(),
                candidates: *candidates,
            },
            Self::PatchFileMissing {
                path,
            } => Self::PatchFileMissing {
                path: path.clone(),
            },
            Self::ToolNotFound {
                tool,
            } => Self::ToolNotFound {
                tool: tool.clone(),
            },
            Self::ProcessError {
                operation,
                reason,
            } => Self::ProcessError {
                operation: operation.clone(),
                reason: reason.clone(),
            },
            Self::ChecksumMismatch {
                name,
                expected,
                actual,
            } => Self::ChecksumMismatch {
                name: name.clone(),
                expected: expected.clone(),
                actual: actual.clone(),
            },
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            Self::ConfigParseError {
                file,
                reason,
            } => Self::ConfigParseError {
                file: file.clone(),
                reason: reason.clone(),
            },
            Self::FileSystemError {
                operation,
                path,
            } => Self::FileSystemError {
                operation: operation.clone(),
                path: path.clone(),
            },
            // For errors that don't implement Clone, convert to Other
            Self::IoError(e) => Self::Other {
                message: format!("IO error: {e}"),
            },
            Self::TomlError(e) => Self::Other {
                message: format!("TOML parsing error: {e}"),
            },
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// An [`UpdaterError`] enriched with optional details and a suggestion.
///
/// This is what the operator sees when an update fails. [`display`](Self::display)
/// prints a colored report to stderr; the [`fmt::Display`] impl produces the same
/// content without colors for the log file.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error.
    pub error: UpdaterError,
    /// What the operator can do about it.
    pub suggestion: Option<String>,
    /// Extra information about what happened.
    pub details: Option<String>,
}

impl ErrorContext {
    /// Wrap an error without details or suggestion.
    #[must_use]
    pub const fn new(error: UpdaterError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Attach a suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the report to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an operator-facing report.
///
/// Known [`UpdaterError`] variants get a tailored suggestion. Anything else keeps
/// its full context chain in the details so nothing is lost from the report.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(ctx) = error.downcast_ref::<ErrorContext>() {
        return ErrorContext {
            error: ctx.error.clone(),
            suggestion: ctx.suggestion.clone(),
            details: ctx.details.clone(),
        };
    }

    if let Some(updater_error) = error.downcast_ref::<UpdaterError>() {
        return create_error_context(updater_error.clone());
    }

    // Errors wrapped by `.context(...)` still carry a typed cause further down the chain
    for cause in error.chain() {
        if let Some(updater_error) = cause.downcast_ref::<UpdaterError>() {
            return create_error_context(updater_error.clone())
                .with_details(format!("{error:#}"));
        }
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(UpdaterError::FileSystemError {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion(
                    "Close the application and any program using its files, then try again",
                )
                .with_details("The updater does not have permission to modify the installation");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(UpdaterError::FileSystemError {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion("Check that the installation directory is complete");
            }
            _ => {}
        }
    }

    ErrorContext::new(UpdaterError::Other {
        message: format!("{error:#}"),
    })
}

fn create_error_context(error: UpdaterError) -> ErrorContext {
    match &error {
        UpdaterError::InvalidLaunch {
            ..
        } => ErrorContext::new(error)
            .with_details("The updater is started automatically by the main application, which passes its process id, version and directory")
            .with_suggestion("Keep the updater in the utils directory and start the main application as usual"),
        UpdaterError::NetworkError {
            reason,
            ..
        } => {
            let reason = reason.clone();
            ErrorContext::new(error)
                .with_details(reason)
                .with_suggestion("Check your network connection. If you rely on a proxy, create the proxy flag file in the installation directory")
        }
        UpdaterError::DownloadFailed {
            reason,
            ..
        } => {
            let reason = reason.clone();
            ErrorContext::new(error)
                .with_details(reason)
                .with_suggestion("Check your network connection and try again later")
        }
        UpdaterError::AllSourcesFailed {
            primary,
            fallback,
        } => {
            let details = format!("primary store: {primary}\nfallback source: {fallback}");
            ErrorContext::new(error)
                .with_details(details)
                .with_suggestion("Download the latest release manually and extract it over the installation directory")
        }
        UpdaterError::ArchiveError {
            reason,
            ..
        } => {
            let reason = reason.clone();
            ErrorContext::new(error)
                .with_details(reason)
                .with_suggestion("The download may be corrupted; run the update again")
        }
        UpdaterError::UnsupportedArchive {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Supported formats are .zip, .tar.gz, .tgz and .7z (requires 7z on PATH)"),
        UpdaterError::PackageRootNotFound {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("The release archive layout is unexpected; download and extract it manually"),
        UpdaterError::ToolNotFound {
            tool,
        } => {
            let suggestion = format!("Make sure '{tool}' is installed or configure its path in updater.toml");
            ErrorContext::new(error).with_suggestion(suggestion)
        }
        UpdaterError::ProcessError {
            reason,
            ..
        } => {
            let reason = reason.clone();
            ErrorContext::new(error)
                .with_details(reason)
                .with_suggestion("Close the application manually and start the update again")
        }
        UpdaterError::ChecksumMismatch {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("The download was corrupted or tampered with; run the update again"),
        UpdaterError::ConfigParseError {
            reason,
            ..
        } => {
            let reason = reason.clone();
            ErrorContext::new(error)
                .with_details(reason)
                .with_suggestion("Fix or delete updater.toml to fall back to the defaults")
        }
        _ => ErrorContext::new(error),
    }
}
