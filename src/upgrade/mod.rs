//! Updating an installation in place.
//!
//! An update run moves through a small state machine (see [`orchestrator`]):
//!
//! ```text
//! 1. Version check
//!    └── ask the release store for the latest version; stop if not newer
//!
//! 2. Incremental update (when the installed version is within the patch range)
//!    ├── download and extract the patch set into the workspace
//!    ├── terminate the main application
//!    └── apply `<current version>.patch` to the installation
//!
//! 3. Full update (when 2 is skipped or fails)
//!    ├── download the full release, from the fallback source if the store fails
//!    ├── extract it and strip files that must not be copied
//!    ├── terminate the main application (unless 2 already did)
//!    └── copy the release over the installation
//!
//! 4. Relaunch the main application
//! ```
//!
//! # Failure handling
//!
//! Expected incremental failures are reported as [`StrategyOutcome::Failed`] and
//! unexpected ones as errors; both lead to a full update. A full update failure is
//! fatal and is returned to the caller. Neither strategy rolls back a partially
//! modified installation.
//!
//! # Workspace
//!
//! Downloads and extraction happen in a scratch directory inside the
//! installation ([`workspace::Workspace`]). It is cleared before each strategy
//! and after the run, whatever the outcome.

pub mod context;
pub mod full;
pub mod incremental;
pub mod orchestrator;
pub mod package;
/// SHA-256 verification of downloaded archives.
pub mod verification;
pub mod workspace;


pub use context::{Collaborators, StrategyOutcome, UpdateContext, UpdateRequest};
pub use full::run_full;
pub use incremental::run_incremental;
pub use orchestrator::{UpdateOrchestrator, UpdateReport, UpdateState, UpdateStrategy};
pub use package::resolve_package_root;
pub use verification::ChecksumVerifier;
pub use workspace::Workspace;
