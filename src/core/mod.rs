//! Core types shared across the updater.
//!
//! At the moment this is the error taxonomy and the operator-facing error
//! reports used by the binary's top-level handler.

pub mod error;

pub use error::{ErrorContext, UpdaterError, user_friendly_error};
