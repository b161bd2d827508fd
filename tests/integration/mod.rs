//! Integration test suite for the updater.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **update_flow**: End-to-end update scenarios against in-process fakes
//! - **http_sources**: The update flow against the real HTTP sources and a mock server
//! - **cli**: The `auto_updater` binary

mod cli;
mod http_sources;
mod update_flow;
