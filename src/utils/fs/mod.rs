//! Filesystem helpers used by the update strategies.

pub mod dirs;

pub use dirs::{copy_dir, ensure_dir, ensure_parent_dir, remove_dir_all};
