//! Cross-platform utilities: directory handling, platform quirks, and progress output.

pub mod fs;
pub mod platform;
pub mod progress;

pub use fs::{copy_dir, ensure_dir, remove_dir_all};
pub use platform::{command_exists, executable_name, is_windows};
pub use progress::{ProgressBar, ProgressStyle};
