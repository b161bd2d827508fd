//! Version handling for update decisions.
//!
//! - [`comparison`]: the [`Version`] type and the [`need_update`] gate used to
//!   decide whether an update is required at all
//! - [`range`]: [`PatchRange`] and [`is_eligible`], deciding whether the
//!   incremental strategy may be attempted
//!
//! Both are pure and never fail: malformed input answers "no update" and
//! "not eligible", which steers the orchestrator towards the safe paths.

pub mod comparison;
pub mod range;

pub use comparison::{Version, need_update};
pub use range::{PatchRange, is_eligible};
