//! Patch set eligibility.
//!
//! A patch set is published for a bounded window of source versions. Applying it
//! to an installation outside that window would corrupt the install, so the
//! incremental strategy is only attempted when the installed version falls
//! inside the inclusive range.

use std::fmt;

use tracing::warn;

use super::comparison::{Version, need_update};

/// The inclusive span of installed versions a published patch set can upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRange {
    /// Oldest installed version the patch set covers.
    pub min_version: Version,
    /// Newest installed version the patch set covers.
    pub max_version: Version,
}

impl PatchRange {
    /// Create a range from its bounds.
    pub fn new(min_version: Version, max_version: Version) -> Self {
        Self {
            min_version,
            max_version,
        }
    }

    /// Whether `current` lies within the range, both bounds included.
    pub fn contains(&self, current: &Version) -> bool {
        self.min_version <= *current && *current <= self.max_version
    }
}

impl fmt::Display for PatchRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min_version, self.max_version)
    }
}

/// Whether the installed version `current` may be upgraded with a patch set
/// covering `range`.
///
/// Equivalent to `!need_update(current, min) && !need_update(max, current)`, except
/// that an unparsable `current` is never eligible.
pub fn is_eligible(current: &str, range: &PatchRange) -> bool {
    if current.parse::<Version>().is_err() {
        warn!("Installed version '{current}' is not a valid version; patches cannot be used");
        return false;
    }

    let min = range.min_version.to_string();
    let max = range.max_version.to_string();
    !need_update(current, &min) && !need_update(&max, current)
}
