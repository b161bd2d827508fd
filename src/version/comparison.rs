//! Dotted numeric version parsing and comparison.
//!
//! Release identifiers published by the stores are plain dotted numbers such as
//! `1.2.3` or `20.1.0.4`. They are compared segment by segment as integers, with
//! missing trailing segments treated as zero, so `1.2` and `1.2.0` are equal and
//! `1.9.0` sorts before `1.10.0`.
//!
//! # Examples
//!
//! ```rust
//! use auto_updater::version::{Version, need_update};
//!
//! let a: Version = "1.9.0".parse().unwrap();
//! let b: Version = "1.10.0".parse().unwrap();
//! assert!(a < b);
//!
//! assert!(need_update("1.9.0", "1.10.0"));
//! assert!(!need_update("2.0.0", "2.0.0"));
//! assert!(!need_update("not-a-version", "9.9.9"));
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use tracing::warn;

use crate::core::UpdaterError;

/// A dotted numeric version with a total order.
///
/// Equality follows the ordering: trailing zero segments are insignificant, so
/// `Version::from_str("1.0")` equals `Version::from_str("1.0.0")`. The input
/// text is not kept; [`Display`](fmt::Display) prints the parsed segments.
#[derive(Debug, Clone)]
pub struct Version {
    segments: Vec<u64>,
}

impl Version {
    /// Build a version from its numeric segments.
    pub fn new(segments: &[u64]) -> Self {
        Self {
            segments: segments.to_vec(),
        }
    }

    /// The numeric segments as parsed.
    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    fn segment(&self, index: usize) -> u64 {
        self.segments.get(index).copied().unwrap_or(0)
    }
}

impl FromStr for Version {
    type Err = UpdaterError;

    /// Parse `1.2.3`, tolerating surrounding whitespace and a leading `v`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || UpdaterError::InvalidVersion {
            version: input.to_string(),
        };

        let trimmed = input.trim();
        let trimmed = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        if trimmed.is_empty() {
            return Err(invalid());
        }

        let segments = trimmed
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                part.parse::<u64>().map_err(|_| invalid())
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            segments,
        })
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        (0..len)
            .map(|i| self.segment(i).cmp(&other.segment(i)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
            first = false;
        }
        Ok(())
    }
}

/// Whether `current` is strictly older than `latest`.
///
/// Malformed input on either side is logged and answered with `false`: garbage
/// must never cause an update, otherwise a broken store could trigger an endless
/// update-and-relaunch loop.
pub fn need_update(current: &str, latest: &str) -> bool {
    match (current.parse::<Version>(), latest.parse::<Version>()) {
        (Ok(current), Ok(latest)) => current < latest,
        (Err(e), _) | (_, Err(e)) => {
            warn!("Refusing to compare versions '{current}' and '{latest}': {e}");
            false
        }
    }
}
