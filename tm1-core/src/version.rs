//! Dotted version comparison.
//!
//! TM1 reports versions such as `11.8.02500.3` or `12.0.1`. Versions are
//! compared segment by segment as integers; a missing segment counts as `0`
//! and so does any segment that is not a plain non-negative integer.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// First major version that ships the v12 REST surface.
pub const V12: &str = "12.0.0";

fn segments(version: &str) -> Vec<u64> {
    version
        .trim()
        .split('.')
        .map(|s| s.trim().parse::<u64>().unwrap_or(0))
        .collect()
}

/// Compares two dotted versions.
///
/// The shorter version is padded with zeros, so `11.4` and `11.4.0` are equal.
pub fn compare_versions(v1: &str, v2: &str) -> Ordering {
    let a = segments(v1);
    let b = segments(v2);
    let len = a.len().max(b.len());

    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    Ordering::Equal
}

/// Returns true if `v1 >= v2`.
pub fn is_version_at_least(v1: &str, v2: &str) -> bool {
    compare_versions(v1, v2) != Ordering::Less
}

// ============================================================================
// Server Version
// ============================================================================

/// Version string reported by a TM1 server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerVersion(String);

impl ServerVersion {
    /// Wraps a raw version string.
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into().trim().to_string())
    }

    /// Returns the raw version string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when no version has been recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Leading segment of the version, `0` when unknown.
    pub fn major(&self) -> u64 {
        segments(&self.0).first().copied().unwrap_or(0)
    }

    /// Returns true for v12 and later.
    pub fn is_v12(&self) -> bool {
        self.at_least(V12)
    }

    /// Returns true if this version is `>= other`.
    pub fn at_least(&self, other: &str) -> bool {
        is_version_at_least(&self.0, other)
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServerVersion {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ServerVersion {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl PartialOrd for ServerVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ServerVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_versions(&self.0, &other.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
