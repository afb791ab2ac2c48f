// genforge-core/src/core/time.rs
// ============================================================================
// Module: GenForge Time Model
// Description: Canonical timestamp representation for store and provenance records.
// Purpose: Keep wall-clock reads out of deterministic code paths.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! GenForge timestamps are unix epoch milliseconds. They appear only in store
//! metadata, idempotency records, and provenance environment capture. Render
//! and hashing paths never read the clock; determinism gates depend on that.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Unix epoch milliseconds timestamp.
///
/// # Invariants
/// - Values before the epoch clamp to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Wraps an explicit millisecond value.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Reads the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| i64::try_from(duration.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Self(millis)
    }

    /// Returns the value in milliseconds since the epoch.
    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// Returns this timestamp shifted forward by the given milliseconds.
    #[must_use]
    pub const fn plus_millis(self, delta: i64) -> Self {
        Self(self.0.saturating_add(delta))
    }

    /// Returns true when this timestamp is strictly before the other.
    #[must_use]
    pub const fn is_before(self, other: Self) -> bool {
        self.0 < other.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
