//! Merge policies - how an incoming priority combines with a stored one
//!
//! Every merge reports an explicit overflow amount instead of silently
//! dropping budget; callers may redistribute it elsewhere. Merging into a
//! tombstone (NaN) always behaves as a fresh insert.

use serde::{Deserialize, Serialize};

use super::priority::is_live;

/// Policy for combining a stored priority with an incoming delta.
///
/// Policies are pluggable per container: concept-level containers
/// typically blend, task-link containers use the saturating sum so that
/// repeated activation of the same link saturates at 1.0 instead of
/// growing unbounded.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Clamped sum: `new = clamp(existing + incoming, 0, 1)`, overflow is
    /// whatever the clamp discarded.
    #[default]
    PlusBlend,
    /// Maximum: `new = max(existing, incoming)`, never overflows.
    Max,
}

impl MergePolicy {
    /// Merge `incoming` into `existing`, returning `(new_value, overflow)`.
    ///
    /// The result is always in [0, 1] and the overflow is always >= 0.
    /// A tombstoned `existing` is treated as an empty slot.
    pub fn merge(&self, existing: f32, incoming: f32) -> (f32, f32) {
        let incoming = incoming.clamp(0.0, 1.0);
        if !is_live(existing) {
            return (incoming, 0.0);
        }
        match self {
            MergePolicy::PlusBlend => {
                let sum = existing + incoming;
                (sum.clamp(0.0, 1.0), (sum - 1.0).max(0.0))
            }
            MergePolicy::Max => (existing.max(incoming), 0.0),
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MergePolicy::PlusBlend => "plusblend",
            MergePolicy::Max => "max",
        }
    }
}

impl std::fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// TESTS
// ============================================================================
