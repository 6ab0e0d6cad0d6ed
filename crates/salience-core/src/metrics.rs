//! Engine metrics - lock-free counters
//!
//! Recovered errors (stale references, evaluator failures) are never
//! surfaced as results; they land here. Counters are cache-padded so
//! workers incrementing different counters do not false-share.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::utils::CachePadded;
use serde::{Deserialize, Serialize};

/// Cumulative engine counters. Cheap to increment from any worker.
#[derive(Debug, Default)]
pub struct Metrics {
    pub(crate) cycles: CachePadded<AtomicU64>,
    pub(crate) concepts_sampled: CachePadded<AtomicU64>,
    pub(crate) premises_submitted: CachePadded<AtomicU64>,
    pub(crate) premises_deduplicated: CachePadded<AtomicU64>,
    pub(crate) derivations_routed: CachePadded<AtomicU64>,
    pub(crate) derivations_rejected: CachePadded<AtomicU64>,
    pub(crate) evaluator_errors: CachePadded<AtomicU64>,
    pub(crate) stale_tasks: CachePadded<AtomicU64>,
    pub(crate) concepts_evicted: CachePadded<AtomicU64>,
}

impl Metrics {
    /// Fresh zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn incr(counter: &CachePadded<AtomicU64>) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add(counter: &CachePadded<AtomicU64>, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            concepts_sampled: self.concepts_sampled.load(Ordering::Relaxed),
            premises_submitted: self.premises_submitted.load(Ordering::Relaxed),
            premises_deduplicated: self.premises_deduplicated.load(Ordering::Relaxed),
            derivations_routed: self.derivations_routed.load(Ordering::Relaxed),
            derivations_rejected: self.derivations_rejected.load(Ordering::Relaxed),
            evaluator_errors: self.evaluator_errors.load(Ordering::Relaxed),
            stale_tasks: self.stale_tasks.load(Ordering::Relaxed),
            concepts_evicted: self.concepts_evicted.load(Ordering::Relaxed),
        }
    }
}

/// Serializable counter snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Scheduler cycles completed.
    pub cycles: u64,
    /// Concepts drawn from the concept bag across all cycles.
    pub concepts_sampled: u64,
    /// Premises handed to the rule evaluator.
    pub premises_submitted: u64,
    /// (task, belief) pairings skipped as duplicates within a cycle.
    pub premises_deduplicated: u64,
    /// Derivations scored and routed back through the activator.
    pub derivations_routed: u64,
    /// Derivations dropped for a NaN or non-positive score.
    pub derivations_rejected: u64,
    /// Evaluator panics confined at the premise boundary.
    pub evaluator_errors: u64,
    /// Sampled task links whose task no longer resolves.
    pub stale_tasks: u64,
    /// Concepts evicted (put to sleep) from the active set.
    pub concepts_evicted: u64,
}

impl MetricsSnapshot {
    /// Per-interval counts: `self` minus an earlier snapshot.
    pub fn since(&self, earlier: &MetricsSnapshot) -> MetricsSnapshot {
        MetricsSnapshot {
            cycles: self.cycles - earlier.cycles,
            concepts_sampled: self.concepts_sampled - earlier.concepts_sampled,
            premises_submitted: self.premises_submitted - earlier.premises_submitted,
            premises_deduplicated: self.premises_deduplicated - earlier.premises_deduplicated,
            derivations_routed: self.derivations_routed - earlier.derivations_routed,
            derivations_rejected: self.derivations_rejected - earlier.derivations_rejected,
            evaluator_errors: self.evaluator_errors - earlier.evaluator_errors,
            stale_tasks: self.stale_tasks - earlier.stale_tasks,
            concepts_evicted: self.concepts_evicted - earlier.concepts_evicted,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
