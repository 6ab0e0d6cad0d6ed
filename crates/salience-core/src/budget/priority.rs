//! Priority cells - lock-free mutable priority scalars
//!
//! A priority is an `f32` in [0, 1]. NaN is the tombstone: a deleted/inert
//! item that sampling must treat as absent and that the next `commit()`
//! removes. Cells store the raw f32 bits in an `AtomicU32` so that merge
//! and decay updates are single compare-and-swap operations with no lock
//! on the fast path.

use std::sync::atomic::{AtomicU32, Ordering};

use super::merge::MergePolicy;

/// Tombstone marker. An item whose priority is NaN is dead.
pub const TOMBSTONE: f32 = f32::NAN;

/// CAS attempts before an update falls back to the caller's lock-protected
/// slow path. Keeps worst-case latency bounded under heavy contention.
pub const CAS_RETRY_BUDGET: usize = 16;

/// Whether a priority value denotes a live (non-tombstoned) item.
#[inline]
pub fn is_live(priority: f32) -> bool {
    !priority.is_nan()
}

// ============================================================================
// STATIC BUDGET DESCRIPTORS
// ============================================================================

/// Immutable per-item budget descriptors paired with the mutable priority.
///
/// Durability modulates decay speed (1.0 = never decays), quality scales
/// the floor a priority can decay down to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Budget {
    /// Resistance to decay, in [0, 1]. Higher durability decays slower.
    pub durability: f32,
    /// Intrinsic quality, in [0, 1]. Scales the decay floor.
    pub quality: f32,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            durability: 0.5,
            quality: 1.0,
        }
    }
}

impl Budget {
    /// Create a budget descriptor, clamping both fields into [0, 1].
    pub fn new(durability: f32, quality: f32) -> Self {
        Self {
            durability: durability.clamp(0.0, 1.0),
            quality: quality.clamp(0.0, 1.0),
        }
    }
}

// ============================================================================
// PRIORITY CELL
// ============================================================================

/// Outcome of a bounded-CAS merge attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CasMerge {
    /// The merge landed.
    Done {
        /// Priority stored after the merge.
        value: f32,
        /// Budget amount the clamp discarded.
        overflow: f32,
    },
    /// The retry budget was exhausted; caller must take the slow path.
    Contended,
}

/// A lock-free mutable priority scalar.
///
/// All mutation goes through CAS loops on the raw bits; NaN round-trips
/// through `to_bits`/`from_bits` so tombstones CAS like any other value.
#[derive(Debug)]
pub struct PriorityCell(AtomicU32);

impl PriorityCell {
    /// Create a cell holding `priority` clamped into [0, 1].
    pub fn new(priority: f32) -> Self {
        Self(AtomicU32::new(clamp_bits(priority)))
    }

    /// Create a tombstoned cell.
    pub fn tombstoned() -> Self {
        Self(AtomicU32::new(TOMBSTONE.to_bits()))
    }

    /// Current priority.
    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }

    /// Unconditionally store `priority` (clamped).
    #[inline]
    pub fn store(&self, priority: f32) {
        self.0.store(clamp_bits(priority), Ordering::Release);
    }

    /// Mark the cell dead. Sampling treats it as absent from now on.
    pub fn tombstone(&self) {
        self.0.store(TOMBSTONE.to_bits(), Ordering::Release);
    }

    /// Whether the cell is tombstoned.
    pub fn is_tombstoned(&self) -> bool {
        !is_live(self.load())
    }

    /// Merge `incoming` into the cell under `policy` with a bounded number
    /// of CAS retries. Returns [`CasMerge::Contended`] once the retry
    /// budget is spent; the caller then serializes through its slow-path
    /// lock and calls [`PriorityCell::merge_locked`].
    pub fn try_merge(&self, policy: MergePolicy, incoming: f32) -> CasMerge {
        let mut current = self.0.load(Ordering::Acquire);
        for _ in 0..CAS_RETRY_BUDGET {
            let (merged, overflow) = policy.merge(f32::from_bits(current), incoming);
            match self.0.compare_exchange_weak(
                current,
                merged.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return CasMerge::Done {
                        value: merged,
                        overflow,
                    }
                }
                Err(observed) => current = observed,
            }
        }
        CasMerge::Contended
    }

    /// Slow-path merge. The caller must hold the owning structure's
    /// slow-path lock so competing exhausted writers are serialized; a
    /// plain CAS loop here then terminates quickly because at most the
    /// fast-path writers still race.
    pub fn merge_locked(&self, policy: MergePolicy, incoming: f32) -> (f32, f32) {
        loop {
            let current = self.0.load(Ordering::Acquire);
            let (merged, overflow) = policy.merge(f32::from_bits(current), incoming);
            if self
                .0
                .compare_exchange(
                    current,
                    merged.to_bits(),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                return (merged, overflow);
            }
        }
    }

    /// Apply a pure rewrite `f` to the current value with bounded retries.
    /// Returns the new value, or `None` if the retry budget was exhausted.
    pub fn try_update(&self, f: impl Fn(f32) -> f32) -> Option<f32> {
        let mut current = self.0.load(Ordering::Acquire);
        for _ in 0..CAS_RETRY_BUDGET {
            let updated = clamp_keep_nan(f(f32::from_bits(current)));
            match self.0.compare_exchange_weak(
                current,
                updated.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(updated),
                Err(observed) => current = observed,
            }
        }
        None
    }
}

#[inline]
fn clamp_bits(priority: f32) -> u32 {
    clamp_keep_nan(priority).to_bits()
}

#[inline]
fn clamp_keep_nan(priority: f32) -> f32 {
    if priority.is_nan() {
        priority
    } else {
        priority.clamp(0.0, 1.0)
    }
}

// ============================================================================
// TESTS
// ============================================================================
