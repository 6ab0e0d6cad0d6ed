//! Activator - write-coalescing activation buffer
//!
//! Many workers deriving in parallel all want to activate the same
//! popular concepts. Letting them hit the shared concept bag directly
//! would serialize on its hottest keys every derivation; the activator
//! instead coalesces concurrent "activate key K with priority P" requests
//! into one accumulated priority per key (a single CAS each), and the
//! scheduler drains the whole buffer into the target bag in one
//! uncontended batch per cycle.

use std::hash::Hash;
use std::sync::{Mutex, PoisonError};

use dashmap::DashMap;

use crate::bag::Bag;
use crate::budget::{is_live, CasMerge, MergePolicy, PriorityCell};

/// Outcome of a drain.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DrainResult {
    /// Entries forwarded into the target bag.
    pub forwarded: usize,
    /// Entries whose key could not be resolved to a value.
    pub unresolved: usize,
    /// Total overflow the target bag's clamps discarded.
    pub overflow: f32,
}

/// Concurrent per-key priority accumulator.
pub struct Activator<K> {
    pending: DashMap<K, PriorityCell>,
    policy: MergePolicy,
    rate: f32,
    slow: Mutex<()>,
}

impl<K> Activator<K>
where
    K: Clone + Eq + Hash,
{
    /// Create an activator. `policy` should match the target bag's merge
    /// policy so accumulation is associative with the final merge;
    /// `activation_rate` in [0, 1] scales every delta before
    /// accumulation (global throttle).
    pub fn new(policy: MergePolicy, activation_rate: f32) -> Self {
        Self {
            pending: DashMap::new(),
            policy,
            rate: activation_rate.clamp(0.0, 1.0),
            slow: Mutex::new(()),
        }
    }

    /// The configured activation rate.
    pub fn activation_rate(&self) -> f32 {
        self.rate
    }

    /// Accumulate `delta` for `key`. Thread-safe; writers of different
    /// keys never contend, same-key writers resolve via CAS with a
    /// bounded retry budget and a short lock past it.
    pub fn activate(&self, key: K, delta: f32) {
        let scaled = (delta * self.rate).clamp(0.0, 1.0);
        if scaled <= 0.0 {
            return;
        }

        if let Some(cell) = self.pending.get(&key) {
            self.merge_into(cell.value(), scaled);
            return;
        }
        match self.pending.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(slot) => {
                self.merge_into(slot.get(), scaled);
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(PriorityCell::new(scaled));
            }
        }
    }

    fn merge_into(&self, cell: &PriorityCell, delta: f32) {
        match cell.try_merge(self.policy, delta) {
            CasMerge::Done { .. } => {}
            CasMerge::Contended => {
                tracing::trace!("activation retry budget exhausted, taking slow path");
                let _guard = self.slow.lock().unwrap_or_else(PoisonError::into_inner);
                cell.merge_locked(self.policy, delta);
            }
        }
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending key count.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Migrate every pending accumulation into `bag`, resolving each key
    /// to its bag value via `resolve`.
    ///
    /// Single-threaded per cycle by contract (invoked by the scheduler,
    /// not by workers). Each entry is removed *then* forwarded, so a
    /// writer racing with the drain either lands before the removal (and
    /// is carried in this drain) or after it (and is picked up next
    /// cycle) - no activation is lost either way. `on_put` sees each
    /// forwarded key with its resolved value and put result.
    pub fn drain_into<V>(
        &self,
        bag: &Bag<K, V>,
        now: i64,
        mut resolve: impl FnMut(&K) -> Option<V>,
        mut on_put: impl FnMut(&K, &V, crate::bag::PutResult),
    ) -> DrainResult
    where
        K: Ord,
        V: Clone,
    {
        let mut keys: Vec<K> = self.pending.iter().map(|r| r.key().clone()).collect();
        // Key order, not map order, so drains replay identically
        keys.sort_unstable();
        let mut result = DrainResult::default();
        for key in keys {
            let Some((key, cell)) = self.pending.remove(&key) else {
                continue;
            };
            let priority = cell.load();
            if !is_live(priority) || priority <= 0.0 {
                continue;
            }
            match resolve(&key) {
                Some(value) => {
                    let put = bag.put(key.clone(), value.clone(), priority, now);
                    result.forwarded += 1;
                    result.overflow += put.overflow;
                    on_put(&key, &value, put);
                }
                None => result.unresolved += 1,
            }
        }
        result
    }
}

impl<K: Eq + std::hash::Hash> std::fmt::Debug for Activator<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Activator")
            .field("pending", &self.pending.len())
            .field("policy", &self.policy)
            .field("rate", &self.rate)
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bag::BagConfig;
    use std::sync::Arc;

    #[test]
    fn test_lossless_concurrent_accumulation() {
        // T threads x T activations of 1/T^2 each must sum to exactly 1.0
        let threads = 8usize;
        let activator = Arc::new(Activator::new(MergePolicy::PlusBlend, 1.0));
        let delta = 1.0 / (threads * threads) as f32;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let a = activator.clone();
                std::thread::spawn(move || {
                    for _ in 0..threads {
                        a.activate("k", delta);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let bag: Bag<&str, ()> = Bag::with_capacity(4);
        let mut merged = 0.0f32;
        activator.drain_into(&bag, 0, |_| Some(()), |_, _, put| merged = put.priority);
        assert!((merged - 1.0).abs() < 1e-3, "accumulated {merged}");
        assert!(activator.is_empty());
    }

    #[test]
    fn test_activation_rate_scales_deltas() {
        let activator = Activator::new(MergePolicy::PlusBlend, 0.5);
        activator.activate("k", 0.8);

        let bag: Bag<&str, ()> = Bag::with_capacity(4);
        let mut seen = 0.0f32;
        activator.drain_into(&bag, 0, |_| Some(()), |_, _, put| seen = put.priority);
        assert!((seen - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_drain_skips_unresolvable_keys() {
        let activator = Activator::new(MergePolicy::Max, 1.0);
        activator.activate("gone", 0.7);
        activator.activate("here", 0.7);

        let bag: Bag<&str, ()> = Bag::with_capacity(4);
        let result = activator.drain_into(
            &bag,
            0,
            |k| if *k == "here" { Some(()) } else { None },
            |_, _, _| {},
        );
        assert_eq!(result.forwarded, 1);
        assert_eq!(result.unresolved, 1);
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn test_drain_reports_overflow() {
        let activator = Activator::new(MergePolicy::PlusBlend, 1.0);
        let bag: Bag<&str, ()> = Bag::new(BagConfig {
            capacity: 2,
            policy: MergePolicy::PlusBlend,
            ..Default::default()
        });
        bag.put("k", (), 0.9, 0);
        activator.activate("k", 0.4);

        let result = activator.drain_into(&bag, 0, |_| Some(()), |_, _, _| {});
        assert!((result.overflow - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_empty_after_drain() {
        let activator = Activator::new(MergePolicy::PlusBlend, 1.0);
        for i in 0..50 {
            activator.activate(i, 0.2);
        }
        assert_eq!(activator.len(), 50);

        let bag: Bag<i32, ()> = Bag::with_capacity(64);
        activator.drain_into(&bag, 0, |_| Some(()), |_, _, _| {});
        assert!(activator.is_empty());
        assert_eq!(bag.len(), 50);
    }
}
