//! Bag - bounded-capacity concurrent priority container
//!
//! The workhorse container of the attention engine, used at several
//! scales: the outer set of active concepts, and each concept's task-link
//! and term-link sets. A bag is a sharded associative map whose entries
//! carry a lock-free priority cell, a static budget descriptor, and a
//! last-touched tick.
//!
//! Operational discipline (two-phase):
//! - `put` is the concurrent phase: insert-or-merge with per-key CAS
//!   contention only. Racing inserts may leave the bag temporarily over
//!   capacity, bounded by the configured overshoot slack; past the slack
//!   an approximate inline eviction fires.
//! - `commit` is the single-threaded phase: tombstones are dropped and
//!   the bag is trimmed exactly to capacity by evicting the
//!   lowest-priority survivors. It is the only place global bookkeeping
//!   is reconciled, which keeps `put` lock-light.
//!
//! Sampling never mutates membership; as a side effect it applies the
//! bag's forgetting curve to the drawn items (decay-on-access).

mod sampling;

pub use sampling::weighted_indices;

use std::hash::Hash;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::budget::{is_live, Budget, CasMerge, Forgetting, MergePolicy, PriorityCell};

/// Entries scanned by the approximate inline eviction.
const EVICT_SCAN: usize = 32;

// ============================================================================
// CONFIG
// ============================================================================

/// Bag construction parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BagConfig {
    /// Maximum entries after a `commit`.
    pub capacity: usize,
    /// How an incoming priority merges with a stored one.
    pub policy: MergePolicy,
    /// Decay curve applied to items on touch.
    pub forgetting: Forgetting,
    /// Entries the bag may temporarily exceed capacity by between commits
    /// before inline eviction kicks in. Tune to a small multiple of the
    /// writer count.
    pub overshoot: usize,
}

impl Default for BagConfig {
    fn default() -> Self {
        Self {
            capacity: 128,
            policy: MergePolicy::PlusBlend,
            forgetting: Forgetting::None,
            overshoot: 8,
        }
    }
}

impl BagConfig {
    /// Config with the given capacity and defaults elsewhere.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }
}

// ============================================================================
// ENTRY
// ============================================================================

/// One bag slot: an immutable value plus its mutable attention state.
///
/// The value is owned by exactly one slot at a time and is never mutated
/// through the bag; only the priority cell and timestamp change, and only
/// through the bag's merge/decay paths.
#[derive(Debug)]
pub struct BagEntry<V> {
    value: V,
    budget: Budget,
    priority: PriorityCell,
    last_touched: AtomicI64,
}

impl<V> BagEntry<V> {
    fn new(value: V, budget: Budget, priority: f32, now: i64) -> Self {
        Self {
            value,
            budget,
            priority: PriorityCell::new(priority),
            last_touched: AtomicI64::new(now),
        }
    }

    /// The stored value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Current priority (may be NaN for a tombstoned entry).
    pub fn priority(&self) -> f32 {
        self.priority.load()
    }

    /// Static budget descriptors.
    pub fn budget(&self) -> &Budget {
        &self.budget
    }

    /// Tick of the last touch.
    pub fn last_touched(&self) -> i64 {
        self.last_touched.load(Ordering::Acquire)
    }

    /// Mark the entry dead; the next `commit` removes it.
    pub fn tombstone(&self) {
        self.priority.tombstone();
    }
}

/// Result of a `put`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PutResult {
    /// Priority stored after the merge/insert.
    pub priority: f32,
    /// Budget the clamp discarded; callers may redistribute it rather
    /// than silently dropping it.
    pub overflow: f32,
    /// Whether a new entry was created (vs merged into an existing one).
    pub inserted: bool,
}

/// Callback invoked when an entry is evicted for capacity reasons.
pub type EvictHook<K, V> = Box<dyn Fn(&K, &BagEntry<V>) + Send + Sync>;

// ============================================================================
// BAG
// ============================================================================

/// Fixed-capacity concurrent priority container.
pub struct Bag<K, V> {
    entries: DashMap<K, Arc<BagEntry<V>>>,
    config: BagConfig,
    // Serializes writers that exhausted their CAS retry budget
    slow: Mutex<()>,
    on_evict: Option<EvictHook<K, V>>,
}

impl<K, V> Bag<K, V>
where
    K: Clone + Eq + Hash + Ord,
{
    /// Create a bag from a config.
    pub fn new(config: BagConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            slow: Mutex::new(()),
            on_evict: None,
        }
    }

    /// Create a bag with the given capacity and default config elsewhere.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(BagConfig::with_capacity(capacity))
    }

    /// Attach an eviction callback (builder style). Fires once per entry
    /// evicted for capacity reasons, from whichever thread evicts.
    pub fn with_evict_hook(mut self, hook: EvictHook<K, V>) -> Self {
        self.on_evict = Some(hook);
        self
    }

    /// The configured capacity.
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// The bag's config.
    pub fn config(&self) -> &BagConfig {
        &self.config
    }

    /// Current entry count. May transiently exceed `capacity` between
    /// commits under concurrent insertion.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bag holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert-or-merge with the default budget descriptors.
    pub fn put(&self, key: K, value: V, delta: f32, now: i64) -> PutResult {
        self.put_budgeted(key, value, delta, Budget::default(), now)
    }

    /// Insert-or-merge.
    ///
    /// If the key is present the delta merges under the bag's policy and
    /// the clamped-away amount is reported as overflow. Otherwise a new
    /// entry is created; if that pushes the bag past capacity plus the
    /// overshoot slack, one approximately-minimal entry is evicted
    /// inline. Safe to call from many threads with per-key contention
    /// only; never blocks beyond a bounded CAS retry plus one short lock.
    pub fn put_budgeted(&self, key: K, value: V, delta: f32, budget: Budget, now: i64) -> PutResult {
        let delta = delta.clamp(0.0, 1.0);

        if let Some(existing) = self.entries.get(&key).map(|r| r.value().clone()) {
            return self.merge_into(&existing, delta);
        }

        let result = match self.entries.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(slot) => {
                // Lost the insert race; merge instead
                let existing = slot.get().clone();
                drop(slot);
                return self.merge_into(&existing, delta);
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(BagEntry::new(value, budget, delta, now)));
                PutResult {
                    priority: delta,
                    overflow: 0.0,
                    inserted: true,
                }
            }
        };

        if self.entries.len() > self.config.capacity + self.config.overshoot {
            self.evict_approx();
        }
        result
    }

    fn merge_into(&self, entry: &BagEntry<V>, delta: f32) -> PutResult {
        let (priority, overflow) = match entry.priority.try_merge(self.config.policy, delta) {
            CasMerge::Done { value, overflow } => (value, overflow),
            CasMerge::Contended => {
                tracing::trace!("merge retry budget exhausted, taking slow path");
                let _guard = self.slow.lock().unwrap_or_else(PoisonError::into_inner);
                entry.priority.merge_locked(self.config.policy, delta)
            }
        };
        PutResult {
            priority,
            overflow,
            inserted: false,
        }
    }

    /// Remove an entry by key.
    pub fn remove(&self, key: &K) -> Option<Arc<BagEntry<V>>> {
        self.entries.remove(key).map(|(_, entry)| entry)
    }

    /// Look up an entry by key.
    pub fn get(&self, key: &K) -> Option<Arc<BagEntry<V>>> {
        self.entries.get(key).map(|r| r.value().clone())
    }

    /// Draw up to `n` distinct entries, biased by priority, and hand each
    /// to `consumer` along with its post-decay priority. Returns how many
    /// were drawn.
    ///
    /// Membership is not mutated. Zero-priority and tombstoned entries
    /// are never drawn. Drawn entries are touched: the forgetting curve
    /// runs against the elapsed ticks and `last_touched` advances to
    /// `now`. The snapshot is key-sorted before selection so draws are
    /// deterministic for a fixed RNG seed regardless of shard layout.
    pub fn sample<R: Rng>(
        &self,
        rng: &mut R,
        n: usize,
        now: i64,
        mut consumer: impl FnMut(&K, &Arc<BagEntry<V>>, f32),
    ) -> usize {
        if n == 0 || self.entries.is_empty() {
            return 0;
        }

        let mut snapshot: Vec<(K, Arc<BagEntry<V>>, f32)> = self
            .entries
            .iter()
            .filter_map(|r| {
                let p = r.value().priority.load();
                if is_live(p) && p > 0.0 {
                    Some((r.key().clone(), r.value().clone(), p))
                } else {
                    None
                }
            })
            .collect();
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));

        let weights: Vec<f32> = snapshot.iter().map(|(_, _, p)| *p).collect();
        let picked = weighted_indices(rng, &weights, n);
        let drawn = picked.len();
        for idx in picked {
            let (key, entry, _) = &snapshot[idx];
            let priority = self.touch(entry, now);
            if is_live(priority) {
                consumer(key, entry, priority);
            }
        }
        drawn
    }

    /// Apply decay-on-access to an entry and stamp it touched at `now`.
    /// Returns the post-decay priority.
    pub fn touch(&self, entry: &BagEntry<V>, now: i64) -> f32 {
        let elapsed = now - entry.last_touched.load(Ordering::Acquire);
        let current = entry.priority.load();
        if elapsed <= 0 || !is_live(current) {
            return current;
        }
        let forgetting = self.config.forgetting;
        let budget = entry.budget;
        let decayed = match entry
            .priority
            .try_update(|p| forgetting.decay(p, &budget, elapsed))
        {
            Some(value) => value,
            None => {
                let _guard = self.slow.lock().unwrap_or_else(PoisonError::into_inner);
                let value = forgetting.decay(entry.priority.load(), &budget, elapsed);
                entry.priority.store(value);
                value
            }
        };
        // Timestamp written after the priority so a reader never pairs a
        // fresh timestamp with a stale priority
        entry.last_touched.store(now, Ordering::Release);
        decayed
    }

    /// Reconcile the bag: drop tombstones, then trim exactly to capacity
    /// by evicting the lowest-priority survivors. Returns how many
    /// entries were removed.
    ///
    /// Must run at a single-threaded boundary (no concurrent `put`) for
    /// the capacity bound to be exact; any residue a racing writer leaves
    /// is repaired by the next call.
    pub fn commit(&self) -> usize {
        let mut removed = 0usize;

        self.entries.retain(|_, entry| {
            if is_live(entry.priority.load()) {
                true
            } else {
                removed += 1;
                false
            }
        });

        let survivors = self.entries.len();
        if survivors > self.config.capacity {
            let mut ranked: Vec<(K, f32)> = self
                .entries
                .iter()
                .map(|r| (r.key().clone(), r.value().priority.load()))
                .collect();
            // Ascending by priority, ties broken by key for determinism
            ranked.sort_by(|a, b| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0))
            });
            let excess = survivors - self.config.capacity;
            for (key, _) in ranked.into_iter().take(excess) {
                if let Some((key, entry)) = self.entries.remove(&key) {
                    self.notify_evict(&key, &entry);
                    removed += 1;
                }
            }
        }
        removed
    }

    /// Evict one approximately-minimal entry: scan a bounded sample and
    /// remove the lowest-priority member found. Tombstones rank below any
    /// live priority. Stale selection only costs temporary misordering;
    /// `commit` restores the exact bound.
    fn evict_approx(&self) {
        let mut min: Option<(K, f32)> = None;
        for r in self.entries.iter().take(EVICT_SCAN) {
            let p = r.value().priority.load();
            let rank = if is_live(p) { p } else { -1.0 };
            if min.as_ref().is_none_or(|(_, best)| rank < *best) {
                min = Some((r.key().clone(), rank));
            }
        }
        if let Some((key, _)) = min {
            if let Some((key, entry)) = self.entries.remove(&key) {
                if is_live(entry.priority.load()) {
                    self.notify_evict(&key, &entry);
                }
            }
        }
    }

    fn notify_evict(&self, key: &K, entry: &BagEntry<V>) {
        if let Some(hook) = &self.on_evict {
            hook(key, entry);
        }
    }
}

impl<K: Eq + Hash, V> std::fmt::Debug for Bag<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bag")
            .field("len", &self.entries.len())
            .field("config", &self.config)
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
