//! Concepts and the external concept directory
//!
//! A concept is the addressable unit of reasoning, keyed by a term. The
//! engine never owns concept storage: concepts are materialized by an
//! injected [`ConceptDirectory`] (never a process-wide singleton, so test
//! instances stay isolated). What this core owns is the attention state
//! scoped to each concept - its task-link bag and term-link bag - and the
//! lifecycle notifications that fire as concepts enter and leave the
//! active set.
//!
//! Eviction from the active set puts a concept to sleep; it is never
//! destroyed here. Reclamation is the directory's own policy.

use std::hash::Hash;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bag::{Bag, BagConfig};
use crate::budget::{Forgetting, MergePolicy};

/// Key bounds shared by terms and task identifiers. `Ord` keeps sampling
/// snapshots deterministic, the rest lets keys cross worker threads.
pub trait BagKey: Clone + Eq + Hash + Ord + Send + Sync + 'static {}
impl<T: Clone + Eq + Hash + Ord + Send + Sync + 'static> BagKey for T {}

// ============================================================================
// LINKS
// ============================================================================

/// A pending-work reference from a concept to a task. Carries the task's
/// own term so the task can serve as a belief source when paired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLink<T, A> {
    /// The referenced task.
    pub task: A,
    /// The term of the referenced task.
    pub term: T,
}

// ============================================================================
// CONCEPT
// ============================================================================

/// Per-concept link-bag parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConceptConfig {
    /// Capacity of the task-link bag.
    pub task_link_capacity: usize,
    /// Capacity of the term-link bag.
    pub term_link_capacity: usize,
    /// Merge policy for task links. The saturating sum is the usual
    /// choice: repeated activation of the same link caps at 1.0.
    pub task_link_policy: MergePolicy,
    /// Merge policy for term links.
    pub term_link_policy: MergePolicy,
    /// Decay curve for both link bags.
    pub forgetting: Forgetting,
}

impl Default for ConceptConfig {
    fn default() -> Self {
        Self {
            task_link_capacity: 32,
            term_link_capacity: 32,
            task_link_policy: MergePolicy::PlusBlend,
            term_link_policy: MergePolicy::PlusBlend,
            forgetting: Forgetting::Linear {
                rate: 100.0,
                quality_floor: 0.0,
            },
        }
    }
}

/// The addressable unit of reasoning.
///
/// Owns (by composition) the task-link and term-link bags scoped to it.
/// Within a cycle, a concept's link bags are touched only by the worker
/// processing that concept, so there is no inter-concept contention.
pub struct Concept<T, A> {
    term: T,
    atomic_term: bool,
    task_links: Bag<A, TaskLink<T, A>>,
    term_links: Bag<T, ()>,
}

impl<T: BagKey, A: BagKey> Concept<T, A> {
    /// Create a concept for `term`. `atomic_term` marks terms with no
    /// internal structure; premise formation then falls back to task
    /// links as the belief source.
    pub fn new(term: T, atomic_term: bool, config: ConceptConfig) -> Self {
        Self {
            term,
            atomic_term,
            task_links: Bag::new(BagConfig {
                capacity: config.task_link_capacity,
                policy: config.task_link_policy,
                forgetting: config.forgetting,
                overshoot: 4,
            }),
            term_links: Bag::new(BagConfig {
                capacity: config.term_link_capacity,
                policy: config.term_link_policy,
                forgetting: config.forgetting,
                overshoot: 4,
            }),
        }
    }

    /// The concept's identifying term.
    pub fn term(&self) -> &T {
        &self.term
    }

    /// Whether the term has no internal structure.
    pub fn is_atomic(&self) -> bool {
        self.atomic_term
    }

    /// The concept's task-link bag.
    pub fn task_links(&self) -> &Bag<A, TaskLink<T, A>> {
        &self.task_links
    }

    /// The concept's term-link bag.
    pub fn term_links(&self) -> &Bag<T, ()> {
        &self.term_links
    }

    /// Insert-or-merge a task link.
    pub fn link_task(&self, task: A, term: T, priority: f32, now: i64) {
        self.task_links
            .put(task.clone(), TaskLink { task, term }, priority, now);
    }

    /// Insert-or-merge a term link. Directories typically seed these from
    /// the term's structure when the concept is materialized.
    pub fn link_term(&self, term: T, priority: f32, now: i64) {
        self.term_links.put(term, (), priority, now);
    }
}

impl<T, A> std::fmt::Debug for Concept<T, A>
where
    T: std::fmt::Debug + Clone + Eq + std::hash::Hash + Ord,
    A: Clone + Eq + std::hash::Hash + Ord,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Concept")
            .field("term", &self.term)
            .field("atomic", &self.atomic_term)
            .field("task_links", &self.task_links.len())
            .field("term_links", &self.term_links.len())
            .finish()
    }
}

// ============================================================================
// DIRECTORY
// ============================================================================

/// The external term index / concept directory.
///
/// Injected at scheduler construction. Resolution is expected to be
/// amortized O(1) and safe to call from many worker threads. The
/// lifecycle hooks fire exactly once per transition: `on_concept_activate`
/// when a concept enters the active set, `on_concept_sleep` when it is
/// evicted from it. A re-activated concept reports activate again.
pub trait ConceptDirectory<T, A>: Send + Sync {
    /// Resolve `term` to its concept, materializing it if needed. `None`
    /// means the directory refuses the term (e.g. malformed); the caller
    /// skips it.
    fn resolve_or_create(&self, term: &T) -> Option<Arc<Concept<T, A>>>;

    /// Resolve a task-link key to its live task. `None` means the task
    /// is stale or deleted; the sampled link is dropped.
    fn resolve_task(&self, task: &A) -> Option<A>;

    /// A concept entered the active set.
    fn on_concept_activate(&self, _concept: &Concept<T, A>) {}

    /// A concept was evicted from the active set. The concept is put to
    /// sleep, not destroyed.
    fn on_concept_sleep(&self, _concept: &Concept<T, A>) {}
}

// ============================================================================
// TESTS
// ============================================================================
