//! # Salience Core
//!
//! Attention-allocation and inference-scheduling engine for
//! resource-bounded reasoning. The working assumption is that processing
//! resources are always insufficient relative to the space of things
//! worth thinking about, so the engine continuously decides - with no
//! global view, under concurrent load - which items deserve attention
//! right now, and degrades gracefully through decay and eviction when
//! overloaded.
//!
//! ## Building blocks
//!
//! - **Priority budgets**: scalars in [0, 1] with pluggable merge
//!   policies (saturating blend, max) and explicit overflow reporting;
//!   NaN is the tombstone state
//! - **Bag**: bounded-capacity concurrent priority container with
//!   insert-or-merge, priority-weighted probabilistic sampling,
//!   lowest-priority eviction, and a two-phase commit/sample discipline
//! - **Forgetting**: lazy linear/exponential decay evaluated on touch,
//!   never by a background sweep
//! - **Activator**: write-coalescing buffer that absorbs concurrent
//!   activations from worker threads and drains into a bag once per
//!   cycle
//! - **Deriver**: the cycle loop - sample concepts, build bounded
//!   task-link x term-link premise matrices in parallel, hand premises
//!   to the external rule evaluator under TTL budgets, route results
//!   back through the activator
//!
//! Term representation, pattern matching, and truth revision live behind
//! the [`ConceptDirectory`], [`RuleEvaluator`], and [`PriorityScorer`]
//! traits; this crate only rations attention across them.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use salience_core::prelude::*;
//! use std::sync::Arc;
//!
//! let mut deriver = Deriver::new(
//!     DeriverConfig::default(),
//!     Arc::new(directory),   // your ConceptDirectory
//!     Arc::new(evaluator),   // your RuleEvaluator
//!     Arc::new(ComplexityDiscountScorer),
//! )?;
//!
//! deriver.input("bird", task_id, "bird-is-animal", 0.8);
//! let stats = deriver.cycle();
//! println!("premises: {}", stats.premises_submitted);
//! ```

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod activator;
pub mod bag;
pub mod budget;
pub mod concept;
pub mod error;
pub mod metrics;
pub mod premise;
pub mod scheduler;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use activator::{Activator, DrainResult};
pub use bag::{weighted_indices, Bag, BagConfig, BagEntry, EvictHook, PutResult};
pub use budget::{is_live, Budget, CasMerge, Forgetting, MergePolicy, PriorityCell, TOMBSTONE};
pub use concept::{BagKey, Concept, ConceptConfig, ConceptDirectory, TaskLink};
pub use error::ConfigError;
pub use metrics::{Metrics, MetricsSnapshot};
pub use premise::{ComplexityDiscountScorer, Derivation, Premise, PriorityScorer, RuleEvaluator};
pub use scheduler::{CycleStats, Deriver, DeriverConfig, Stimulus, WorkerPool};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        Activator, Bag, BagConfig, Budget, ComplexityDiscountScorer, Concept, ConceptConfig,
        ConceptDirectory, ConfigError, CycleStats, Derivation, Deriver, DeriverConfig, Forgetting,
        MergePolicy, MetricsSnapshot, Premise, PriorityScorer, RuleEvaluator, TaskLink,
    };
}
