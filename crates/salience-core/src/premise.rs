//! Premises and the external rule-evaluation contract
//!
//! A premise is an ephemeral, immutable (task, belief-term) pairing
//! sampled inside one concept during one cycle. It is handed to the
//! external rule evaluator and then dropped; it has no lifecycle of its
//! own. Everything the evaluator does internally - pattern matching,
//! truth revision - is outside this crate; the only requirements at the
//! boundary are re-entrancy (many workers call it concurrently on
//! different premises) and respect for the TTL work budgets.

/// One (task, belief) pairing submitted for one inference attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Premise<T, A> {
    /// Term of the concept that hosted the sampling.
    pub concept: T,
    /// The sampled task.
    pub task: A,
    /// The belief term paired with it.
    pub belief: T,
}

/// A candidate conclusion emitted by the rule evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct Derivation<T, A> {
    /// The derived task.
    pub task: A,
    /// The derived task's term; its concept is activated when the
    /// derivation is routed back.
    pub term: T,
    /// Structural-complexity signal for priority scoring.
    pub complexity: u32,
    /// Evidence-strength signal in [0, 1].
    pub evidence: f32,
}

/// The external inference-rule evaluator.
///
/// Must be safe to call from multiple worker threads simultaneously on
/// different premises. `match_ttl` bounds pattern-matching steps,
/// `derive_ttl` bounds derivation work units; a hung evaluator is a
/// contract violation this core cannot recover from beyond those
/// counters. A panic during evaluation is confined to its premise.
pub trait RuleEvaluator<T, A>: Send + Sync {
    /// Evaluate one premise, emitting candidate conclusions.
    fn evaluate(&self, premise: &Premise<T, A>, match_ttl: u32, derive_ttl: u32)
        -> Vec<Derivation<T, A>>;
}

/// Pluggable derivation-budgeting strategy.
///
/// Receives the parent priority and the derivation's structural signals;
/// the returned score is clamped by the caller into [0, parent_priority]
/// and a NaN result drops the derivation instead of propagating.
pub trait PriorityScorer<T, A>: Send + Sync {
    /// Score a derivation given the priority of the premise that
    /// produced it.
    fn score(&self, derivation: &Derivation<T, A>, parent_priority: f32) -> f32;
}

/// Default scorer: parent priority scaled by evidence and discounted by
/// structural complexity.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplexityDiscountScorer;

impl<T, A> PriorityScorer<T, A> for ComplexityDiscountScorer {
    fn score(&self, derivation: &Derivation<T, A>, parent_priority: f32) -> f32 {
        let evidence = derivation.evidence.clamp(0.0, 1.0);
        parent_priority * evidence / (1.0 + derivation.complexity as f32 * 0.25)
    }
}

// ============================================================================
// TESTS
// ============================================================================
