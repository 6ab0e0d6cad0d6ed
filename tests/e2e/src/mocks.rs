//! Mock collaborators: an in-memory concept directory and scripted rule
//! evaluators.
//!
//! Terms are `String`s; a term containing no `-` is treated as atomic.
//! Tasks are `u64` identifiers that can be marked dead to exercise the
//! stale-reference path.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::{DashMap, DashSet};
use salience_core::{
    Concept, ConceptConfig, ConceptDirectory, Derivation, Premise, PriorityScorer, RuleEvaluator,
};

/// In-memory concept directory with lifecycle counters.
#[derive(Default)]
pub struct MemoryDirectory {
    concepts: DashMap<String, Arc<Concept<String, u64>>>,
    dead_tasks: DashSet<u64>,
    activated: AtomicUsize,
    slept: AtomicUsize,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a task dead so `resolve_task` reports it stale.
    pub fn kill_task(&self, task: u64) {
        self.dead_tasks.insert(task);
    }

    /// Concepts materialized so far.
    pub fn concept_count(&self) -> usize {
        self.concepts.len()
    }

    pub fn activations(&self) -> usize {
        self.activated.load(Ordering::SeqCst)
    }

    pub fn sleeps(&self) -> usize {
        self.slept.load(Ordering::SeqCst)
    }
}

impl ConceptDirectory<String, u64> for MemoryDirectory {
    fn resolve_or_create(&self, term: &String) -> Option<Arc<Concept<String, u64>>> {
        let concept = self
            .concepts
            .entry(term.clone())
            .or_insert_with(|| {
                let atomic = !term.contains('-');
                let concept = Concept::new(term.clone(), atomic, ConceptConfig::default());
                if !atomic {
                    // Seed term links from the term's parts
                    for part in term.split('-') {
                        concept.link_term(part.to_string(), 0.5, 0);
                    }
                }
                Arc::new(concept)
            })
            .clone();
        Some(concept)
    }

    fn resolve_task(&self, task: &u64) -> Option<u64> {
        if self.dead_tasks.contains(task) {
            None
        } else {
            Some(*task)
        }
    }

    fn on_concept_activate(&self, _concept: &Concept<String, u64>) {
        self.activated.fetch_add(1, Ordering::SeqCst);
    }

    fn on_concept_sleep(&self, _concept: &Concept<String, u64>) {
        self.slept.fetch_add(1, Ordering::SeqCst);
    }
}

/// Evaluator that derives one conclusion per premise: the belief term
/// becomes the derived concept, with a task id hashed from the pairing.
pub struct ChainingEvaluator {
    pub evidence: f32,
}

impl Default for ChainingEvaluator {
    fn default() -> Self {
        Self { evidence: 0.8 }
    }
}

impl RuleEvaluator<String, u64> for ChainingEvaluator {
    fn evaluate(
        &self,
        premise: &Premise<String, u64>,
        _match_ttl: u32,
        _derive_ttl: u32,
    ) -> Vec<Derivation<String, u64>> {
        let mut hasher = DefaultHasher::new();
        premise.task.hash(&mut hasher);
        premise.belief.hash(&mut hasher);
        vec![Derivation {
            task: hasher.finish(),
            term: premise.belief.clone(),
            complexity: 1,
            evidence: self.evidence,
        }]
    }
}

/// Evaluator that panics on every odd-numbered premise (1st, 3rd, ...)
/// and behaves like [`ChainingEvaluator`] on the rest.
#[derive(Default)]
pub struct FlakyEvaluator {
    calls: AtomicU64,
    inner: ChainingEvaluator,
}

impl FlakyEvaluator {
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RuleEvaluator<String, u64> for FlakyEvaluator {
    fn evaluate(
        &self,
        premise: &Premise<String, u64>,
        match_ttl: u32,
        derive_ttl: u32,
    ) -> Vec<Derivation<String, u64>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n % 2 == 0 {
            panic!("scripted failure on premise {n}");
        }
        self.inner.evaluate(premise, match_ttl, derive_ttl)
    }
}

/// Evaluator that records every premise it sees and derives nothing.
#[derive(Default)]
pub struct RecordingEvaluator {
    premises: Mutex<Vec<Premise<String, u64>>>,
}

impl RecordingEvaluator {
    pub fn premises(&self) -> Vec<Premise<String, u64>> {
        self.premises
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl RuleEvaluator<String, u64> for RecordingEvaluator {
    fn evaluate(
        &self,
        premise: &Premise<String, u64>,
        _match_ttl: u32,
        _derive_ttl: u32,
    ) -> Vec<Derivation<String, u64>> {
        self.premises
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(premise.clone());
        Vec::new()
    }
}

/// Scorer that returns a fixed fraction of the parent priority.
pub struct FractionScorer(pub f32);

impl PriorityScorer<String, u64> for FractionScorer {
    fn score(&self, _derivation: &Derivation<String, u64>, parent_priority: f32) -> f32 {
        parent_priority * self.0
    }
}
