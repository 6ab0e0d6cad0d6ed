//! Seeded reproducibility: with a single worker, the same seed and the
//! same stimuli produce the same premise stream, cycle after cycle.

use std::collections::HashSet;
use std::sync::Arc;

use salience_core::prelude::*;
use salience_e2e::mocks::{FractionScorer, MemoryDirectory, RecordingEvaluator};

/// Runs a fresh single-worker engine for `cycles` cycles and returns
/// every premise the evaluator saw, in submission order.
fn run(seed: u64, cycles: usize) -> Vec<Premise<String, u64>> {
    let config = DeriverConfig {
        workers: 1,
        seed,
        ..Default::default()
    };
    let evaluator = Arc::new(RecordingEvaluator::default());
    let mut deriver = Deriver::new(
        config,
        Arc::new(MemoryDirectory::new()),
        evaluator.clone(),
        Arc::new(FractionScorer(0.5)),
    )
    .expect("valid config");

    deriver.input("a-b-c".to_string(), 1, "a-b-c".to_string(), 0.8);
    deriver.input("d-e".to_string(), 2, "d-e".to_string(), 0.6);
    deriver.input("a-b-c".to_string(), 3, "c-a".to_string(), 0.4);

    for _ in 0..cycles {
        deriver.cycle();
    }
    evaluator.premises()
}

#[test]
fn test_same_seed_replays_the_same_premises() {
    let first = run(9, 4);
    let second = run(9, 4);

    assert!(!first.is_empty(), "some premises should have formed");
    assert_eq!(first, second);
}

#[test]
fn test_premises_within_a_cycle_are_unique() {
    // Two cycles: the first drains the stimuli, the second samples, so
    // every recorded premise comes from a single cycle.
    let premises = run(21, 2);

    assert!(!premises.is_empty());
    let distinct: HashSet<_> = premises.iter().collect();
    assert_eq!(
        distinct.len(),
        premises.len(),
        "a (task, belief) pair must not be submitted twice in one cycle"
    );
}
