//! Overload behavior: capacity pressure puts the lowest-priority
//! concepts to sleep, decay erodes untouched priorities, and both
//! degrade throughput instead of crashing anything.

use std::sync::Arc;

use salience_core::prelude::*;
use salience_e2e::mocks::{ChainingEvaluator, FractionScorer, MemoryDirectory, RecordingEvaluator};

fn engine(
    directory: Arc<MemoryDirectory>,
    config: DeriverConfig,
) -> Deriver<String, u64, MemoryDirectory, ChainingEvaluator, FractionScorer> {
    Deriver::new(
        config,
        directory,
        Arc::new(ChainingEvaluator::default()),
        Arc::new(FractionScorer(0.5)),
    )
    .expect("valid config")
}

#[test]
fn test_capacity_pressure_sleeps_lowest_priority_concepts() {
    let directory = Arc::new(MemoryDirectory::new());
    let config = DeriverConfig {
        concept_capacity: 4,
        workers: 2,
        seed: 3,
        ..Default::default()
    };
    let mut deriver = engine(directory.clone(), config);

    // Atomic terms so no belief-concept fan-out muddies the counts
    for i in 0..12u64 {
        let term = format!("c{i}");
        deriver.input(term.clone(), i, term, 0.1 + i as f32 * 0.05);
    }
    deriver.cycle();
    assert_eq!(directory.activations(), 12);

    // The next commit trims the bag back to capacity
    deriver.cycle();
    assert!(deriver.concepts().len() <= 4);
    assert_eq!(directory.sleeps(), 8);

    // The survivors are the highest-priority inputs
    for i in 8..12u64 {
        assert!(
            deriver.concepts().get(&format!("c{i}")).is_some(),
            "c{i} should have survived"
        );
    }

    // Re-activating a slept concept reports a fresh activation
    deriver.input("c0".to_string(), 100, "c0".to_string(), 0.9);
    deriver.cycle();
    assert_eq!(directory.activations(), 13);
}

#[test]
fn test_idle_concept_priority_decays_on_touch() {
    let directory = Arc::new(MemoryDirectory::new());
    let config = DeriverConfig {
        concept_forgetting: Forgetting::Exponential {
            rate: 5.0,
            quality_floor: 0.0,
        },
        workers: 1,
        seed: 19,
        ..Default::default()
    };
    // An evaluator that derives nothing, so no re-activation props the
    // priority back up between cycles.
    let mut deriver = Deriver::new(
        config,
        directory,
        Arc::new(RecordingEvaluator::default()),
        Arc::new(FractionScorer(0.5)),
    )
    .expect("valid config");

    deriver.input("idle".to_string(), 1, "idle".to_string(), 0.9);
    deriver.cycle();

    let fresh = deriver
        .concepts()
        .get(&"idle".to_string())
        .expect("concept present")
        .priority();

    for _ in 0..10 {
        deriver.cycle();
    }
    let aged = deriver
        .concepts()
        .get(&"idle".to_string())
        .map(|entry| entry.priority());

    match aged {
        Some(p) => assert!(p < fresh, "priority should have decayed: {p} >= {fresh}"),
        // Fully decayed entries may have been sampled to ~0 and are fine too
        None => {}
    }
}
