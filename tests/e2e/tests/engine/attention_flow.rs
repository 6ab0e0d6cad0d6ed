//! Stimulus-to-derivation flow: input activates a concept, the concept
//! is sampled, premises reach the evaluator, and derivations come back
//! through the activator as new concepts.

use std::sync::Arc;

use salience_core::prelude::*;
use salience_e2e::mocks::{ChainingEvaluator, FractionScorer, MemoryDirectory};

fn engine(
    directory: Arc<MemoryDirectory>,
) -> Deriver<String, u64, MemoryDirectory, ChainingEvaluator, FractionScorer> {
    let config = DeriverConfig {
        workers: 2,
        seed: 7,
        ..Default::default()
    };
    Deriver::new(
        config,
        directory,
        Arc::new(ChainingEvaluator::default()),
        Arc::new(FractionScorer(0.5)),
    )
    .expect("valid config")
}

#[test]
fn test_stimulus_flows_to_derivations() {
    let directory = Arc::new(MemoryDirectory::new());
    let mut deriver = engine(directory.clone());

    deriver.input("bird-animal".to_string(), 1, "bird-animal".to_string(), 0.9);

    // Cycle 1: the stimulus is drained into the concept bag
    let first = deriver.cycle();
    assert_eq!(first.activations_drained, 1);
    assert_eq!(directory.activations(), 1);
    assert_eq!(deriver.concepts().len(), 1);

    // Cycle 2: the concept is sampled and premises form against its
    // seeded term links
    let second = deriver.cycle();
    assert!(second.concepts_sampled >= 1);
    assert!(second.premises_submitted >= 1);
    assert!(second.derivations_routed >= 1);
    assert_eq!(second.evaluator_errors, 0);

    // Derivations activated the belief concepts
    assert!(directory.concept_count() >= 3, "bird and animal materialized");
    assert!(deriver.concepts().len() >= 2);

    let snapshot = deriver.metrics();
    assert_eq!(snapshot.cycles, 2);
    assert!(snapshot.derivations_routed >= second.derivations_routed);
}

#[test]
fn test_stale_tasks_skipped_and_pruned() {
    let directory = Arc::new(MemoryDirectory::new());
    let mut deriver = engine(directory.clone());

    deriver.input("x-y".to_string(), 42, "x-y".to_string(), 0.8);
    deriver.cycle();

    // Kill the task before it is ever derived from
    directory.kill_task(42);
    let stats = deriver.cycle();
    assert_eq!(stats.premises_submitted, 0);
    assert_eq!(stats.stale_tasks, 1);

    // The stale link was pruned, so it is not reported again
    let again = deriver.cycle();
    assert_eq!(again.stale_tasks, 0);
}

#[test]
fn test_cycle_stats_serialize() {
    let directory = Arc::new(MemoryDirectory::new());
    let mut deriver = engine(directory);
    let stats = deriver.cycle();

    let json = serde_json::to_string(&stats).expect("stats serialize");
    assert!(json.contains("premisesSubmitted"));
    assert!(json.contains("activationsDrained"));
}
