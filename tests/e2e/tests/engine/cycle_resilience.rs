//! A failing evaluator costs exactly the premises it failed on, never
//! the cycle or the engine.

use std::sync::Arc;

use salience_core::prelude::*;
use salience_e2e::mocks::{FlakyEvaluator, FractionScorer, MemoryDirectory};

#[test]
fn test_evaluator_panic_confined_to_its_premise() {
    let directory = Arc::new(MemoryDirectory::new());
    let evaluator = Arc::new(FlakyEvaluator::default());
    let config = DeriverConfig {
        workers: 2,
        seed: 11,
        ..Default::default()
    };
    let mut deriver = Deriver::new(
        config,
        directory.clone(),
        evaluator.clone(),
        Arc::new(FractionScorer(0.5)),
    )
    .expect("valid config");

    // Three term links -> three premises in the next cycle
    deriver.input("x-y-z".to_string(), 5, "x-y-z".to_string(), 1.0);
    deriver.cycle();

    // The flaky evaluator panics on every other call; the surviving
    // premises must still route their derivations
    let stats = deriver.cycle();
    assert!(stats.premises_submitted >= 3);
    assert!(stats.evaluator_errors >= 1, "some premises failed");
    assert!(
        stats.derivations_routed >= 1,
        "surviving premises still derived"
    );
    assert_eq!(evaluator.calls(), stats.premises_submitted);

    // The engine keeps cycling afterwards
    let next = deriver.cycle();
    assert!(next.premises_submitted >= 1);
    assert_eq!(deriver.metrics().cycles, 3);
}
