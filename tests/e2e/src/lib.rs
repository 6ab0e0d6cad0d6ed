//! End-to-end test harness for the salience engine.
//!
//! Provides in-memory mock collaborators (concept directory, rule
//! evaluators, scorers) shared by the scenario suites under `tests/`.

pub mod mocks;
