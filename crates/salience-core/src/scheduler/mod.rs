//! Deriver - the attention-scheduling cycle
//!
//! One cycle of the resource-bounded reasoning loop:
//!
//! 1. **Commit** the concept bag (reconcile approximate eviction)
//! 2. **Sample** a bounded number of concepts, weighted by priority
//! 3. **Derive**, in parallel across workers: per concept, sample
//!    task-links x term-links into a de-duplicated premise matrix and
//!    submit each premise to the external rule evaluator under TTL
//!    budgets; score and buffer the results
//! 4. **Route** buffered derivations and stimuli through the activator,
//!    drain the activator into the concept bag, insert new task links
//! 5. **Advance** the tick
//!
//! The loop never guarantees a particular premise is revisited. It is
//! best-effort, priority-biased coverage: correctness of the conclusions
//! is the evaluator's concern, this loop only rations attention. A stale
//! task or a panicking evaluator costs exactly the premise it touched,
//! never the cycle.

mod pool;

pub use pool::WorkerPool;

use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use crossbeam::queue::SegQueue;
use crossbeam::sync::WaitGroup;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::activator::Activator;
use crate::bag::{Bag, BagConfig, BagEntry};
use crate::budget::{Forgetting, MergePolicy};
use crate::concept::{BagKey, Concept, ConceptDirectory};
use crate::error::ConfigError;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::premise::{Premise, PriorityScorer, RuleEvaluator};

// ============================================================================
// CONFIG
// ============================================================================

/// Deriver construction parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeriverConfig {
    /// Capacity of the concept bag.
    pub concept_capacity: usize,
    /// Merge policy of the concept bag.
    pub concept_policy: MergePolicy,
    /// Decay curve of the concept bag.
    pub concept_forgetting: Forgetting,
    /// Concepts sampled per cycle.
    pub concepts_per_cycle: usize,
    /// Task links sampled per concept.
    pub task_links_per_concept: usize,
    /// Belief terms paired with each sampled task link.
    pub premises_per_link: usize,
    /// Pattern-matching work units per premise.
    pub match_ttl: u32,
    /// Derivation work units per premise.
    pub derive_ttl: u32,
    /// Global activation throttle in [0, 1].
    pub activation_rate: f32,
    /// Worker threads for per-concept derivation.
    pub workers: usize,
    /// Depth of the bounded job queue feeding the workers.
    pub queue_depth: usize,
    /// RNG seed. Cycles are reproducible for a fixed seed.
    pub seed: u64,
}

impl Default for DeriverConfig {
    fn default() -> Self {
        Self {
            concept_capacity: 256,
            concept_policy: MergePolicy::PlusBlend,
            concept_forgetting: Forgetting::Linear {
                rate: 200.0,
                quality_floor: 0.0,
            },
            concepts_per_cycle: 8,
            task_links_per_concept: 4,
            premises_per_link: 3,
            match_ttl: 32,
            derive_ttl: 64,
            activation_rate: 1.0,
            workers: 4,
            queue_depth: 64,
            seed: 0x5a11_ce5a,
        }
    }
}

impl DeriverConfig {
    /// Validate field ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("concept_capacity", self.concept_capacity),
            ("concepts_per_cycle", self.concepts_per_cycle),
            ("task_links_per_concept", self.task_links_per_concept),
            ("premises_per_link", self.premises_per_link),
            ("workers", self.workers),
            ("queue_depth", self.queue_depth),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        if !(0.0..=1.0).contains(&self.activation_rate) {
            return Err(ConfigError::OutOfRange {
                field: "activation_rate",
                value: self.activation_rate,
            });
        }
        Ok(())
    }

    // Temporary over-capacity the concept bag tolerates between commits;
    // scales with the writer count
    fn concept_overshoot(&self) -> usize {
        (self.workers * 2).max(8)
    }
}

// ============================================================================
// STIMULUS & CYCLE STATS
// ============================================================================

/// A task headed for a concept: external input or a freshly scored
/// derivation. Buffered until the cycle boundary so no worker ever
/// writes another concept's link bags.
#[derive(Debug, Clone)]
pub struct Stimulus<T, A> {
    /// Term of the concept to activate.
    pub concept: T,
    /// The task to link into that concept.
    pub task: A,
    /// The task's own term.
    pub task_term: T,
    /// Priority carried by the stimulus.
    pub priority: f32,
}

/// Summary of one cycle.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleStats {
    /// Tick this cycle ran at.
    pub tick: i64,
    /// Concepts drawn from the concept bag.
    pub concepts_sampled: u64,
    /// Premises handed to the evaluator.
    pub premises_submitted: u64,
    /// Duplicate pairings skipped.
    pub premises_deduplicated: u64,
    /// Derivations routed back through the activator.
    pub derivations_routed: u64,
    /// Evaluator failures confined this cycle.
    pub evaluator_errors: u64,
    /// Task links dropped as stale.
    pub stale_tasks: u64,
    /// Activations merged into the concept bag at the drain.
    pub activations_drained: u64,
    /// Concepts put to sleep.
    pub concepts_evicted: u64,
    /// Wall-clock duration of the cycle in microseconds.
    pub duration_micros: u64,
}

// ============================================================================
// DERIVER
// ============================================================================

/// The attention-allocation scheduler.
///
/// Owns the concept bag and the activator; collaborates with the
/// injected directory, rule evaluator, and scorer. The cycle boundary is
/// single-threaded (`cycle` takes `&mut self`); per-concept derivation
/// inside a cycle runs on the worker pool.
pub struct Deriver<T, A, D, E, S>
where
    T: BagKey,
    A: BagKey,
{
    config: DeriverConfig,
    concepts: Bag<T, Arc<Concept<T, A>>>,
    activator: Activator<T>,
    directory: Arc<D>,
    evaluator: Arc<E>,
    scorer: Arc<S>,
    inbox: Arc<SegQueue<Stimulus<T, A>>>,
    metrics: Arc<Metrics>,
    pool: WorkerPool,
    tick: i64,
}

impl<T, A, D, E, S> Deriver<T, A, D, E, S>
where
    T: BagKey,
    A: BagKey,
    D: ConceptDirectory<T, A> + 'static,
    E: RuleEvaluator<T, A> + 'static,
    S: PriorityScorer<T, A> + 'static,
{
    /// Build a deriver. Fails only on invalid configuration.
    pub fn new(
        config: DeriverConfig,
        directory: Arc<D>,
        evaluator: Arc<E>,
        scorer: Arc<S>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let metrics = Arc::new(Metrics::new());
        let sleep_metrics = metrics.clone();
        let sleep_directory = directory.clone();
        let concepts = Bag::new(BagConfig {
            capacity: config.concept_capacity,
            policy: config.concept_policy,
            forgetting: config.concept_forgetting,
            overshoot: config.concept_overshoot(),
        })
        .with_evict_hook(Box::new(
            move |_term: &T, entry: &BagEntry<Arc<Concept<T, A>>>| {
                Metrics::incr(&sleep_metrics.concepts_evicted);
                sleep_directory.on_concept_sleep(entry.value());
            },
        ));

        Ok(Self {
            activator: Activator::new(config.concept_policy, config.activation_rate),
            concepts,
            directory,
            evaluator,
            scorer,
            inbox: Arc::new(SegQueue::new()),
            metrics,
            pool: WorkerPool::new(config.workers, config.queue_depth),
            tick: 0,
            config,
        })
    }

    /// Current tick.
    pub fn tick(&self) -> i64 {
        self.tick
    }

    /// The concept bag.
    pub fn concepts(&self) -> &Bag<T, Arc<Concept<T, A>>> {
        &self.concepts
    }

    /// Cumulative counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Feed external stimulus: activate `concept` and link `task` into
    /// it. Buffered; the stimulus takes effect at the next cycle
    /// boundary and the concept becomes sampleable the cycle after.
    /// Thread-safe.
    pub fn input(&self, concept: T, task: A, task_term: T, priority: f32) {
        self.inbox.push(Stimulus {
            concept,
            task,
            task_term,
            priority: priority.clamp(0.0, 1.0),
        });
    }

    /// Run one cycle.
    pub fn cycle(&mut self) -> CycleStats {
        let started = Instant::now();
        let now = self.tick;
        let before = self.metrics.snapshot();

        // 1. reconcile the concept bag
        self.concepts.commit();

        // 2. sample concepts, weighted by priority
        let mut rng = StdRng::seed_from_u64(cycle_seed(self.config.seed, now));
        let mut sampled: Vec<(T, Arc<Concept<T, A>>)> = Vec::new();
        self.concepts
            .sample(&mut rng, self.config.concepts_per_cycle, now, |term, entry, _| {
                sampled.push((term.clone(), entry.value().clone()));
            });
        Metrics::add(&self.metrics.concepts_sampled, sampled.len() as u64);

        // 3. per-concept derivation in parallel
        let wg = WaitGroup::new();
        for (term, concept) in sampled {
            let ctx = WorkerCtx {
                directory: self.directory.clone(),
                evaluator: self.evaluator.clone(),
                scorer: self.scorer.clone(),
                inbox: self.inbox.clone(),
                metrics: self.metrics.clone(),
                config: self.config,
            };
            let seed = concept_seed(self.config.seed, &term, now);
            let wg = wg.clone();
            self.pool.execute(move || {
                derive_concept(&ctx, &concept, seed, now);
                drop(wg);
            });
        }
        wg.wait();

        // 4. route buffered stimuli: activation now, task links after the
        //    drain has materialized the concepts
        let mut links: Vec<Stimulus<T, A>> = Vec::new();
        while let Some(stimulus) = self.inbox.pop() {
            self.activator
                .activate(stimulus.concept.clone(), stimulus.priority);
            links.push(stimulus);
        }

        // 5. end-of-cycle drain into the concept bag
        let directory = self.directory.clone();
        let hook_directory = self.directory.clone();
        let drain = self.activator.drain_into(
            &self.concepts,
            now,
            |term| directory.resolve_or_create(term),
            |_, concept, put| {
                if put.inserted {
                    hook_directory.on_concept_activate(concept);
                }
            },
        );
        for stimulus in links {
            if let Some(concept) = self.directory.resolve_or_create(&stimulus.concept) {
                concept.link_task(stimulus.task, stimulus.task_term, stimulus.priority, now);
            }
        }

        // 6. advance the tick
        self.tick += 1;
        Metrics::incr(&self.metrics.cycles);

        let delta = self.metrics.snapshot().since(&before);
        let stats = CycleStats {
            tick: now,
            concepts_sampled: delta.concepts_sampled,
            premises_submitted: delta.premises_submitted,
            premises_deduplicated: delta.premises_deduplicated,
            derivations_routed: delta.derivations_routed,
            evaluator_errors: delta.evaluator_errors,
            stale_tasks: delta.stale_tasks,
            activations_drained: drain.forwarded as u64,
            concepts_evicted: delta.concepts_evicted,
            duration_micros: started.elapsed().as_micros() as u64,
        };
        tracing::debug!(
            tick = stats.tick,
            concepts = stats.concepts_sampled,
            premises = stats.premises_submitted,
            derived = stats.derivations_routed,
            "cycle complete"
        );
        stats
    }
}

// ============================================================================
// PER-CONCEPT DERIVATION (worker side)
// ============================================================================

struct WorkerCtx<T, A, D, E, S> {
    directory: Arc<D>,
    evaluator: Arc<E>,
    scorer: Arc<S>,
    inbox: Arc<SegQueue<Stimulus<T, A>>>,
    metrics: Arc<Metrics>,
    config: DeriverConfig,
}

/// Build and evaluate one concept's premise matrix. Runs on a worker;
/// touches only this concept's link bags.
fn derive_concept<T, A, D, E, S>(
    ctx: &WorkerCtx<T, A, D, E, S>,
    concept: &Concept<T, A>,
    seed: u64,
    now: i64,
) where
    T: BagKey,
    A: BagKey,
    D: ConceptDirectory<T, A>,
    E: RuleEvaluator<T, A>,
    S: PriorityScorer<T, A>,
{
    let mut rng = StdRng::seed_from_u64(seed);

    concept.task_links().commit();
    concept.term_links().commit();

    let mut task_draws: Vec<(A, T, f32)> = Vec::new();
    concept
        .task_links()
        .sample(&mut rng, ctx.config.task_links_per_concept, now, |key, entry, priority| {
            task_draws.push((key.clone(), entry.value().term.clone(), priority));
        });

    let mut seen: HashSet<(A, T)> = HashSet::new();
    for (task_key, _task_term, link_priority) in task_draws {
        let Some(task) = ctx.directory.resolve_task(&task_key) else {
            // Stale link: drop it and move on
            Metrics::incr(&ctx.metrics.stale_tasks);
            concept.task_links().remove(&task_key);
            tracing::debug!("stale task link dropped");
            continue;
        };

        // Belief sources: term links, or task links again for atomic terms
        let mut beliefs: Vec<T> = Vec::new();
        if !concept.is_atomic() && !concept.term_links().is_empty() {
            concept
                .term_links()
                .sample(&mut rng, ctx.config.premises_per_link, now, |term, _, _| {
                    beliefs.push(term.clone());
                });
        } else {
            concept
                .task_links()
                .sample(&mut rng, ctx.config.premises_per_link, now, |_, entry, _| {
                    beliefs.push(entry.value().term.clone());
                });
        }

        for belief in beliefs {
            if !seen.insert((task_key.clone(), belief.clone())) {
                Metrics::incr(&ctx.metrics.premises_deduplicated);
                continue;
            }
            let premise = Premise {
                concept: concept.term().clone(),
                task: task.clone(),
                belief,
            };
            Metrics::incr(&ctx.metrics.premises_submitted);

            let evaluator = ctx.evaluator.clone();
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                evaluator.evaluate(&premise, ctx.config.match_ttl, ctx.config.derive_ttl)
            }));
            let derivations = match outcome {
                Ok(derivations) => derivations,
                Err(_) => {
                    // One bad premise must not abort the cycle
                    Metrics::incr(&ctx.metrics.evaluator_errors);
                    tracing::warn!("rule evaluator panicked; premise skipped");
                    continue;
                }
            };

            for derivation in derivations {
                let raw = ctx.scorer.score(&derivation, link_priority);
                if !raw.is_finite() {
                    Metrics::incr(&ctx.metrics.derivations_rejected);
                    continue;
                }
                let priority = raw.clamp(0.0, link_priority);
                if priority <= 0.0 {
                    Metrics::incr(&ctx.metrics.derivations_rejected);
                    continue;
                }
                Metrics::incr(&ctx.metrics.derivations_routed);
                ctx.inbox.push(Stimulus {
                    concept: derivation.term.clone(),
                    task: derivation.task,
                    task_term: derivation.term,
                    priority,
                });
            }
        }
    }
}

fn cycle_seed(seed: u64, tick: i64) -> u64 {
    seed ^ (tick as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15)
}

fn concept_seed<T: Hash>(seed: u64, term: &T, tick: i64) -> u64 {
    let mut hasher = std::hash::DefaultHasher::new();
    term.hash(&mut hasher);
    tick.hash(&mut hasher);
    seed ^ hasher.finish()
}

// ============================================================================
// TESTS
// ============================================================================
