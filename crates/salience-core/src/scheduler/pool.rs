//! Worker pool - bounded MPMC queue feeding fixed worker threads
//!
//! The per-concept work of a cycle runs here in parallel. The queue is a
//! bounded crossbeam channel: producers block when it fills, which is the
//! backpressure contract. Dropping the pool closes the channel and joins
//! the workers, so in-flight jobs drain instead of being aborted
//! mid-mutation.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::JoinHandle;

use crossbeam::channel::{bounded, Sender};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size worker pool over a bounded job queue.
pub struct WorkerPool {
    tx: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` threads consuming from a queue of depth
    /// `queue_depth`.
    pub fn new(workers: usize, queue_depth: usize) -> Self {
        let (tx, rx) = bounded::<Job>(queue_depth.max(1));
        let workers = (0..workers.max(1))
            .map(|i| {
                let rx = rx.clone();
                std::thread::Builder::new()
                    .name(format!("salience-worker-{i}"))
                    .spawn(move || {
                        while let Ok(job) = rx.recv() {
                            // A panicking job must not take the worker
                            // thread down with it; the panic is already
                            // accounted for at the premise boundary.
                            let _ = catch_unwind(AssertUnwindSafe(job));
                        }
                    })
                    .unwrap_or_else(|e| panic!("failed to spawn worker thread: {e}"))
            })
            .collect();
        Self {
            tx: Some(tx),
            workers,
        }
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Submit a job. Blocks while the queue is full (backpressure).
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) {
        if let Some(tx) = &self.tx {
            // Send only fails when all receivers are gone, i.e. the pool
            // is already shut down; the job is dropped in that case.
            let _ = tx.send(Box::new(job));
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Close the channel, then let workers finish what is queued
        self.tx.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
