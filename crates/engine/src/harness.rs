//! Benchmark hosting
//!
//! A [`Benchmark`] supplies one thread's workload plus validation and
//! reporting; the [`Driver`] starts the threads, lets them run for a fixed
//! duration, raises the stop flag, joins them and collects the results.
//!
//! The driver's `mix` is the percentage of calls that should modify shared
//! state; the rest are read-only. Each benchmark decides how to honor it.
//!
//! ```ignore
//! let runtime = Runtime::builder().manager(ManagerKind::Greedy).build()?;
//! let report = Driver::new(4, Duration::from_secs(5)).run(&runtime, &SharedCounter::new())?;
//! println!("{} commits, {} aborts", report.committed, report.aborted);
//! ```

use crate::cell::TCell;
use crate::runtime::Runtime;
use crate::transaction::{Worker, WorkerStats};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use sxm_core::{ManagerKind, StmError, StmResult};
use tracing::debug;

/// Workload hosted by the [`Driver`].
pub trait Benchmark: Sync {
    /// One thread's loop. Should return once the runtime stops; a
    /// [`StmError::Shutdown`] result counts as a clean exit.
    ///
    /// `mix` is the percentage (0..=100) of calls that modify shared state.
    fn run(&self, worker: &mut Worker, mix: u32) -> StmResult<()>;

    /// Check that the final state makes sense.
    fn validate(&self) -> StmResult<()>;

    /// Benchmark-specific statistics.
    fn report(&self) -> String {
        String::new()
    }
}

/// Outcome of one driver run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchReport {
    /// Contention strategy in use
    pub manager: ManagerKind,
    /// Worker threads started
    pub threads: usize,
    /// Percentage of modifier calls requested
    pub mix: u32,
    /// Wall time from first spawn to last join
    pub elapsed: Duration,
    /// Total committed attempts
    pub committed: u64,
    /// Total aborted attempts
    pub aborted: u64,
    /// Per-thread counts, in spawn order
    pub workers: Vec<WorkerStats>,
    /// Output of [`Benchmark::report`]
    pub summary: String,
}

impl BenchReport {
    /// Commits per second of wall time.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.committed as f64 / secs
        }
    }
}

/// Starts, times and stops benchmark threads.
#[derive(Debug, Clone, Copy)]
pub struct Driver {
    /// Number of worker threads
    pub threads: usize,
    /// How long the threads run before the stop flag is raised
    pub duration: Duration,
    /// Percentage of calls that modify shared state
    pub mix: u32,
}

/// Every call modifies.
pub const DEFAULT_MIX: u32 = 100;

impl Default for Driver {
    fn default() -> Self {
        Self::new(1, Duration::from_millis(5000))
    }
}

impl Driver {
    /// Driver with the given thread count and duration, every call a modifier.
    pub fn new(threads: usize, duration: Duration) -> Self {
        Self {
            threads,
            duration,
            mix: DEFAULT_MIX,
        }
    }

    /// Set the percentage of modifier calls, capped at 100.
    pub fn with_mix(mut self, percent: u32) -> Self {
        self.mix = percent.min(100);
        self
    }

    /// Run `benchmark` on `runtime`.
    ///
    /// Clears the stop flag and the metrics first. The runtime is left
    /// stopped afterwards; call [`Runtime::resume`] to reuse it.
    pub fn run<B: Benchmark>(&self, runtime: &Runtime, benchmark: &B) -> StmResult<BenchReport> {
        runtime.resume();
        runtime.reset_metrics();
        debug!(
            threads = self.threads,
            mix = self.mix,
            manager = %runtime.manager_kind(),
            duration_ms = self.duration.as_millis() as u64,
            "benchmark starting"
        );

        let started = Instant::now();
        let outcomes: Vec<StmResult<WorkerStats>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..self.threads)
                .map(|_| {
                    let mix = self.mix;
                    scope.spawn(move || {
                        let mut worker = runtime.worker();
                        match benchmark.run(&mut worker, mix) {
                            Ok(()) | Err(StmError::Shutdown) => Ok(worker.stats()),
                            Err(err) => Err(err),
                        }
                    })
                })
                .collect();

            thread::sleep(self.duration);
            runtime.stop();

            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err(StmError::invariant("benchmark thread panicked")))
                })
                .collect()
        });
        let elapsed = started.elapsed();

        let workers = outcomes.into_iter().collect::<StmResult<Vec<_>>>()?;
        benchmark.validate()?;

        let totals = runtime.metrics();
        Ok(BenchReport {
            manager: runtime.manager_kind(),
            threads: self.threads,
            mix: self.mix,
            elapsed,
            committed: totals.committed,
            aborted: totals.aborted,
            workers,
            summary: benchmark.report(),
        })
    }
}

/// Every thread increments or reads one shared counter.
///
/// At a mix of 100 this is the highest-contention workload there is: every
/// transaction writes the same cell. Lower mixes replace increments with
/// read-only transactions.
#[derive(Debug)]
pub struct SharedCounter {
    counter: TCell<u64>,
    increments: AtomicU64,
    reads: AtomicU64,
}

impl SharedCounter {
    /// Counter starting at zero.
    pub fn new() -> Self {
        Self {
            counter: TCell::new(0),
            increments: AtomicU64::new(0),
            reads: AtomicU64::new(0),
        }
    }

    /// Handle to the shared cell.
    pub fn counter(&self) -> &TCell<u64> {
        &self.counter
    }

    /// Increments that committed.
    pub fn increments(&self) -> u64 {
        self.increments.load(Ordering::Relaxed)
    }

    /// Read-only transactions that committed.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Commit one read of the counter.
    pub fn peek(&self, worker: &mut Worker) -> StmResult<u64> {
        let value = worker.run(|tx| Ok(*self.counter.read(tx)?))?;
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(value)
    }

    /// Commit one increment.
    pub fn increment(&self, worker: &mut Worker) -> StmResult<u64> {
        let value = worker.run(|tx| {
            let next = *self.counter.read(tx)? + 1;
            self.counter.set(tx, next)?;
            Ok(next)
        })?;
        self.increments.fetch_add(1, Ordering::Relaxed);
        Ok(value)
    }
}

impl Default for SharedCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl Benchmark for SharedCounter {
    fn run(&self, worker: &mut Worker, mix: u32) -> StmResult<()> {
        let mix = u64::from(mix);
        let mut calls: u64 = 0;
        while !worker.is_stopped() {
            if calls % 100 < mix {
                self.increment(worker)?;
            } else {
                self.peek(worker)?;
            }
            calls += 1;
        }
        Ok(())
    }

    fn validate(&self) -> StmResult<()> {
        let value = *self.counter.snapshot()?;
        let expected = self.increments();
        if value != expected {
            return Err(StmError::invariant(format!(
                "counter is {} after {} committed increments",
                value, expected
            )));
        }
        Ok(())
    }

    fn report(&self) -> String {
        format!("counter = {}, reads = {}", self.increments(), self.reads())
    }
}
