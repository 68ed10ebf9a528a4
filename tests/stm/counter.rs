//! Shared Counter Tests
//!
//! N threads each commit 10,000 read-increment-write transactions on one cell.

use crate::*;
use std::sync::{Arc, Barrier};
use std::thread;
use sxm::TCell;

const PER_THREAD: u64 = 10_000;

fn run_counter(kind: ManagerKind, threads: usize) {
    let stm = stm_with(kind);
    let counter = TCell::new(0u64);
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let stm = stm.clone();
            let counter = counter.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut worker = stm.worker();
                barrier.wait();
                for _ in 0..PER_THREAD {
                    worker
                        .run(|tx| {
                            let next = *counter.read(tx)? + 1;
                            counter.set(tx, next)
                        })
                        .unwrap();
                }
                worker.stats()
            })
        })
        .collect();

    let stats: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let expected = threads as u64 * PER_THREAD;

    assert_eq!(*counter.snapshot().unwrap(), expected);
    assert_eq!(stats.iter().map(|s| s.committed).sum::<u64>(), expected);
    assert_eq!(stm.metrics().transactions_committed, expected);
}

// ============================================================================
// Backoff
// ============================================================================

#[test]
fn backoff_counter_has_no_lost_updates() {
    run_counter(ManagerKind::Backoff, 4);
}

#[test]
fn backoff_counter_single_thread() {
    run_counter(ManagerKind::Backoff, 1);
}

// ============================================================================
// Other deadlock-free strategies
// ============================================================================

#[test]
fn greedy_counter_has_no_lost_updates() {
    run_counter(ManagerKind::Greedy, 4);
}

#[test]
fn priority_counter_has_no_lost_updates() {
    run_counter(ManagerKind::Priority, 4);
}
