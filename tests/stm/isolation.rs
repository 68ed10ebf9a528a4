//! Isolation Tests
//!
//! Committed writes become visible atomically; uncommitted and aborted
//! candidates never do.

use crate::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use sxm::TCell;

// ============================================================================
// Read-after-commit
// ============================================================================

#[test]
fn read_after_commit_sees_committed_value() {
    let stm = stm_with(ManagerKind::Backoff);
    let cell = TCell::new(String::from("before"));

    let writer = {
        let stm = stm.clone();
        let cell = cell.clone();
        thread::spawn(move || stm.atomically(|tx| cell.set(tx, String::from("after"))))
    };
    writer.join().unwrap().unwrap();

    let seen = stm.atomically(|tx| Ok((*cell.read(tx)?).clone())).unwrap();
    assert_eq!(seen, "after");
}

#[test]
fn readers_never_observe_intermediate_values() {
    let stm = stm_with(ManagerKind::Greedy);
    let cell = TCell::new(0u64);
    let done = Arc::new(AtomicBool::new(false));
    let barrier = Arc::new(Barrier::new(3));

    let writer = {
        let stm = stm.clone();
        let cell = cell.clone();
        let done = Arc::clone(&done);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            let mut worker = stm.worker();
            barrier.wait();
            for _ in 0..2_000 {
                // Odd values only ever exist inside an attempt
                worker
                    .run(|tx| {
                        cell.modify(tx, |v| *v += 1)?;
                        cell.modify(tx, |v| *v += 1)
                    })
                    .unwrap();
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let readers: Vec<_> = (0..2)
        .map(|_| {
            let stm = stm.clone();
            let cell = cell.clone();
            let done = Arc::clone(&done);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut worker = stm.worker();
                let mut last = 0;
                barrier.wait();
                while !done.load(Ordering::SeqCst) {
                    let seen = worker.run(|tx| Ok(*cell.read(tx)?)).unwrap();
                    assert_eq!(seen % 2, 0, "observed uncommitted value {}", seen);
                    assert!(seen >= last, "went backwards from {} to {}", last, seen);
                    last = seen;

                    let snap = *cell.snapshot().unwrap();
                    assert_eq!(snap % 2, 0);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(*cell.snapshot().unwrap(), 4_000);
}

// ============================================================================
// Abort invisibility
// ============================================================================

#[test]
fn aborted_candidate_is_never_visible() {
    let stm = stm_with(ManagerKind::Aggressive);
    let cell = TCell::new(0i32);
    let (written_tx, written_rx) = mpsc::channel::<()>();
    let (observed_tx, observed_rx) = mpsc::channel::<()>();

    let writer = {
        let stm = stm.clone();
        let cell = cell.clone();
        thread::spawn(move || {
            let mut attempts = 0;
            stm.atomically(|tx| {
                attempts += 1;
                if attempts == 1 {
                    cell.set(tx, 99)?;
                    written_tx.send(()).unwrap();
                    // Hold the write open until the other side has looked
                    observed_rx.recv().unwrap();
                    return Ok(());
                }
                cell.set(tx, 5)
            })
            .unwrap();
            attempts
        })
    };

    written_rx.recv().unwrap();
    // An aggressive reader aborts the live writer and falls back to the pre-image
    let seen = stm.atomically(|tx| Ok(*cell.read(tx)?)).unwrap();
    assert_eq!(seen, 0);
    assert_eq!(*cell.snapshot().unwrap(), 0);
    observed_tx.send(()).unwrap();

    let attempts = writer.join().unwrap();
    assert_eq!(attempts, 2);
    assert_eq!(*cell.snapshot().unwrap(), 5);
}

#[test]
fn multi_cell_transfer_is_atomic() {
    let stm = stm_with(ManagerKind::Backoff);
    let accounts: Vec<TCell<i64>> = (0..4).map(|_| TCell::new(1_000)).collect();
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let stm = stm.clone();
            let accounts = accounts.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut worker = stm.worker();
                barrier.wait();
                for i in 0..500 {
                    let from = (t + i) % 4;
                    let to = (t + i + 1) % 4;
                    worker
                        .run(|tx| {
                            accounts[from].modify(tx, |v| *v -= 7)?;
                            accounts[to].modify(tx, |v| *v += 7)
                        })
                        .unwrap();
                    // Whole-system invariant seen from inside a transaction
                    let total = worker
                        .run(|tx| {
                            let mut sum = 0;
                            for account in &accounts {
                                sum += *account.read(tx)?;
                            }
                            Ok(sum)
                        })
                        .unwrap();
                    assert_eq!(total, 4_000);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    let total: i64 = accounts.iter().map(|a| *a.snapshot().unwrap()).sum();
    assert_eq!(total, 4_000);
}
