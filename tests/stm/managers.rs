//! Contention Manager Contract Tests
//!
//! Each strategy's wait/abort behavior, observed through real transactions.

use crate::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};
use sxm::{StmError, TCell, TxState, TxStatus};
use sxm_concurrency::ContentionManager;
use sxm_core::StopSignal;

// ============================================================================
// Aggressive
// ============================================================================

#[test]
fn aggressive_never_waits() {
    let stop = StopSignal::new(Duration::from_secs(30));
    let mut manager = ContentionManager::new(ManagerKind::Aggressive);
    let me = TxStatus::new(1, 0);

    let started = Instant::now();
    for id in 2..100 {
        let blocker = TxStatus::new(id, i64::MAX - 1);
        manager.resolve_conflict(&me, &blocker, &stop).unwrap();
        assert_eq!(blocker.state(), TxState::Aborted);
    }
    assert!(started.elapsed() < Duration::from_secs(5));
}

// ============================================================================
// Passive
// ============================================================================

#[test]
fn passive_mutual_wait_deadlocks_until_shutdown() {
    let stm = stm_with(ManagerKind::Passive);
    let a = TCell::new(0);
    let b = TCell::new(0);
    let barrier = Arc::new(Barrier::new(2));
    let finished = Arc::new(AtomicBool::new(false));

    let spawn = |first: TCell<i32>, second: TCell<i32>| {
        let stm = stm.clone();
        let barrier = Arc::clone(&barrier);
        let finished = Arc::clone(&finished);
        thread::spawn(move || {
            let mut worker = stm.worker();
            let result = worker.run(|tx| {
                first.set(tx, 1)?;
                barrier.wait();
                second.set(tx, 1)
            });
            finished.store(true, Ordering::SeqCst);
            (result, worker.stats())
        })
    };

    let left = spawn(a.clone(), b.clone());
    let right = spawn(b.clone(), a.clone());

    thread::sleep(Duration::from_millis(300));
    // Neither side aborts the other, so neither can finish
    assert!(!finished.load(Ordering::SeqCst));
    assert_eq!(stm.metrics().transactions_committed, 0);

    stm.stop();
    for handle in [left, right] {
        let (result, stats) = handle.join().unwrap();
        assert_eq!(result, Err(StmError::Shutdown));
        assert_eq!(stats.committed, 0);
    }
    assert_eq!(*a.snapshot().unwrap(), 0);
    assert_eq!(*b.snapshot().unwrap(), 0);
}

// ============================================================================
// Priority
// ============================================================================

#[test]
fn priority_older_transaction_aborts_younger() {
    let stm = stm_with(ManagerKind::Priority);
    let cell = TCell::new(0);
    let (old_started_tx, old_started_rx) = mpsc::channel::<()>();
    let (young_wrote_tx, young_wrote_rx) = mpsc::channel::<()>();
    let (old_done_tx, old_done_rx) = mpsc::channel::<()>();

    let old = {
        let stm = stm.clone();
        let cell = cell.clone();
        thread::spawn(move || {
            let mut worker = stm.worker();
            let mut attempts = 0;
            worker
                .run(|tx| {
                    attempts += 1;
                    if attempts == 1 {
                        old_started_tx.send(()).unwrap();
                        young_wrote_rx.recv().unwrap();
                    }
                    cell.set(tx, 1)
                })
                .unwrap();
            old_done_tx.send(()).unwrap();
            attempts
        })
    };

    // The younger transaction starts after the older one drew its priority
    old_started_rx.recv().unwrap();
    let young = {
        let stm = stm.clone();
        let cell = cell.clone();
        thread::spawn(move || {
            let mut worker = stm.worker();
            let mut attempts = 0;
            worker
                .run(|tx| {
                    attempts += 1;
                    cell.modify(tx, |v| *v += 10)?;
                    if attempts == 1 {
                        young_wrote_tx.send(()).unwrap();
                        old_done_rx.recv().unwrap();
                    }
                    Ok(())
                })
                .unwrap();
            attempts
        })
    };

    assert_eq!(old.join().unwrap(), 1);
    assert_eq!(young.join().unwrap(), 2);
    // Older wrote 1 first; the younger rerun added 10 on top
    assert_eq!(*cell.snapshot().unwrap(), 11);
}

#[test]
fn priority_younger_transaction_waits_for_older() {
    let stm = stm_with(ManagerKind::Priority);
    let cell = TCell::new(0);
    let (old_wrote_tx, old_wrote_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let young_done = Arc::new(AtomicBool::new(false));

    let old = {
        let stm = stm.clone();
        let cell = cell.clone();
        thread::spawn(move || {
            let mut attempts = 0;
            stm.atomically(|tx| {
                attempts += 1;
                cell.set(tx, 1)?;
                if attempts == 1 {
                    old_wrote_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                }
                Ok(())
            })
            .unwrap();
            attempts
        })
    };

    old_wrote_rx.recv().unwrap();
    let young = {
        let stm = stm.clone();
        let cell = cell.clone();
        let young_done = Arc::clone(&young_done);
        thread::spawn(move || {
            stm.atomically(|tx| cell.modify(tx, |v| *v += 10)).unwrap();
            young_done.store(true, Ordering::SeqCst);
        })
    };

    thread::sleep(Duration::from_millis(100));
    assert!(!young_done.load(Ordering::SeqCst));
    release_tx.send(()).unwrap();

    assert_eq!(old.join().unwrap(), 1);
    young.join().unwrap();
    assert_eq!(*cell.snapshot().unwrap(), 11);
}

#[test]
fn priority_tie_aborts_blocker() {
    let stop = StopSignal::new(Duration::from_secs(30));
    let mut manager = ContentionManager::new(ManagerKind::Priority);
    let me = TxStatus::new(1, 50);
    let tied = TxStatus::new(2, 50);

    manager.resolve_conflict(&me, &tied, &stop).unwrap();
    assert_eq!(tied.state(), TxState::Aborted);
    assert_eq!(me.state(), TxState::Active);
}

// ============================================================================
// Backoff
// ============================================================================

#[test]
fn backoff_eventually_aborts_stuck_writer() {
    let stm = stm_with(ManagerKind::Backoff);
    let cell = TCell::new(0);
    let (wrote_tx, wrote_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let stuck = {
        let stm = stm.clone();
        let cell = cell.clone();
        thread::spawn(move || {
            let mut attempts = 0;
            stm.atomically(|tx| {
                attempts += 1;
                cell.set(tx, 100)?;
                if attempts == 1 {
                    wrote_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                }
                Ok(())
            })
            .unwrap();
            attempts
        })
    };

    wrote_rx.recv().unwrap();
    // Without aborting the stuck writer this would never finish
    stm.atomically(|tx| cell.modify(tx, |v| *v += 1)).unwrap();
    assert_eq!(*cell.snapshot().unwrap(), 1);
    release_tx.send(()).unwrap();

    assert_eq!(stuck.join().unwrap(), 2);
    assert_eq!(*cell.snapshot().unwrap(), 100);
}
