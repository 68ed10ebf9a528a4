//! Nested Transaction Tests
//!
//! Nested bodies share the outermost attempt: they never commit on their own,
//! and aborting the outermost attempt discards everything they wrote.

use crate::*;
use std::sync::mpsc;
use std::thread;
use sxm::{StmError, TCell};

#[test]
fn nested_writes_wait_for_outer_commit() {
    let stm = stm_with(ManagerKind::Backoff);
    let cell = TCell::new(1);

    stm.atomically(|tx| {
        tx.nested(|inner| cell.set(inner, 2))?;
        // Inner success is not a commit
        assert_eq!(*cell.snapshot()?, 1);
        assert_eq!(*cell.read(tx)?, 2);
        Ok(())
    })
    .unwrap();

    assert_eq!(*cell.snapshot().unwrap(), 2);
    assert_eq!(stm.metrics().transactions_committed, 1);
}

#[test]
fn nested_depth_is_tracked() {
    let stm = stm_with(ManagerKind::Backoff);
    let depths = stm
        .atomically(|tx| {
            let outer = tx.depth();
            let (middle, innermost) = tx.nested(|mid| {
                let middle = mid.depth();
                let innermost = mid.nested(|deep| Ok(deep.depth()))?;
                Ok((middle, innermost))
            })?;
            Ok((outer, middle, innermost, tx.depth()))
        })
        .unwrap();
    assert_eq!(depths, (1, 2, 3, 1));
}

#[test]
fn nested_abort_restarts_outermost() {
    let stm = stm_with(ManagerKind::Backoff);
    let cell = TCell::new(0);
    let mut outer_runs = 0;

    stm.atomically(|tx| {
        outer_runs += 1;
        cell.modify(tx, |v| *v += 10)?;
        let first = outer_runs == 1;
        tx.nested(|inner| {
            cell.modify(inner, |v| *v += 1)?;
            if first {
                return Err(StmError::Aborted);
            }
            Ok(())
        })
    })
    .unwrap();

    assert_eq!(outer_runs, 2);
    assert_eq!(*cell.snapshot().unwrap(), 11);
}

#[test]
fn aborting_outer_discards_inner_writes() {
    let stm = stm_with(ManagerKind::Aggressive);
    let cell = TCell::new(0);
    let (ready_tx, ready_rx) = mpsc::channel::<()>();
    let (go_tx, go_rx) = mpsc::channel::<()>();

    let nester = {
        let stm = stm.clone();
        let cell = cell.clone();
        thread::spawn(move || {
            let mut attempts = 0;
            stm.atomically(|tx| {
                attempts += 1;
                if attempts == 1 {
                    tx.nested(|inner| cell.set(inner, 42))?;
                    ready_tx.send(()).unwrap();
                    go_rx.recv().unwrap();
                } else {
                    tx.nested(|inner| cell.set(inner, 7))?;
                }
                Ok(())
            })
            .unwrap();
            attempts
        })
    };

    ready_rx.recv().unwrap();
    // Aggressive reader aborts the outer attempt while the inner write is pending
    let seen = stm.atomically(|tx| Ok(*cell.read(tx)?)).unwrap();
    assert_eq!(seen, 0);
    go_tx.send(()).unwrap();

    assert_eq!(nester.join().unwrap(), 2);
    assert_eq!(*cell.snapshot().unwrap(), 7);
}

#[test]
fn reentrant_atomically_is_rejected_and_writes_nothing() {
    let stm = stm_with(ManagerKind::Backoff);
    let outer_cell = TCell::new(0);
    let inner_cell = TCell::new(0);
    let mut outer_runs = 0;

    stm.atomically(|tx| {
        outer_runs += 1;
        outer_cell.modify(tx, |v| *v += 1)?;
        let inner = stm.atomically(|t| inner_cell.modify(t, |v| *v += 1));
        assert!(inner.unwrap_err().is_serious());
        if outer_runs < 3 {
            return Err(StmError::Aborted);
        }
        Ok(())
    })
    .unwrap();

    assert_eq!(outer_runs, 3);
    assert_eq!(*outer_cell.snapshot().unwrap(), 1);
    // No inner attempt ever committed on its own
    assert_eq!(*inner_cell.snapshot().unwrap(), 0);

    // The same write through nested() joins the outer attempt
    stm.atomically(|tx| tx.nested(|inner| inner_cell.modify(inner, |v| *v += 1)))
        .unwrap();
    assert_eq!(*inner_cell.snapshot().unwrap(), 1);
}

#[test]
fn separate_threads_may_run_concurrently_with_a_body() {
    let stm = stm_with(ManagerKind::Backoff);
    let cell = TCell::new(0);

    stm.atomically(|tx| {
        cell.set(tx, 1)?;
        let other = {
            let stm = stm.clone();
            let side = TCell::new(0);
            thread::spawn(move || {
                stm.atomically(|t| side.set(t, 9))?;
                Ok::<_, sxm::Error>(*side.snapshot()?)
            })
        };
        assert_eq!(other.join().unwrap().unwrap(), 9);
        Ok(())
    })
    .unwrap();

    assert_eq!(*cell.snapshot().unwrap(), 1);
}
