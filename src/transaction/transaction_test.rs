// ABOUTME: Tests for transaction execution and reverse-order rollback.
// ABOUTME: Covers commit, failure unwind, rollback skipping, and error collection.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Mutex;

use super::transaction::{Step, Transaction, TransactionOutcome, execute_transaction};

type Log = Arc<Mutex<Vec<String>>>;

fn ok_step(name: &str, log: &Log) -> Step<String> {
    let name_owned = name.to_string();
    let exec_log = log.clone();
    let undo_log = log.clone();
    let undo_name = name.to_string();
    Step::new(name, move || async move {
        exec_log.lock().await.push(format!("exec:{name_owned}"));
        Ok(name_owned)
    })
    .with_rollback(move |value: String| async move {
        assert_eq!(value, undo_name);
        undo_log.lock().await.push(format!("undo:{undo_name}"));
        Ok(())
    })
}

fn failing_step(name: &str, log: &Log) -> Step<String> {
    let name_owned = name.to_string();
    let log = log.clone();
    Step::new(name, move || async move {
        log.lock().await.push(format!("exec:{name_owned}"));
        Err(anyhow::anyhow!("{name_owned} blew up"))
    })
}

#[tokio::test]
async fn test_all_steps_commit_in_order() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let outcome = execute_transaction(vec![
        ok_step("a", &log),
        ok_step("b", &log),
        ok_step("c", &log),
    ])
    .await;

    assert!(outcome.is_committed());
    assert_eq!(
        outcome.into_results().unwrap(),
        vec!["a".to_string(), "b".to_string(), "c".to_string()]
    );
    assert_eq!(*log.lock().await, vec!["exec:a", "exec:b", "exec:c"]);
}

#[tokio::test]
async fn test_failure_rolls_back_in_reverse_and_skips_later_steps() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let outcome = execute_transaction(vec![
        ok_step("a", &log),
        ok_step("b", &log),
        failing_step("c", &log),
        ok_step("never", &log),
    ])
    .await;

    match outcome {
        TransactionOutcome::RolledBack {
            failed_at,
            error,
            rollback_errors,
        } => {
            assert_eq!(failed_at, "c");
            assert_eq!(error.to_string(), "c blew up");
            assert!(rollback_errors.is_empty());
        }
        TransactionOutcome::Committed { .. } => panic!("Expected RolledBack"),
    }

    assert_eq!(
        *log.lock().await,
        vec!["exec:a", "exec:b", "exec:c", "undo:b", "undo:a"],
        "rollback must run in reverse order and step 'never' must not execute"
    );
}

#[tokio::test]
async fn test_first_step_failure_rolls_back_nothing() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let outcome = execute_transaction(vec![failing_step("a", &log), ok_step("b", &log)]).await;

    match outcome {
        TransactionOutcome::RolledBack { failed_at, .. } => assert_eq!(failed_at, "a"),
        TransactionOutcome::Committed { .. } => panic!("Expected RolledBack"),
    }
    assert_eq!(*log.lock().await, vec!["exec:a"]);
}

#[tokio::test]
async fn test_steps_without_rollback_are_skipped_during_unwind() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let no_undo = {
        let log = log.clone();
        Step::new("plain", move || async move {
            log.lock().await.push("exec:plain".to_string());
            Ok("plain".to_string())
        })
    };

    let outcome =
        execute_transaction(vec![ok_step("a", &log), no_undo, failing_step("boom", &log)]).await;

    assert!(!outcome.is_committed());
    assert_eq!(
        *log.lock().await,
        vec!["exec:a", "exec:plain", "exec:boom", "undo:a"]
    );
}

#[tokio::test]
async fn test_rollback_errors_are_collected_and_unwind_continues() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let bad_undo = {
        let log = log.clone();
        Step::new("fragile", move || async move {
            log.lock().await.push("exec:fragile".to_string());
            Ok("fragile".to_string())
        })
        .with_rollback(|_| async { Err(anyhow::anyhow!("undo failed")) })
    };

    let outcome =
        execute_transaction(vec![ok_step("a", &log), bad_undo, failing_step("boom", &log)]).await;

    match outcome {
        TransactionOutcome::RolledBack {
            failed_at,
            rollback_errors,
            ..
        } => {
            assert_eq!(failed_at, "boom");
            assert_eq!(rollback_errors.len(), 1);
            assert_eq!(rollback_errors[0].to_string(), "undo failed");
        }
        TransactionOutcome::Committed { .. } => panic!("Expected RolledBack"),
    }

    // The failing rollback must not stop 'a' from being undone.
    assert_eq!(
        *log.lock().await,
        vec!["exec:a", "exec:fragile", "exec:boom", "undo:a"]
    );
}

#[tokio::test]
async fn test_empty_transaction_commits() {
    let outcome = execute_transaction::<()>(vec![]).await;
    assert!(outcome.is_committed());
    assert!(outcome.into_results().unwrap().is_empty());
}

#[tokio::test]
async fn test_incremental_registration() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut transaction = Transaction::new();
    assert!(transaction.is_empty());

    for i in 0..3 {
        let counter = counter.clone();
        transaction.add_step(Step::new(format!("step-{i}"), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(i)
        }));
    }
    assert_eq!(transaction.len(), 3);

    let outcome = transaction.run().await;
    assert_eq!(outcome.into_results().unwrap(), vec![0, 1, 2]);
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_rollback_receives_the_executed_value() {
    let received: Arc<Mutex<Option<u32>>> = Arc::new(Mutex::new(None));
    let sink = received.clone();

    let outcome = execute_transaction(vec![
        Step::new("produce", || async { Ok(17) }).with_rollback(move |value| {
            let sink = sink.clone();
            async move {
                *sink.lock().await = Some(value);
                Ok(())
            }
        }),
        Step::new("explode", || async { Err(anyhow::anyhow!("bang")) }),
    ])
    .await;

    assert!(!outcome.is_committed());
    assert_eq!(*received.lock().await, Some(17));
}
