//! Tests for supervised tasks

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{SupervisorConfig, supervise_with};

fn fast() -> SupervisorConfig {
    SupervisorConfig {
        initial_backoff: Duration::from_millis(5),
        max_backoff: Duration::from_millis(20),
        stable_after: Duration::from_secs(60),
    }
}

#[tokio::test]
async fn test_restarts_after_panic() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);

    let handle = supervise_with("panicky", fast(), CancellationToken::new(), move || {
        let counter = Arc::clone(&counter);
        async move {
            let run = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if run < 3 {
                panic!("run {run} fails");
            }
            Ok::<(), String>(())
        }
    });

    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_restarts_after_error() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);

    let handle = supervise_with("failing", fast(), CancellationToken::new(), move || {
        let counter = Arc::clone(&counter);
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err("first run fails".to_string());
            }
            Ok(())
        }
    });

    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_cancel_stops_restarts() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let cancel = CancellationToken::new();

    let handle = supervise_with("always-failing", fast(), cancel.clone(), move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>("nope")
        }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();

    let after_cancel = runs.load(Ordering::SeqCst);
    assert!(after_cancel >= 2);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(runs.load(Ordering::SeqCst), after_cancel);
}
