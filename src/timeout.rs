// ABOUTME: Races an operation against a deadline without cancelling it.
// ABOUTME: On timeout the operation keeps running to completion in the background.

use std::time::Duration;

use crate::error::TimeoutError;

/// Race `future` against a deadline.
///
/// Resolves with the future's output if it settles first, or with a
/// [`TimeoutError`] (carrying `timeout` and the optional custom `message`)
/// if the deadline elapses first. If the future's output is itself a
/// `Result`, an early inner failure propagates unchanged as `Ok(Err(_))`.
///
/// This is a race, not a cancellation: the operation is spawned onto the
/// runtime and keeps running to completion in the background after a
/// timeout. Callers needing true cancellation must make the operation
/// idempotent or abortable themselves. A panic inside the operation is
/// resumed on the caller.
pub async fn with_timeout<F>(
    future: F,
    timeout: Duration,
    message: Option<&str>,
) -> Result<F::Output, TimeoutError>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let error = match message {
        Some(message) => TimeoutError::with_message(timeout, message),
        None => TimeoutError::new(timeout),
    };

    let handle = tokio::spawn(future);

    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(join_error)) => match join_error.try_into_panic() {
            Ok(payload) => std::panic::resume_unwind(payload),
            // The task can only otherwise fail to join while the runtime is
            // shutting down; report it as the deadline being unmet.
            Err(_) => Err(error),
        },
        Err(_) => {
            tracing::debug!(
                timeout_ms = error.timeout_ms,
                "operation timed out; continuing in background"
            );
            Err(error)
        }
    }
}

/// The bare timeout leg: sleeps for `timeout`, then yields the error value.
///
/// Useful in caller-assembled `select!` races with multiple independent
/// deadlines, where [`with_timeout`] is too coarse.
pub async fn timeout_after(timeout: Duration, message: Option<&str>) -> TimeoutError {
    let error = match message {
        Some(message) => TimeoutError::with_message(timeout, message),
        None => TimeoutError::new(timeout),
    };
    tokio::time::sleep(timeout).await;
    error
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;

    async fn delay<T>(ms: u64, value: T) -> T {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        value
    }

    #[tokio::test]
    async fn test_fast_operation_wins() {
        let result = with_timeout(delay(10, "fast"), Duration::from_millis(100), None).await;
        assert_eq!(result.unwrap(), "fast");
    }

    #[tokio::test]
    async fn test_slow_operation_times_out() {
        let result = with_timeout(delay(100, "slow"), Duration::from_millis(10), None).await;
        let err = result.unwrap_err();
        assert_eq!(err.timeout_ms, 10);
        assert_eq!(err.to_string(), "Operation timed out after 10ms");
    }

    #[tokio::test]
    async fn test_custom_message() {
        let result = with_timeout(
            delay(100, ()),
            Duration::from_millis(10),
            Some("fetch took too long"),
        )
        .await;
        assert_eq!(result.unwrap_err().to_string(), "fetch took too long");
    }

    #[tokio::test]
    async fn test_inner_failure_propagates_before_deadline() {
        let result = with_timeout(
            async { Err::<(), _>(anyhow::anyhow!("boom")) },
            Duration::from_millis(100),
            None,
        )
        .await;

        // Outer Ok: the race was won. Inner Err: the operation itself failed.
        let inner = result.unwrap();
        assert_eq!(inner.unwrap_err().to_string(), "boom");
    }

    #[tokio::test]
    async fn test_operation_continues_after_timeout() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        let result = with_timeout(
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                flag.store(true, Ordering::SeqCst);
            },
            Duration::from_millis(10),
            None,
        )
        .await;
        assert!(result.is_err());
        assert!(!finished.load(Ordering::SeqCst));

        // The abandoned operation still runs to completion.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_timeout_after_yields_error_value() {
        let start = std::time::Instant::now();
        let err = timeout_after(Duration::from_millis(20), None).await;
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(err.timeout_ms, 20);
    }

    #[tokio::test]
    async fn test_timeout_after_in_select_race() {
        let err = tokio::select! {
            () = delay(200, ()) => panic!("slow leg should lose"),
            err = timeout_after(Duration::from_millis(10), Some("deadline one")) => err,
        };
        assert_eq!(err.message, "deadline one");
    }

    #[tokio::test]
    async fn test_default_message_format() {
        let err = TimeoutError::new(Duration::from_millis(250));
        assert_eq!(err.to_string(), "Operation timed out after 250ms");
        assert_eq!(err.timeout(), Duration::from_millis(250));
    }
}
