// ABOUTME: Fixed minimum-delay rate limiter for pacing repeated calls.
// ABOUTME: Each wait() resolves no sooner than the configured delay after the last.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Mutable state for the rate limiter, protected by a single mutex.
struct RateLimiterState {
    last_request_at: Option<Instant>,
}

/// Enforces a minimum delay between successive operations.
///
/// The first `wait()` resolves immediately; each subsequent one resolves
/// only once `min_delay` has elapsed since the previous recorded call.
///
/// Designed for one logical sequential caller. Concurrent unsynchronized
/// `wait()` calls observe the same last-call time and are not serialized
/// against each other - wrap the limiter in external synchronization if
/// several tasks must share one pace.
pub struct RateLimiter {
    state: Mutex<RateLimiterState>,
    min_delay: Duration,
}

impl RateLimiter {
    /// Create a limiter enforcing `min_delay` between calls.
    pub fn new(min_delay: Duration) -> Self {
        Self {
            state: Mutex::new(RateLimiterState {
                last_request_at: None,
            }),
            min_delay,
        }
    }

    /// Wait until the pacing window has elapsed, then record this call.
    ///
    /// Resolves immediately if no prior call was recorded or the window has
    /// already passed.
    pub async fn wait(&self) {
        let remaining = self.time_until_ready().await;
        if !remaining.is_zero() {
            tokio::time::sleep(remaining).await;
        }

        let mut state = self.state.lock().await;
        state.last_request_at = Some(Instant::now());
    }

    /// Remaining time before the next `wait()` would resolve immediately.
    ///
    /// Zero once the window has elapsed; never negative.
    pub async fn time_until_ready(&self) -> Duration {
        let state = self.state.lock().await;
        match state.last_request_at {
            Some(last) => self.min_delay.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Forget the last recorded call so the next `wait()` is immediate.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.last_request_at = None;
    }
}
