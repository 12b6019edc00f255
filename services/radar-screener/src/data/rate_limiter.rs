//! Sliding-window rate limiter for price provider requests.
//!
//! Enforces two independent bounds on outbound calls:
//! - at most `requests_per_minute` calls in any trailing 60-second window
//! - a minimum spacing between consecutive calls
//!
//! All bookkeeping lives behind one async mutex which is held while a caller
//! waits, so admissions are serialized in FIFO order and no caller starves.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Length of the sliding quota window.
pub const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct WindowState {
    /// Admission times still inside the window, oldest first
    calls: VecDeque<Instant>,
    /// Most recent admission
    last_call: Option<Instant>,
}

impl WindowState {
    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.calls.front() {
            if now.duration_since(oldest) >= WINDOW {
                self.calls.pop_front();
            } else {
                break;
            }
        }
    }
}

/// A sliding-window rate limiter with minimum call spacing.
#[derive(Debug)]
pub struct RateLimiter {
    /// Name for logging
    name: String,
    /// Maximum admissions per window
    max_per_window: usize,
    /// Minimum time between two admissions
    min_spacing: Duration,
    state: Mutex<WindowState>,
}

impl RateLimiter {
    /// Create a new rate limiter.
    ///
    /// A quota of zero is treated as one call per window.
    pub fn new(name: impl Into<String>, requests_per_minute: u32, min_spacing: Duration) -> Self {
        Self {
            name: name.into(),
            max_per_window: requests_per_minute.max(1) as usize,
            min_spacing,
            state: Mutex::new(WindowState::default()),
        }
    }

    /// Wait until the next call is allowed, then record it.
    ///
    /// Returns the admission instant. Never fails; cancellation is up to the
    /// caller (dropping the future releases the lock without recording).
    pub async fn acquire(&self) -> Instant {
        let mut state = self.state.lock().await;

        loop {
            let now = Instant::now();
            state.prune(now);

            if state.calls.len() >= self.max_per_window {
                if let Some(&oldest) = state.calls.front() {
                    let ready_at = oldest + WINDOW;
                    debug!(
                        limiter = %self.name,
                        wait_ms = ready_at.saturating_duration_since(now).as_millis() as u64,
                        in_window = state.calls.len(),
                        "Quota window full, waiting for oldest call to expire"
                    );
                    sleep_until(ready_at).await;
                    continue;
                }
            }

            if let Some(last) = state.last_call {
                let ready_at = last + self.min_spacing;
                if ready_at > now {
                    sleep_until(ready_at).await;
                    continue;
                }
            }

            state.calls.push_back(now);
            state.last_call = Some(now);
            return now;
        }
    }

    /// Number of admissions inside the current window (for monitoring).
    pub async fn in_window(&self) -> usize {
        let mut state = self.state.lock().await;
        state.prune(Instant::now());
        state.calls.len()
    }

    /// Get the configured per-window quota.
    pub fn capacity(&self) -> usize {
        self.max_per_window
    }

    pub fn min_spacing(&self) -> Duration {
        self.min_spacing
    }
}

/// Shared rate limiter that can be cloned.
pub type SharedRateLimiter = Arc<RateLimiter>;

/// Create a shared rate limiter.
pub fn shared_limiter(
    name: impl Into<String>,
    requests_per_minute: u32,
    min_spacing: Duration,
) -> SharedRateLimiter {
    Arc::new(RateLimiter::new(name, requests_per_minute, min_spacing))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Every run of `limit + 1` consecutive admissions must span at least a window.
    fn assert_window_bound(mut calls: Vec<Instant>, limit: usize) {
        calls.sort();
        for pair in calls.windows(limit + 1) {
            let span = pair[limit].duration_since(pair[0]);
            assert!(span >= WINDOW, "{} calls within {:?}", limit + 1, span);
        }
    }

    #[test]
    fn test_zero_quota_clamped() {
        let limiter = RateLimiter::new("test", 0, Duration::ZERO);
        assert_eq!(limiter.capacity(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_never_exceeded_in_window() {
        let limit = 10;
        let limiter = RateLimiter::new("test", limit as u32, Duration::ZERO);

        let mut calls = Vec::new();
        for _ in 0..limit + 5 {
            calls.push(limiter.acquire().await);
        }

        assert_window_bound(calls.clone(), limit);
        // The overflow calls had to wait for the first window to expire.
        assert!(calls[limit].duration_since(calls[0]) >= WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_the_quota() {
        let limit = 4;
        let limiter = Arc::new(RateLimiter::new("test", limit as u32, Duration::ZERO));

        let mut handles = Vec::new();
        for _ in 0..limit + 5 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move { limiter.acquire().await }));
        }

        let mut calls = Vec::new();
        for handle in handles {
            calls.push(handle.await.unwrap());
        }

        assert_eq!(calls.len(), limit + 5);
        assert_window_bound(calls, limit);
    }

    #[tokio::test(start_paused = true)]
    async fn test_min_spacing_enforced_under_quota() {
        let spacing = Duration::from_millis(500);
        let limiter = RateLimiter::new("test", 2000, spacing);

        let first = limiter.acquire().await;
        let second = limiter.acquire().await;
        let third = limiter.acquire().await;

        assert!(second.duration_since(first) >= spacing);
        assert!(third.duration_since(second) >= spacing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_drains_over_time() {
        let limiter = RateLimiter::new("test", 5, Duration::ZERO);
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert_eq!(limiter.in_window().await, 3);

        tokio::time::sleep(WINDOW).await;
        assert_eq!(limiter.in_window().await, 0);
    }
}
