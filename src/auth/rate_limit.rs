//! Rolling-window tracking of failed CLI login attempts per client origin.
//!
//! Only the browser-leg verification records failures; API-key pushes are
//! never counted. Counters decay lazily: whoever touches a stale origin
//! first drops it.

use chrono::{DateTime, Duration, Utc};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;

use crate::auth::clock::Clock;

pub const DEFAULT_MAX_FAILURES: u32 = 5;
pub const DEFAULT_FAILURE_WINDOW_MINUTES: i64 = 10;

struct FailedAttempts {
    count: u32,
    last_attempt: DateTime<Utc>,
}

pub struct FailedLoginLimiter {
    attempts: Mutex<HashMap<String, FailedAttempts>>,
    max_failures: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl FailedLoginLimiter {
    #[must_use]
    pub fn new(max_failures: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            attempts: Mutex::new(HashMap::new()),
            max_failures,
            window,
            clock,
        }
    }

    /// Whether this origin has used up its failure budget.
    ///
    /// A counter older than the window is dropped on the way, so a blocked
    /// origin unblocks itself once the window has elapsed.
    pub async fn is_blocked(&self, origin: &str) -> bool {
        let now = self.clock.now();
        let mut attempts = self.attempts.lock().await;

        let (count, last_attempt) = match attempts.get(origin) {
            Some(entry) => (entry.count, entry.last_attempt),
            None => return false,
        };

        if last_attempt < now - self.window {
            attempts.remove(origin);
            return false;
        }

        count >= self.max_failures
    }

    /// Count one failed verification attempt against this origin.
    ///
    /// A stale counter restarts at one instead of accumulating across
    /// windows.
    pub async fn record_failure(&self, origin: &str) {
        let now = self.clock.now();
        let stale_before = now - self.window;
        let mut attempts = self.attempts.lock().await;

        let entry = attempts
            .entry(origin.to_string())
            .or_insert(FailedAttempts {
                count: 0,
                last_attempt: now,
            });
        if entry.last_attempt < stale_before {
            entry.count = 0;
        }
        entry.count += 1;
        entry.last_attempt = now;
    }

    /// Number of origins still tracked, dropping stale ones first.
    pub async fn tracked_origins(&self) -> usize {
        let now = self.clock.now();
        let stale_before = now - self.window;
        let mut attempts = self.attempts.lock().await;
        attempts.retain(|_, entry| entry.last_attempt >= stale_before);
        attempts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;

    fn limiter(clock: &ManualClock) -> FailedLoginLimiter {
        FailedLoginLimiter::new(5, Duration::minutes(10), Arc::new(clock.clone()))
    }

    #[tokio::test]
    async fn blocks_after_reaching_the_threshold() {
        let clock = ManualClock::starting_now();
        let limiter = limiter(&clock);

        for _ in 0..4 {
            limiter.record_failure("1.2.3.4").await;
            assert!(!limiter.is_blocked("1.2.3.4").await);
        }

        limiter.record_failure("1.2.3.4").await;
        assert!(limiter.is_blocked("1.2.3.4").await);
    }

    #[tokio::test]
    async fn origins_are_tracked_independently() {
        let clock = ManualClock::starting_now();
        let limiter = limiter(&clock);

        for _ in 0..5 {
            limiter.record_failure("1.2.3.4").await;
        }

        assert!(limiter.is_blocked("1.2.3.4").await);
        assert!(!limiter.is_blocked("5.6.7.8").await);
        assert_eq!(limiter.tracked_origins().await, 1);
    }

    #[tokio::test]
    async fn block_expires_with_the_window() {
        let clock = ManualClock::starting_now();
        let limiter = limiter(&clock);

        for _ in 0..5 {
            limiter.record_failure("1.2.3.4").await;
        }
        assert!(limiter.is_blocked("1.2.3.4").await);

        clock.advance(Duration::minutes(11));
        assert!(!limiter.is_blocked("1.2.3.4").await);
        assert_eq!(limiter.tracked_origins().await, 0);
    }

    #[tokio::test]
    async fn stale_counter_restarts_at_one() {
        let clock = ManualClock::starting_now();
        let limiter = limiter(&clock);

        for _ in 0..4 {
            limiter.record_failure("1.2.3.4").await;
        }

        clock.advance(Duration::minutes(11));
        limiter.record_failure("1.2.3.4").await;
        assert!(!limiter.is_blocked("1.2.3.4").await);

        // Four more failures inside the fresh window reach the threshold.
        for _ in 0..4 {
            limiter.record_failure("1.2.3.4").await;
        }
        assert!(limiter.is_blocked("1.2.3.4").await);
    }

    #[tokio::test]
    async fn recent_failures_keep_the_counter_alive() {
        let clock = ManualClock::starting_now();
        let limiter = limiter(&clock);

        for _ in 0..5 {
            limiter.record_failure("1.2.3.4").await;
            clock.advance(Duration::minutes(5));
        }

        // Each failure refreshed the window, so the counter kept growing.
        assert!(limiter.is_blocked("1.2.3.4").await);
    }
}
