//! Minimum-interval rate limiter for upstream calls.
//!
//! The wait and the timestamp update happen while holding one mutex, so two
//! callers can never both observe an expired window and proceed together.
//! Concurrent callers queue on the lock; nobody is rejected.

use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

/// Minimum wall-clock gap between the starts of two upstream calls.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_call: Mutex::new(None),
        }
    }

    /// Block until the next call may start, then record it.
    pub fn acquire(&self) {
        self.acquire_stamped();
    }

    /// [`acquire`](Self::acquire), returning the instant that was recorded.
    pub(crate) fn acquire_stamped(&self) -> Instant {
        // A panic while holding the gate cannot leave the timestamp half-written.
        let mut last_call = self.last_call.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                let wait = self.interval - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "rate limit: waiting");
                thread::sleep(wait);
            }
        }

        let now = Instant::now();
        *last_call = Some(now);
        now
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(MIN_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_first_acquire_does_not_wait() {
        let limiter = RateLimiter::default();
        let start = Instant::now();
        limiter.acquire();
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_back_to_back_calls_are_spaced_by_min_interval() {
        let limiter = RateLimiter::default();
        let stamps: Vec<Instant> = (0..3).map(|_| limiter.acquire_stamped()).collect();

        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= MIN_INTERVAL);
        }
    }

    #[test]
    fn test_no_wait_after_interval_has_passed() {
        let limiter = RateLimiter::new(Duration::from_millis(20));
        limiter.acquire();
        thread::sleep(Duration::from_millis(40));

        let start = Instant::now();
        limiter.acquire();
        assert!(start.elapsed() < Duration::from_millis(20));
    }

    #[test]
    fn test_concurrent_callers_serialize() {
        let interval = Duration::from_millis(50);
        let limiter = Arc::new(RateLimiter::new(interval));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                thread::spawn(move || limiter.acquire_stamped())
            })
            .collect();

        let mut stamps: Vec<Instant> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        stamps.sort();

        assert_eq!(stamps.len(), 6);
        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= interval);
        }
    }
}
