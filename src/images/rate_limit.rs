use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Fixed-delay gate between consecutive outbound API calls.
///
/// Shared by the resolver and the clients that issue follow-up requests
/// within a single lookup, so every call observes the same clock.
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

    /// A limiter that never waits
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until at least `interval` has passed since the previous `wait()`
    pub async fn wait(&self) {
        let mut last_call = self.last_call.lock().await;

        if let Some(last) = *last_call {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }

        *last_call = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_wait_returns_immediately() {
        let limiter = RateLimiter::new(Duration::from_secs(5));
        let start = std::time::Instant::now();

        limiter.wait().await;

        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_consecutive_waits_are_spaced() {
        let limiter = RateLimiter::new(Duration::from_millis(80));
        let start = std::time::Instant::now();

        limiter.wait().await;
        limiter.wait().await;
        limiter.wait().await;

        assert!(start.elapsed() >= Duration::from_millis(160));
    }

    #[tokio::test]
    async fn test_elapsed_time_counts_toward_interval() {
        let limiter = RateLimiter::new(Duration::from_millis(100));
        limiter.wait().await;

        tokio::time::sleep(Duration::from_millis(120)).await;

        let start = std::time::Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() < Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_disabled_limiter() {
        let limiter = RateLimiter::disabled();
        assert_eq!(limiter.interval(), Duration::ZERO);

        let start = std::time::Instant::now();
        for _ in 0..10 {
            limiter.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}
