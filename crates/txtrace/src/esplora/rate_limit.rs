//! Request pacing.

use std::time::Duration;

use tokio::time::Instant;

/// Enforces a minimum interval between request starts.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Option<Duration>,
    last_call: Option<Instant>,
}

impl RateLimiter {
    /// Allow at most `rate_per_sec` requests per second.
    ///
    /// A rate of zero, a negative rate or a non-finite rate disables pacing.
    #[must_use]
    pub fn per_second(rate_per_sec: f64) -> Self {
        let min_interval = (rate_per_sec.is_finite() && rate_per_sec > 0.0)
            .then(|| Duration::try_from_secs_f64(1.0 / rate_per_sec).ok())
            .flatten();
        Self {
            min_interval,
            last_call: None,
        }
    }

    /// A limiter that never waits.
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            min_interval: None,
            last_call: None,
        }
    }

    /// The enforced interval, if any.
    #[must_use]
    pub fn min_interval(&self) -> Option<Duration> {
        self.min_interval
    }

    /// How long a call made at `now` would have to wait.
    #[must_use]
    pub fn wait_time(&self, now: Instant) -> Duration {
        match (self.min_interval, self.last_call) {
            (Some(interval), Some(last)) => interval.saturating_sub(now.duration_since(last)),
            _ => Duration::ZERO,
        }
    }

    /// Sleep until the next request may start, then mark it as started.
    pub async fn acquire(&mut self) {
        let wait = self.wait_time(Instant::now());
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        self.last_call = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_from_rate() {
        let limiter = RateLimiter::per_second(4.0);
        assert_eq!(limiter.min_interval(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_zero_or_negative_rate_disables() {
        assert!(RateLimiter::per_second(0.0).min_interval().is_none());
        assert!(RateLimiter::per_second(-2.0).min_interval().is_none());
        assert!(RateLimiter::per_second(f64::NAN).min_interval().is_none());
        assert!(RateLimiter::unlimited().min_interval().is_none());
    }

    #[test]
    fn test_first_call_never_waits() {
        let limiter = RateLimiter::per_second(1.0);
        assert_eq!(limiter.wait_time(Instant::now()), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_second_call_waits_for_interval() {
        let mut limiter = RateLimiter::per_second(20.0);
        limiter.acquire().await;
        let wait = limiter.wait_time(Instant::now());
        assert!(wait > Duration::ZERO);
        assert!(wait <= Duration::from_millis(50));

        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_unlimited_never_waits() {
        let mut limiter = RateLimiter::unlimited();
        limiter.acquire().await;
        assert_eq!(limiter.wait_time(Instant::now()), Duration::ZERO);
    }
}
