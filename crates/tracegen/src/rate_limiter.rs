//! Trace pacing.
//!
//! Each worker owns its own limiter instance, so the aggregate emission rate
//! scales as `rate * workers`. Implementations are trait-based so pacing
//! strategies can be swapped without touching the worker loop.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Trait for rate limiting async operations.
///
/// Callers await [`wait`](Self::wait) before each rate-limited operation; it
/// completes immediately when within budget and delays as needed otherwise.
pub trait RateLimiter: Send {
    /// Wait until the next operation is permitted.
    fn wait(&mut self) -> impl Future<Output = ()> + Send;

    /// Returns the target rate in operations per second, if bounded.
    fn target_rate(&self) -> Option<f64> {
        None
    }
}

/// Object-safe version of [`RateLimiter`] for dynamic dispatch.
pub trait RateLimiterBoxed: Send {
    fn wait_boxed(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;

    fn target_rate(&self) -> Option<f64> {
        None
    }
}

impl<T: RateLimiter> RateLimiterBoxed for T {
    fn wait_boxed(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(self.wait())
    }

    fn target_rate(&self) -> Option<f64> {
        RateLimiter::target_rate(self)
    }
}

/// Interval-paced limiter built on `tokio::time::Interval`.
///
/// Permits are spaced at `1 / rate`; missed ticks are skipped, so a slow
/// caller never holds more than one pending permit and cannot catch up by
/// bursting. A rate at or below zero means unlimited: `wait` only yields to
/// the runtime.
pub struct IntervalRateLimiter {
    interval: Option<Interval>,
    rate_per_sec: f64,
}

impl IntervalRateLimiter {
    /// Creates a limiter with a specific period between permits.
    ///
    /// A zero period creates an unlimited limiter.
    pub fn new(period: Duration) -> Self {
        if period.is_zero() {
            return Self {
                interval: None,
                rate_per_sec: f64::INFINITY,
            };
        }

        let mut interval = interval(period);
        // Skip missed ticks: falling behind never accumulates a burst.
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        Self {
            interval: Some(interval),
            rate_per_sec: 1.0 / period.as_secs_f64(),
        }
    }

    /// Creates a limiter from a target rate in traces per second.
    ///
    /// Rates at or below zero (the scenario's "unbounded" sentinel) create an
    /// unlimited limiter.
    pub fn from_rate(rate_per_sec: f64) -> Self {
        if rate_per_sec <= 0.0 || !rate_per_sec.is_finite() {
            return Self::unlimited();
        }
        let period = Duration::from_secs_f64(1.0 / rate_per_sec);
        let mut limiter = Self::new(period);
        limiter.rate_per_sec = rate_per_sec;
        limiter
    }

    /// Creates a limiter that never waits.
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }
}

impl RateLimiter for IntervalRateLimiter {
    async fn wait(&mut self) {
        match &mut self.interval {
            Some(interval) => {
                interval.tick().await;
            }
            None => {
                // Unlimited: just yield to the runtime
                tokio::task::yield_now().await;
            }
        }
    }

    fn target_rate(&self) -> Option<f64> {
        if self.rate_per_sec.is_infinite() {
            None
        } else {
            Some(self.rate_per_sec)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_interval_pacing() {
        let mut limiter = IntervalRateLimiter::from_rate(100.0); // 10ms interval

        let start = Instant::now();
        for _ in 0..10 {
            limiter.wait().await;
        }
        let elapsed = start.elapsed();

        // 10 ticks at 10ms each, first tick immediate; allow scheduling jitter
        assert!(
            elapsed >= Duration::from_millis(80) && elapsed <= Duration::from_millis(200),
            "expected ~90ms, got {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn test_zero_rate_is_unlimited() {
        let mut limiter = IntervalRateLimiter::from_rate(0.0);

        let start = Instant::now();
        for _ in 0..1000 {
            limiter.wait().await;
        }
        assert!(
            start.elapsed() < Duration::from_millis(50),
            "unlimited limiter too slow: {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn test_negative_rate_is_unlimited() {
        let limiter = IntervalRateLimiter::from_rate(-10.0);
        assert_eq!(RateLimiter::target_rate(&limiter), None);
    }

    #[tokio::test]
    async fn test_target_rate() {
        let limiter = IntervalRateLimiter::from_rate(250.0);
        // Disambiguate between RateLimiter and RateLimiterBoxed traits
        assert_eq!(RateLimiter::target_rate(&limiter), Some(250.0));

        let unlimited = IntervalRateLimiter::unlimited();
        assert_eq!(RateLimiter::target_rate(&unlimited), None);
    }

    #[tokio::test]
    async fn test_no_burst_after_stall() {
        let mut limiter = IntervalRateLimiter::from_rate(100.0);
        limiter.wait().await;

        // Stall well past several periods; skipped ticks must not pile up.
        tokio::time::sleep(Duration::from_millis(55)).await;

        // At most one permit is pending: draining three takes at least one
        // full period beyond the immediate one (a bursting limiter would
        // return all three instantly).
        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        limiter.wait().await;
        assert!(
            start.elapsed() >= Duration::from_millis(9),
            "burst catch-up detected: {:?}",
            start.elapsed()
        );
    }
}
