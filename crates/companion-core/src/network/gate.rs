//! Minimum-interval gate in front of remote calls.

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::sync::Arc;
use std::time::Duration;

/// Blocks the caller until the next remote call is allowed.
#[async_trait]
pub trait RateGate: Send + Sync {
    async fn wait(&self);
}

pub type DynRateGate = Arc<dyn RateGate>;

/// Allows one call per `interval`, shared by every caller holding it.
///
/// The first call passes immediately.
pub struct IntervalGate {
    limiter: Option<DefaultDirectRateLimiter>,
    interval: Duration,
}

impl IntervalGate {
    /// A zero interval disables the gate.
    pub fn new(interval: Duration) -> Self {
        let limiter = Quota::with_period(interval).map(RateLimiter::direct);
        Self { limiter, interval }
    }

    /// A gate that never waits.
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl RateGate for IntervalGate {
    async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_unlimited_gate_never_waits() {
        let gate = IntervalGate::unlimited();
        let start = Instant::now();
        for _ in 0..5 {
            gate.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_interval_gate_spaces_calls() {
        let gate = IntervalGate::new(Duration::from_millis(100));
        let start = Instant::now();
        gate.wait().await;
        assert!(start.elapsed() < Duration::from_millis(50));

        gate.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }
}
