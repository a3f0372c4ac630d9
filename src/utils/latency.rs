//! Randomized delays standing in for backend and network round-trips.

use std::time::Duration;

use rand::Rng;

/// Uniform latency range in milliseconds, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedLatency {
    min_ms: u64,
    max_ms: u64,
}

impl SimulatedLatency {
    pub const ZERO: SimulatedLatency = SimulatedLatency { min_ms: 0, max_ms: 0 };

    pub const fn between_ms(min_ms: u64, max_ms: u64) -> Self {
        if min_ms <= max_ms {
            Self { min_ms, max_ms }
        } else {
            Self {
                min_ms: max_ms,
                max_ms: min_ms,
            }
        }
    }

    /// Base latency plus up to `jitter_ms` of random extra delay.
    pub const fn with_jitter(base_ms: u64, jitter_ms: u64) -> Self {
        Self::between_ms(base_ms, base_ms.saturating_add(jitter_ms))
    }

    /// Multiply both bounds by `factor`; `0.0` disables the delay.
    pub fn scaled(self, factor: f64) -> Self {
        if !factor.is_finite() || factor <= 0.0 {
            return Self::ZERO;
        }
        let scale = |ms: u64| (ms as f64 * factor).round() as u64;
        Self::between_ms(scale(self.min_ms), scale(self.max_ms))
    }

    pub fn is_zero(&self) -> bool {
        self.max_ms == 0
    }

    pub fn min(&self) -> Duration {
        Duration::from_millis(self.min_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    pub fn sample(&self) -> Duration {
        if self.min_ms == self.max_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rand::rng().random_range(self.min_ms..=self.max_ms))
    }

    /// Sleep for one sampled delay.
    pub async fn wait(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_stay_in_range() {
        let latency = SimulatedLatency::between_ms(200, 500);
        for _ in 0..200 {
            let sample = latency.sample();
            assert!(sample >= latency.min() && sample <= latency.max());
        }
    }

    #[test]
    fn scaling_to_zero_disables_delay() {
        let latency = SimulatedLatency::between_ms(100, 300).scaled(0.0);
        assert!(latency.is_zero());
        assert_eq!(latency.sample(), Duration::ZERO);

        let halved = SimulatedLatency::between_ms(100, 300).scaled(0.5);
        assert_eq!(halved.min(), Duration::from_millis(50));
        assert_eq!(halved.max(), Duration::from_millis(150));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_sleeps_for_fixed_latency() {
        let start = tokio::time::Instant::now();
        SimulatedLatency::between_ms(250, 250).wait().await;
        assert_eq!(start.elapsed(), Duration::from_millis(250));
    }
}
