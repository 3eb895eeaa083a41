//! Exponential polling backoff with jitter.

use super::strategy::BackoffStrategy;
use std::time::Duration;

const DEFAULT_MAX_POLLS: u32 = 120;
const DEFAULT_FIRST_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_INTERVAL_CEILING: Duration = Duration::from_secs(30);
const DEFAULT_GROWTH: f64 = 1.5;
const DEFAULT_SPREAD: f64 = 0.1;

/// Polling intervals that grow geometrically up to a ceiling.
///
/// The interval before poll `n` (0-indexed) is
/// `initial_delay * multiplier^n`, spread by `±jitter` and capped at
/// `max_delay`. Long operations settle at one poll per `max_delay` instead of
/// hammering the service; the spread keeps pollers started together from
/// polling in lockstep.
///
/// ```rust
/// use turbolro_core::backoff::{BackoffStrategy, ExponentialBackoff};
/// use std::time::Duration;
///
/// let backoff = ExponentialBackoff::builder()
///     .max_attempts(20)
///     .initial_delay(Duration::from_millis(200))
///     .max_delay(Duration::from_secs(10))
///     .multiplier(2.0)
///     .jitter(0.0)
///     .build();
/// assert_eq!(backoff.next_delay(1), Some(Duration::from_millis(400)));
/// assert_eq!(backoff.next_delay(20), None);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    max_polls: u32,
    first_interval: Duration,
    interval_ceiling: Duration,
    growth: f64,
    spread: f64,
}

impl ExponentialBackoff {
    /// Configure a backoff starting from the defaults: 120 polls, 1s first
    /// interval, 30s ceiling, growth 1.5, 10% jitter.
    pub fn builder() -> ExponentialBackoffBuilder {
        ExponentialBackoffBuilder::default()
    }

    /// Longest interval between two polls.
    pub fn max_delay(&self) -> Duration {
        self.interval_ceiling
    }

    /// Interval before poll `attempt`, without jitter.
    fn base_interval(&self, attempt: u32) -> f64 {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let grown = self.first_interval.as_secs_f64() * self.growth.powi(exponent);
        grown.min(self.interval_ceiling.as_secs_f64())
    }

    /// Upper bound on the total time spent sleeping before the budget runs
    /// out, jitter included. Useful to size a `result()` timeout.
    pub fn worst_case_total(&self) -> Duration {
        let ceiling = self.interval_ceiling.as_secs_f64();
        let total: f64 = (0..self.max_polls)
            .map(|attempt| (self.base_interval(attempt) * (1.0 + self.spread)).min(ceiling))
            .sum();
        Duration::try_from_secs_f64(total).unwrap_or(Duration::MAX)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl BackoffStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if !self.should_continue(attempt) {
            return None;
        }

        let base = self.base_interval(attempt);
        let offset = if self.spread > 0.0 {
            base * self.spread * rand::random::<f64>().mul_add(2.0, -1.0)
        } else {
            0.0
        };

        let seconds = (base + offset).clamp(0.0, self.interval_ceiling.as_secs_f64());
        Some(Duration::from_secs_f64(seconds))
    }

    fn max_attempts(&self) -> u32 {
        self.max_polls
    }
}

/// Builder for [`ExponentialBackoff`].
#[derive(Debug, Default)]
pub struct ExponentialBackoffBuilder {
    max_polls: Option<u32>,
    first_interval: Option<Duration>,
    interval_ceiling: Option<Duration>,
    growth: Option<f64>,
    spread: Option<f64>,
}

impl ExponentialBackoffBuilder {
    /// Polls allowed after the initial response. Default: 120
    pub fn max_attempts(mut self, polls: u32) -> Self {
        self.max_polls = Some(polls);
        self
    }

    /// Interval before the first poll. Default: 1s
    pub fn initial_delay(mut self, interval: Duration) -> Self {
        self.first_interval = Some(interval);
        self
    }

    /// Ceiling on the interval between polls. Default: 30s
    pub fn max_delay(mut self, ceiling: Duration) -> Self {
        self.interval_ceiling = Some(ceiling);
        self
    }

    /// Growth factor per poll, at least 1.0 so intervals never shrink. Default: 1.5
    pub fn multiplier(mut self, growth: f64) -> Self {
        self.growth = Some(growth.max(1.0));
        self
    }

    /// Relative spread applied to each interval, within `[0.0, 1.0]`. Default: 0.1
    pub fn jitter(mut self, spread: f64) -> Self {
        self.spread = Some(spread.clamp(0.0, 1.0));
        self
    }

    /// Build the backoff.
    pub fn build(self) -> ExponentialBackoff {
        ExponentialBackoff {
            max_polls: self.max_polls.unwrap_or(DEFAULT_MAX_POLLS),
            first_interval: self.first_interval.unwrap_or(DEFAULT_FIRST_INTERVAL),
            interval_ceiling: self.interval_ceiling.unwrap_or(DEFAULT_INTERVAL_CEILING),
            growth: self.growth.unwrap_or(DEFAULT_GROWTH),
            spread: self.spread.unwrap_or(DEFAULT_SPREAD),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn steady(growth: f64, ceiling_ms: u64) -> ExponentialBackoff {
        ExponentialBackoff::builder()
            .max_attempts(10)
            .initial_delay(Duration::from_millis(100))
            .max_delay(Duration::from_millis(ceiling_ms))
            .multiplier(growth)
            .jitter(0.0)
            .build()
    }

    #[rstest]
    #[case(2.0, 0, 100)]
    #[case(2.0, 3, 800)]
    #[case(2.0, 6, 5_000)]
    #[case(1.0, 9, 100)]
    fn test_intervals_grow_to_ceiling(
        #[case] growth: f64,
        #[case] attempt: u32,
        #[case] expected_ms: u64,
    ) {
        let backoff = steady(growth, 5_000);
        assert_eq!(
            backoff.next_delay(attempt),
            Some(Duration::from_millis(expected_ms))
        );
    }

    #[test]
    fn test_budget_exhausted() {
        let backoff = ExponentialBackoff::builder().max_attempts(2).build();

        assert!(backoff.next_delay(1).is_some());
        assert!(backoff.next_delay(2).is_none());
        assert!(backoff.next_delay(u32::MAX).is_none());
    }

    #[test]
    fn test_jitter_stays_within_spread() {
        let backoff = ExponentialBackoff::builder()
            .initial_delay(Duration::from_secs(1))
            .max_delay(Duration::from_secs(60))
            .jitter(0.5)
            .build();

        let delays: Vec<_> = (0..20).filter_map(|_| backoff.next_delay(0)).collect();
        for delay in &delays {
            assert!(
                (500..=1500).contains(&delay.as_millis()),
                "{delay:?} outside 50% spread of 1s"
            );
        }
        assert!(delays.windows(2).any(|pair| pair[0] != pair[1]));
    }

    #[test]
    fn test_defaults() {
        let backoff = ExponentialBackoff::default();
        assert_eq!(backoff.max_attempts(), 120);
        assert_eq!(backoff.max_delay(), Duration::from_secs(30));
        assert_eq!(backoff, ExponentialBackoff::builder().build());
    }

    #[test]
    fn test_builder_clamps() {
        let backoff = ExponentialBackoff::builder()
            .jitter(2.0)
            .multiplier(0.5)
            .build();
        assert_eq!(backoff.spread, 1.0);
        assert_eq!(backoff.growth, 1.0);

        let backoff = ExponentialBackoff::builder().jitter(-0.5).build();
        assert_eq!(backoff.spread, 0.0);
    }

    #[test]
    fn test_worst_case_total() {
        // 100 + 200 + 400 + 500 * 7, no jitter
        let total = steady(2.0, 500).worst_case_total();
        assert!(total.abs_diff(Duration::from_millis(4_200)) < Duration::from_micros(1));

        let none = ExponentialBackoff::builder().max_attempts(0).build();
        assert_eq!(none.worst_case_total(), Duration::ZERO);
    }
}
