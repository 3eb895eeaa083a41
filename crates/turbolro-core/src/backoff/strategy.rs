//! The polling-interval trait and the fixed-interval policy.

use std::sync::Arc;
use std::time::Duration;

/// A policy deciding how long to wait between two polls of a long-running
/// operation, and when to stop polling altogether.
///
/// `attempt` is the number of non-terminal polls observed so far, starting at
/// 0 for the delay between the initial response and the first poll.
///
/// # Examples
///
/// ```rust
/// use turbolro_core::backoff::{BackoffStrategy, ExponentialBackoff};
/// use std::time::Duration;
///
/// let backoff = ExponentialBackoff::builder()
///     .max_attempts(3)
///     .initial_delay(Duration::from_millis(100))
///     .jitter(0.0)
///     .build();
///
/// assert_eq!(backoff.next_delay(0), Some(Duration::from_millis(100)));
/// assert!(backoff.should_continue(2));
/// assert!(!backoff.should_continue(3));
/// assert_eq!(backoff.next_delay(3), None);
/// ```
pub trait BackoffStrategy: Send + Sync {
    /// Calculate the delay before the next poll.
    ///
    /// # Returns
    /// - `Some(Duration)`: Wait this long before polling again
    /// - `None`: The attempt budget is exhausted, stop polling
    fn next_delay(&self, attempt: u32) -> Option<Duration>;

    /// The maximum number of polls after the initial response.
    fn max_attempts(&self) -> u32;

    /// Whether another poll is allowed after `attempt` non-terminal polls.
    fn should_continue(&self, attempt: u32) -> bool {
        attempt < self.max_attempts()
    }
}

impl<B: BackoffStrategy + ?Sized> BackoffStrategy for Arc<B> {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        (**self).next_delay(attempt)
    }

    fn max_attempts(&self) -> u32 {
        (**self).max_attempts()
    }

    fn should_continue(&self, attempt: u32) -> bool {
        (**self).should_continue(attempt)
    }
}

impl<B: BackoffStrategy + ?Sized> BackoffStrategy for Box<B> {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        (**self).next_delay(attempt)
    }

    fn max_attempts(&self) -> u32 {
        (**self).max_attempts()
    }

    fn should_continue(&self, attempt: u32) -> bool {
        (**self).should_continue(attempt)
    }
}

/// Poll at a constant interval, at most `max_attempts` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedInterval {
    interval: Duration,
    max_attempts: u32,
}

impl FixedInterval {
    /// Create a fixed-interval policy.
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Poll back-to-back, without sleeping. Mostly useful in tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(Duration::ZERO, max_attempts)
    }

    /// The configured interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl BackoffStrategy for FixedInterval {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        self.should_continue(attempt).then_some(self.interval)
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
