//! Polling-interval policies.
//!
//! Polling strategies decide on their own how long to wait between two status
//! probes. This module gives them a shared vocabulary for that decision.
//!
//! # Key Types
//!
//! - [`BackoffStrategy`] - Core trait for polling-interval policies
//! - [`ExponentialBackoff`] - Growing intervals with jitter
//! - [`FixedInterval`] - Constant interval with an attempt budget
//!
//! # Examples
//!
//! ```rust
//! use turbolro_core::backoff::{BackoffStrategy, FixedInterval};
//! use std::time::Duration;
//!
//! let policy = FixedInterval::new(Duration::from_secs(5), 3);
//! assert_eq!(policy.next_delay(0), Some(Duration::from_secs(5)));
//! assert_eq!(policy.next_delay(3), None);
//! ```

mod exponential;
mod strategy;

pub use exponential::{ExponentialBackoff, ExponentialBackoffBuilder};
pub use strategy::{BackoffStrategy, FixedInterval};
