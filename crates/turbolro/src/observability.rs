//! Structured logging for poller lifecycles
//!
//! Every poller event goes through [`PollerMetadata`] so that log lines carry
//! the same `poller_id` and `strategy` fields.

use std::time::{Duration, Instant};
use tracing::{Span, debug, error, info, info_span, warn};
use uuid::Uuid;

/// Identity of one poller for structured logging
#[derive(Debug, Clone)]
pub struct PollerMetadata {
    /// Unique poller id, also part of the background unit name
    pub poller_id: Uuid,
    /// Strategy kind
    pub strategy: &'static str,
}

impl PollerMetadata {
    /// Create new poller metadata
    pub fn new(poller_id: Uuid, strategy: &'static str) -> Self {
        Self {
            poller_id,
            strategy,
        }
    }

    /// Span for the background unit, parented on the constructing caller's span
    pub fn span(&self, parent: &Span) -> Span {
        info_span!(
            parent: parent,
            "lro_poller",
            poller_id = %self.poller_id,
            strategy = self.strategy,
        )
    }

    /// Log a poller whose operation finished with the initial response
    pub fn log_already_finished(&self, status: &str) {
        debug!(
            poller_id = %self.poller_id,
            strategy = self.strategy,
            status = %status,
            "Operation already finished; no background polling"
        );
    }

    /// Log background polling started
    pub fn log_started(&self) {
        debug!(
            poller_id = %self.poller_id,
            strategy = self.strategy,
            "Polling started"
        );
    }

    /// Log polling finished without error
    pub fn log_succeeded(&self, status: &str, elapsed: Duration) {
        info!(
            poller_id = %self.poller_id,
            strategy = self.strategy,
            status = %status,
            elapsed_ms = elapsed.as_millis(),
            "Polling finished"
        );
    }

    /// Log polling failed
    pub fn log_failed(&self, status: &str, elapsed: Duration, error: &str) {
        warn!(
            poller_id = %self.poller_id,
            strategy = self.strategy,
            status = %status,
            elapsed_ms = elapsed.as_millis(),
            error = %error,
            "Polling failed"
        );
    }

    /// Log that an operation failure could not be tagged with a token
    pub fn log_token_unavailable(&self, error: &str) {
        warn!(
            poller_id = %self.poller_id,
            strategy = self.strategy,
            error = %error,
            "Unable to retrieve continuation token"
        );
    }

    /// Log a completion callback that panicked
    pub fn log_callback_panicked(&self, round: usize, index: usize, message: &str) {
        error!(
            poller_id = %self.poller_id,
            round,
            index,
            panic = %message,
            "Completion callback panicked"
        );
    }

    /// Log a nested callback registration refused at the depth bound
    pub fn log_callback_dropped(&self, depth: usize, max_depth: usize) {
        warn!(
            poller_id = %self.poller_id,
            depth,
            max_depth,
            "Completion callbacks kept registering more callbacks; dropping the new one"
        );
    }
}

/// Timer for measuring how long an operation was polled
pub struct PollTimer {
    start: Instant,
}

impl PollTimer {
    /// Start a new timer
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Render a panic payload as text
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poller_metadata_creation() {
        let id = Uuid::new_v4();
        let metadata = PollerMetadata::new(id, "status-polling");
        assert_eq!(metadata.poller_id, id);
        assert_eq!(metadata.strategy, "status-polling");
    }

    #[test]
    fn test_poll_timer() {
        let timer = PollTimer::start();
        std::thread::sleep(Duration::from_millis(10));
        assert!(timer.elapsed().as_millis() >= 10);
    }

    #[test]
    fn test_panic_message() {
        let payload = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload = std::panic::catch_unwind(|| panic!("code {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "code 7");

        let payload = std::panic::catch_unwind(|| std::panic::panic_any(3_u8)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
