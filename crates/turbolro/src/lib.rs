//! # TurboLRO
//!
//! Generic poller for long-running operations (LROs):
//! - One background unit per operation, started at construction
//! - Pluggable polling protocols through the `PollingStrategy` trait
//! - Blocking and async waits with optional timeouts
//! - Completion callbacks, delivered exactly once
//! - Resumable polling through opaque continuation tokens
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::{Value, json};
//! use std::time::Duration;
//! use turbolro::{DeserializationTarget, LroPoller, OperationStatus, PollingError, StatusPolling, StatusProbe};
//! use turbolro_core::backoff::FixedInterval;
//!
//! /// Serves canned responses, one per poll.
//! struct Canned;
//!
//! impl StatusProbe for Canned {
//!     type Client = Vec<Value>;
//!     type Response = Value;
//!
//!     fn status(&self, response: &Value) -> Result<OperationStatus, PollingError> {
//!         Ok(OperationStatus::parse(response["status"].as_str().unwrap_or_default()))
//!     }
//!
//!     fn poll(&self, client: &Vec<Value>, latest: &Value) -> Result<Value, PollingError> {
//!         let next = latest["step"].as_u64().unwrap_or(0) as usize + 1;
//!         Ok(client[next].clone())
//!     }
//! }
//!
//! let responses = vec![
//!     json!({"step": 0, "status": "InProgress"}),
//!     json!({"step": 1, "status": "InProgress"}),
//!     json!({"step": 2, "status": "Succeeded", "value": 42}),
//! ];
//!
//! let poller = LroPoller::new(
//!     responses.clone(),
//!     responses[0].clone(),
//!     DeserializationTarget::function(|r: &Value| Ok(r["value"].as_i64())),
//!     StatusPolling::new(Canned, FixedInterval::new(Duration::from_millis(5), 10)),
//! )?;
//!
//! assert_eq!(poller.result(None)?, Some(42));
//! # Ok::<(), PollingError>(())
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// Re-export commonly used types
pub use config::{PollerConfig, PollerConfigBuilder};
pub use deserialize::{DeserializationTarget, DeserializeFn, Model, identity};
pub use error::{OperationError, PollingError, Result};
pub use executor::{Spawn, ThreadSpawner, TokioSpawner};
pub use poller::{DoneCallback, LroPoller, done_callback};
pub use strategy::{
    NoPolling, OperationStatus, PollingStrategy, ResumeContext, Resumed, StatusPolling,
    StatusProbe,
};

// Module declarations
pub mod config;
pub mod deserialize;
pub mod error;
pub mod executor;
pub mod observability;
pub mod poller;
pub mod strategy;
pub mod testing;

mod sync;

// Re-export the core crate for strategy authors
pub use turbolro_core;
