#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Core abstractions for the TurboLRO ecosystem.
//!
//! This crate provides the building blocks that polling strategies share:
//!
//! - **Polling intervals** via the `BackoffStrategy` trait
//!   - Exponential backoff with jitter
//!   - Fixed intervals with an attempt budget
//! - **Continuation tokens** via the `TokenPayload` codec
//!   - Versioned, kind-tagged, base64 JSON envelopes
//! - **Declarative error boundaries** via the `error_boundary!` macro
//!
//! # Examples
//!
//! Using the prelude for convenient imports:
//!
//! ```rust
//! use turbolro_core::prelude::*;
//! use std::time::Duration;
//!
//! let backoff = ExponentialBackoff::builder()
//!     .max_attempts(10)
//!     .initial_delay(Duration::from_millis(500))
//!     .build();
//! assert_eq!(backoff.max_attempts(), 10);
//!
//! let token = 42u32.to_token("answer").unwrap();
//! assert_eq!(u32::from_token("answer", &token).unwrap(), 42);
//! ```

pub mod backoff;
pub mod error;
pub mod token;

/// Convenient re-exports of commonly used items.
///
/// Import all core abstractions with:
///
/// ```rust
/// use turbolro_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::backoff::{
        BackoffStrategy, ExponentialBackoff, ExponentialBackoffBuilder, FixedInterval,
    };
    pub use crate::error_boundary;
    pub use crate::token::{CodecError, TokenPayload};
}
