//! Polling strategies.
//!
//! A [`PollingStrategy`] holds one polling protocol's state and transition
//! logic. The poller never interprets responses itself; it only asks the
//! strategy to run, reports its status, and hands out its resource.
//!
//! Built-in strategies:
//! - [`NoPolling`] - the operation completed with the initial response
//! - [`StatusPolling`] - probe a status until it is terminal, sleeping per a
//!   [`BackoffStrategy`](turbolro_core::backoff::BackoffStrategy)

mod no_polling;
mod status;

pub use no_polling::NoPolling;
pub use status::{OperationStatus, StatusPolling, StatusProbe};

use crate::deserialize::{DeserializationTarget, DeserializeFn};
use crate::error::{PollingError, Result};
use std::fmt;

/// One polling protocol, driven by an [`LroPoller`](crate::LroPoller).
///
/// # Lifecycle
///
/// 1. `initialize` is called exactly once, synchronously, from the poller
///    constructor, before the strategy is shared with any other thread.
/// 2. `is_finished` is checked once right after. If it is false, `run` is
///    called once on the poller's background unit.
/// 3. `status` and `continuation_token` may be called from any thread at any
///    time after `initialize`, including while `run` is in progress. They must
///    not block on `run`; keep mutable state behind short-lived locks.
/// 4. `resource` is meaningful once the operation is finished.
///
/// # Example
///
/// ```rust
/// use std::sync::Mutex;
/// use turbolro::strategy::PollingStrategy;
/// use turbolro::{DeserializeFn, PollingError};
///
/// /// Completes after a fixed number of polls.
/// struct Countdown {
///     remaining: Mutex<u32>,
///     deserializer: Option<DeserializeFn<u32, u32>>,
/// }
///
/// impl PollingStrategy for Countdown {
///     type Client = ();
///     type Response = u32;
///     type Output = u32;
///
///     fn initialize(
///         &mut self,
///         _client: (),
///         initial_response: u32,
///         deserializer: DeserializeFn<u32, u32>,
///     ) -> Result<(), PollingError> {
///         *self.remaining.get_mut().unwrap() = initial_response;
///         self.deserializer = Some(deserializer);
///         Ok(())
///     }
///
///     fn run(&self) -> Result<(), PollingError> {
///         while *self.remaining.lock().unwrap() > 0 {
///             *self.remaining.lock().unwrap() -= 1;
///         }
///         Ok(())
///     }
///
///     fn status(&self) -> String {
///         if self.is_finished() { "Succeeded".into() } else { "InProgress".into() }
///     }
///
///     fn is_finished(&self) -> bool {
///         *self.remaining.lock().unwrap() == 0
///     }
///
///     fn resource(&self) -> Result<u32, PollingError> {
///         let deserialize = self.deserializer.as_ref().ok_or(PollingError::NotInitialized)?;
///         deserialize(&*self.remaining.lock().unwrap())
///     }
/// }
/// ```
pub trait PollingStrategy: Send + Sync + 'static {
    /// Client used to issue follow-up requests, forwarded unchanged by the poller.
    type Client: Send + 'static;
    /// Raw response type of the service.
    type Response: Send + Sync + 'static;
    /// Typed resource produced once the operation completes.
    type Output: Send + 'static;

    /// Short name used in logs, errors and continuation-token tags.
    fn kind(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Store what is needed to poll the operation started by `initial_response`.
    ///
    /// # Errors
    ///
    /// Fails if the initial response shows the service did not accept the
    /// operation. The poller returns this error from its constructor.
    fn initialize(
        &mut self,
        client: Self::Client,
        initial_response: Self::Response,
        deserializer: DeserializeFn<Self::Response, Self::Output>,
    ) -> Result<()>;

    /// Poll until the operation reaches a terminal state.
    ///
    /// Blocking. Called from the poller's background unit only.
    fn run(&self) -> Result<()>;

    /// Short human-readable status.
    fn status(&self) -> String;

    /// Whether the operation reached a terminal state.
    fn is_finished(&self) -> bool;

    /// The deserialized resource of the finished operation.
    fn resource(&self) -> Result<Self::Output>;

    /// An opaque token from which this strategy can resume polling.
    fn continuation_token(&self) -> Result<String> {
        Err(PollingError::Unsupported {
            strategy: self.kind(),
            operation: "continuation_token",
        })
    }

    /// Recover the constructor inputs of a poller from a continuation token.
    ///
    /// # Errors
    ///
    /// - [`PollingError::Unsupported`] if the strategy cannot resume
    /// - [`PollingError::MissingContext`] if `context` lacks the deserializer
    /// - [`PollingError::InvalidToken`] if the token cannot be decoded
    fn from_continuation_token(
        token: &str,
        context: ResumeContext<Self::Client, Self::Response, Self::Output>,
    ) -> Result<Resumed<Self::Client, Self::Response, Self::Output>>
    where
        Self: Sized,
    {
        let _ = (token, context);
        Err(PollingError::Unsupported {
            strategy: std::any::type_name::<Self>(),
            operation: "from_continuation_token",
        })
    }
}

/// Context for resuming from a continuation token.
///
/// Callbacks and live clients cannot be serialized into a token, so the
/// caller supplies them again here.
pub struct ResumeContext<C, R, T> {
    client: Option<C>,
    deserializer: Option<DeserializeFn<R, T>>,
}

impl<C, R: 'static, T: 'static> ResumeContext<C, R, T> {
    /// Create an empty context.
    pub fn new() -> Self {
        Self {
            client: None,
            deserializer: None,
        }
    }

    /// Set the client to keep polling with.
    pub fn with_client(mut self, client: C) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the deserialization callback (or typed model).
    pub fn with_deserializer(mut self, target: impl Into<DeserializationTarget<R, T>>) -> Self {
        let target: DeserializationTarget<R, T> = target.into();
        self.deserializer = Some(target.into_callback());
        self
    }

    /// Take the deserializer, failing with [`PollingError::MissingContext`]
    /// when it was not supplied.
    pub fn require_deserializer(self) -> Result<DeserializeFn<R, T>> {
        self.deserializer
            .ok_or(PollingError::MissingContext("deserialization_callback"))
    }

    /// Take both the client and the deserializer.
    pub fn require_client_and_deserializer(self) -> Result<(C, DeserializeFn<R, T>)> {
        let deserializer = self
            .deserializer
            .ok_or(PollingError::MissingContext("deserialization_callback"))?;
        let client = self.client.ok_or(PollingError::MissingContext("client"))?;
        Ok((client, deserializer))
    }
}

impl<C, R: 'static, T: 'static> Default for ResumeContext<C, R, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, R, T> fmt::Debug for ResumeContext<C, R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResumeContext")
            .field("has_client", &self.client.is_some())
            .field("has_deserializer", &self.deserializer.is_some())
            .finish()
    }
}

/// Constructor inputs recovered from a continuation token.
pub struct Resumed<C, R, T> {
    /// Client to keep polling with
    pub client: C,
    /// Initial response of the operation
    pub initial_response: R,
    /// Deserializer supplied through the [`ResumeContext`]
    pub deserializer: DeserializeFn<R, T>,
}

impl<C, R: fmt::Debug, T> fmt::Debug for Resumed<C, R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resumed")
            .field("initial_response", &self.initial_response)
            .finish_non_exhaustive()
    }
}
