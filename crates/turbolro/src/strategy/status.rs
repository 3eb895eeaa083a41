//! Generic status-probe polling.
//!
//! [`StatusPolling`] knows nothing about any wire protocol. A [`StatusProbe`]
//! supplied by the caller fetches the next response and reads its status; the
//! strategy owns the loop, the sleeping, and the resumable state.

use super::{PollingStrategy, ResumeContext, Resumed};
use crate::deserialize::DeserializeFn;
use crate::error::{OperationError, PollingError, Result};
use crate::sync::lock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, trace};
use turbolro_core::backoff::BackoffStrategy;
use turbolro_core::token::TokenPayload;

const KIND: &str = "status-polling";

/// Status of a long-running operation as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperationStatus {
    /// Accepted but not started yet
    NotStarted,
    /// Still running
    InProgress,
    /// Completed successfully
    Succeeded,
    /// Completed with a failure
    Failed,
    /// Canceled before completion
    Canceled,
    /// A status string this crate does not recognize; treated as in progress
    Other(String),
}

impl OperationStatus {
    /// Parse a service status string, case-insensitively.
    ///
    /// ```rust
    /// use turbolro::OperationStatus;
    ///
    /// assert_eq!(OperationStatus::parse("succeeded"), OperationStatus::Succeeded);
    /// assert_eq!(OperationStatus::parse("Cancelled"), OperationStatus::Canceled);
    /// assert_eq!(OperationStatus::parse("Provisioning"), OperationStatus::Other("Provisioning".into()));
    /// ```
    pub fn parse(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "notstarted" | "not-started" | "accepted" | "queued" => OperationStatus::NotStarted,
            "inprogress" | "in-progress" | "running" | "updating" | "processing" => {
                OperationStatus::InProgress
            }
            "succeeded" | "success" | "completed" | "complete" | "done" => {
                OperationStatus::Succeeded
            }
            "failed" | "failure" | "error" => OperationStatus::Failed,
            "canceled" | "cancelled" => OperationStatus::Canceled,
            _ => OperationStatus::Other(status.trim().to_string()),
        }
    }

    /// Whether no further polling will happen.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationStatus::Succeeded | OperationStatus::Failed | OperationStatus::Canceled
        )
    }

    /// Whether the operation failed or was canceled.
    pub fn is_failure(&self) -> bool {
        matches!(self, OperationStatus::Failed | OperationStatus::Canceled)
    }

    /// Canonical string form.
    pub fn as_str(&self) -> &str {
        match self {
            OperationStatus::NotStarted => "NotStarted",
            OperationStatus::InProgress => "InProgress",
            OperationStatus::Succeeded => "Succeeded",
            OperationStatus::Failed => "Failed",
            OperationStatus::Canceled => "Canceled",
            OperationStatus::Other(status) => status,
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protocol half of [`StatusPolling`]: how to fetch the next response and
/// how to read a status from it.
///
/// Everything protocol-specific (URLs, headers, retry-after hints) lives here.
///
/// # Example
///
/// ```rust
/// use serde_json::{Value, json};
/// use turbolro::{OperationStatus, PollingError, StatusProbe};
///
/// /// Reads `"status"` from JSON documents served by an in-memory store.
/// struct JsonStatus;
///
/// impl StatusProbe for JsonStatus {
///     type Client = Vec<Value>;
///     type Response = Value;
///
///     fn status(&self, response: &Value) -> Result<OperationStatus, PollingError> {
///         let status = response["status"]
///             .as_str()
///             .ok_or_else(|| PollingError::deserialization("no status field"))?;
///         Ok(OperationStatus::parse(status))
///     }
///
///     fn poll(&self, client: &Vec<Value>, latest: &Value) -> Result<Value, PollingError> {
///         let step = latest["step"].as_u64().unwrap_or(0) as usize + 1;
///         Ok(client.get(step).cloned().unwrap_or_else(|| json!({"status": "Failed"})))
///     }
/// }
/// ```
pub trait StatusProbe: Send + Sync + 'static {
    /// Client used for follow-up requests.
    type Client: Send + Sync + 'static;
    /// Raw response type; serialized into continuation tokens.
    type Response: Clone + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Read the operation status from a response.
    fn status(&self, response: &Self::Response) -> Result<OperationStatus>;

    /// Fetch the next response, given the latest one.
    fn poll(&self, client: &Self::Client, latest: &Self::Response) -> Result<Self::Response>;
}

struct Progress<R> {
    latest: R,
    status: OperationStatus,
}

/// Polls a [`StatusProbe`] until it reports a terminal status, sleeping between
/// polls as told by a [`BackoffStrategy`].
///
/// - `Succeeded` completes the operation; `resource()` deserializes the last response.
/// - `Failed` or `Canceled` ends `run()` with [`PollingError::Operation`].
/// - An exhausted backoff budget ends `run()` with [`PollingError::Operation`]
///   carrying the last observed status.
///
/// The continuation token holds the latest response, so a resumed poller
/// continues from where the original stopped.
pub struct StatusPolling<P: StatusProbe, B, T> {
    probe: P,
    backoff: B,
    client: Option<P::Client>,
    deserializer: Option<DeserializeFn<P::Response, T>>,
    progress: Mutex<Option<Progress<P::Response>>>,
    attempts: AtomicU32,
}

impl<P: StatusProbe, B: BackoffStrategy, T> StatusPolling<P, B, T> {
    /// Create an uninitialized strategy.
    pub fn new(probe: P, backoff: B) -> Self {
        Self {
            probe,
            backoff,
            client: None,
            deserializer: None,
            progress: Mutex::new(None),
            attempts: AtomicU32::new(0),
        }
    }

    /// Number of polls performed so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// The most recent response, if initialized.
    pub fn latest_response(&self) -> Option<P::Response> {
        lock(&self.progress).as_ref().map(|p| p.latest.clone())
    }

    /// The last observed operation status, if initialized.
    pub fn operation_status(&self) -> Option<OperationStatus> {
        lock(&self.progress).as_ref().map(|p| p.status.clone())
    }

    fn failure(status: &OperationStatus) -> PollingError {
        OperationError::new("Operation failed or canceled")
            .with_status(status.as_str())
            .into()
    }
}

impl<P, B, T> fmt::Debug for StatusPolling<P, B, T>
where
    P: StatusProbe,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = lock(&self.progress).as_ref().map(|p| p.status.clone());
        f.debug_struct("StatusPolling")
            .field("status", &status)
            .field("attempts", &self.attempts.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl<P, B, T> PollingStrategy for StatusPolling<P, B, T>
where
    P: StatusProbe,
    B: BackoffStrategy + 'static,
    T: Send + 'static,
{
    type Client = P::Client;
    type Response = P::Response;
    type Output = T;

    fn kind(&self) -> &'static str {
        KIND
    }

    fn initialize(
        &mut self,
        client: P::Client,
        initial_response: P::Response,
        deserializer: DeserializeFn<P::Response, T>,
    ) -> Result<()> {
        let status = self.probe.status(&initial_response)?;
        if status.is_failure() {
            return Err(Self::failure(&status));
        }

        self.client = Some(client);
        self.deserializer = Some(deserializer);
        *self
            .progress
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(Progress {
            latest: initial_response,
            status,
        });
        Ok(())
    }

    fn run(&self) -> Result<()> {
        let client = self.client.as_ref().ok_or(PollingError::NotInitialized)?;
        let (mut latest, mut status) = {
            let progress = lock(&self.progress);
            let progress = progress.as_ref().ok_or(PollingError::NotInitialized)?;
            (progress.latest.clone(), progress.status.clone())
        };

        while !status.is_terminal() {
            let attempt = self.attempts.load(Ordering::SeqCst);
            let Some(delay) = self.backoff.next_delay(attempt) else {
                return Err(OperationError::new(format!(
                    "Operation still '{}' after {} polls",
                    status, attempt
                ))
                .with_status(status.as_str())
                .into());
            };

            if !delay.is_zero() {
                trace!(delay_ms = delay.as_millis() as u64, "Sleeping before next poll");
                std::thread::sleep(delay);
            }

            latest = self.probe.poll(client, &latest)?;
            status = self.probe.status(&latest)?;
            self.attempts.fetch_add(1, Ordering::SeqCst);

            debug!(attempt = attempt + 1, status = %status, "Polled operation status");

            *lock(&self.progress) = Some(Progress {
                latest: latest.clone(),
                status: status.clone(),
            });
        }

        if status.is_failure() {
            return Err(Self::failure(&status));
        }
        Ok(())
    }

    fn status(&self) -> String {
        lock(&self.progress)
            .as_ref()
            .map(|p| p.status.to_string())
            .unwrap_or_else(|| OperationStatus::NotStarted.to_string())
    }

    fn is_finished(&self) -> bool {
        lock(&self.progress)
            .as_ref()
            .is_some_and(|p| p.status.is_terminal())
    }

    fn resource(&self) -> Result<T> {
        let deserialize = self.deserializer.as_ref().ok_or(PollingError::NotInitialized)?;
        let latest = self.latest_response().ok_or(PollingError::NotInitialized)?;
        deserialize(&latest)
    }

    fn continuation_token(&self) -> Result<String> {
        let latest = self.latest_response().ok_or(PollingError::NotInitialized)?;
        Ok(latest.to_token(KIND)?)
    }

    fn from_continuation_token(
        token: &str,
        context: ResumeContext<P::Client, P::Response, T>,
    ) -> Result<Resumed<P::Client, P::Response, T>> {
        let (client, deserializer) = context.require_client_and_deserializer()?;
        let initial_response = P::Response::from_token(KIND, token)?;
        Ok(Resumed {
            client,
            initial_response,
            deserializer,
        })
    }
}
