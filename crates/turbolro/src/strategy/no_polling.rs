//! Strategy for operations that are already complete.

use super::{PollingStrategy, ResumeContext, Resumed};
use crate::deserialize::DeserializeFn;
use crate::error::{PollingError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use turbolro_core::token::TokenPayload;

const KIND: &str = "no-polling";

/// A strategy that performs no polling: the initial response is final.
///
/// `resource()` applies the deserializer to the initial response. The
/// continuation token is the serialized initial response, so `R` must be
/// serde-compatible.
///
/// # Example
///
/// ```rust
/// use serde_json::{Value, json};
/// use turbolro::{DeserializationTarget, LroPoller, NoPolling};
///
/// let poller = LroPoller::new(
///     (),
///     json!({"status": "Succeeded", "value": 42}),
///     DeserializationTarget::function(|r: &Value| Ok(r["value"].as_i64())),
///     NoPolling::new(),
/// )
/// .unwrap();
///
/// assert!(poller.done());
/// assert_eq!(poller.result(None).unwrap(), Some(42));
/// ```
pub struct NoPolling<R, T> {
    initial_response: Option<R>,
    deserializer: Option<DeserializeFn<R, T>>,
}

impl<R, T> NoPolling<R, T> {
    /// Create an uninitialized strategy.
    pub fn new() -> Self {
        Self {
            initial_response: None,
            deserializer: None,
        }
    }

    /// The stored initial response.
    pub fn initial_response(&self) -> Option<&R> {
        self.initial_response.as_ref()
    }
}

impl<R, T> Default for NoPolling<R, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: fmt::Debug, T> fmt::Debug for NoPolling<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoPolling")
            .field("initial_response", &self.initial_response)
            .finish_non_exhaustive()
    }
}

impl<R, T> PollingStrategy for NoPolling<R, T>
where
    R: Serialize + DeserializeOwned + Send + Sync + 'static,
    T: Send + 'static,
{
    type Client = ();
    type Response = R;
    type Output = T;

    fn kind(&self) -> &'static str {
        KIND
    }

    fn initialize(
        &mut self,
        _client: (),
        initial_response: R,
        deserializer: DeserializeFn<R, T>,
    ) -> Result<()> {
        self.initial_response = Some(initial_response);
        self.deserializer = Some(deserializer);
        Ok(())
    }

    fn run(&self) -> Result<()> {
        Ok(())
    }

    fn status(&self) -> String {
        "succeeded".to_string()
    }

    fn is_finished(&self) -> bool {
        true
    }

    fn resource(&self) -> Result<T> {
        match (&self.initial_response, &self.deserializer) {
            (Some(response), Some(deserialize)) => deserialize(response),
            _ => Err(PollingError::NotInitialized),
        }
    }

    fn continuation_token(&self) -> Result<String> {
        let response = self
            .initial_response
            .as_ref()
            .ok_or(PollingError::NotInitialized)?;
        Ok(response.to_token(KIND)?)
    }

    fn from_continuation_token(
        token: &str,
        context: ResumeContext<(), R, T>,
    ) -> Result<Resumed<(), R, T>> {
        let deserializer = context.require_deserializer()?;
        let initial_response = R::from_token(KIND, token)?;
        Ok(Resumed {
            client: (),
            initial_response,
            deserializer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deserialize::DeserializationTarget;
    use serde_json::{Value, json};

    fn value_of() -> DeserializeFn<Value, i64> {
        DeserializationTarget::function(|r: &Value| {
            r["value"]
                .as_i64()
                .ok_or_else(|| PollingError::deserialization("missing value"))
        })
        .into_callback()
    }

    fn initialized(response: Value) -> NoPolling<Value, i64> {
        let mut strategy = NoPolling::new();
        strategy.initialize((), response, value_of()).unwrap();
        strategy
    }

    #[test]
    fn test_always_finished() {
        let strategy = initialized(json!({"value": 1}));
        assert!(strategy.is_finished());
        assert_eq!(strategy.status(), "succeeded");
        assert!(strategy.run().is_ok());
        assert_eq!(strategy.kind(), "no-polling");
    }

    #[test]
    fn test_resource_applies_deserializer() {
        let strategy = initialized(json!({"status": "Succeeded", "value": 42}));
        assert_eq!(strategy.resource().unwrap(), 42);
    }

    #[test]
    fn test_uninitialized() {
        let strategy: NoPolling<Value, i64> = NoPolling::new();
        assert!(matches!(strategy.resource(), Err(PollingError::NotInitialized)));
        assert!(matches!(
            strategy.continuation_token(),
            Err(PollingError::NotInitialized)
        ));
    }

    #[test]
    fn test_token_resumes_initial_response() {
        let original = json!({"status": "Succeeded", "value": 42});
        let token = initialized(original.clone()).continuation_token().unwrap();

        let resumed = NoPolling::<Value, i64>::from_continuation_token(
            &token,
            ResumeContext::new().with_deserializer(value_of()),
        )
        .unwrap();

        assert_eq!(resumed.initial_response, original);
        assert_eq!((resumed.deserializer)(&resumed.initial_response).unwrap(), 42);
    }

    #[test]
    fn test_resume_requires_deserializer() {
        let token = initialized(json!({"value": 1})).continuation_token().unwrap();
        let err = NoPolling::<Value, i64>::from_continuation_token(&token, ResumeContext::new())
            .unwrap_err();
        assert!(matches!(
            err,
            PollingError::MissingContext("deserialization_callback")
        ));
    }

    #[test]
    fn test_resume_rejects_foreign_token() {
        let token = json!({"value": 1}).to_token("status-polling").unwrap();
        let err = NoPolling::<Value, i64>::from_continuation_token(
            &token,
            ResumeContext::new().with_deserializer(value_of()),
        )
        .unwrap_err();
        assert!(matches!(err, PollingError::InvalidToken(_)));
    }
}
