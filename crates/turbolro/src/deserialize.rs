//! Turning raw operation responses into typed resources.
//!
//! A poller is given a [`DeserializationTarget`]: either a plain function or a
//! type implementing [`Model`]. Both are normalized once, at construction, to
//! a [`DeserializeFn`] that strategies call from `resource()`.

use crate::error::Result;
use std::fmt;
use std::sync::Arc;

/// Shared callback turning a raw response into a typed resource.
pub type DeserializeFn<R, T> = Arc<dyn Fn(&R) -> Result<T> + Send + Sync>;

/// A typed resource that knows how to build itself from a raw response.
///
/// # Example
///
/// ```rust
/// use serde_json::Value;
/// use turbolro::{DeserializationTarget, Model, PollingError};
///
/// struct Vault {
///     name: String,
/// }
///
/// impl Model<Value> for Vault {
///     fn deserialize(response: &Value) -> Result<Self, PollingError> {
///         let name = response["name"]
///             .as_str()
///             .ok_or_else(|| PollingError::deserialization("missing 'name'"))?;
///         Ok(Vault { name: name.to_string() })
///     }
/// }
///
/// let callback = DeserializationTarget::<Value, Vault>::model().into_callback();
/// let vault = callback(&serde_json::json!({"name": "prod"})).unwrap();
/// assert_eq!(vault.name, "prod");
/// ```
pub trait Model<R>: Sized {
    /// Build the resource from a response.
    fn deserialize(response: &R) -> Result<Self>;
}

/// What a poller should use to deserialize the final response.
pub enum DeserializationTarget<R, T> {
    /// A plain callback.
    Function(DeserializeFn<R, T>),
    /// A typed model; its [`Model::deserialize`] is used as the callback.
    Model(fn(&R) -> Result<T>),
}

impl<R, T> DeserializationTarget<R, T> {
    /// Use a closure as the deserialization callback.
    ///
    /// ```rust
    /// use serde_json::{Value, json};
    /// use turbolro::DeserializationTarget;
    ///
    /// let target = DeserializationTarget::function(|r: &Value| Ok(r["value"].as_i64()));
    /// let callback = target.into_callback();
    /// assert_eq!(callback(&json!({"value": 42})).unwrap(), Some(42));
    /// ```
    pub fn function<F>(callback: F) -> Self
    where
        F: Fn(&R) -> Result<T> + Send + Sync + 'static,
    {
        DeserializationTarget::Function(Arc::new(callback))
    }

    /// Normalize to a plain callback.
    pub fn into_callback(self) -> DeserializeFn<R, T>
    where
        R: 'static,
        T: 'static,
    {
        match self {
            DeserializationTarget::Function(callback) => callback,
            DeserializationTarget::Model(deserialize) => Arc::new(deserialize),
        }
    }
}

impl<R, T: Model<R>> DeserializationTarget<R, T> {
    /// Use `T`'s [`Model::deserialize`] as the callback.
    pub fn model() -> Self {
        DeserializationTarget::Model(T::deserialize)
    }
}

impl<R, T> From<DeserializeFn<R, T>> for DeserializationTarget<R, T> {
    fn from(callback: DeserializeFn<R, T>) -> Self {
        DeserializationTarget::Function(callback)
    }
}

impl<R, T> fmt::Debug for DeserializationTarget<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeserializationTarget::Function(_) => f.write_str("DeserializationTarget::Function"),
            DeserializationTarget::Model(_) => f.write_str("DeserializationTarget::Model"),
        }
    }
}

/// Deserializer that returns the raw response unchanged.
pub fn identity<R: Clone + 'static>() -> DeserializeFn<R, R> {
    Arc::new(|response: &R| Ok(response.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PollingError;
    use serde_json::{Value, json};

    #[derive(Debug, PartialEq)]
    struct Answer(i64);

    impl Model<Value> for Answer {
        fn deserialize(response: &Value) -> Result<Self> {
            response["value"]
                .as_i64()
                .map(Answer)
                .ok_or_else(|| PollingError::deserialization("no value"))
        }
    }

    #[test]
    fn test_function_and_model_normalize_the_same() {
        let response = json!({"status": "Succeeded", "value": 42});

        let from_fn = DeserializationTarget::function(|r: &Value| Ok(Answer(r["value"].as_i64().unwrap_or(0))))
            .into_callback();
        let from_model = DeserializationTarget::<Value, Answer>::model().into_callback();

        assert_eq!(from_fn(&response).unwrap(), Answer(42));
        assert_eq!(from_model(&response).unwrap(), Answer(42));
    }

    #[test]
    fn test_model_errors_propagate() {
        let callback = DeserializationTarget::<Value, Answer>::model().into_callback();
        let err = callback(&json!({})).unwrap_err();
        assert!(matches!(err, PollingError::Deserialization(_)));
    }

    #[test]
    fn test_identity() {
        let callback = identity::<Value>();
        assert_eq!(callback(&json!([1, 2])).unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_debug_names_variant() {
        let target = DeserializationTarget::<Value, Answer>::model();
        assert_eq!(format!("{:?}", target), "DeserializationTarget::Model");
    }
}
