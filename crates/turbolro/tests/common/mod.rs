//! Common test utilities and helpers

use serde_json::Value;
use std::sync::{Arc, Mutex};
use turbolro::{DeserializationTarget, PollingError};

/// Install a test-friendly tracing subscriber (honors `RUST_LOG`)
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Deserializer reading the integer `value` field
#[allow(dead_code)]
pub fn value_of() -> DeserializationTarget<Value, i64> {
    DeserializationTarget::function(|response: &Value| {
        response["value"]
            .as_i64()
            .ok_or_else(|| PollingError::deserialization("missing 'value'"))
    })
}

/// Shared, ordered log of which callbacks fired
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct FiringLog {
    entries: Arc<Mutex<Vec<usize>>>,
}

#[allow(dead_code)]
impl FiringLog {
    pub fn record(&self, id: usize) {
        self.entries.lock().unwrap().push(id);
    }

    pub fn entries(&self) -> Vec<usize> {
        self.entries.lock().unwrap().clone()
    }
}
