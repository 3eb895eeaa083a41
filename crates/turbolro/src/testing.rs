//! Testing utilities for pollers
//!
//! Provides a scripted strategy and spawner spies for exercising
//! [`LroPoller`](crate::LroPoller) without a real service.

use crate::deserialize::DeserializeFn;
use crate::error::{OperationError, PollingError, Result};
use crate::executor::{Job, Spawn, ThreadSpawner};
use crate::strategy::{PollingStrategy, ResumeContext, Resumed};
use crate::sync::lock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use turbolro_core::token::TokenPayload;

const KIND: &str = "scripted";

/// How a [`ScriptedStrategy`] ends its run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedOutcome {
    /// Finish successfully
    Succeed,
    /// Fail with an [`OperationError`] with status `Failed`
    FailOperation(String),
    /// Fail with an [`OperationError`] that already carries this token
    FailOperationWithToken(String),
    /// Fail with an unrecognized error
    FailUnexpected(String),
    /// Panic with this message
    Panic(String),
}

/// A latch that blocks until opened
///
/// Lets a test register callbacks or inspect a poller while its strategy is
/// provably still running.
#[derive(Debug, Clone, Default)]
pub struct Gate {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Gate {
    /// Create a closed gate
    pub fn closed() -> Self {
        Self::default()
    }

    /// Open the gate, releasing every waiter
    pub fn open(&self) {
        let (open, opened) = &*self.inner;
        *lock(open) = true;
        opened.notify_all();
    }

    /// Block until the gate is open
    pub fn wait(&self) {
        let (open, opened) = &*self.inner;
        let mut guard = lock(open);
        while !*guard {
            guard = opened
                .wait(guard)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ScriptedToken {
    initial: Value,
    completed: u32,
}

/// A spy strategy that finishes after a fixed number of steps
///
/// Responses are JSON values; the output type is whatever the deserializer
/// produces. With zero steps the operation is finished right after
/// initialization, so the poller starts no background unit.
pub struct ScriptedStrategy<T = Value> {
    steps: u32,
    step_delay: Duration,
    outcome: ScriptedOutcome,
    gate: Option<Gate>,
    tokens: bool,
    reject_initialization: Option<String>,

    initial: Option<Value>,
    deserializer: Option<DeserializeFn<Value, T>>,
    initialize_calls: AtomicU32,
    run_calls: AtomicU32,
    completed: AtomicU32,
    running: AtomicBool,
    finished: AtomicBool,
    failed: AtomicBool,
}

impl<T> ScriptedStrategy<T> {
    /// Strategy that succeeds after `steps` steps
    pub fn new(steps: u32) -> Self {
        Self {
            steps,
            step_delay: Duration::ZERO,
            outcome: ScriptedOutcome::Succeed,
            gate: None,
            tokens: true,
            reject_initialization: None,
            initial: None,
            deserializer: None,
            initialize_calls: AtomicU32::new(0),
            run_calls: AtomicU32::new(0),
            completed: AtomicU32::new(0),
            running: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            failed: AtomicBool::new(false),
        }
    }

    /// Set how the run ends
    pub fn with_outcome(mut self, outcome: ScriptedOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    /// Sleep this long per step
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// Hold `run` until the gate opens
    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Make `continuation_token` unsupported
    pub fn without_tokens(mut self) -> Self {
        self.tokens = false;
        self
    }

    /// Make `initialize` fail with an [`PollingError::Initialization`]
    pub fn rejecting_initialization(mut self, message: impl Into<String>) -> Self {
        self.reject_initialization = Some(message.into());
        self
    }

    /// Number of `initialize` calls
    pub fn initialize_calls(&self) -> u32 {
        self.initialize_calls.load(Ordering::SeqCst)
    }

    /// Number of `run` calls
    pub fn run_calls(&self) -> u32 {
        self.run_calls.load(Ordering::SeqCst)
    }

    /// Steps completed so far
    pub fn completed_steps(&self) -> u32 {
        self.completed.load(Ordering::SeqCst)
    }

    /// The initial response given to `initialize`
    pub fn initial_response(&self) -> Option<&Value> {
        self.initial.as_ref()
    }
}

impl<T> fmt::Debug for ScriptedStrategy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedStrategy")
            .field("steps", &self.steps)
            .field("outcome", &self.outcome)
            .field("completed", &self.completed_steps())
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> PollingStrategy for ScriptedStrategy<T> {
    type Client = ();
    type Response = Value;
    type Output = T;

    fn kind(&self) -> &'static str {
        KIND
    }

    fn initialize(
        &mut self,
        _client: (),
        initial_response: Value,
        deserializer: DeserializeFn<Value, T>,
    ) -> Result<()> {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.reject_initialization {
            return Err(PollingError::Initialization {
                message: message.clone(),
            });
        }
        if let Some(completed) = initial_response.get("completed").and_then(Value::as_u64) {
            self.completed
                .store(u32::try_from(completed).unwrap_or(u32::MAX), Ordering::SeqCst);
        }
        if self.completed_steps() >= self.steps {
            self.finished.store(true, Ordering::SeqCst);
        }
        self.initial = Some(initial_response);
        self.deserializer = Some(deserializer);
        Ok(())
    }

    fn run(&self) -> Result<()> {
        self.run_calls.fetch_add(1, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.wait();
        }

        while self.completed_steps() < self.steps {
            if !self.step_delay.is_zero() {
                std::thread::sleep(self.step_delay);
            }
            self.completed.fetch_add(1, Ordering::SeqCst);
        }

        let result = match &self.outcome {
            ScriptedOutcome::Succeed => Ok(()),
            ScriptedOutcome::FailOperation(message) => {
                self.failed.store(true, Ordering::SeqCst);
                Err(OperationError::new(message.clone())
                    .with_status("Failed")
                    .into())
            }
            ScriptedOutcome::FailOperationWithToken(token) => {
                self.failed.store(true, Ordering::SeqCst);
                Err(OperationError::new("Operation failed or canceled")
                    .with_status("Failed")
                    .with_continuation_token(token.clone())
                    .into())
            }
            ScriptedOutcome::FailUnexpected(message) => {
                self.failed.store(true, Ordering::SeqCst);
                Err(PollingError::unexpected(io::Error::other(message.clone())))
            }
            ScriptedOutcome::Panic(message) => panic!("{message}"),
        };
        self.finished.store(true, Ordering::SeqCst);
        result
    }

    fn status(&self) -> String {
        let status = if self.failed.load(Ordering::SeqCst) {
            "Failed"
        } else if self.finished.load(Ordering::SeqCst) {
            "Succeeded"
        } else if self.running.load(Ordering::SeqCst) {
            "InProgress"
        } else {
            "NotStarted"
        };
        status.to_string()
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    fn resource(&self) -> Result<T> {
        match (&self.initial, &self.deserializer) {
            (Some(response), Some(deserialize)) => deserialize(response),
            _ => Err(PollingError::NotInitialized),
        }
    }

    fn continuation_token(&self) -> Result<String> {
        if !self.tokens {
            return Err(PollingError::Unsupported {
                strategy: KIND,
                operation: "continuation_token",
            });
        }
        let initial = self.initial.clone().ok_or(PollingError::NotInitialized)?;
        let token = ScriptedToken {
            initial,
            completed: self.completed_steps(),
        };
        Ok(token.to_token(KIND)?)
    }

    fn from_continuation_token(
        token: &str,
        context: ResumeContext<(), Value, T>,
    ) -> Result<Resumed<(), Value, T>> {
        let deserializer = context.require_deserializer()?;
        let ScriptedToken {
            mut initial,
            completed,
        } = ScriptedToken::from_token(KIND, token)?;
        if let Value::Object(fields) = &mut initial {
            fields.insert("completed".to_string(), Value::from(completed));
        }
        Ok(Resumed {
            client: (),
            initial_response: initial,
            deserializer,
        })
    }
}

/// A spawner spy that counts background units
#[derive(Debug, Clone)]
pub struct CountingSpawner {
    inner: Arc<dyn Spawn>,
    spawned: Arc<AtomicUsize>,
    names: Arc<Mutex<Vec<String>>>,
}

impl CountingSpawner {
    /// Count units started through a [`ThreadSpawner`]
    pub fn new() -> Self {
        Self::wrapping(Arc::new(ThreadSpawner::new()))
    }

    /// Count units started through another spawner
    pub fn wrapping(inner: Arc<dyn Spawn>) -> Self {
        Self {
            inner,
            spawned: Arc::new(AtomicUsize::new(0)),
            names: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of units started
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    /// Names of the units started, in order
    pub fn names(&self) -> Vec<String> {
        lock(&self.names).clone()
    }
}

impl Default for CountingSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl Spawn for CountingSpawner {
    fn spawn(&self, name: String, job: Job) -> io::Result<()> {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        lock(&self.names).push(name.clone());
        self.inner.spawn(name, job)
    }
}

/// A spawner that always fails
#[derive(Debug, Clone, Default)]
pub struct FailingSpawner;

impl Spawn for FailingSpawner {
    fn spawn(&self, _name: String, _job: Job) -> io::Result<()> {
        Err(io::Error::other("no threads available"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deserialize::DeserializationTarget;
    use serde_json::json;

    fn identity() -> DeserializeFn<Value, Value> {
        DeserializationTarget::function(|r: &Value| Ok(r.clone())).into_callback()
    }

    #[test]
    fn test_zero_steps_is_finished_after_initialize() {
        let mut strategy = ScriptedStrategy::<Value>::new(0);
        strategy.initialize((), json!({}), identity()).unwrap();
        assert!(strategy.is_finished());
        assert_eq!(strategy.status(), "Succeeded");
        assert_eq!(strategy.initialize_calls(), 1);
    }

    #[test]
    fn test_run_completes_steps() {
        let mut strategy = ScriptedStrategy::<Value>::new(3);
        strategy.initialize((), json!({}), identity()).unwrap();
        assert_eq!(strategy.status(), "NotStarted");

        strategy.run().unwrap();
        assert_eq!(strategy.completed_steps(), 3);
        assert_eq!(strategy.run_calls(), 1);
        assert!(strategy.is_finished());
    }

    #[test]
    fn test_token_resumes_progress() {
        let mut strategy = ScriptedStrategy::<Value>::new(5);
        strategy
            .initialize((), json!({"value": 9}), identity())
            .unwrap();
        let token = strategy.continuation_token().unwrap();

        let resumed = ScriptedStrategy::<Value>::from_continuation_token(
            &token,
            ResumeContext::new().with_deserializer(identity()),
        )
        .unwrap();
        assert_eq!(resumed.initial_response["value"], 9);
        assert_eq!(resumed.initial_response["completed"], 0);
    }

    #[test]
    fn test_failure_with_token_keeps_it() {
        let mut strategy = ScriptedStrategy::<Value>::new(1)
            .with_outcome(ScriptedOutcome::FailOperationWithToken("from-service".into()));
        strategy.initialize((), json!({}), identity()).unwrap();

        let err = strategy.run().unwrap_err();
        assert_eq!(err.continuation_token(), Some("from-service"));
        assert_eq!(strategy.status(), "Failed");
    }

    #[test]
    fn test_gate_releases_waiters() {
        let gate = Gate::closed();
        let waiter = gate.clone();
        let handle = std::thread::spawn(move || waiter.wait());
        gate.open();
        handle.join().unwrap();
    }

    #[test]
    fn test_counting_spawner() {
        let spawner = CountingSpawner::new();
        let (tx, rx) = std::sync::mpsc::channel();
        spawner
            .spawn("unit".to_string(), Box::new(move || tx.send(()).unwrap()))
            .unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(spawner.spawned(), 1);
        assert_eq!(spawner.names(), vec!["unit".to_string()]);
    }
}
