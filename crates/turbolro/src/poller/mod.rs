//! The long-running-operation poller.
//!
//! An [`LroPoller`] owns one [`PollingStrategy`] and, unless the operation is
//! already finished, one background unit that drives `strategy.run()` to
//! completion and then invokes the completion callbacks.

mod callbacks;

pub use callbacks::{DoneCallback, done_callback};

use crate::config::PollerConfig;
use crate::deserialize::DeserializationTarget;
use crate::error::{PollingError, Result};
use crate::observability::{PollTimer, PollerMetadata, panic_message};
use crate::strategy::{PollingStrategy, ResumeContext};
use crate::sync::lock;
use callbacks::{CallbackRegistry, Registration};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::Span;
use uuid::Uuid;

struct State<S> {
    callbacks: CallbackRegistry<S>,
    error: Option<PollingError>,
    terminated: bool,
    worker: Option<ThreadId>,
}

struct Inner<S> {
    strategy: S,
    background: bool,
    state: Mutex<State<S>>,
    terminated: Condvar,
    done_tx: watch::Sender<bool>,
    max_drain_rounds: usize,
    meta: PollerMetadata,
}

/// Handle to a long-running operation.
///
/// Cloning is cheap and every clone observes the same operation.
///
/// # Example
///
/// ```rust
/// use serde_json::{Value, json};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use turbolro::{DeserializationTarget, LroPoller, NoPolling, done_callback};
///
/// let poller = LroPoller::new(
///     (),
///     json!({"status": "Succeeded", "value": 42}),
///     DeserializationTarget::function(|r: &Value| Ok(r["value"].as_i64().unwrap_or_default())),
///     NoPolling::new(),
/// )
/// .unwrap();
///
/// let called = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&called);
/// poller.add_done_callback(done_callback(move |_| flag.store(true, Ordering::SeqCst)));
///
/// assert!(called.load(Ordering::SeqCst));
/// assert_eq!(poller.result(None).unwrap(), 42);
/// ```
pub struct LroPoller<S: PollingStrategy> {
    inner: Arc<Inner<S>>,
}

impl<S: PollingStrategy> Clone for LroPoller<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: PollingStrategy> fmt::Debug for LroPoller<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LroPoller")
            .field("id", &self.inner.meta.poller_id)
            .field("strategy", &self.inner.meta.strategy)
            .field("done", &self.done())
            .finish()
    }
}

impl<S: PollingStrategy> LroPoller<S> {
    /// Start polling with the default [`PollerConfig`].
    ///
    /// # Errors
    ///
    /// Returns the strategy's initialization error unchanged, or
    /// [`PollingError::Spawn`] if the background unit could not be started.
    pub fn new(
        client: S::Client,
        initial_response: S::Response,
        target: impl Into<DeserializationTarget<S::Response, S::Output>>,
        strategy: S,
    ) -> Result<Self> {
        Self::with_config(
            client,
            initial_response,
            target,
            strategy,
            PollerConfig::default(),
        )
    }

    /// Start polling with an explicit configuration.
    pub fn with_config(
        client: S::Client,
        initial_response: S::Response,
        target: impl Into<DeserializationTarget<S::Response, S::Output>>,
        mut strategy: S,
        config: PollerConfig,
    ) -> Result<Self> {
        let target: DeserializationTarget<S::Response, S::Output> = target.into();
        let deserializer = target.into_callback();
        strategy.initialize(client, initial_response, deserializer)?;

        let meta = PollerMetadata::new(Uuid::new_v4(), strategy.kind());
        let finished = strategy.is_finished();
        let (done_tx, _) = watch::channel(finished);
        let max_drain_rounds = config.max_drain_rounds.max(1);
        let callbacks = if finished {
            CallbackRegistry::drained()
        } else {
            CallbackRegistry::running(max_drain_rounds)
        };

        let inner = Arc::new(Inner {
            strategy,
            background: !finished,
            state: Mutex::new(State {
                callbacks,
                error: None,
                terminated: finished,
                worker: None,
            }),
            terminated: Condvar::new(),
            done_tx,
            max_drain_rounds,
            meta,
        });

        if finished {
            inner.meta.log_already_finished(&inner.strategy.status());
            return Ok(Self { inner });
        }

        let span = inner.meta.span(&Span::current());
        let name = format!("{}({})", config.thread_name_prefix, inner.meta.poller_id);
        let worker = Arc::clone(&inner);
        config
            .spawner
            .spawn(
                name,
                Box::new(move || {
                    let _entered = span.enter();
                    worker.execute();
                }),
            )
            .map_err(|e| PollingError::Spawn(e.to_string()))?;

        Ok(Self { inner })
    }

    /// Resume polling from a continuation token.
    ///
    /// `strategy` is a fresh, uninitialized strategy; it is initialized from
    /// what [`PollingStrategy::from_continuation_token`] recovers.
    pub fn from_continuation_token(
        strategy: S,
        token: &str,
        context: ResumeContext<S::Client, S::Response, S::Output>,
    ) -> Result<Self> {
        Self::from_continuation_token_with_config(strategy, token, context, PollerConfig::default())
    }

    /// Resume polling from a continuation token with an explicit configuration.
    pub fn from_continuation_token_with_config(
        strategy: S,
        token: &str,
        context: ResumeContext<S::Client, S::Response, S::Output>,
        config: PollerConfig,
    ) -> Result<Self> {
        let resumed = S::from_continuation_token(token, context)?;
        Self::with_config(
            resumed.client,
            resumed.initial_response,
            DeserializationTarget::Function(resumed.deserializer),
            strategy,
            config,
        )
    }

    /// Unique id of this poller.
    pub fn id(&self) -> Uuid {
        self.inner.meta.poller_id
    }

    /// The strategy driving this poller.
    pub fn polling_method(&self) -> &S {
        &self.inner.strategy
    }

    /// Alias of [`polling_method`](Self::polling_method).
    pub fn strategy(&self) -> &S {
        &self.inner.strategy
    }

    /// Current status reported by the strategy.
    pub fn status(&self) -> String {
        self.inner.strategy.status()
    }

    /// Whether polling and callback delivery are complete.
    pub fn done(&self) -> bool {
        !self.inner.background || lock(&self.inner.state).terminated
    }

    /// Continuation token of the strategy's current state.
    pub fn continuation_token(&self) -> Result<String> {
        self.inner.strategy.continuation_token()
    }

    /// Number of registered callbacks, pending and already invoked.
    pub fn callback_count(&self) -> usize {
        lock(&self.inner.state).callbacks.len()
    }

    /// Block until the poller is done or `timeout` elapses.
    ///
    /// Returns `Ok(())` on timeout; check [`done`](Self::done) to tell the
    /// two apart.
    ///
    /// # Errors
    ///
    /// - The error captured from the background unit, on every call after it
    ///   failed
    /// - [`PollingError::InvalidState`] when called from the poller's own
    ///   background unit, such as from inside a completion callback
    pub fn wait(&self, timeout: Option<Duration>) -> Result<()> {
        if !self.inner.background {
            return Ok(());
        }

        let mut state = lock(&self.inner.state);
        if !state.terminated && state.on_worker() {
            return Err(waiting_on_own_worker());
        }

        match timeout.and_then(|t| Instant::now().checked_add(t)) {
            None => {
                while !state.terminated {
                    state = self
                        .inner
                        .terminated
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
            Some(deadline) => {
                while !state.terminated {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    let (guard, _) = self
                        .inner
                        .terminated
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    state = guard;
                }
            }
        }

        match &state.error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    /// Wait, then return the operation's resource.
    ///
    /// # Errors
    ///
    /// Everything [`wait`](Self::wait) returns, [`PollingError::Timeout`] if
    /// the operation is still running when `timeout` elapses, and whatever
    /// the strategy's `resource()` returns.
    pub fn result(&self, timeout: Option<Duration>) -> Result<S::Output> {
        self.wait(timeout)?;
        self.resource_if_done(timeout)
    }

    /// Async counterpart of [`wait`](Self::wait).
    ///
    /// # Errors
    ///
    /// The same as [`wait`](Self::wait), including
    /// [`PollingError::InvalidState`] from the poller's own background unit.
    pub async fn wait_async(&self, timeout: Option<Duration>) -> Result<()> {
        if self.inner.background {
            {
                let state = lock(&self.inner.state);
                if !state.terminated && state.on_worker() {
                    return Err(waiting_on_own_worker());
                }
            }
            let mut done_rx = self.inner.done_tx.subscribe();
            let finished = async move {
                // The sender lives as long as `self`, so this only ends on done.
                let _ = done_rx.wait_for(|done| *done).await;
            };
            match timeout {
                Some(limit) => {
                    let _ = tokio::time::timeout(limit, finished).await;
                }
                None => finished.await,
            }
        }

        match &lock(&self.inner.state).error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    /// Async counterpart of [`result`](Self::result).
    pub async fn result_async(&self, timeout: Option<Duration>) -> Result<S::Output> {
        self.wait_async(timeout).await?;
        self.resource_if_done(timeout)
    }

    /// Register a completion callback.
    ///
    /// Before completion the callback is queued and later invoked on the
    /// background unit. Once callback delivery is over, it is invoked right
    /// away on the calling thread.
    ///
    /// A callback registered from inside a running callback is picked up by
    /// the next delivery round. Such chains are cut at
    /// [`PollerConfig::max_drain_rounds`] levels: the registration that
    /// would go deeper is dropped with a warning. Callbacks registered from
    /// any other thread are always invoked.
    pub fn add_done_callback(&self, callback: DoneCallback<S>) {
        let registration = {
            let mut state = lock(&self.inner.state);
            let nested = state.on_worker();
            state.callbacks.register(callback, nested)
        };
        match registration {
            Registration::Queued => {}
            Registration::InvokeNow(callback) => callback(&self.inner.strategy),
            Registration::Refused { depth } => self
                .inner
                .meta
                .log_callback_dropped(depth, self.inner.max_drain_rounds),
        }
    }

    /// Remove every registration of `callback`.
    ///
    /// # Errors
    ///
    /// [`PollingError::InvalidState`] once the operation has completed.
    pub fn remove_done_callback(&self, callback: &DoneCallback<S>) -> Result<()> {
        lock(&self.inner.state).callbacks.remove(callback).map(drop)
    }

    fn resource_if_done(&self, timeout: Option<Duration>) -> Result<S::Output> {
        if !self.done() {
            return Err(PollingError::Timeout(timeout.unwrap_or_default()));
        }
        self.inner.strategy.resource()
    }
}

impl<S> State<S> {
    fn on_worker(&self) -> bool {
        self.worker == Some(thread::current().id())
    }
}

fn waiting_on_own_worker() -> PollingError {
    PollingError::InvalidState("Cannot wait on a poller from its own background unit".to_string())
}

impl<S: PollingStrategy> Inner<S> {
    /// Background procedure: poll, capture the outcome, deliver callbacks.
    fn execute(&self) {
        lock(&self.state).worker = Some(thread::current().id());

        let timer = PollTimer::start();
        self.meta.log_started();

        let error = match panic::catch_unwind(AssertUnwindSafe(|| self.strategy.run())) {
            Ok(Ok(())) => None,
            Ok(Err(PollingError::Operation(mut failure))) => {
                if failure.continuation_token.is_none() {
                    failure.continuation_token = self.current_token();
                }
                Some(PollingError::Operation(failure))
            }
            Ok(Err(other)) => Some(other),
            Err(payload) => Some(PollingError::Panicked(panic_message(payload.as_ref()))),
        };

        let status = self.strategy.status();
        match &error {
            None => self.meta.log_succeeded(&status, timer.elapsed()),
            Some(e) => self.meta.log_failed(&status, timer.elapsed(), &e.to_string()),
        }

        {
            let mut state = lock(&self.state);
            state.error = error;
            state.callbacks.begin_drain();
        }

        self.drain_callbacks();

        lock(&self.state).terminated = true;
        self.terminated.notify_all();
        self.done_tx.send_replace(true);
    }

    fn current_token(&self) -> Option<String> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.strategy.continuation_token())) {
            Ok(Ok(token)) => Some(token),
            Ok(Err(e)) => {
                self.meta.log_token_unavailable(&e.to_string());
                None
            }
            Err(payload) => {
                self.meta.log_token_unavailable(&panic_message(payload.as_ref()));
                None
            }
        }
    }

    /// Invoke callbacks round by round until a round comes up empty.
    ///
    /// Terminates once outside threads stop registering: nested chains are
    /// bounded at registration time.
    fn drain_callbacks(&self) {
        for round in 0.. {
            let batch = lock(&self.state).callbacks.next_batch();
            if batch.is_empty() {
                return;
            }
            for (index, entry) in batch.iter().enumerate() {
                lock(&self.state).callbacks.enter(entry.depth);
                if let Err(payload) =
                    panic::catch_unwind(AssertUnwindSafe(|| (entry.callback)(&self.strategy)))
                {
                    self.meta
                        .log_callback_panicked(round, index, &panic_message(payload.as_ref()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::NoPolling;
    use crate::testing::{Gate, ScriptedStrategy};
    use assert_matches::assert_matches;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn value_of() -> DeserializationTarget<Value, i64> {
        DeserializationTarget::function(|r: &Value| {
            r["value"]
                .as_i64()
                .ok_or_else(|| PollingError::deserialization("missing value"))
        })
    }

    #[test]
    fn test_finished_poller_has_no_error() {
        let poller = LroPoller::new((), json!({"value": 3}), value_of(), NoPolling::new()).unwrap();
        assert!(poller.done());
        assert!(poller.wait(Some(Duration::ZERO)).is_ok());
        assert_eq!(poller.status(), "succeeded");
        assert_eq!(poller.strategy().kind(), "no-polling");
    }

    #[test]
    fn test_clones_share_state() {
        let gate = Gate::closed();
        let poller = LroPoller::new(
            (),
            json!({"value": 1}),
            value_of(),
            ScriptedStrategy::new(1).with_gate(gate.clone()),
        )
        .unwrap();
        let clone = poller.clone();
        assert_eq!(poller.id(), clone.id());

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        clone.add_done_callback(done_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(poller.callback_count(), 1);

        gate.open();
        poller.wait(None).unwrap();
        assert!(clone.done());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wait_from_callback_is_rejected() {
        let gate = Gate::closed();
        let poller = LroPoller::new(
            (),
            json!({"value": 1}),
            value_of(),
            ScriptedStrategy::new(1).with_gate(gate.clone()),
        )
        .unwrap();

        let seen = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);
        let handle = poller.clone();
        poller.add_done_callback(done_callback(move |_| {
            *slot.lock().unwrap() = Some(handle.wait(None));
        }));

        gate.open();
        poller.wait(None).unwrap();
        let outcome = seen.lock().unwrap().take().unwrap();
        assert_matches!(outcome, Err(PollingError::InvalidState(_)));
    }

    #[test]
    fn test_debug_mentions_strategy() {
        let poller = LroPoller::new((), json!({"value": 3}), value_of(), NoPolling::new()).unwrap();
        let rendered = format!("{poller:?}");
        assert!(rendered.contains("no-polling"));
        assert!(rendered.contains("done: true"));
    }
}
