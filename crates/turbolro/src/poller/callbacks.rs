//! Completion-callback bookkeeping.

use crate::error::{PollingError, Result};
use std::sync::Arc;

/// A completion callback. It receives the poller's strategy.
///
/// Identity is the `Arc` allocation: keep a clone of the callback to remove
/// it later with [`LroPoller::remove_done_callback`](crate::LroPoller::remove_done_callback).
pub type DoneCallback<S> = Arc<dyn Fn(&S) + Send + Sync>;

/// Wrap a closure as a [`DoneCallback`].
pub fn done_callback<S, F>(callback: F) -> DoneCallback<S>
where
    F: Fn(&S) + Send + Sync + 'static,
{
    Arc::new(callback)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Polling in progress; callbacks queue up
    Running,
    /// Done-signal set; the background unit is invoking callbacks
    Draining,
    /// Callback list closed; new callbacks run on the registering thread
    Drained,
}

pub(crate) enum Registration<S> {
    Queued,
    InvokeNow(DoneCallback<S>),
    /// Registered from inside a callback nested `depth` levels deep
    Refused { depth: usize },
}

impl<S> std::fmt::Debug for Registration<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Registration::Queued => f.write_str("Queued"),
            Registration::InvokeNow(_) => f.debug_tuple("InvokeNow").finish_non_exhaustive(),
            Registration::Refused { depth } => {
                f.debug_struct("Refused").field("depth", depth).finish()
            }
        }
    }
}

/// A queued callback and how deeply it is nested.
///
/// Depth 0 is anything registered from outside the background unit. A
/// callback registered by a running callback gets the runner's depth plus one.
pub(crate) struct Pending<S> {
    pub(crate) callback: DoneCallback<S>,
    pub(crate) depth: usize,
}

pub(crate) struct CallbackRegistry<S> {
    phase: Phase,
    pending: Vec<Pending<S>>,
    fired: Vec<DoneCallback<S>>,
    max_depth: usize,
    current_depth: usize,
}

impl<S> CallbackRegistry<S> {
    /// Nested registrations at `max_depth` or deeper are refused.
    pub(crate) fn running(max_depth: usize) -> Self {
        Self {
            phase: Phase::Running,
            pending: Vec::new(),
            fired: Vec::new(),
            max_depth: max_depth.max(1),
            current_depth: 0,
        }
    }

    pub(crate) fn drained() -> Self {
        Self {
            phase: Phase::Drained,
            ..Self::running(1)
        }
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    /// Pending plus already invoked callbacks.
    pub(crate) fn len(&self) -> usize {
        self.pending.len() + self.fired.len()
    }

    /// Queue `callback`, or hand it back to run now once delivery is over.
    ///
    /// `nested` is true when the registering thread is the background unit
    /// itself, that is, a running callback is registering another one.
    pub(crate) fn register(&mut self, callback: DoneCallback<S>, nested: bool) -> Registration<S> {
        match self.phase {
            Phase::Running => {
                self.pending.push(Pending { callback, depth: 0 });
                Registration::Queued
            }
            Phase::Draining => {
                let depth = if nested { self.current_depth + 1 } else { 0 };
                if depth >= self.max_depth {
                    return Registration::Refused { depth };
                }
                self.pending.push(Pending { callback, depth });
                Registration::Queued
            }
            Phase::Drained => {
                self.fired.push(Arc::clone(&callback));
                Registration::InvokeNow(callback)
            }
        }
    }

    /// Remove every registration of `callback`. Only allowed while running.
    pub(crate) fn remove(&mut self, callback: &DoneCallback<S>) -> Result<usize> {
        if self.phase != Phase::Running {
            return Err(PollingError::InvalidState("Process is complete.".to_string()));
        }
        let before = self.pending.len();
        self.pending
            .retain(|registered| !same(&registered.callback, callback));
        Ok(before - self.pending.len())
    }

    pub(crate) fn begin_drain(&mut self) {
        if self.phase == Phase::Running {
            self.phase = Phase::Draining;
        }
    }

    /// Take the next batch to invoke. An empty batch closes the list.
    pub(crate) fn next_batch(&mut self) -> Vec<Pending<S>> {
        let batch = std::mem::take(&mut self.pending);
        if batch.is_empty() {
            self.phase = Phase::Drained;
        } else {
            self.fired
                .extend(batch.iter().map(|entry| Arc::clone(&entry.callback)));
        }
        batch
    }

    /// Record the depth of the callback about to run.
    pub(crate) fn enter(&mut self, depth: usize) {
        self.current_depth = depth;
    }
}

fn same<S>(a: &DoneCallback<S>, b: &DoneCallback<S>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
