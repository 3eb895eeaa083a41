//! Where background polling runs.
//!
//! Every poller that is not finished at construction needs one background
//! unit. The [`Spawn`] trait is the injection point for that unit, so a
//! deployment can choose between detached OS threads and a bounded pool.

use std::fmt;
use std::io;

/// A unit of background work: drive one strategy to completion.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Starts background polling units.
///
/// Implementations must start `job` promptly and must not run it on the
/// calling thread: the poller constructor returns before polling finishes.
pub trait Spawn: Send + Sync + fmt::Debug {
    /// Start `job` in the background. `name` identifies the poller and is
    /// suitable as a thread name.
    fn spawn(&self, name: String, job: Job) -> io::Result<()>;
}

/// Runs each poller on its own detached, named OS thread.
///
/// The `JoinHandle` is dropped right away, so polling threads never keep the
/// process alive: on exit, in-flight polls are abandoned.
#[derive(Debug, Clone, Default)]
pub struct ThreadSpawner {
    stack_size: Option<usize>,
}

impl ThreadSpawner {
    /// Spawner using the platform's default thread stack size.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stack size of polling threads, in bytes.
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }
}

impl Spawn for ThreadSpawner {
    fn spawn(&self, name: String, job: Job) -> io::Result<()> {
        let mut builder = std::thread::Builder::new().name(name);
        if let Some(bytes) = self.stack_size {
            builder = builder.stack_size(bytes);
        }
        builder.spawn(job).map(drop)
    }
}

/// Runs pollers on a tokio runtime's blocking pool.
///
/// The pool size (`max_blocking_threads`) bounds how many operations are
/// polled at once; extra pollers queue until a thread frees up. Note that a
/// runtime waits for running blocking tasks on shutdown unless it is shut
/// down with a timeout.
#[derive(Debug, Clone)]
pub struct TokioSpawner {
    handle: tokio::runtime::Handle,
}

impl TokioSpawner {
    /// Use the given runtime.
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is running on, if any.
    pub fn current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }
}

impl Spawn for TokioSpawner {
    fn spawn(&self, name: String, job: Job) -> io::Result<()> {
        tracing::trace!(poller = %name, "Queueing poller on tokio blocking pool");
        drop(self.handle.spawn_blocking(job));
        Ok(())
    }
}
