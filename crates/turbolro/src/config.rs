//! Configuration for pollers

use crate::executor::{Spawn, ThreadSpawner};
use std::fmt;
use std::sync::Arc;

/// Default bound on nested callback registration.
pub const DEFAULT_MAX_DRAIN_ROUNDS: usize = 32;

/// Default prefix of background unit names.
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "LROPoller";

/// Configuration for an [`LroPoller`](crate::LroPoller).
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use turbolro::{PollerConfig, ThreadSpawner};
///
/// let config = PollerConfig::builder()
///     .max_drain_rounds(8)
///     .thread_name_prefix("vault-create")
///     .spawner(Arc::new(ThreadSpawner::new().with_stack_size(512 * 1024)))
///     .build();
///
/// assert_eq!(config.max_drain_rounds, 8);
/// ```
#[derive(Clone)]
pub struct PollerConfig {
    /// Maximum nesting of completion callbacks that register callbacks.
    ///
    /// A callback registered from inside a running callback is picked up by
    /// the next delivery round. A registration that would nest this deep is
    /// dropped with a warning. Callbacks registered from other threads are
    /// never dropped.
    pub max_drain_rounds: usize,

    /// Prefix of the background unit name, followed by `(<poller id>)`.
    pub thread_name_prefix: String,

    /// Starts the background polling unit.
    pub spawner: Arc<dyn Spawn>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            max_drain_rounds: DEFAULT_MAX_DRAIN_ROUNDS,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
            spawner: Arc::new(ThreadSpawner::default()),
        }
    }
}

impl fmt::Debug for PollerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollerConfig")
            .field("max_drain_rounds", &self.max_drain_rounds)
            .field("thread_name_prefix", &self.thread_name_prefix)
            .field("spawner", &self.spawner)
            .finish()
    }
}

impl PollerConfig {
    /// Create a builder.
    pub fn builder() -> PollerConfigBuilder {
        PollerConfigBuilder::default()
    }

    /// Load configuration from environment variables.
    ///
    /// This will look for:
    /// - `TURBOLRO_MAX_DRAIN_ROUNDS` for the nested-callback bound
    /// - `TURBOLRO_THREAD_NAME_PREFIX` for background unit names
    /// - `TURBOLRO_THREAD_STACK_SIZE` for the stack size of polling threads (bytes)
    ///
    /// Unparsable values are ignored with a warning.
    #[cfg(feature = "env")]
    pub fn from_env() -> Self {
        use std::env;

        let mut builder = Self::builder();

        if let Ok(raw) = env::var("TURBOLRO_MAX_DRAIN_ROUNDS") {
            match raw.parse::<usize>() {
                Ok(rounds) => builder = builder.max_drain_rounds(rounds),
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid TURBOLRO_MAX_DRAIN_ROUNDS"),
            }
        }

        if let Ok(prefix) = env::var("TURBOLRO_THREAD_NAME_PREFIX")
            && !prefix.trim().is_empty()
        {
            builder = builder.thread_name_prefix(prefix.trim());
        }

        if let Ok(raw) = env::var("TURBOLRO_THREAD_STACK_SIZE") {
            match raw.parse::<usize>() {
                Ok(bytes) => {
                    builder = builder.spawner(Arc::new(ThreadSpawner::new().with_stack_size(bytes)))
                }
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid TURBOLRO_THREAD_STACK_SIZE"),
            }
        }

        builder.build()
    }
}

/// Builder for [`PollerConfig`].
#[derive(Debug, Default)]
pub struct PollerConfigBuilder {
    max_drain_rounds: Option<usize>,
    thread_name_prefix: Option<String>,
    spawner: Option<Arc<dyn Spawn>>,
}

impl PollerConfigBuilder {
    /// Set the nested-callback bound. Values below 1 are raised to 1.
    ///
    /// Default: 32
    pub fn max_drain_rounds(mut self, rounds: usize) -> Self {
        self.max_drain_rounds = Some(rounds.max(1));
        self
    }

    /// Set the background unit name prefix.
    ///
    /// Default: `LROPoller`
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = Some(prefix.into());
        self
    }

    /// Set the spawner for background units.
    ///
    /// Default: [`ThreadSpawner`]
    pub fn spawner(mut self, spawner: Arc<dyn Spawn>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Build the configuration, using defaults for unset values.
    pub fn build(self) -> PollerConfig {
        let defaults = PollerConfig::default();
        PollerConfig {
            max_drain_rounds: self.max_drain_rounds.unwrap_or(defaults.max_drain_rounds),
            thread_name_prefix: self
                .thread_name_prefix
                .unwrap_or(defaults.thread_name_prefix),
            spawner: self.spawner.unwrap_or(defaults.spawner),
        }
    }
}
