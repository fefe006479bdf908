//! Pool configuration types

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::backend::BackendConfig;
use crate::error::{Error, Result};

const DEFAULT_MIN_SIZE: usize = 1;
const DEFAULT_MAX_SIZE: usize = 1;
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_QUEUE_CAPACITY: usize = 100;
const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for a resource pool.
///
/// Zero values mean "use the default"; [`PoolConfig::normalize`] resolves
/// them once when the pool is constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Pool name, recorded on the pool's tracing span.
    pub name: String,
    /// Parameters passed to the backend for every resource it creates.
    pub backend: BackendConfig,
    /// Resources created up front and never reaped.
    pub min_size: usize,
    /// Upper bound on live resources.
    pub max_size: usize,
    /// Idle time after which a free resource may be reaped.
    #[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
    pub idle_timeout: Duration,
    /// How long `acquire` waits for a free resource before trying to grow.
    #[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
    pub wait_timeout: Duration,
    /// Interval between idle sweeps.
    #[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
    pub cleanup_interval: Duration,
    /// Grace period granted to each worker when it is shut down.
    #[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
    pub close_timeout: Duration,
    /// Capacity of each worker's command queue.
    pub queue_capacity: usize,
    /// How long a submission waits on a full command queue.
    #[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
    pub submit_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "pool".to_string(),
            backend: BackendConfig::default(),
            min_size: DEFAULT_MIN_SIZE,
            max_size: DEFAULT_MAX_SIZE,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
        }
    }
}

impl PoolConfig {
    /// Create a config for the given backend parameters with default sizing.
    pub fn new(backend: BackendConfig) -> Self {
        Self {
            backend,
            ..Self::default()
        }
    }

    /// Resolve zero values to defaults and clamp `min_size` to `max_size`.
    ///
    /// Idempotent. After this call `1 <= min_size <= max_size` and every
    /// duration is non-zero.
    #[must_use]
    pub fn normalize(mut self) -> Self {
        if self.max_size == 0 {
            self.max_size = DEFAULT_MAX_SIZE;
        }
        if self.min_size == 0 {
            self.min_size = DEFAULT_MIN_SIZE;
        }
        if self.min_size > self.max_size {
            self.min_size = self.max_size;
        }
        fn or_default(value: Duration, fallback: Duration) -> Duration {
            if value.is_zero() { fallback } else { value }
        }
        self.idle_timeout = or_default(self.idle_timeout, DEFAULT_IDLE_TIMEOUT);
        self.wait_timeout = or_default(self.wait_timeout, DEFAULT_WAIT_TIMEOUT);
        self.cleanup_interval = or_default(self.cleanup_interval, DEFAULT_CLEANUP_INTERVAL);
        self.close_timeout = or_default(self.close_timeout, DEFAULT_CLOSE_TIMEOUT);
        self.submit_timeout = or_default(self.submit_timeout, DEFAULT_SUBMIT_TIMEOUT);
        if self.queue_capacity == 0 {
            self.queue_capacity = DEFAULT_QUEUE_CAPACITY;
        }
        if self.name.is_empty() {
            self.name = "pool".to_string();
        }
        self
    }

    /// Validate settings that normalization cannot repair.
    pub fn validate(&self) -> Result<()> {
        if self.backend.entry_point.trim().is_empty() {
            return Err(Error::configuration("backend entry_point must not be empty"));
        }
        Ok(())
    }
}
