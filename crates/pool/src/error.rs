//! Error types for pool operations
use thiserror::Error;

/// Result type for pool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error produced by a backend implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Comprehensive error type for pool operations
#[derive(Error, Debug)]
pub enum Error {
    /// Pool configuration is invalid
    #[error("Configuration error: {message}")]
    Configuration {
        /// The error message
        message: String,
    },

    /// The initial `min_size` population could not be created.
    ///
    /// The pool is not returned; every resource created before the failure
    /// has already been torn down.
    #[error("Failed to construct pool: could not create {required} initial resource(s)")]
    Construction {
        /// Number of resources the pool had to create up front
        required: usize,
        /// The creation failure that aborted construction
        #[source]
        source: Box<Error>,
    },

    /// The backend failed to initialize a resource on its worker thread
    #[error("Initialization failed for resource {resource_id}")]
    Initialization {
        /// The resource identifier
        resource_id: u64,
        /// The underlying backend error
        #[source]
        source: BoxError,
    },

    /// No resource became free in time and the pool is at its maximum size
    #[error("Timed out after {waited_ms}ms waiting for a resource: {active}/{max_size} in use")]
    AcquireTimeout {
        /// How long the caller waited in total
        waited_ms: u64,
        /// Active resources at the time of the failure
        active: usize,
        /// Maximum pool size
        max_size: usize,
    },

    /// The pool is closing or closed
    #[error("Pool is shut down")]
    ShutdownInProgress,

    /// The pool refused to grow because it is already at its maximum size
    #[error("Maximum pool size {max_size} reached")]
    PoolFull {
        /// Maximum pool size
        max_size: usize,
    },

    /// The backend reported a command failure
    #[error("Command '{operation}' failed on resource {resource_id}")]
    Execution {
        /// The resource identifier
        resource_id: u64,
        /// The operation that failed
        operation: String,
        /// The underlying backend error, surfaced verbatim
        #[source]
        source: BoxError,
    },

    /// The backend response could not be interpreted as a result payload
    #[error("Unexpected result from resource {resource_id}: {found}")]
    ResultShape {
        /// The resource identifier
        resource_id: u64,
        /// Description of what was returned instead
        found: String,
    },

    /// The worker could not accept the command or stopped before answering
    #[error("Worker for resource {resource_id} is unavailable: {reason}")]
    WorkerUnavailable {
        /// The resource identifier
        resource_id: u64,
        /// Why the worker could not serve the command
        reason: String,
    },

    /// A worker did not exit within the shutdown grace period
    #[error("Worker for resource {resource_id} did not stop within {timeout_ms}ms")]
    WorkerShutdownTimeout {
        /// The resource identifier
        resource_id: u64,
        /// The grace period in milliseconds
        timeout_ms: u64,
    },
}

impl Error {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a worker-unavailable error
    pub fn worker_unavailable<S: Into<String>>(resource_id: u64, reason: S) -> Self {
        Self::WorkerUnavailable {
            resource_id,
            reason: reason.into(),
        }
    }

    /// Check if this error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AcquireTimeout { .. } | Self::WorkerUnavailable { .. } | Self::PoolFull { .. }
        )
    }

    /// Get the resource ID associated with this error (if any)
    #[must_use]
    pub fn resource_id(&self) -> Option<u64> {
        match self {
            Self::Initialization { resource_id, .. }
            | Self::Execution { resource_id, .. }
            | Self::ResultShape { resource_id, .. }
            | Self::WorkerUnavailable { resource_id, .. }
            | Self::WorkerShutdownTimeout { resource_id, .. } => Some(*resource_id),
            Self::Construction { source, .. } => source.resource_id(),
            Self::Configuration { .. }
            | Self::AcquireTimeout { .. }
            | Self::ShutdownInProgress
            | Self::PoolFull { .. } => None,
        }
    }
}
