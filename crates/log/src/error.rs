//! Logger setup errors

/// Result type for logger setup
pub type LogResult<T> = Result<T, LogError>;

/// Errors raised while installing the global subscriber
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The level filter could not be parsed
    #[error("Invalid filter '{filter}': {reason}")]
    Filter {
        /// The rejected filter string
        filter: String,
        /// Parser message
        reason: String,
    },

    /// A global subscriber is already installed
    #[error("A global tracing subscriber is already installed")]
    AlreadyInitialized,
}
