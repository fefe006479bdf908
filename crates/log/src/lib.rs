//! # Tether Log
//!
//! One-call `tracing` setup for tether binaries.
//!
//! ```no_run
//! fn main() -> Result<(), tether_log::LogError> {
//!     let _guard = tether_log::init(tether_log::Config::from_env())?;
//!     tracing::info!(port = 8080, "starting");
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod builder;
mod config;
mod error;

pub use builder::{LoggerGuard, init};
pub use config::{Config, DisplayConfig, Format};
pub use error::{LogError, LogResult};

