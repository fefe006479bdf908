//! # Tether Pool
//!
//! Bounded pool of thread-bound resources.
//!
//! Some backend handles (embedded interpreters, single-threaded client
//! libraries) must be created, used and released on one OS thread. The pool
//! gives each such handle its own worker thread, queues commands to it one
//! at a time, and keeps between `min_size` and `max_size` of them alive:
//! growing under load, reaping idle ones, and shutting all of them down on
//! [`Pool::close`].
//!
//! ```no_run
//! use tether_pool::{BackendConfig, Pool, PoolConfig};
//! use tether_pool::testing::EchoBackend;
//!
//! # async fn demo() -> tether_pool::Result<()> {
//! let config = PoolConfig::new(BackendConfig::new("memory", "echo"));
//! let pool = Pool::new(EchoBackend::new(), config).await?;
//!
//! let bytes = pool.execute_command("Post", r#"{"id":1}"#).await?;
//! assert_eq!(&bytes[..], br#"{"id":1}"#);
//!
//! pool.close().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod lease;
pub mod pool;
pub mod record;
pub mod status;

mod reaper;
mod worker;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backend::{Backend, BackendConfig, Handle, Payload};
pub use config::PoolConfig;
pub use error::{BoxError, Error, Result};
pub use events::{CleanupReason, EventBus, PoolEvent};
pub use lease::Lease;
pub use pool::Pool;
pub use record::Record;
pub use status::{PoolStatus, ResourceStatus};
