//! In-memory echo backend for tests and demos.
//!
//! [`EchoBackend`] answers every command with its params and records what
//! happened: initializations, releases, and any violation of the
//! one-thread-per-handle rule.
//!
//! Operation names with special meaning:
//!
//! | operation | result |
//! |-----------|--------|
//! | `null`    | [`Payload::Null`] |
//! | `panic`   | panics on the worker thread |
//! | `thread`  | name of the executing thread |
//! | `count`   | commands executed by this handle so far |
//! | anything else | the params, as text |

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread::ThreadId;
use std::time::Duration;

use thiserror::Error;

use crate::backend::{Backend, BackendConfig, Handle, Payload};

/// Errors produced by [`EchoBackend`] and [`EchoHandle`].
#[derive(Debug, Error)]
pub enum EchoError {
    /// Initialization was configured to fail for this attempt.
    #[error("initialization attempt {attempt} refused")]
    InitRefused {
        /// Zero-based initialization attempt.
        attempt: u64,
    },
    /// The operation was configured to fail.
    #[error("operation '{operation}' rejected")]
    Rejected {
        /// The rejected operation.
        operation: String,
    },
    /// The handle was entered while another command was running on it.
    #[error("handle re-entered while a command was in flight")]
    Reentered,
    /// The handle was used from a thread other than the one that created it.
    #[error("handle used off its owning thread")]
    WrongThread,
}

/// Shared counters observed by tests.
#[derive(Debug, Default)]
pub struct Counters {
    init_attempts: AtomicU64,
    initializations: AtomicU64,
    releases: AtomicU64,
    executions: AtomicU64,
    violations: AtomicU64,
    running: AtomicUsize,
    peak_running: AtomicUsize,
}

impl Counters {
    /// Successful initializations.
    pub fn initializations(&self) -> u64 {
        self.initializations.load(Ordering::SeqCst)
    }

    /// Handles released.
    pub fn releases(&self) -> u64 {
        self.releases.load(Ordering::SeqCst)
    }

    /// Commands executed across all handles.
    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::SeqCst)
    }

    /// Re-entrancy or thread-affinity violations detected.
    pub fn violations(&self) -> u64 {
        self.violations.load(Ordering::SeqCst)
    }

    /// Highest number of commands observed running at once across all handles.
    pub fn peak_running(&self) -> usize {
        self.peak_running.load(Ordering::SeqCst)
    }

    /// Handles initialized and not yet released.
    pub fn live(&self) -> u64 {
        self.initializations() - self.releases()
    }
}

/// Backend whose handles echo their params back.
#[derive(Debug, Default)]
pub struct EchoBackend {
    counters: Arc<Counters>,
    delay: Duration,
    init_delay: Duration,
    failing_inits: HashSet<u64>,
    failing_operations: HashSet<String>,
}

impl EchoBackend {
    /// Create a backend with no delays and no failures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every command.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sleep this long inside every initialization.
    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = delay;
        self
    }

    /// Fail the zero-based `attempt`-th initialization.
    pub fn fail_init_on(mut self, attempt: u64) -> Self {
        self.failing_inits.insert(attempt);
        self
    }

    /// Fail every command with this operation name.
    pub fn fail_operation(mut self, operation: impl Into<String>) -> Self {
        self.failing_operations.insert(operation.into());
        self
    }

    /// Counters shared with every handle this backend creates.
    pub fn counters(&self) -> Arc<Counters> {
        Arc::clone(&self.counters)
    }

    /// Shortcut for `counters().initializations()`.
    pub fn initializations(&self) -> u64 {
        self.counters.initializations()
    }

    /// Shortcut for `counters().releases()`.
    pub fn releases(&self) -> u64 {
        self.counters.releases()
    }
}

impl Backend for EchoBackend {
    type Handle = EchoHandle;
    type Error = EchoError;

    fn name(&self) -> &str {
        "echo"
    }

    fn initialize(&self, config: &BackendConfig) -> Result<EchoHandle, EchoError> {
        let attempt = self.counters.init_attempts.fetch_add(1, Ordering::SeqCst);
        if !self.init_delay.is_zero() {
            std::thread::sleep(self.init_delay);
        }
        if self.failing_inits.contains(&attempt) {
            return Err(EchoError::InitRefused { attempt });
        }
        self.counters.initializations.fetch_add(1, Ordering::SeqCst);
        Ok(EchoHandle {
            entry_point: config.entry_point.clone(),
            owner: std::thread::current().id(),
            in_flight: AtomicBool::new(false),
            executed: 0,
            delay: self.delay,
            failing_operations: self.failing_operations.clone(),
            counters: Arc::clone(&self.counters),
        })
    }
}

/// Handle created by [`EchoBackend`].
#[derive(Debug)]
pub struct EchoHandle {
    entry_point: String,
    owner: ThreadId,
    in_flight: AtomicBool,
    executed: u64,
    delay: Duration,
    failing_operations: HashSet<String>,
    counters: Arc<Counters>,
}

impl EchoHandle {
    /// Entry point the handle was initialized with.
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    fn violation(&self, err: EchoError) -> EchoError {
        self.counters.violations.fetch_add(1, Ordering::SeqCst);
        err
    }
}

impl Handle for EchoHandle {
    type Error = EchoError;

    fn execute(&mut self, operation: &str, params: &str) -> Result<Payload, EchoError> {
        if std::thread::current().id() != self.owner {
            return Err(self.violation(EchoError::WrongThread));
        }
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(self.violation(EchoError::Reentered));
        }
        let running = self.counters.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak_running.fetch_max(running, Ordering::SeqCst);

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.executed += 1;
        self.counters.executions.fetch_add(1, Ordering::SeqCst);

        self.counters.running.fetch_sub(1, Ordering::SeqCst);
        self.in_flight.store(false, Ordering::SeqCst);

        if self.failing_operations.contains(operation) {
            return Err(EchoError::Rejected {
                operation: operation.to_string(),
            });
        }
        match operation {
            "null" => Ok(Payload::Null),
            "panic" => panic!("echo handle asked to panic"),
            "thread" => Ok(Payload::Text(
                std::thread::current().name().unwrap_or_default().to_string(),
            )),
            "count" => Ok(Payload::Integer(self.executed as i64)),
            _ => Ok(Payload::Text(params.to_string())),
        }
    }

    fn release(self) {
        if std::thread::current().id() != self.owner {
            self.counters.violations.fetch_add(1, Ordering::SeqCst);
        }
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
    }
}
