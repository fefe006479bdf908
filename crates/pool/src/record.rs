//! Pool-visible metadata for one live resource.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::backend::{Handle, Payload};
use crate::error::{Error, Result};
use crate::status::ResourceStatus;
use crate::worker::Worker;

#[derive(Debug, Clone, Copy)]
struct Usage {
    busy: bool,
    last_used: Instant,
    last_used_at: DateTime<Utc>,
    use_count: u64,
}

/// One live resource: identity, usage statistics and its worker.
///
/// Usage fields sit behind a read/write lock so status reporting never
/// waits on command execution. The resource handle itself is owned by the
/// worker thread and is reachable only through [`Record::execute`] and
/// [`Record::run`].
pub struct Record<H> {
    id: u64,
    usage: RwLock<Usage>,
    worker: Worker<H>,
}

impl<H> Record<H> {
    pub(crate) fn new(id: u64, worker: Worker<H>) -> Self {
        Self {
            id,
            usage: RwLock::new(Usage {
                busy: false,
                last_used: Instant::now(),
                last_used_at: Utc::now(),
                use_count: 0,
            }),
            worker,
        }
    }

    /// Identity assigned at creation; never reused while the pool lives.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether a caller currently holds this resource.
    pub fn is_busy(&self) -> bool {
        self.usage.read().busy
    }

    /// Wall-clock time of the last acquire or release.
    pub fn last_used(&self) -> DateTime<Utc> {
        self.usage.read().last_used_at
    }

    /// Number of times this resource has been acquired.
    pub fn use_count(&self) -> u64 {
        self.usage.read().use_count
    }

    /// Time since the last acquire or release.
    pub fn idle_for(&self) -> Duration {
        self.usage.read().last_used.elapsed()
    }

    pub(crate) fn mark_busy(&self) {
        let mut usage = self.usage.write();
        usage.busy = true;
        usage.last_used = Instant::now();
        usage.last_used_at = Utc::now();
        usage.use_count += 1;
    }

    pub(crate) fn mark_idle(&self) {
        let mut usage = self.usage.write();
        usage.busy = false;
        usage.last_used = Instant::now();
        usage.last_used_at = Utc::now();
    }

    /// Not busy and unused for longer than `timeout`.
    pub(crate) fn is_idle_longer_than(&self, timeout: Duration) -> bool {
        let usage = self.usage.read();
        !usage.busy && usage.last_used.elapsed() > timeout
    }

    pub(crate) fn status(&self) -> ResourceStatus {
        let usage = *self.usage.read();
        ResourceStatus {
            id: self.id,
            use_count: usage.use_count,
            last_used: usage.last_used_at,
            busy: usage.busy,
        }
    }

    pub(crate) fn worker(&self) -> &Worker<H> {
        &self.worker
    }
}

impl<H: Handle> Record<H> {
    /// Execute one backend command on this resource's worker.
    ///
    /// Backend failures come back as [`Error::Execution`] with the backend
    /// error as source.
    pub async fn execute(&self, operation: &str, params: &str) -> Result<Payload> {
        let resource_id = self.id;
        let operation = operation.to_string();
        let params = params.to_string();
        self.worker
            .submit(move |handle: &mut H| {
                handle
                    .execute(&operation, &params)
                    .map_err(|err| Error::Execution {
                        resource_id,
                        operation,
                        source: Box::new(err),
                    })
            })
            .await?
    }

    /// Run an arbitrary closure against the handle on the worker thread.
    pub async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut H) -> T + Send + 'static,
        T: Send + 'static,
    {
        self.worker.submit(f).await
    }
}

impl<H> std::fmt::Debug for Record<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let usage = *self.usage.read();
        f.debug_struct("Record")
            .field("id", &self.id)
            .field("busy", &usage.busy)
            .field("use_count", &usage.use_count)
            .field("alive", &self.worker.is_alive())
            .finish()
    }
}
