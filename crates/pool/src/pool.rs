//! Pool manager: creation, acquisition, release and shutdown.
//!
//! `Pool<B>` keeps between `min_size` and `max_size` resources, each owned
//! by its own worker thread. Idle resources wait in a bounded free registry
//! (capacity `max_size`); callers take one out with [`Pool::acquire`] and
//! hand it back with [`Pool::release`].
//!
//! Two locks guard the shared state. The creation lock serializes growth so
//! concurrent acquirers cannot jointly exceed `max_size`; it is held across
//! the wait for a new worker's readiness. The pool lock guards the active
//! set and is never held across an await.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_channel::TrySendError;
use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::{Mutex, OnceCell, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::Span;

use crate::backend::Backend;
use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::events::{CleanupReason, EventBus, PoolEvent};
use crate::lease::Lease;
use crate::reaper;
use crate::record::Record;
use crate::status::PoolStatus;
use crate::worker::{Worker, WorkerOptions};

type Shared<B> = Arc<Record<<B as Backend>::Handle>>;

// ---------------------------------------------------------------------------
// PoolInner
// ---------------------------------------------------------------------------

/// Inner shared state for the pool.
pub(crate) struct PoolInner<B: Backend> {
    backend: Arc<B>,
    pub(crate) config: PoolConfig,
    /// Active set, guarded by the pool lock.
    records: RwLock<Vec<Shared<B>>>,
    free_tx: async_channel::Sender<Shared<B>>,
    free_rx: async_channel::Receiver<Shared<B>>,
    create_lock: Mutex<()>,
    next_id: AtomicU64,
    pub(crate) shutdown: CancellationToken,
    closed: OnceCell<()>,
    events: EventBus,
    pub(crate) span: Span,
}

impl<B: Backend> PoolInner<B> {
    pub(crate) fn active_count(&self) -> usize {
        self.records.read().len()
    }

    pub(crate) fn records_snapshot(&self) -> Vec<Shared<B>> {
        self.records.read().clone()
    }

    fn worker_options(&self) -> WorkerOptions {
        WorkerOptions {
            backend: self.config.backend.clone(),
            queue_capacity: self.config.queue_capacity,
            submit_timeout: self.config.submit_timeout,
        }
    }

    /// Create one resource and put it in the free registry.
    async fn create_resource(&self) -> Result<()> {
        let _creating = self.create_lock.lock().await;
        if self.shutdown.is_cancelled() {
            return Err(Error::ShutdownInProgress);
        }
        if self.active_count() >= self.config.max_size {
            return Err(Error::PoolFull {
                max_size: self.config.max_size,
            });
        }

        let resource_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let worker = Worker::spawn(
            resource_id,
            Arc::clone(&self.backend),
            self.worker_options(),
            self.span.clone(),
        )
        .await?;
        let record = Arc::new(Record::new(resource_id, worker));

        let active = {
            let mut records = self.records.write();
            records.push(Arc::clone(&record));
            records.len()
        };
        self.events.emit(PoolEvent::Created { resource_id });

        match self.free_tx.try_send(record) {
            Ok(()) => {
                tracing::info!(parent: &self.span, resource_id, active, "created resource");
            }
            Err(err) => {
                // Capacity equals max_size, so only a concurrent close gets here.
                self.teardown(err.into_inner(), CleanupReason::Shutdown).await;
            }
        }
        Ok(())
    }

    /// Wait up to `wait_timeout` for a free resource.
    ///
    /// `Ok(None)` means the wait timed out.
    async fn wait_free(&self) -> Result<Option<Shared<B>>> {
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => Err(Error::ShutdownInProgress),
            received = tokio::time::timeout(self.config.wait_timeout, self.free_rx.recv()) => {
                match received {
                    Ok(Ok(record)) => Ok(Some(record)),
                    Ok(Err(_)) => Err(Error::ShutdownInProgress),
                    Err(_) => Ok(None),
                }
            }
        }
    }

    fn check_out(self: &Arc<Self>, record: Shared<B>) -> Lease<B> {
        let reused = record.use_count() > 0;
        record.mark_busy();
        if reused {
            tracing::debug!(parent: &self.span, resource_id = record.id(), "reusing resource");
        }
        self.events.emit(PoolEvent::Acquired {
            resource_id: record.id(),
            reused,
        });
        Lease::new(record, Arc::clone(self))
    }

    /// Mark a record idle and try to put it back in the free registry.
    ///
    /// Returns the record with a reason when it has to be torn down instead.
    pub(crate) fn check_in(
        &self,
        record: Shared<B>,
        held_for: Duration,
    ) -> Option<(Shared<B>, CleanupReason)> {
        let resource_id = record.id();
        record.mark_idle();
        self.events.emit(PoolEvent::Released {
            resource_id,
            held_for,
        });

        if self.shutdown.is_cancelled() {
            return Some((record, CleanupReason::Shutdown));
        }
        if !record.worker().is_alive() {
            if record.worker().is_poisoned() {
                tracing::warn!(parent: &self.span, resource_id, "command panicked, retiring resource");
            } else {
                tracing::warn!(parent: &self.span, resource_id, "worker exited, retiring resource");
            }
            return Some((record, CleanupReason::Poisoned));
        }
        match self.free_tx.try_send(record) {
            Ok(()) => {
                tracing::debug!(parent: &self.span, resource_id, "released resource back to pool");
                None
            }
            Err(TrySendError::Full(record)) => {
                tracing::debug!(parent: &self.span, resource_id, "free registry full, closing resource");
                Some((record, CleanupReason::RegistryFull))
            }
            Err(TrySendError::Closed(record)) => Some((record, CleanupReason::Shutdown)),
        }
    }

    /// Put a record taken out by the reaper back in the free registry.
    pub(crate) fn requeue(&self, record: Shared<B>) {
        if let Err(err) = self.free_tx.try_send(record) {
            // Registry closed: the pool is shutting down and close tears it down.
            let record = err.into_inner();
            record.worker().signal_shutdown();
        }
    }

    /// Dequeue one specific record from the free registry.
    ///
    /// Records passed over on the way are put back untouched. Returns `None`
    /// when the record is not in the registry (a caller holds it).
    pub(crate) fn take_free(&self, resource_id: u64) -> Option<Shared<B>> {
        let mut passed = Vec::new();
        let mut found = None;
        for _ in 0..self.free_rx.len() {
            match self.free_rx.try_recv() {
                Ok(record) if record.id() == resource_id => {
                    found = Some(record);
                    break;
                }
                Ok(record) => passed.push(record),
                Err(_) => break,
            }
        }
        for record in passed {
            self.requeue(record);
        }
        found
    }

    /// Drop a record from the active set, then wait at most `close_timeout`
    /// for its worker to exit.
    ///
    /// The record leaves the active set before the first await.
    pub(crate) async fn teardown(&self, record: Shared<B>, reason: CleanupReason) {
        self.forget(&record, reason);
        if let Err(err) = record.worker().shutdown(self.config.close_timeout).await {
            tracing::warn!(parent: &self.span, resource_id = record.id(), error = %err, "worker shutdown timeout");
        }
    }

    /// Drop a record from the active set without waiting for its worker.
    pub(crate) fn forget(&self, record: &Shared<B>, reason: CleanupReason) {
        record.worker().signal_shutdown();
        let resource_id = record.id();
        let (removed, remaining) = {
            let mut records = self.records.write();
            let before = records.len();
            records.retain(|r| r.id() != resource_id);
            (before != records.len(), records.len())
        };
        if removed {
            tracing::info!(parent: &self.span, resource_id, remaining, ?reason, "closed resource");
            self.events.emit(PoolEvent::CleanedUp {
                resource_id,
                reason,
            });
        }
    }

    async fn shut_down(&self) {
        tracing::debug!(parent: &self.span, "closing pool");
        self.shutdown.cancel();
        self.free_tx.close();

        // Wait for an in-flight creation so its record is included below.
        let _creating = self.create_lock.lock().await;
        while self.free_rx.try_recv().is_ok() {}

        futures::future::join_all(
            self.records_snapshot()
                .into_iter()
                .map(|record| self.teardown(record, CleanupReason::Shutdown)),
        )
        .await;
        self.records.write().clear();
        tracing::info!(parent: &self.span, "pool closed");
    }
}

impl<B: Backend> Drop for PoolInner<B> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// ---------------------------------------------------------------------------
// Pool<B>
// ---------------------------------------------------------------------------

/// Bounded pool of thread-bound resources.
///
/// Cheap to clone; all clones share the same resources. Call
/// [`Pool::close`] for an orderly shutdown; dropping the last clone only
/// signals the workers to stop.
pub struct Pool<B: Backend> {
    inner: Arc<PoolInner<B>>,
}

impl<B: Backend> Clone for Pool<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: Backend> std::fmt::Debug for Pool<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.inner.config.name)
            .field("backend", &self.inner.backend.name())
            .field("active", &self.inner.active_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<B: Backend> Pool<B> {
    /// Create a pool and its initial `min_size` resources.
    ///
    /// Logs go to a new `pool` span named after `config.name`.
    pub async fn new(backend: B, config: PoolConfig) -> Result<Self> {
        let config = config.normalize();
        let span = tracing::info_span!("pool", name = %config.name, backend = backend.name());
        Self::with_span(backend, config, span).await
    }

    /// Create a pool that logs under the given span.
    ///
    /// Fails with [`Error::Construction`] if any initial resource cannot be
    /// created; resources created before the failure are torn down first.
    pub async fn with_span(backend: B, config: PoolConfig, span: Span) -> Result<Self> {
        let config = config.normalize();
        let (free_tx, free_rx) = async_channel::bounded(config.max_size);
        let pool = Self {
            inner: Arc::new(PoolInner {
                backend: Arc::new(backend),
                records: RwLock::new(Vec::with_capacity(config.max_size)),
                free_tx,
                free_rx,
                create_lock: Mutex::new(()),
                next_id: AtomicU64::new(0),
                shutdown: CancellationToken::new(),
                closed: OnceCell::new(),
                events: EventBus::default(),
                span,
                config,
            }),
        };

        let required = pool.inner.config.min_size;
        for _ in 0..required {
            if let Err(err) = pool.inner.create_resource().await {
                tracing::error!(parent: &pool.inner.span, error = %err, "failed to create initial resource");
                pool.close().await?;
                return Err(Error::Construction {
                    required,
                    source: Box::new(err),
                });
            }
        }

        reaper::spawn(&pool.inner);
        Ok(pool)
    }

    /// Acquire a free resource.
    ///
    /// Takes a free resource immediately if there is one, otherwise waits up
    /// to `wait_timeout`. When that wait times out and the pool is below
    /// `max_size`, one resource is created and the wait is retried once.
    /// Fails with [`Error::AcquireTimeout`] right after the first wait if the
    /// pool is already at `max_size`, or when the retry also times out, and
    /// with [`Error::ShutdownInProgress`] as soon as the pool closes.
    pub async fn acquire(&self) -> Result<Lease<B>> {
        let inner = &self.inner;
        let started = Instant::now();
        if inner.shutdown.is_cancelled() {
            return Err(Error::ShutdownInProgress);
        }

        if let Ok(record) = inner.free_rx.try_recv() {
            return Ok(inner.check_out(record));
        }
        if let Some(record) = inner.wait_free().await? {
            return Ok(inner.check_out(record));
        }

        if inner.active_count() < inner.config.max_size {
            match inner.create_resource().await {
                Ok(()) | Err(Error::PoolFull { .. }) => {}
                Err(err) => {
                    tracing::error!(parent: &inner.span, error = %err, "failed to create new resource");
                    return Err(err);
                }
            }
            if let Some(record) = inner.wait_free().await? {
                return Ok(inner.check_out(record));
            }
        }

        let waited = started.elapsed();
        let active = inner.active_count();
        tracing::warn!(
            parent: &inner.span,
            waited_ms = waited.as_millis() as u64,
            active,
            "timeout waiting for resource"
        );
        inner.events.emit(PoolEvent::AcquireTimedOut { waited });
        Err(Error::AcquireTimeout {
            waited_ms: waited.as_millis() as u64,
            active,
            max_size: inner.config.max_size,
        })
    }

    /// Return an acquired resource to the pool.
    pub async fn release(&self, lease: Lease<B>) {
        lease.release().await;
    }

    /// Acquire a resource, run one backend command on it, release it.
    ///
    /// The resource is released whether or not the command succeeds.
    pub async fn execute_command(&self, operation: &str, params: &str) -> Result<Bytes> {
        let lease = self.acquire().await?;
        let resource_id = lease.id();
        let result = lease.execute(operation, params).await;
        lease.release().await;
        if let Err(err) = &result {
            tracing::debug!(parent: &self.inner.span, resource_id, operation, error = %err, "command failed");
        }
        result?.into_bytes(resource_id)
    }

    /// Acquire a resource, run `f` against its handle on the worker thread,
    /// release it.
    pub async fn execute<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut B::Handle) -> T + Send + 'static,
        T: Send + 'static,
    {
        let lease = self.acquire().await?;
        let result = lease.run(f).await;
        lease.release().await;
        result
    }

    /// Snapshot of per-resource statistics.
    ///
    /// Takes only short read locks and never waits on command execution.
    pub fn status(&self) -> PoolStatus {
        let inner = &self.inner;
        let mut resources: Vec<_> = inner.records.read().iter().map(|r| r.status()).collect();
        resources.sort_by_key(|r| r.id);
        PoolStatus {
            active_count: resources.len(),
            idle_count: inner.free_rx.len(),
            min_size: inner.config.min_size,
            max_size: inner.config.max_size,
            resources,
        }
    }

    /// Number of live resources.
    pub fn active_count(&self) -> usize {
        self.inner.active_count()
    }

    /// The normalized configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Whether [`Pool::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Subscribe to pool lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.inner.events.subscribe()
    }

    /// Run one idle sweep now. Returns how many resources were reaped.
    pub async fn reap_idle(&self) -> usize {
        self.inner.reap_idle().await
    }

    /// Shut the pool down and tear down every resource.
    ///
    /// Idempotent: the shutdown runs once, and concurrent callers wait for
    /// it to finish. Each worker gets `close_timeout` to exit; a worker that
    /// does not make it is logged and abandoned.
    pub async fn close(&self) -> Result<()> {
        self.inner.closed.get_or_init(|| self.inner.shut_down()).await;
        Ok(())
    }
}
