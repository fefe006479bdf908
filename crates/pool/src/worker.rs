//! Dedicated worker thread owning one resource handle.
//!
//! Each worker is a named OS thread running a current-thread tokio runtime.
//! The thread initializes the handle, reports readiness, then pulls boxed
//! commands off a bounded queue and runs them one at a time. The handle never
//! leaves the thread: other components only see the command queue and the
//! shutdown token.
//!
//! Commands still queued when shutdown is signalled are dropped unexecuted.
//! Dropping a command drops its result sender, so the submitting caller
//! observes [`Error::WorkerUnavailable`] rather than waiting forever.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::Span;

use crate::backend::{Backend, BackendConfig, Handle};
use crate::error::{BoxError, Error, Result};

/// A unit of work run against the handle. Returns `false` when the worker
/// must stop (the command panicked).
type Job<H> = Box<dyn FnOnce(&mut H) -> bool + Send>;

/// Marker sent back when a command panicked.
struct Panicked;

/// Pool-side handle to a worker thread.
pub(crate) struct Worker<H> {
    resource_id: u64,
    commands: mpsc::Sender<Job<H>>,
    shutdown: CancellationToken,
    exited: CancellationToken,
    poisoned: Arc<AtomicBool>,
    submit_timeout: Duration,
}

/// Settings a worker needs from the pool config.
pub(crate) struct WorkerOptions {
    pub(crate) backend: BackendConfig,
    pub(crate) queue_capacity: usize,
    pub(crate) submit_timeout: Duration,
}

impl<H: Handle> Worker<H> {
    /// Start the worker thread and wait until the handle is initialized.
    ///
    /// The returned future resolves only after the backend's `initialize`
    /// has finished on the new thread.
    pub(crate) async fn spawn<B>(
        resource_id: u64,
        backend: Arc<B>,
        options: WorkerOptions,
        span: Span,
    ) -> Result<Self>
    where
        B: Backend<Handle = H>,
    {
        let (commands, queue) = mpsc::channel(options.queue_capacity);
        let (ready_tx, ready_rx) = oneshot::channel();
        let shutdown = CancellationToken::new();
        let exited = CancellationToken::new();

        let thread = {
            let shutdown = shutdown.clone();
            let exited = exited.clone();
            let config = options.backend;
            std::thread::Builder::new()
                .name(format!("tether-worker-{resource_id}"))
                .spawn(move || {
                    let _exited = exited.drop_guard();
                    span.in_scope(|| {
                        run(resource_id, backend.as_ref(), &config, queue, &shutdown, ready_tx);
                    });
                })
        };
        if let Err(err) = thread {
            return Err(Error::Initialization {
                resource_id,
                source: Box::new(err),
            });
        }

        match ready_rx.await {
            Ok(Ok(())) => Ok(Self {
                resource_id,
                commands,
                shutdown,
                exited,
                poisoned: Arc::new(AtomicBool::new(false)),
                submit_timeout: options.submit_timeout,
            }),
            Ok(Err(source)) => Err(Error::Initialization {
                resource_id,
                source,
            }),
            Err(_) => Err(Error::Initialization {
                resource_id,
                source: "worker exited before signalling readiness".into(),
            }),
        }
    }

    /// Run `f` against the handle on the worker thread and wait for its result.
    ///
    /// Waits at most `submit_timeout` for queue space. There is no timeout
    /// once the command is queued.
    pub(crate) async fn submit<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut H) -> T + Send + 'static,
        T: Send + 'static,
    {
        if !self.is_alive() || self.shutdown.is_cancelled() {
            return Err(Error::worker_unavailable(self.resource_id, "worker is stopped"));
        }

        let (tx, rx) = oneshot::channel::<std::result::Result<T, Panicked>>();
        let poisoned = Arc::clone(&self.poisoned);
        let job: Job<H> = Box::new(move |handle: &mut H| {
            match catch_unwind(AssertUnwindSafe(|| f(handle))) {
                Ok(value) => {
                    let _ = tx.send(Ok(value));
                    true
                }
                Err(_) => {
                    poisoned.store(true, Ordering::Release);
                    let _ = tx.send(Err(Panicked));
                    false
                }
            }
        });

        match tokio::time::timeout(self.submit_timeout, self.commands.send(job)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                return Err(Error::worker_unavailable(self.resource_id, "command queue is closed"));
            }
            Err(_) => {
                return Err(Error::worker_unavailable(
                    self.resource_id,
                    format!(
                        "command queue stayed full for {}ms",
                        self.submit_timeout.as_millis()
                    ),
                ));
            }
        }

        match rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(Panicked)) => Err(Error::worker_unavailable(
                self.resource_id,
                "command panicked; worker stopped",
            )),
            Err(_) => Err(Error::worker_unavailable(
                self.resource_id,
                "worker stopped before responding",
            )),
        }
    }
}

impl<H> Worker<H> {
    /// `false` once the thread has exited or a command panicked.
    pub(crate) fn is_alive(&self) -> bool {
        !self.poisoned.load(Ordering::Acquire) && !self.exited.is_cancelled()
    }

    /// Whether a command panicked on this worker.
    pub(crate) fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    /// Signal shutdown without waiting.
    pub(crate) fn signal_shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Signal shutdown and wait up to `grace` for the thread to exit.
    ///
    /// On timeout the thread is left running detached; it will still exit
    /// once the in-flight command returns control.
    pub(crate) async fn shutdown(&self, grace: Duration) -> Result<()> {
        self.shutdown.cancel();
        tokio::time::timeout(grace, self.exited.cancelled())
            .await
            .map_err(|_| Error::WorkerShutdownTimeout {
                resource_id: self.resource_id,
                timeout_ms: grace.as_millis() as u64,
            })
    }
}

impl<H> Drop for Worker<H> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Body of the worker thread.
fn run<B: Backend>(
    resource_id: u64,
    backend: &B,
    config: &BackendConfig,
    mut queue: mpsc::Receiver<Job<B::Handle>>,
    shutdown: &CancellationToken,
    ready: oneshot::Sender<std::result::Result<(), BoxError>>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            let _ = ready.send(Err(Box::new(err)));
            return;
        }
    };

    tracing::debug!(resource_id, backend = backend.name(), "initializing resource");
    let mut handle = match backend.initialize(config) {
        Ok(handle) => handle,
        Err(err) => {
            tracing::warn!(resource_id, error = %err, "resource initialization failed");
            let _ = ready.send(Err(Box::new(err)));
            return;
        }
    };

    if ready.send(Ok(())).is_err() {
        // The creator stopped waiting; nobody will ever submit work.
        handle.release();
        return;
    }
    tracing::info!(resource_id, "resource initialized");

    runtime.block_on(async {
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                job = queue.recv() => match job {
                    Some(job) => {
                        if !job(&mut handle) {
                            tracing::error!(resource_id, "command panicked, stopping worker");
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    });

    queue.close();
    drop(queue);
    tracing::debug!(resource_id, "worker shutting down");

    if catch_unwind(AssertUnwindSafe(|| handle.release())).is_err() {
        tracing::error!(resource_id, "resource release panicked");
    }
}
