//! Event broadcasting for pool lifecycle observability.
//!
//! Provides [`PoolEvent`] variants emitted by the pool and an [`EventBus`]
//! backed by `tokio::sync::broadcast`.

use std::time::Duration;

use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// PoolEvent
// ---------------------------------------------------------------------------

/// Events emitted during resource lifecycle operations.
///
/// Subscribers receive cloned copies via [`EventBus::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    /// A new resource finished initializing and joined the pool.
    Created {
        /// The resource identifier.
        resource_id: u64,
    },
    /// A resource was handed to a caller.
    Acquired {
        /// The resource identifier.
        resource_id: u64,
        /// `false` on the resource's first acquisition.
        reused: bool,
    },
    /// A resource was checked back in.
    Released {
        /// The resource identifier.
        resource_id: u64,
        /// How long the caller held it.
        held_for: Duration,
    },
    /// A caller gave up waiting for a resource.
    AcquireTimedOut {
        /// Total time the caller waited.
        waited: Duration,
    },
    /// A resource was torn down.
    CleanedUp {
        /// The resource identifier.
        resource_id: u64,
        /// Why it was removed.
        reason: CleanupReason,
    },
}

// ---------------------------------------------------------------------------
// CleanupReason
// ---------------------------------------------------------------------------

/// Reason a resource was permanently removed from the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupReason {
    /// Idle longer than the configured timeout.
    IdleTimeout,
    /// Released into a free registry that was already full.
    RegistryFull,
    /// A command panicked and the worker stopped.
    Poisoned,
    /// The pool is shutting down.
    Shutdown,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast-based event bus for pool events.
///
/// Emission is fire-and-forget: if no subscribers are listening or the
/// channel is full, events are dropped (no backpressure on the emitter).
pub struct EventBus {
    sender: broadcast::Sender<PoolEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer size.
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer_size);
        Self { sender }
    }

    /// Emit an event to all current subscribers.
    pub fn emit(&self, event: PoolEvent) {
        // No receivers is not an error for the emitter.
        let _ = self.sender.send(event);
    }

    /// Subscribe to events emitted after this call.
    ///
    /// A subscriber that falls behind by more than the buffer size receives
    /// a `Lagged` error and skips to the latest event.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.sender.receiver_count())
            .finish()
    }
}
