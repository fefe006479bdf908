//! Read-only pool snapshots.

use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::Serialize;

/// Usage statistics of one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ResourceStatus {
    /// The resource identifier.
    pub id: u64,
    /// Number of times the resource has been acquired.
    pub use_count: u64,
    /// Wall-clock time of the last acquire or release.
    pub last_used: DateTime<Utc>,
    /// Whether a caller holds it right now.
    pub busy: bool,
}

/// Snapshot returned by [`Pool::status`](crate::Pool::status).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PoolStatus {
    /// Per-resource statistics, ordered by identity.
    pub resources: Vec<ResourceStatus>,
    /// Live resources.
    pub active_count: usize,
    /// Resources currently waiting in the free registry.
    pub idle_count: usize,
    /// Configured minimum.
    pub min_size: usize,
    /// Configured maximum.
    pub max_size: usize,
}

impl PoolStatus {
    /// Total acquisitions across all live resources.
    #[must_use]
    pub fn total_uses(&self) -> u64 {
        self.resources.iter().map(|r| r.use_count).sum()
    }

    /// Look up one resource by identity.
    #[must_use]
    pub fn resource(&self, id: u64) -> Option<&ResourceStatus> {
        self.resources.iter().find(|r| r.id == id)
    }
}
