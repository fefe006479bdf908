//! RAII lease on an acquired resource

use std::sync::Arc;
use std::time::Instant;

use crate::backend::Backend;
use crate::pool::PoolInner;
use crate::record::Record;

/// An acquired resource.
///
/// Dereferences to the underlying [`Record`], so commands are issued with
/// [`Record::execute`] / [`Record::run`]. Hand it back with
/// [`Lease::release`] (or [`Pool::release`](crate::Pool::release)). A lease
/// that is dropped without being released is checked in on drop, so a
/// cancelled caller never leaves its resource marked busy.
pub struct Lease<B: Backend> {
    record: Option<Arc<Record<B::Handle>>>,
    pool: Arc<PoolInner<B>>,
    acquired_at: Instant,
}

impl<B: Backend> Lease<B> {
    pub(crate) fn new(record: Arc<Record<B::Handle>>, pool: Arc<PoolInner<B>>) -> Self {
        Self {
            record: Some(record),
            pool,
            acquired_at: Instant::now(),
        }
    }

    /// Return the resource to the pool.
    ///
    /// The resource goes back to the free registry, or is torn down when
    /// the registry is full, the pool is closing, or its worker stopped.
    pub async fn release(mut self) {
        if let Some(record) = self.record.take() {
            let held_for = self.acquired_at.elapsed();
            if let Some((record, reason)) = self.pool.check_in(record, held_for) {
                self.pool.teardown(record, reason).await;
            }
        }
    }
}

impl<B: Backend> std::ops::Deref for Lease<B> {
    type Target = Record<B::Handle>;

    fn deref(&self) -> &Self::Target {
        self.record.as_ref().expect("lease used after release")
    }
}

impl<B: Backend> Drop for Lease<B> {
    fn drop(&mut self) {
        let Some(record) = self.record.take() else {
            return;
        };
        let held_for = self.acquired_at.elapsed();
        if let Some((record, reason)) = self.pool.check_in(record, held_for) {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let pool = Arc::clone(&self.pool);
                    drop(runtime.spawn(async move { pool.teardown(record, reason).await }));
                }
                Err(_) => self.pool.forget(&record, reason),
            }
        }
    }
}

impl<B: Backend> std::fmt::Debug for Lease<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("record", &self.record)
            .field("held_for", &self.acquired_at.elapsed())
            .finish()
    }
}
