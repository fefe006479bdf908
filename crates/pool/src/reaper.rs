//! Idle reaper: periodic eviction of over-idle resources.

use std::sync::Arc;

use tokio::time::MissedTickBehavior;

use crate::backend::Backend;
use crate::events::CleanupReason;
use crate::pool::PoolInner;

/// Start the background sweep for a pool.
///
/// The task holds only a weak reference, so it ends when the pool is closed
/// or its last handle is dropped.
pub(crate) fn spawn<B: Backend>(pool: &Arc<PoolInner<B>>) {
    let weak = Arc::downgrade(pool);
    let shutdown = pool.shutdown.clone();
    let period = pool.config.cleanup_interval;

    drop(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(pool) = weak.upgrade() else {
                        break;
                    };
                    pool.reap_idle().await;
                }
            }
        }
    }));
}

impl<B: Backend> PoolInner<B> {
    /// Tear down free resources idle longer than `idle_timeout`, never going
    /// below `min_size`. Returns how many were reaped.
    pub(crate) async fn reap_idle(&self) -> usize {
        let min_size = self.config.min_size;
        let idle_timeout = self.config.idle_timeout;
        if self.active_count() <= min_size {
            return 0;
        }

        let candidates: Vec<_> = self
            .records_snapshot()
            .into_iter()
            .filter(|record| record.is_idle_longer_than(idle_timeout))
            .collect();

        let mut reaped = 0;
        for candidate in candidates {
            if self.shutdown.is_cancelled() || self.active_count() <= min_size {
                break;
            }
            // A caller may have claimed it since the snapshot; then it is
            // not in the registry and is left alone.
            let Some(record) = self.take_free(candidate.id()) else {
                continue;
            };
            if record.is_idle_longer_than(idle_timeout) {
                tracing::debug!(parent: &self.span, resource_id = record.id(), "reaping idle resource");
                self.teardown(record, CleanupReason::IdleTimeout).await;
                reaped += 1;
            } else {
                self.requeue(record);
            }
        }
        reaped
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::backend::BackendConfig;
    use crate::config::PoolConfig;
    use crate::pool::Pool;
    use crate::testing::EchoBackend;

    fn config() -> PoolConfig {
        PoolConfig {
            backend: BackendConfig::new("mem", "echo"),
            min_size: 1,
            max_size: 3,
            idle_timeout: Duration::from_millis(20),
            wait_timeout: Duration::from_millis(10),
            // Keep the background sweep out of the way; tests sweep by hand.
            cleanup_interval: Duration::from_secs(3600),
            ..PoolConfig::default()
        }
    }

    #[tokio::test]
    async fn sweep_keeps_min_size() {
        let pool = Pool::new(EchoBackend::new(), config()).await.unwrap();
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        let c = pool.acquire().await.unwrap();
        a.release().await;
        b.release().await;
        c.release().await;
        assert_eq!(pool.active_count(), 3);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(pool.reap_idle().await, 2);
        assert_eq!(pool.active_count(), 1);
        assert_eq!(pool.reap_idle().await, 0);

        pool.close().await.unwrap();
    }

    #[tokio::test]
    async fn sweep_skips_busy_resources() {
        let pool = Pool::new(EchoBackend::new(), config()).await.unwrap();
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        b.release().await;

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(pool.reap_idle().await, 1);
        assert_eq!(pool.active_count(), 1);
        assert!(a.is_busy());

        a.release().await;
        pool.close().await.unwrap();
    }

    #[tokio::test]
    async fn recently_used_resources_survive() {
        let pool = Pool::new(EchoBackend::new(), config()).await.unwrap();
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        a.release().await;
        b.release().await;

        assert_eq!(pool.reap_idle().await, 0);
        assert_eq!(pool.active_count(), 2);
        pool.close().await.unwrap();
    }
}
