//! Background idle sweep.

use std::time::Duration;

use pretty_assertions::assert_eq;
use tether_pool::testing::EchoBackend;
use tether_pool::{BackendConfig, CleanupReason, Pool, PoolConfig, PoolEvent};

fn config() -> PoolConfig {
    PoolConfig {
        backend: BackendConfig::new("mem", "echo"),
        // Normalized to 1.
        min_size: 0,
        max_size: 3,
        idle_timeout: Duration::from_millis(10),
        cleanup_interval: Duration::from_millis(5),
        wait_timeout: Duration::from_millis(5),
        ..PoolConfig::default()
    }
}

#[tokio::test]
async fn idle_resources_shrink_to_min_size() {
    let backend = EchoBackend::new();
    let counters = backend.counters();
    let pool = Pool::new(backend, config()).await.unwrap();
    assert_eq!(pool.config().min_size, 1);

    let leases = vec![
        pool.acquire().await.unwrap(),
        pool.acquire().await.unwrap(),
        pool.acquire().await.unwrap(),
    ];
    assert_eq!(pool.active_count(), 3);
    let mut events = pool.subscribe();
    for lease in leases {
        lease.release().await;
    }

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(pool.active_count(), 1);
    assert_eq!(counters.releases(), 2);

    let mut idle_cleanups = 0;
    while let Ok(event) = events.try_recv() {
        if let PoolEvent::CleanedUp { reason, .. } = event {
            assert_eq!(reason, CleanupReason::IdleTimeout);
            idle_cleanups += 1;
        }
    }
    assert_eq!(idle_cleanups, 2);

    // The survivor still serves commands.
    let bytes = pool.execute_command("Get", "alive").await.unwrap();
    assert_eq!(&bytes[..], b"alive");

    pool.close().await.unwrap();
    assert_eq!(counters.releases(), 3);
}

#[tokio::test]
async fn held_resources_are_never_reaped() {
    let pool = Pool::new(EchoBackend::new(), config()).await.unwrap();

    let first = pool.acquire().await.unwrap();
    let second = pool.acquire().await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert_eq!(pool.active_count(), 2);
    assert!(first.is_busy());
    assert!(second.is_busy());

    first.release().await;
    second.release().await;
    pool.close().await.unwrap();
}

#[tokio::test]
async fn sweep_stops_after_close() {
    let backend = EchoBackend::new();
    let counters = backend.counters();
    let pool = Pool::new(backend, config()).await.unwrap();
    pool.close().await.unwrap();

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(pool.reap_idle().await, 0);
    assert_eq!(counters.releases(), 1);
}
