//! Pool close semantics.

use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use tether_pool::testing::EchoBackend;
use tether_pool::{BackendConfig, Error, Pool, PoolConfig};

fn config(min_size: usize, max_size: usize) -> PoolConfig {
    PoolConfig {
        backend: BackendConfig::new("mem", "echo"),
        min_size,
        max_size,
        wait_timeout: Duration::from_millis(50),
        close_timeout: Duration::from_secs(2),
        ..PoolConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_close_releases_each_resource_once() {
    let backend = EchoBackend::new();
    let counters = backend.counters();
    let pool = Pool::new(backend, config(3, 3)).await.unwrap();

    let closers: Vec<_> = (0..8)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move { pool.close().await })
        })
        .collect();
    for closer in futures::future::join_all(closers).await {
        closer.unwrap().unwrap();
    }

    assert!(pool.is_closed());
    assert_eq!(pool.active_count(), 0);
    assert_eq!(counters.releases(), 3);

    pool.close().await.unwrap();
    assert_eq!(counters.releases(), 3);
}

#[tokio::test]
async fn waiting_acquirer_fails_when_pool_closes() {
    let pool = Pool::new(EchoBackend::new(), config(1, 1)).await.unwrap();
    let held = pool.acquire().await.unwrap();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await.map(|lease| lease.id()) })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    pool.close().await.unwrap();
    let err = waiter.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::ShutdownInProgress));
    assert!(!err.is_retryable());

    // Releasing into a closed pool is harmless.
    held.release().await;
    assert_eq!(pool.active_count(), 0);
}

#[tokio::test]
async fn commands_fail_after_close() {
    let pool = Pool::new(EchoBackend::new(), config(1, 1)).await.unwrap();
    pool.close().await.unwrap();

    let err = pool.execute_command("Get", "").await.unwrap_err();
    assert!(matches!(err, Error::ShutdownInProgress));
    assert_eq!(pool.status().active_count, 0);
}

#[tokio::test]
async fn queued_commands_are_dropped_at_shutdown() {
    let backend = EchoBackend::new().with_delay(Duration::from_millis(100));
    let pool = Pool::new(backend, config(1, 1)).await.unwrap();
    let lease = pool.acquire().await.unwrap();

    let (closed, (first, second)) = tokio::join!(
        async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            pool.close().await
        },
        async { tokio::join!(lease.execute("Get", "first"), lease.execute("Get", "second")) },
    );
    closed.unwrap();

    // The in-flight command completes; the queued one never runs.
    assert_eq!(first.unwrap().to_string(), "first");
    assert!(matches!(second, Err(Error::WorkerUnavailable { resource_id: 0, .. })));

    lease.release().await;
}

#[tokio::test]
async fn stuck_worker_does_not_block_close() {
    let backend = EchoBackend::new().with_delay(Duration::from_millis(400));
    let counters = backend.counters();
    let pool = Pool::new(
        backend,
        PoolConfig {
            close_timeout: Duration::from_millis(50),
            ..config(1, 1)
        },
    )
    .await
    .unwrap();

    let in_flight = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.execute_command("Get", "slow").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = Instant::now();
    pool.close().await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(300));
    assert_eq!(pool.active_count(), 0);

    // The detached worker still finishes its command and releases the handle.
    let bytes = in_flight.await.unwrap().unwrap();
    assert_eq!(&bytes[..], b"slow");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(counters.releases(), 1);
}
