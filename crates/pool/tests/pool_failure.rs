//! Failure handling: construction, growth, command errors and panics.

use std::time::Duration;

use pretty_assertions::assert_eq;
use rstest::rstest;
use tether_pool::testing::EchoBackend;
use tether_pool::{BackendConfig, Error, Pool, PoolConfig};

fn config(min_size: usize, max_size: usize) -> PoolConfig {
    PoolConfig {
        backend: BackendConfig::new("mem", "echo"),
        min_size,
        max_size,
        wait_timeout: Duration::from_millis(30),
        close_timeout: Duration::from_secs(2),
        ..PoolConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[tokio::test]
async fn construction_failure_tears_down_created_resources() {
    let backend = EchoBackend::new().fail_init_on(1);
    let counters = backend.counters();

    let err = Pool::new(backend, config(2, 4)).await.unwrap_err();
    match &err {
        Error::Construction { required, source } => {
            assert_eq!(*required, 2);
            assert!(
                matches!(**source, Error::Initialization { resource_id: 1, .. }),
                "unexpected source: {source:?}"
            );
        }
        other => panic!("expected Construction, got {other:?}"),
    }
    assert!(err.to_string().contains('2'));

    assert_eq!(counters.initializations(), 1);
    assert_eq!(counters.releases(), 1);
}

#[tokio::test]
async fn construction_failure_on_first_resource() {
    let backend = EchoBackend::new().fail_init_on(0);
    let counters = backend.counters();

    let err = Pool::new(backend, config(1, 1)).await.unwrap_err();
    assert!(matches!(err, Error::Construction { required: 1, .. }));
    assert_eq!(counters.live(), 0);
}

#[tokio::test]
async fn growth_failure_reaches_the_caller() {
    let pool = Pool::new(EchoBackend::new().fail_init_on(1), config(1, 2))
        .await
        .unwrap();
    let held = pool.acquire().await.unwrap();

    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, Error::Initialization { resource_id: 1, .. }));
    assert_eq!(pool.active_count(), 1);

    // The next growth attempt is a fresh initialization and succeeds.
    let grown = pool.acquire().await.unwrap();
    assert_eq!(grown.id(), 2);

    held.release().await;
    grown.release().await;
    pool.close().await.unwrap();
}

// ---------------------------------------------------------------------------
// Command failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn execution_error_keeps_resource_in_service() {
    let backend = EchoBackend::new().fail_operation("Delete");
    let counters = backend.counters();
    let pool = Pool::new(backend, config(1, 1)).await.unwrap();

    let err = pool.execute_command("Delete", "{}").await.unwrap_err();
    match &err {
        Error::Execution {
            resource_id,
            operation,
            ..
        } => {
            assert_eq!(*resource_id, 0);
            assert_eq!(operation, "Delete");
        }
        other => panic!("expected Execution, got {other:?}"),
    }
    assert_eq!(err.resource_id(), Some(0));

    let bytes = pool.execute_command("Get", "still here").await.unwrap();
    assert_eq!(&bytes[..], b"still here");

    let status = pool.status();
    assert_eq!(status.active_count, 1);
    assert_eq!(status.resources[0].use_count, 2);
    assert!(!status.resources[0].busy);

    pool.close().await.unwrap();
    assert_eq!(counters.initializations(), 1);
}

#[tokio::test]
async fn null_result_is_a_shape_error() {
    let pool = Pool::new(EchoBackend::new(), config(1, 1)).await.unwrap();

    let err = pool.execute_command("null", "").await.unwrap_err();
    assert!(matches!(err, Error::ResultShape { resource_id: 0, .. }));

    // The resource itself is fine.
    assert_eq!(pool.status().idle_count, 1);
    pool.close().await.unwrap();
}

#[rstest]
#[case::count("count", "", b"1".as_slice())]
#[case::text("Post", "abc", b"abc".as_slice())]
#[case::thread("thread", "", b"tether-worker-0".as_slice())]
#[tokio::test]
async fn payload_converts_to_bytes(
    #[case] operation: &str,
    #[case] params: &str,
    #[case] expected: &[u8],
) {
    let pool = Pool::new(EchoBackend::new(), config(1, 1)).await.unwrap();
    let bytes = pool.execute_command(operation, params).await.unwrap();
    assert_eq!(&bytes[..], expected);
    pool.close().await.unwrap();
}

// ---------------------------------------------------------------------------
// Panics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn panicking_command_retires_the_resource() {
    let backend = EchoBackend::new();
    let counters = backend.counters();
    let pool = Pool::new(backend, config(1, 2)).await.unwrap();

    let err = pool.execute_command("panic", "").await.unwrap_err();
    assert!(matches!(err, Error::WorkerUnavailable { resource_id: 0, .. }));
    assert!(err.is_retryable());

    assert_eq!(pool.active_count(), 0);
    assert_eq!(counters.releases(), 1);

    // A replacement is grown on demand.
    let bytes = pool.execute_command("Get", "again").await.unwrap();
    assert_eq!(&bytes[..], b"again");
    assert_eq!(pool.status().resources[0].id, 1);

    pool.close().await.unwrap();
    assert_eq!(counters.live(), 0);
}

#[tokio::test]
async fn generic_closure_runs_against_the_handle() {
    let pool = Pool::new(EchoBackend::new(), config(1, 1)).await.unwrap();

    let entry_point = pool
        .execute(|handle| handle.entry_point().to_string())
        .await
        .unwrap();
    assert_eq!(entry_point, "echo");

    pool.close().await.unwrap();
}
