//! `tether run`: concurrent commands against an echo-backed pool.

use std::io::Write;
use std::time::Instant;

use anyhow::Context;
use tether_pool::testing::EchoBackend;
use tether_pool::{Pool, PoolConfig};

use crate::cli::RunArgs;

/// Outcome of one command.
#[derive(Debug)]
struct Outcome {
    call: usize,
    result: tether_pool::Result<String>,
}

pub async fn run(config: PoolConfig, args: RunArgs) -> anyhow::Result<()> {
    let backend = EchoBackend::new().with_delay(args.delay);
    let pool = Pool::new(backend, config)
        .await
        .context("failed to construct pool")?;

    let started = Instant::now();
    let outcomes = tokio::select! {
        outcomes = drive(&pool, &args) => outcomes,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted, closing pool");
            pool.close().await?;
            anyhow::bail!("interrupted");
        }
    };
    let elapsed = started.elapsed();

    let mut stdout = std::io::stdout().lock();
    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(text) => writeln!(stdout, "call {}: {text}", outcome.call)?,
            Err(err) => {
                failed += 1;
                writeln!(stdout, "call {}: error: {err}", outcome.call)?;
            }
        }
    }
    writeln!(stdout, "{}", serde_json::to_string_pretty(&pool.status())?)?;
    drop(stdout);

    tracing::info!(
        calls = outcomes.len(),
        failed,
        elapsed_ms = elapsed.as_millis() as u64,
        "run finished"
    );
    pool.close().await?;

    anyhow::ensure!(failed == 0, "{failed} of {} calls failed", outcomes.len());
    Ok(())
}

async fn drive(pool: &Pool<EchoBackend>, args: &RunArgs) -> Vec<Outcome> {
    let calls = (0..args.calls).map(|call| {
        let params = args.params.replace("{n}", &call.to_string());
        async move {
            let result = pool
                .execute_command(&args.operation, &params)
                .await
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
            Outcome { call, result }
        }
    });
    futures::future::join_all(calls).await
}
