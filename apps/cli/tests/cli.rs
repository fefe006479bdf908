//! End-to-end runs of the `tether` binary.

use assert_cmd::Command;
use predicates::prelude::*;

fn tether() -> Command {
    let mut cmd = Command::cargo_bin("tether").unwrap();
    cmd.env_remove("TETHER_CONFIG")
        .env_remove("TETHER_MAX_SIZE")
        .env("TETHER_LOG", "warn");
    cmd
}

#[test]
fn config_prints_normalized_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pool.toml");
    std::fs::write(
        &path,
        "name = \"demo\"\nmin_size = 5\nmax_size = 2\nidle_timeout = \"90s\"\n",
    )
    .unwrap();

    tether()
        .args(["config", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""name": "demo""#))
        .stdout(predicate::str::contains(r#""min_size": 2"#))
        .stdout(predicate::str::contains(r#""idle_timeout": "1m 30s""#));
}

#[test]
fn env_overrides_defaults() {
    tether()
        .arg("config")
        .env("TETHER_MAX_SIZE", "4")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""max_size": 4"#));
}

#[test]
fn run_prints_results_and_status() {
    tether()
        .args(["run", "-n", "3", "--delay", "20ms", "--params", "job-{n}"])
        .env("TETHER_MAX_SIZE", "2")
        .env("TETHER_WAIT_TIMEOUT", "50ms")
        .assert()
        .success()
        .stdout(predicate::str::contains("call 0: job-0"))
        .stdout(predicate::str::contains("call 2: job-2"))
        .stdout(predicate::str::contains(r#""active_count""#));
}

#[test]
fn failing_calls_exit_nonzero() {
    tether()
        .args(["run", "-n", "1", "--operation", "null"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("call 0: error"))
        .stderr(predicate::str::contains("1 of 1 calls failed"));
}

#[test]
fn missing_config_file_fails() {
    tether()
        .args(["config", "--config", "/nonexistent/pool.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn log_level_flag_overrides_env_filter() {
    tether()
        .args(["config", "--log-level", "debug"])
        .env("TETHER_LOG_COLORS", "0")
        .assert()
        .success()
        .stderr(predicate::str::contains("loaded pool config"));
}

#[test]
fn debug_build_logs_at_debug_without_filter() {
    if !cfg!(debug_assertions) {
        return;
    }
    tether()
        .arg("config")
        .env_remove("TETHER_LOG")
        .env_remove("RUST_LOG")
        .env("TETHER_LOG_FORMAT", "compact")
        .env("TETHER_LOG_COLORS", "0")
        .assert()
        .success()
        .stderr(predicate::str::contains("loaded pool config"));
}
