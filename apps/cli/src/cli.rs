//! Command-line arguments

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "tether")]
#[command(about = "Drive a pool of thread-bound resources", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Pool config file (TOML); `TETHER_*` env vars override it
    #[arg(short, long, global = true, env = "TETHER_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log output format: compact, pretty or json
    #[arg(long, global = true, env = "TETHER_LOG_FORMAT", value_name = "FORMAT")]
    pub log_format: Option<String>,

    /// Log filter, overriding `TETHER_LOG` / `RUST_LOG`
    #[arg(long, global = true, value_name = "FILTER")]
    pub log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run concurrent commands through the pool and print the results
    Run(RunArgs),

    /// Print the effective, normalized pool config
    Config,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Number of concurrent commands
    #[arg(short = 'n', long, default_value_t = 3)]
    pub calls: usize,

    /// Operation name passed to the backend
    #[arg(short, long, default_value = "Post")]
    pub operation: String,

    /// Params passed with every command; `{n}` is replaced by the call index
    #[arg(short, long, default_value = r#"{"call":{n}}"#)]
    pub params: String,

    /// Simulated time each command takes on its worker
    #[arg(long, default_value = "100ms", value_parser = parse_duration)]
    pub delay: Duration,
}

fn parse_duration(raw: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(raw).map_err(|e| e.to_string())
}
