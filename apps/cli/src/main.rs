//! Tether CLI
//!
//! ```bash
//! tether config --config pool.toml
//! TETHER_MAX_SIZE=2 tether run -n 3 --delay 100ms
//! ```

mod cli;
mod run;
mod settings;

use clap::Parser;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut log_config = tether_log::Config::auto().with_service("tether");
    if let Some(level) = cli.log_level.clone() {
        log_config = log_config.with_level(level);
    }
    if let Some(format) = cli.log_format.as_deref() {
        log_config.format = tether_log::Format::parse_lossy(format);
    }
    let _guard = tether_log::init(log_config)?;

    let config = settings::load(cli.config.as_deref())?;
    tracing::debug!(?config, "loaded pool config");

    match cli.command {
        Command::Run(args) => run::run(config, args).await,
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
