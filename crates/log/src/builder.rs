//! Subscriber installation

use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, Format};
use crate::error::{LogError, LogResult};

/// Guard that keeps the logger alive
///
/// Holds the root service span entered for the lifetime of the guard.
#[derive(Debug)]
pub struct LoggerGuard {
    _root_span: Option<tracing::span::EnteredSpan>,
}

/// Base fmt layer with the display options shared by every format.
macro_rules! fmt_layer {
    ($display:expr) => {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi($display.colors)
            .with_target($display.target)
            .with_file($display.source)
            .with_line_number($display.source)
            .with_thread_names($display.thread_names)
    };
}

/// Install `Registry + filter + layer`, dropping timestamps when disabled.
macro_rules! install {
    ($filter:expr, $layer:expr, $display:expr) => {
        if $display.time {
            Registry::default().with($filter).with($layer).try_init()
        } else {
            Registry::default()
                .with($filter)
                .with($layer.without_time())
                .try_init()
        }
    };
}

/// Build the filter for a config without installing anything.
pub(crate) fn make_filter(level: &str) -> LogResult<EnvFilter> {
    EnvFilter::try_new(level).map_err(|e| LogError::Filter {
        filter: level.to_string(),
        reason: e.to_string(),
    })
}

/// Install the global subscriber described by `config`
///
/// # Errors
///
/// Returns error if:
/// - The level filter cannot be parsed
/// - A global subscriber is already installed
pub fn init(config: Config) -> LogResult<LoggerGuard> {
    let filter = make_filter(&config.level)?;
    let display = &config.display;

    let installed = match config.format {
        Format::Pretty => install!(filter, fmt_layer!(display).pretty(), display),
        Format::Compact => install!(filter, fmt_layer!(display).compact(), display),
        Format::Json => install!(
            filter,
            fmt_layer!(display)
                .json()
                .with_current_span(true)
                .flatten_event(display.flatten),
            display
        ),
    };
    installed.map_err(|_| LogError::AlreadyInitialized)?;

    let root_span = config
        .service
        .as_deref()
        .map(|service| tracing::info_span!("app", service).entered());

    Ok(LoggerGuard {
        _root_span: root_span,
    })
}
