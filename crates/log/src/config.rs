//! Logger configuration and presets

use serde::{Deserialize, Serialize};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level filter (e.g., "info", "debug,tether_pool=trace")
    pub level: String,

    /// Output format
    pub format: Format,

    /// Display configuration
    pub display: DisplayConfig,

    /// Service name recorded on a root span around all events
    pub service: Option<String>,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Human-readable with colors and indentation
    Pretty,
    /// Compact single-line output
    Compact,
    /// Structured JSON output
    Json,
}

impl Format {
    /// Parse a format name, falling back to [`Format::Compact`].
    #[must_use]
    pub fn parse_lossy(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "pretty" => Self::Pretty,
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Display configuration
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Show timestamps
    pub time: bool,
    /// Show source location (`file:line`)
    pub source: bool,
    /// Show target module
    pub target: bool,
    /// Show thread names (worker threads are named `tether-worker-{id}`)
    pub thread_names: bool,
    /// Use ANSI colors
    pub colors: bool,
    /// Flatten JSON events
    pub flatten: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            time: true,
            source: cfg!(debug_assertions),
            target: true,
            thread_names: true,
            colors: cfg!(feature = "ansi") && std::io::IsTerminal::is_terminal(&std::io::stderr()),
            flatten: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: Format::Compact,
            display: DisplayConfig::default(),
            service: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

impl Config {
    /// Create configuration from environment variables
    ///
    /// Reads `TETHER_LOG` (falling back to `RUST_LOG`) for the filter and
    /// `TETHER_LOG_FORMAT` for the output format.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(level) = lookup("TETHER_LOG").or_else(|| lookup("RUST_LOG")) {
            config.level = level;
        }
        config.overlay(&lookup)
    }

    /// Pick a configuration for the current build
    ///
    /// Uses [`Config::from_env`] when `TETHER_LOG` or `RUST_LOG` is set.
    /// Otherwise starts from [`Config::development`] in debug builds and
    /// [`Config::production`] in release builds, still honoring
    /// `TETHER_LOG_FORMAT` and `TETHER_LOG_COLORS`.
    #[must_use]
    pub fn auto() -> Self {
        Self::auto_from_lookup(|key| std::env::var(key).ok(), cfg!(debug_assertions))
    }

    pub(crate) fn auto_from_lookup(lookup: impl Fn(&str) -> Option<String>, debug: bool) -> Self {
        if lookup("TETHER_LOG").is_some() || lookup("RUST_LOG").is_some() {
            return Self::from_lookup(lookup);
        }
        let preset = if debug {
            Self::development()
        } else {
            Self::production()
        };
        preset.overlay(&lookup)
    }

    fn overlay(mut self, lookup: &impl Fn(&str) -> Option<String>) -> Self {
        if let Some(format) = lookup("TETHER_LOG_FORMAT") {
            self.format = Format::parse_lossy(&format);
        }
        if let Some(v) = lookup("TETHER_LOG_COLORS") {
            self.display.colors = v != "0" && v != "false";
        }
        self
    }

    /// Development configuration (pretty, debug level)
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            format: Format::Pretty,
            display: DisplayConfig {
                colors: true,
                source: true,
                ..DisplayConfig::default()
            },
            service: None,
        }
    }

    /// Production configuration (JSON, info level)
    #[must_use]
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            format: Format::Json,
            display: DisplayConfig {
                colors: false,
                source: false,
                flatten: true,
                ..DisplayConfig::default()
            },
            service: None,
        }
    }

    /// Set the service name
    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Set the level filter
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }
}
