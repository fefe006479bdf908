//! Layered pool config: defaults, then a TOML file, then `TETHER_` env vars.

use std::path::Path;

use anyhow::Context;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use tether_pool::{BackendConfig, PoolConfig};

/// Variables under the `TETHER_` prefix that belong to the CLI or logger.
const RESERVED: &[&str] = &["config", "log", "log_format", "log_colors"];

fn defaults() -> PoolConfig {
    PoolConfig {
        name: "tether".to_string(),
        ..PoolConfig::new(BackendConfig::new("memory", "echo"))
    }
}

fn figment(path: Option<&Path>) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(defaults()));
    if let Some(path) = path {
        figment = figment.merge(Toml::file(path));
    }
    // Nested keys use a double underscore: TETHER_BACKEND__ENTRY_POINT.
    figment.merge(Env::prefixed("TETHER_").ignore(RESERVED).split("__"))
}

/// Load, normalize and validate the pool config.
pub fn load(path: Option<&Path>) -> anyhow::Result<PoolConfig> {
    if let Some(path) = path {
        anyhow::ensure!(path.exists(), "config file {} not found", path.display());
    }
    let config: PoolConfig = figment(path)
        .extract()
        .context("failed to load pool config")?;
    let config = config.normalize();
    config.validate().context("invalid pool config")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use figment::Jail;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        Jail::expect_with(|_jail| {
            let config = load(None).unwrap();
            assert_eq!(config.name, "tether");
            assert_eq!(config.backend.entry_point, "echo");
            assert_eq!(config.max_size, 1);
            Ok(())
        });
    }

    #[test]
    fn file_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "pool.toml",
                r#"
                    name = "web"
                    min_size = 2
                    max_size = 4
                    wait_timeout = "250ms"

                    [backend]
                    connection = "srv=local"
                    entry_point = "WebAPI"
                "#,
            )?;
            jail.set_env("TETHER_MAX_SIZE", "6");
            jail.set_env("TETHER_BACKEND__CONNECTION", "srv=remote");
            jail.set_env("TETHER_LOG", "debug");

            let config = load(Some(Path::new("pool.toml"))).unwrap();
            assert_eq!(config.name, "web");
            assert_eq!(config.min_size, 2);
            assert_eq!(config.max_size, 6);
            assert_eq!(config.wait_timeout, Duration::from_millis(250));
            assert_eq!(config.backend.connection, "srv=remote");
            assert_eq!(config.backend.entry_point, "WebAPI");
            Ok(())
        });
    }

    #[test]
    fn values_are_normalized() {
        Jail::expect_with(|jail| {
            jail.create_file("pool.toml", "min_size = 9\nmax_size = 3\nqueue_capacity = 0")?;
            let config = load(Some(Path::new("pool.toml"))).unwrap();
            assert_eq!(config.min_size, 3);
            assert_eq!(config.queue_capacity, 100);
            Ok(())
        });
    }

    #[test]
    fn empty_entry_point_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("pool.toml", "[backend]\nentry_point = \"\"")?;
            let err = load(Some(Path::new("pool.toml"))).unwrap_err();
            assert!(format!("{err:#}").contains("entry_point"));
            Ok(())
        });
    }

    #[test]
    fn missing_file_is_an_error() {
        Jail::expect_with(|_jail| {
            assert!(load(Some(Path::new("absent.toml"))).is_err());
            Ok(())
        });
    }
}
