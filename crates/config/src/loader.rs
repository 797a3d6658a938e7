//! Configuration loading from files and the environment

use crate::{AppConfig, ConfigError, Result};
use ::config::{Config, Environment, File};
use std::path::Path;

/// Environment variable prefix, e.g. `COURIER__API__BASE_URL`.
const ENV_PREFIX: &str = "COURIER";

/// Section separator for environment keys. Double underscore, since field
/// names themselves contain single underscores.
const ENV_SEPARATOR: &str = "__";

/// Configuration loader. A client core reads its configuration once at
/// startup; there is no hot reload.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<AppConfig> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<AppConfig> {
        toml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration from `COURIER__*` environment variables
    pub fn from_env() -> Result<AppConfig> {
        let config = Config::builder()
            .add_source(Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR))
            .build()?;

        config.try_deserialize().map_err(ConfigError::from)
    }

    /// Load configuration from a file, with environment variables layered on
    /// top taking precedence.
    pub fn from_file_with_env(path: &Path) -> Result<AppConfig> {
        let config = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR))
            .build()?;

        config.try_deserialize().map_err(ConfigError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_toml() {
        let toml = r#"
            [api]
            base_url = "https://dispatch.example.com/api"
            timeout_ms = 10000

            [realtime]
            url = "wss://dispatch.example.com/api/ws/delivery"
            reconnect_delay_ms = 2500

            [telemetry]
            distance_filter_m = 25.0
        "#;

        let config = ConfigLoader::from_toml(toml).unwrap();
        assert_eq!(config.api.base_url, "https://dispatch.example.com/api");
        assert_eq!(config.api.timeout_ms, 10_000);
        assert_eq!(config.realtime.reconnect_delay_ms, 2_500);
        assert_eq!(config.telemetry.distance_filter_m, 25.0);
        // Unspecified fields keep their defaults.
        assert_eq!(config.telemetry.interval_ms, 5_000);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_empty_toml_is_all_defaults() {
        let config = ConfigLoader::from_toml("").unwrap();
        assert_eq!(config.api.timeout_ms, 15_000);
        assert_eq!(config.realtime.reconnect_delay_ms, 5_000);
    }

    #[test]
    fn test_load_from_file() {
        let toml = r#"
            [api]
            base_url = "https://staging.example.com/api"

            [log]
            level = "debug"
        "#;

        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(toml.as_bytes()).unwrap();

        let config = ConfigLoader::from_file(file.path()).unwrap();
        assert_eq!(config.api.base_url, "https://staging.example.com/api");
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_file_with_env_override() {
        let toml = r#"
            [api]
            base_url = "https://file.example.com/api"
            timeout_ms = 9000
        "#;

        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(toml.as_bytes()).unwrap();

        std::env::set_var("COURIER__API__BASE_URL", "https://env.example.com/api");
        let config = ConfigLoader::from_file_with_env(file.path()).unwrap();
        std::env::remove_var("COURIER__API__BASE_URL");

        assert_eq!(config.api.base_url, "https://env.example.com/api");
        // Untouched file values survive the overlay.
        assert_eq!(config.api.timeout_ms, 9_000);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(ConfigLoader::from_toml("[api\nbase_url = ").is_err());
    }
}
