//! Configuration for the courier delivery core.

mod config;
mod loader;

pub use self::config::{ApiConfig, AppConfig, LogConfig, RealtimeConfig, TelemetryConfig};
pub use self::loader::ConfigLoader;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ::config::ConfigError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
