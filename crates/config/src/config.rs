//! Core configuration structures for the courier delivery core

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Dispatch REST API
    #[serde(default)]
    pub api: ApiConfig,

    /// Realtime channel
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Location telemetry
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Logging
    #[serde(default)]
    pub log: LogConfig,
}

/// REST gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the dispatch backend (e.g. "https://dispatch.example.com/api")
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_api_timeout_ms")]
    pub timeout_ms: u64,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Realtime channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// WebSocket base URL; the driver id is appended per connection
    /// (e.g. "wss://dispatch.example.com/api/ws/delivery")
    #[serde(default = "default_realtime_url")]
    pub url: String,

    /// Fixed delay before a reconnect attempt, in milliseconds
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

impl RealtimeConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Location telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Minimum movement in meters before a new sample is emitted
    #[serde(default = "default_distance_filter_m")]
    pub distance_filter_m: f64,

    /// Nominal sampling interval in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Faster interval used when updates are needed sooner
    #[serde(default = "default_fastest_interval_ms")]
    pub fastest_interval_ms: u64,

    /// Send a final "not live" location update when tracking stops
    #[serde(default = "default_true")]
    pub send_offline_on_stop: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            timeout_ms: default_api_timeout_ms(),
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: default_realtime_url(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            distance_filter_m: default_distance_filter_m(),
            interval_ms: default_interval_ms(),
            fastest_interval_ms: default_fastest_interval_ms(),
            send_offline_on_stop: true,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_api_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_api_timeout_ms() -> u64 {
    15_000
}

fn default_realtime_url() -> String {
    "ws://localhost:8000/api/ws/delivery".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    5_000
}

fn default_distance_filter_m() -> f64 {
    10.0
}

fn default_interval_ms() -> u64 {
    5_000
}

fn default_fastest_interval_ms() -> u64 {
    3_000
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}
