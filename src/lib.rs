//! Session and order-coordination core for a delivery-driver client.
//!
//! The workspace splits one concern per crate; this root crate re-exports the
//! public surface and owns the tracing bootstrap.

pub use courier_channel::{ChannelError, ChannelEvent, RealtimeChannel, WsTransport};
pub use courier_config::{AppConfig, ConfigError, ConfigLoader};
pub use courier_gateway::{DispatchApi, GatewayError, RestGateway};
pub use courier_orders::{CoordinatorError, OrderCoordinator, OrdersView, ResponseSink};
pub use courier_session::{
    AppPhase, CredentialStore, FileStore, MemoryStore, SessionError, SessionManager,
    SessionManagerBuilder, StoreError,
};
pub use courier_telemetry::{
    LocationSource, PermissionProbe, TelemetryError, TelemetryPublisher, WatchSettings,
};
pub use courier_types as types;

use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Error)]
pub enum TracingInitError {
    #[error("tracing init failed: {0}")]
    Init(String),
}

/// Initialize structured logging. `RUST_LOG` overrides `default_directives`
/// (typically the configured `[log] level`).
pub fn init_tracing(default_directives: &str) -> Result<(), TracingInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    let fmt_layer = fmt::layer().with_target(true).with_level(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| TracingInitError::Init(e.to_string()))
}
