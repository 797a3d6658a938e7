use async_trait::async_trait;
use courier_types::TelemetrySample;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::publisher::WatchSettings;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("location watch failed: {0}")]
    Watch(String),
}

/// Platform location watcher seam. The watch ends when the returned receiver
/// is dropped.
#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn watch(
        &self,
        settings: &WatchSettings,
    ) -> Result<mpsc::Receiver<TelemetrySample>, TelemetryError>;
}

/// Platform permission seam. Prompting the user is the platform's business;
/// the publisher only needs the outcome.
#[async_trait]
pub trait PermissionProbe: Send + Sync {
    async fn location_granted(&self) -> bool;
}
