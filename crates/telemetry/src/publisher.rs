use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use courier_gateway::DispatchApi;
use courier_types::{Role, Session, SessionSignal, TelemetrySample};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::source::{LocationSource, PermissionProbe, TelemetryError};

/// Two consecutive credential rejections force a logout; a lone 401 amid
/// flaky connectivity does not.
const AUTH_FAILURE_THRESHOLD: u32 = 2;

#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub distance_filter_m: f64,
    pub interval: Duration,
    pub fastest_interval: Duration,
    /// Send a final `not_live` update with the last coordinates on stop.
    pub send_offline_on_stop: bool,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            distance_filter_m: 10.0,
            interval: Duration::from_secs(5),
            fastest_interval: Duration::from_secs(3),
            send_offline_on_stop: true,
        }
    }
}

struct ActiveWatch {
    forward: JoinHandle<()>,
    last_sample: Arc<StdMutex<Option<TelemetrySample>>>,
}

/// Forwards location samples for a delivery driver to the dispatch backend.
pub struct TelemetryPublisher {
    api: Arc<dyn DispatchApi>,
    source: Arc<dyn LocationSource>,
    permission: Arc<dyn PermissionProbe>,
    settings: WatchSettings,
    signals: mpsc::Sender<SessionSignal>,
    active: Mutex<Option<ActiveWatch>>,
}

impl TelemetryPublisher {
    pub fn new(
        api: Arc<dyn DispatchApi>,
        source: Arc<dyn LocationSource>,
        permission: Arc<dyn PermissionProbe>,
        settings: WatchSettings,
        signals: mpsc::Sender<SessionSignal>,
    ) -> Self {
        Self {
            api,
            source,
            permission,
            settings,
            signals,
            active: Mutex::new(None),
        }
    }

    /// Begin watching and forwarding. Returns `Ok(false)` when gated off:
    /// non-delivery role, denied permission, or a watch already running.
    pub async fn start(&self, session: &Session) -> Result<bool, TelemetryError> {
        if session.role != Role::Delivery {
            debug!("telemetry skipped for non-delivery role");
            return Ok(false);
        }

        let mut active = self.active.lock().await;
        if active.is_some() {
            debug!("telemetry watch already running");
            return Ok(false);
        }
        if !self.permission.location_granted().await {
            info!("location permission not granted, telemetry disabled");
            return Ok(false);
        }

        let mut samples = self.source.watch(&self.settings).await?;
        let last_sample = Arc::new(StdMutex::new(None));
        info!(driver_id = %session.driver_id, "telemetry watch started");

        let api = Arc::clone(&self.api);
        let signals = self.signals.clone();
        let last = Arc::clone(&last_sample);
        let forward = tokio::spawn(async move {
            let mut consecutive_unauthorized = 0u32;
            while let Some(sample) = samples.recv().await {
                *last.lock().unwrap_or_else(|e| e.into_inner()) = Some(sample.clone());
                match api.update_location(&sample, true).await {
                    Ok(()) => consecutive_unauthorized = 0,
                    Err(err) if err.is_unauthorized() => {
                        consecutive_unauthorized += 1;
                        warn!(
                            attempts = consecutive_unauthorized,
                            "location update rejected as unauthorized"
                        );
                        if consecutive_unauthorized >= AUTH_FAILURE_THRESHOLD {
                            let _ = signals.send(SessionSignal::AuthExpired).await;
                            return;
                        }
                    }
                    Err(err) => {
                        // Transient failure; the watch stays alive.
                        consecutive_unauthorized = 0;
                        warn!(%err, "location update failed");
                    }
                }
            }
        });

        *active = Some(ActiveWatch {
            forward,
            last_sample,
        });
        Ok(true)
    }

    pub async fn is_active(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// Cancel the watch. Safe to call repeatedly; optionally tells the
    /// backend the driver went offline, best effort.
    pub async fn stop(&self) {
        let Some(watch) = self.active.lock().await.take() else {
            return;
        };
        watch.forward.abort();
        info!("telemetry watch stopped");

        if self.settings.send_offline_on_stop {
            let last = watch
                .last_sample
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone();
            if let Some(sample) = last {
                if let Err(err) = self.api.update_location(&sample, false).await {
                    debug!(%err, "final offline update failed");
                }
            }
        }
    }
}
