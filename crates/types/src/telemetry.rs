use chrono::{DateTime, Utc};

/// A single device position. Transient: forwarded to the backend and
/// discarded, never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    pub latitude: f64,
    pub longitude: f64,
    pub captured_at: DateTime<Utc>,
}

impl TelemetrySample {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            captured_at: Utc::now(),
        }
    }
}
