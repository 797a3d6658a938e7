use async_trait::async_trait;
use courier_types::{DeliveryStatus, RawOrder, TelemetrySample};
use serde::Deserialize;
use serde_json::Value;

use crate::GatewayError;

/// Successful login payload from `POST /delivery/users`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    /// Driver id; the backend sends this as either a string or a number.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub token: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "new")]
    pub is_new: bool,
}

/// Raw order sets as fetched from the backend, pre-normalization.
#[derive(Debug, Clone, Default)]
pub struct OrdersSnapshot {
    pub ongoing: Vec<RawOrder>,
    pub past: Vec<RawOrder>,
}

/// Dispatch operations consumed by the coordinator and telemetry publisher.
#[async_trait]
pub trait DispatchApi: Send + Sync {
    /// Fetch the full ongoing + past order sets.
    async fn fetch_orders(&self) -> Result<OrdersSnapshot, GatewayError>;

    /// Fetch the driver profile (opaque to the core).
    async fn fetch_profile(&self) -> Result<Value, GatewayError>;

    /// Fetch a single order's detail.
    async fn track_order(&self, order_id: &str) -> Result<RawOrder, GatewayError>;

    /// Advance an order's delivery status.
    async fn update_status(
        &self,
        order_id: &str,
        status: DeliveryStatus,
    ) -> Result<(), GatewayError>;

    /// Forward a location sample. `live` is false only for the optional
    /// final courtesy update when tracking stops.
    async fn update_location(
        &self,
        sample: &TelemetrySample,
        live: bool,
    ) -> Result<(), GatewayError>;
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}
