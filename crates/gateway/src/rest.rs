use async_trait::async_trait;
use courier_types::{DeliveryStatus, RawOrder, TelemetrySample};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::api::{DispatchApi, LoginResponse, OrdersSnapshot};
use crate::GatewayError;

/// Authenticated HTTP client bound to the dispatch backend.
pub struct RestGateway {
    base_url: String,
    client: reqwest::Client,
    token: RwLock<Option<String>>,
}

impl RestGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            token: RwLock::new(None),
        })
    }

    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = Some(token.into());
    }

    pub fn clear_token(&self) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn has_token(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    fn bearer(&self) -> Result<String, GatewayError> {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(GatewayError::AuthMissing)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, GatewayError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Log in by phone number. The only unauthenticated operation.
    pub async fn login(&self, phone_number: &str) -> Result<LoginResponse, GatewayError> {
        #[derive(Serialize)]
        struct LoginRequest<'a> {
            phone_number: &'a str,
        }

        let response = self
            .execute(
                self.client
                    .post(self.url("/delivery/users"))
                    .json(&LoginRequest { phone_number }),
            )
            .await?;

        let login: LoginResponse = response.json().await?;
        debug!(driver_id = %login.id, new = login.is_new, "login succeeded");
        Ok(login)
    }
}

/// The backend ships two order-list shapes; tolerate both.
#[derive(Deserialize)]
#[serde(untagged)]
enum OrdersPayload {
    Flat {
        orders: Vec<RawOrder>,
    },
    Split {
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        ongoing_orders: Vec<RawOrder>,
        #[serde(default)]
        past_orders: Vec<RawOrder>,
    },
}

#[derive(Deserialize)]
struct TrackPayload {
    #[serde(default)]
    order: Option<RawOrder>,
}

fn raw_is_terminal(raw: &RawOrder) -> bool {
    raw.delivery_status
        .as_deref()
        .or(raw.status.as_deref())
        .and_then(DeliveryStatus::parse)
        .map(DeliveryStatus::is_terminal)
        .unwrap_or(false)
}

impl OrdersPayload {
    fn into_snapshot(self) -> OrdersSnapshot {
        match self {
            Self::Flat { orders } => {
                let (past, ongoing) = orders.into_iter().partition(raw_is_terminal);
                OrdersSnapshot { ongoing, past }
            }
            Self::Split {
                status,
                ongoing_orders,
                past_orders,
            } => {
                if let Some(status) = status.as_deref() {
                    if status != "success" {
                        warn!(status, "orders fetch reported non-success");
                        return OrdersSnapshot::default();
                    }
                }
                OrdersSnapshot {
                    ongoing: ongoing_orders,
                    past: past_orders,
                }
            }
        }
    }
}

#[async_trait]
impl DispatchApi for RestGateway {
    async fn fetch_orders(&self) -> Result<OrdersSnapshot, GatewayError> {
        let token = self.bearer()?;
        let response = self
            .execute(
                self.client
                    .get(self.url("/deliveryboy/orders"))
                    .bearer_auth(token),
            )
            .await?;

        let payload: OrdersPayload = response.json().await?;
        let snapshot = payload.into_snapshot();
        debug!(
            ongoing = snapshot.ongoing.len(),
            past = snapshot.past.len(),
            "orders fetched"
        );
        Ok(snapshot)
    }

    async fn fetch_profile(&self) -> Result<Value, GatewayError> {
        let token = self.bearer()?;
        let response = self
            .execute(self.client.get(self.url("/deliveryme")).bearer_auth(token))
            .await?;
        Ok(response.json().await?)
    }

    async fn track_order(&self, order_id: &str) -> Result<RawOrder, GatewayError> {
        let token = self.bearer()?;
        let response = self
            .execute(
                self.client
                    .get(self.url(&format!("/deliveryordertrack/{order_id}")))
                    .bearer_auth(token),
            )
            .await?;

        let payload: TrackPayload = response.json().await?;
        payload
            .order
            .ok_or_else(|| GatewayError::Decode(format!("no order in track response for {order_id}")))
    }

    async fn update_status(
        &self,
        order_id: &str,
        status: DeliveryStatus,
    ) -> Result<(), GatewayError> {
        #[derive(Serialize)]
        struct StatusBody<'a> {
            status: &'a str,
        }

        let token = self.bearer()?;
        self.execute(
            self.client
                .put(self.url(&format!("/orderdeliveryupdate/{order_id}/status")))
                .bearer_auth(token)
                .json(&StatusBody {
                    status: status.as_str(),
                }),
        )
        .await?;
        Ok(())
    }

    async fn update_location(
        &self,
        sample: &TelemetrySample,
        live: bool,
    ) -> Result<(), GatewayError> {
        #[derive(Serialize)]
        struct LocationBody {
            latitude: f64,
            longitude: f64,
            #[serde(skip_serializing_if = "Option::is_none")]
            status: Option<&'static str>,
        }

        let token = self.bearer()?;
        self.execute(
            self.client
                .post(self.url("/delivery/update-location"))
                .bearer_auth(token)
                .json(&LocationBody {
                    latitude: sample.latitude,
                    longitude: sample.longitude,
                    status: (!live).then_some("not_live"),
                }),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gateway() -> RestGateway {
        RestGateway::new("http://localhost:1/api/", Duration::from_millis(200)).unwrap()
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let gw = gateway();
        assert_eq!(gw.url("/deliveryme"), "http://localhost:1/api/deliveryme");
    }

    #[tokio::test]
    async fn authed_calls_fail_fast_without_token() {
        let gw = gateway();
        let err = gw.fetch_orders().await.unwrap_err();
        assert!(matches!(err, GatewayError::AuthMissing));

        let err = gw
            .update_status("o-1", DeliveryStatus::ChefArrived)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::AuthMissing));

        let err = gw.track_order("o-1").await.unwrap_err();
        assert!(matches!(err, GatewayError::AuthMissing));
    }

    #[test]
    fn split_payload_shape() {
        let payload: OrdersPayload = serde_json::from_value(json!({
            "status": "success",
            "ongoing_orders": [{ "_id": "abc12345", "delivery_status": "assigned" }],
            "past_orders": [{ "_id": "def67890", "delivery_status": "delivered" }]
        }))
        .unwrap();

        let snapshot = payload.into_snapshot();
        assert_eq!(snapshot.ongoing.len(), 1);
        assert_eq!(snapshot.past.len(), 1);
        assert_eq!(snapshot.ongoing[0].id, "abc12345");
    }

    #[test]
    fn flat_payload_partitions_by_terminal_status() {
        let payload: OrdersPayload = serde_json::from_value(json!({
            "orders": [
                { "id": "a1", "status": "picked_up" },
                { "id": "a2", "status": "delivered" },
                { "id": "a3" }
            ]
        }))
        .unwrap();

        let snapshot = payload.into_snapshot();
        assert_eq!(snapshot.ongoing.len(), 2);
        assert_eq!(snapshot.past.len(), 1);
        assert_eq!(snapshot.past[0].id, "a2");
    }

    #[test]
    fn non_success_split_payload_is_empty() {
        let payload: OrdersPayload = serde_json::from_value(json!({
            "status": "error",
            "ongoing_orders": [{ "_id": "abc12345" }]
        }))
        .unwrap();

        let snapshot = payload.into_snapshot();
        assert!(snapshot.ongoing.is_empty());
        assert!(snapshot.past.is_empty());
    }
}
