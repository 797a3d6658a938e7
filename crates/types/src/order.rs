use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::status::DeliveryStatus;

/// Order payload as the dispatch backend sends it. Field names vary between
/// backend builds, so everything beyond the id is optional and unmodeled
/// fields are retained in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawOrder {
    #[serde(alias = "_id")]
    pub id: String,

    #[serde(default)]
    pub chef: Option<Value>,

    #[serde(default)]
    pub customer: Option<PartyRef>,

    /// Some builds call the customer record `user`.
    #[serde(default)]
    pub user: Option<PartyRef>,

    #[serde(default)]
    pub address: Option<AddressRef>,

    #[serde(default)]
    pub items: Option<Value>,

    #[serde(default)]
    pub total_price: Option<f64>,

    #[serde(default)]
    pub total: Option<f64>,

    #[serde(default)]
    pub delivery_status: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Chef or customer reference inside an order payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PartyRef {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, alias = "phone_number")]
    pub phone: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AddressRef {
    #[serde(default)]
    pub label: Option<String>,

    /// `[longitude, latitude]`, GeoJSON order.
    #[serde(default)]
    pub coordinates: Option<[f64; 2]>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Normalized order held by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: String,
    /// Short display number: last 5 characters of the id, uppercased.
    pub order_number: String,
    pub customer_label: String,
    pub total_amount: f64,
    pub status: DeliveryStatus,
    pub placed_at: Option<DateTime<Utc>>,
    pub last_updated_at: DateTime<Utc>,
    pub raw: RawOrder,
}

impl Order {
    /// Normalize a backend payload.
    ///
    /// Fallback chains: customer name (unless absent or the backend's
    /// `"Unknown"` placeholder) -> address label -> `"Customer"`; amount
    /// `total_price` -> `total` -> 0; unknown status vocabulary -> `assigned`.
    pub fn from_raw(raw: RawOrder, now: DateTime<Utc>) -> Self {
        // Last five characters, not bytes; ids are usually hex but the
        // backend does not guarantee ASCII.
        let order_number = raw
            .id
            .char_indices()
            .rev()
            .nth(4)
            .map(|(idx, _)| raw.id[idx..].to_uppercase())
            .unwrap_or_else(|| "N/A".to_string());

        let customer_label = raw
            .customer
            .as_ref()
            .or(raw.user.as_ref())
            .and_then(|p| p.name.as_deref())
            .filter(|name| !name.is_empty() && *name != "Unknown")
            .map(str::to_string)
            .or_else(|| {
                raw.address
                    .as_ref()
                    .and_then(|a| a.label.clone())
            })
            .unwrap_or_else(|| "Customer".to_string());

        let total_amount = raw.total_price.or(raw.total).unwrap_or(0.0);

        let status_text = raw.delivery_status.as_deref().or(raw.status.as_deref());
        let status = match status_text.map(DeliveryStatus::parse) {
            Some(Some(status)) => status,
            Some(None) => {
                warn!(
                    order_id = %raw.id,
                    status = status_text.unwrap_or_default(),
                    "unknown delivery status, treating as assigned"
                );
                DeliveryStatus::Assigned
            }
            None => DeliveryStatus::Assigned,
        };

        Self {
            id: raw.id.clone(),
            order_number,
            customer_label,
            total_amount,
            status,
            placed_at: raw.created_at,
            last_updated_at: now,
            raw,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
