use serde::{Deserialize, Serialize};

/// Driver decision for an incoming order request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Reject,
}

/// Server-pushed realtime message. Push events are invalidation signals, not
/// deltas; the REST snapshot stays authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    OrderRequest {
        order_id: String,
    },
    OrderAccepted {
        order_id: String,
    },
    OrderStatus {
        #[serde(default)]
        order_id: Option<String>,
    },
    OrderUpdate {
        #[serde(default)]
        order_id: Option<String>,
    },
}

/// Client-to-server realtime message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    OrderResponse {
        order_id: String,
        response: Decision,
    },
}
