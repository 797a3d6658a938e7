use async_trait::async_trait;
use courier_channel::{ChannelError, RealtimeChannel};
use courier_types::{ClientMessage, Decision};

/// Outbound path for accept/reject decisions. Seam over the realtime channel
/// so coordinator tests can record responses without a socket.
#[async_trait]
pub trait ResponseSink: Send + Sync {
    async fn send_response(&self, order_id: &str, decision: Decision) -> Result<(), ChannelError>;
}

#[async_trait]
impl ResponseSink for RealtimeChannel {
    async fn send_response(&self, order_id: &str, decision: Decision) -> Result<(), ChannelError> {
        self.send(&ClientMessage::OrderResponse {
            order_id: order_id.to_string(),
            response: decision,
        })
        .await
    }
}
