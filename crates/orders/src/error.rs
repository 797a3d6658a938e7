use courier_channel::ChannelError;
use courier_gateway::GatewayError;
use courier_types::DeliveryStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("unknown order {order_id}")]
    UnknownOrder { order_id: String },

    #[error("illegal status transition {from} -> {to}")]
    InvalidTransition {
        from: DeliveryStatus,
        to: DeliveryStatus,
    },

    /// A status update for this order is already in flight.
    #[error("transition already in progress for order {order_id}")]
    TransitionInProgress { order_id: String },

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}
