use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    /// Outbound send attempted while the socket is not open.
    #[error("channel is not connected")]
    NotConnected,

    #[error("websocket transport failed: {source}")]
    Transport {
        #[from]
        source: tokio_tungstenite::tungstenite::Error,
    },

    #[error("encode failed: {source}")]
    Encode {
        #[from]
        source: serde_json::Error,
    },
}
