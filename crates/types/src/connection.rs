/// Lifecycle of the realtime channel's underlying connection. Owned by the
/// channel, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Open,
    /// Transient state during intentional teardown.
    Closing,
}

impl ConnectionState {
    pub fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}
