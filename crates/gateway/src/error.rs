use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// An operation requiring a session was attempted without one.
    /// Fails fast, no network call is made.
    #[error("no active session")]
    AuthMissing,

    #[error("request failed: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response shape: {0}")]
    Decode(String),
}

impl GatewayError {
    /// HTTP status code, when the failure carries one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport { source } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True when the backend rejected our credentials.
    pub fn is_unauthorized(&self) -> bool {
        self.status_code() == Some(401)
    }
}
