use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Account role attached to a session. Anything the client does not
/// recognize maps to `Other` and never starts telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Delivery,
    Other,
}

impl Role {
    pub fn parse(s: &str) -> Self {
        if s == "delivery" {
            Self::Delivery
        } else {
            Self::Other
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delivery => "delivery",
            Self::Other => "other",
        }
    }
}

/// Authenticated driver session. Created from a login response or restored
/// from the credential store on cold start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub driver_id: String,
    pub bearer_token: String,
    pub role: Role,
    /// Cached driver profile, opaque to the core.
    #[serde(default)]
    pub profile: Option<Value>,
}

impl Session {
    pub fn new(driver_id: impl Into<String>, bearer_token: impl Into<String>, role: Role) -> Self {
        Self {
            driver_id: driver_id.into(),
            bearer_token: bearer_token.into(),
            role,
            profile: None,
        }
    }
}

/// Cross-component lifecycle signals delivered to the session manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSignal {
    /// The backend rejected authenticated calls repeatedly; the session is
    /// no longer valid and must be torn down.
    AuthExpired,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_roles_map_to_other() {
        assert_eq!(Role::parse("delivery"), Role::Delivery);
        assert_eq!(Role::parse("admin"), Role::Other);
        assert_eq!(Role::parse(""), Role::Other);
    }
}
