use serde::{Deserialize, Serialize};

/// Delivery progress for a single order.
///
/// The backend emits either `assigned` or `order_accepted` for a freshly
/// assigned order; both occupy the same slot in the transition chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Assigned,
    OrderAccepted,
    ChefArrived,
    PickedUp,
    NavigatingCustomer,
    CustomerArrived,
    Delivered,
}

impl DeliveryStatus {
    /// Collapse the `order_accepted` pseudo-state onto `assigned`.
    pub fn canonical(self) -> Self {
        match self {
            Self::OrderAccepted => Self::Assigned,
            other => other,
        }
    }

    /// The single legal next state, if any.
    pub fn successor(self) -> Option<Self> {
        match self.canonical() {
            Self::Assigned => Some(Self::ChefArrived),
            Self::ChefArrived => Some(Self::PickedUp),
            Self::PickedUp => Some(Self::NavigatingCustomer),
            Self::NavigatingCustomer => Some(Self::CustomerArrived),
            Self::CustomerArrived => Some(Self::Delivered),
            Self::Delivered => None,
            Self::OrderAccepted => unreachable!("canonicalized above"),
        }
    }

    /// Only forward, single-step transitions are legal.
    pub fn can_advance_to(self, next: Self) -> bool {
        self.successor() == Some(next.canonical())
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered)
    }

    /// `navigating_customer` reflects the driver's navigation intent and is
    /// never persisted to the backend.
    pub fn is_client_local(self) -> bool {
        matches!(self, Self::NavigatingCustomer)
    }

    /// UI label for the action that advances out of this state.
    pub fn advance_label(self) -> Option<&'static str> {
        match self.canonical() {
            Self::Assigned => Some("Arrived at Restaurant"),
            Self::ChefArrived => Some("Picked Up Order"),
            Self::PickedUp => Some("Navigate to Customer"),
            Self::NavigatingCustomer => Some("Arrived at Customer"),
            Self::CustomerArrived => Some("Complete Delivery"),
            _ => None,
        }
    }

    /// Wire name sent to the status-update endpoint.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::OrderAccepted => "order_accepted",
            Self::ChefArrived => "chef_arrived",
            Self::PickedUp => "picked_up",
            Self::NavigatingCustomer => "navigating_customer",
            Self::CustomerArrived => "customer_arrived",
            Self::Delivered => "delivered",
        }
    }

    /// Parse a backend status string. Returns `None` for vocabulary this
    /// client does not know; callers decide the fallback.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "assigned" => Some(Self::Assigned),
            "order_accepted" => Some(Self::OrderAccepted),
            "chef_arrived" => Some(Self::ChefArrived),
            "picked_up" | "picked" => Some(Self::PickedUp),
            "navigating_customer" => Some(Self::NavigatingCustomer),
            "customer_arrived" => Some(Self::CustomerArrived),
            "delivered" => Some(Self::Delivered),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_chain_is_single_step() {
        let chain = [
            DeliveryStatus::Assigned,
            DeliveryStatus::ChefArrived,
            DeliveryStatus::PickedUp,
            DeliveryStatus::NavigatingCustomer,
            DeliveryStatus::CustomerArrived,
            DeliveryStatus::Delivered,
        ];

        for pair in chain.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }

        // Skipping and moving backward are both illegal.
        assert!(!DeliveryStatus::Assigned.can_advance_to(DeliveryStatus::PickedUp));
        assert!(!DeliveryStatus::PickedUp.can_advance_to(DeliveryStatus::ChefArrived));
        assert!(!DeliveryStatus::Delivered.can_advance_to(DeliveryStatus::Assigned));
    }

    #[test]
    fn order_accepted_behaves_as_assigned() {
        assert!(DeliveryStatus::OrderAccepted.can_advance_to(DeliveryStatus::ChefArrived));
        assert_eq!(
            DeliveryStatus::OrderAccepted.canonical(),
            DeliveryStatus::Assigned
        );
    }

    #[test]
    fn delivered_is_terminal() {
        assert!(DeliveryStatus::Delivered.is_terminal());
        assert_eq!(DeliveryStatus::Delivered.successor(), None);
        assert_eq!(DeliveryStatus::Delivered.advance_label(), None);
    }

    #[test]
    fn navigating_customer_is_client_local() {
        assert!(DeliveryStatus::NavigatingCustomer.is_client_local());
        assert!(!DeliveryStatus::CustomerArrived.is_client_local());
    }

    #[test]
    fn parses_backend_vocabulary() {
        assert_eq!(
            DeliveryStatus::parse("chef_arrived"),
            Some(DeliveryStatus::ChefArrived)
        );
        // Legacy short form some backend builds emit.
        assert_eq!(DeliveryStatus::parse("picked"), Some(DeliveryStatus::PickedUp));
        assert_eq!(DeliveryStatus::parse("on_hold"), None);
    }
}
