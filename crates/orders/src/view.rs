use courier_types::Order;

/// Complete snapshot published to observers. Always whole, never a delta.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrdersView {
    pub ongoing: Vec<Order>,
    pub history: Vec<Order>,
    /// Order ids awaiting an accept/reject decision.
    pub incoming: Vec<String>,
    /// Most recently accepted order, for UI highlight.
    pub just_accepted: Option<String>,
}
