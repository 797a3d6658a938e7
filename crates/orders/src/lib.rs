//! Order state coordinator.
//!
//! Owns the authoritative ongoing/history collections and the incoming-request
//! staging list. Refreshes are sequenced last-issued-wins, push events are
//! treated as invalidation signals, and every mutation publishes a complete
//! [`OrdersView`] snapshot over a watch channel.

mod coordinator;
mod error;
mod sink;
mod view;

pub use coordinator::OrderCoordinator;
pub use error::CoordinatorError;
pub use sink::ResponseSink;
pub use view::OrdersView;
