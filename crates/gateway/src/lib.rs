//! REST gateway to the dispatch backend.
//!
//! `RestGateway` owns the HTTP client, base URL, and bearer token.
//! `DispatchApi` is the seam the coordinator and telemetry publisher consume,
//! so tests can substitute a scripted backend.

mod api;
mod error;
mod rest;

pub use api::{DispatchApi, LoginResponse, OrdersSnapshot};
pub use error::GatewayError;
pub use rest::RestGateway;
