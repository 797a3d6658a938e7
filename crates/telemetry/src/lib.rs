//! Location telemetry publisher.
//!
//! Gates a platform location watch behind role and permission, forwards each
//! sample to the dispatch backend, and flags the session as invalid after two
//! consecutive 401 rejections.

mod publisher;
mod source;

pub use publisher::{TelemetryPublisher, WatchSettings};
pub use source::{LocationSource, PermissionProbe, TelemetryError};
