pub mod connection;
pub mod message;
pub mod order;
pub mod session;
pub mod status;
pub mod telemetry;

pub use connection::*;
pub use message::*;
pub use order::*;
pub use session::*;
pub use status::*;
pub use telemetry::*;
