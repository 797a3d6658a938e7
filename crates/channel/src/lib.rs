//! Realtime channel to the dispatch backend.
//!
//! One websocket per driver. Inbound frames are decoded into [`ChannelEvent`]s
//! and fanned out over an mpsc receiver; consumers never touch the socket.
//! Abnormal closure schedules a single fixed-delay reconnect attempt; an
//! intentional close (normal closure, code 1000) never reconnects.

mod channel;
mod error;
mod transport;

pub use channel::{ChannelEvent, RealtimeChannel};
pub use error::ChannelError;
pub use transport::{Connection, Frame, Transport, WsTransport, NORMAL_CLOSURE};
