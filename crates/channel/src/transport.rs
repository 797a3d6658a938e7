use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::ChannelError;

/// Websocket close code for an intentional shutdown.
pub const NORMAL_CLOSURE: u16 = 1000;

/// A single inbound unit from the socket, after protocol frames
/// (ping/pong, binary) have been filtered out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Closed { code: Option<u16> },
}

/// Dials a websocket endpoint. The seam that lets tests script connections.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>, ChannelError>;
}

/// One live socket.
#[async_trait]
pub trait Connection: Send {
    async fn send(&mut self, text: String) -> Result<(), ChannelError>;

    /// Next frame, or `None` when the peer is gone without a close frame.
    async fn next(&mut self) -> Option<Result<Frame, ChannelError>>;

    async fn close(&mut self, code: u16) -> Result<(), ChannelError>;
}

/// Production transport over tokio-tungstenite.
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>, ChannelError> {
        let (stream, _response) = connect_async(url).await?;
        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WsConnection {
    async fn send(&mut self, text: String) -> Result<(), ChannelError> {
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn next(&mut self) -> Option<Result<Frame, ChannelError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(Frame::Text(text))),
                Ok(Message::Close(frame)) => {
                    let code = frame.map(|f| u16::from(f.code));
                    return Some(Ok(Frame::Closed { code }));
                }
                // tungstenite answers protocol pings itself; binary frames
                // are not part of this protocol.
                Ok(_) => continue,
                Err(err) => return Some(Err(err.into())),
            }
        }
    }

    async fn close(&mut self, code: u16) -> Result<(), ChannelError> {
        self.stream
            .close(Some(CloseFrame {
                code: code.into(),
                reason: "".into(),
            }))
            .await?;
        Ok(())
    }
}
