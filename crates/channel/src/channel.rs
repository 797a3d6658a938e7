use std::sync::Arc;
use std::time::Duration;

use courier_types::{ClientMessage, ConnectionState, ServerMessage};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::transport::{Connection, Frame, Transport, NORMAL_CLOSURE};
use crate::ChannelError;

/// What the channel tells its consumer. Decoded, never raw frames.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Opened,
    Message(ServerMessage),
    Closed { code: Option<u16> },
}

enum IoCommand {
    Send(String),
    Close,
}

/// Driver-scoped realtime channel. Cheap to clone; all clones share the
/// same connection.
#[derive(Clone)]
pub struct RealtimeChannel {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Box<dyn Transport>,
    base_url: String,
    reconnect_delay: Duration,
    events: mpsc::Sender<ChannelEvent>,
    core: Mutex<Core>,
}

#[derive(Default)]
struct Core {
    state: ConnectionState,
    driver_id: Option<String>,
    session_active: bool,
    /// Bumped per dial; a retired connection's teardown carries a stale
    /// generation and is ignored.
    generation: u64,
    outbound: Option<mpsc::Sender<IoCommand>>,
    io_task: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
}

impl RealtimeChannel {
    /// Build a channel against `base_url` (the driver id is appended per
    /// connection). Returns the event receiver alongside.
    pub fn new(
        transport: Box<dyn Transport>,
        base_url: impl Into<String>,
        reconnect_delay: Duration,
    ) -> (Self, mpsc::Receiver<ChannelEvent>) {
        let (events, rx) = mpsc::channel(64);
        let channel = Self {
            inner: Arc::new(Inner {
                transport,
                base_url: base_url.into().trim_end_matches('/').to_string(),
                reconnect_delay,
                events,
                core: Mutex::new(Core::default()),
            }),
        };
        (channel, rx)
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.core.lock().await.state
    }

    /// Open (or replace) the socket for `driver_id`. Cancels any pending
    /// reconnect first; a replaced connection is torn down silently.
    pub async fn connect(&self, driver_id: &str) -> Result<(), ChannelError> {
        let mut core = self.inner.core.lock().await;
        core.session_active = true;
        core.driver_id = Some(driver_id.to_string());
        if let Some(pending) = core.reconnect.take() {
            pending.abort();
        }
        self.open_locked(&mut core).await
    }

    /// Intentional teardown. Sends a normal closure and suppresses reconnect.
    pub async fn disconnect(&self) {
        let mut core = self.inner.core.lock().await;
        core.session_active = false;
        if let Some(pending) = core.reconnect.take() {
            pending.abort();
        }
        if core.state == ConnectionState::Disconnected {
            return;
        }
        match core.outbound.clone() {
            Some(tx) => {
                core.state = ConnectionState::Closing;
                let _ = tx.try_send(IoCommand::Close);
            }
            None => core.state = ConnectionState::Disconnected,
        }
    }

    /// Queue an outbound message. Fails unless the socket is open.
    pub async fn send(&self, message: &ClientMessage) -> Result<(), ChannelError> {
        let tx = {
            let core = self.inner.core.lock().await;
            if !core.state.is_open() {
                return Err(ChannelError::NotConnected);
            }
            core.outbound.clone().ok_or(ChannelError::NotConnected)?
        };
        let text = serde_json::to_string(message)?;
        tx.send(IoCommand::Send(text))
            .await
            .map_err(|_| ChannelError::NotConnected)
    }

    async fn open_locked(&self, core: &mut Core) -> Result<(), ChannelError> {
        let driver_id = core.driver_id.clone().ok_or(ChannelError::NotConnected)?;
        // Retire any live connection: its IO task sends the normal closure
        // and winds down on its own. Dropping the sender covers a full
        // command buffer, and the generation bump keeps the retired
        // teardown from emitting events or touching the replacement.
        if let Some(tx) = core.outbound.take() {
            let _ = tx.try_send(IoCommand::Close);
        }
        core.io_task = None;
        core.generation += 1;
        let generation = core.generation;

        core.state = ConnectionState::Connecting;
        let url = format!("{}/{}", self.inner.base_url, driver_id);
        let mut conn = match self.inner.transport.connect(&url).await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(%err, %url, "connect failed");
                core.state = ConnectionState::Disconnected;
                if core.session_active {
                    self.schedule_reconnect_locked(core);
                }
                return Err(err);
            }
        };

        // Greet the server so it registers this driver right away.
        let ping = serde_json::to_string(&ClientMessage::Ping)?;
        if let Err(err) = conn.send(ping).await {
            warn!(%err, "greeting failed");
            core.state = ConnectionState::Disconnected;
            if core.session_active {
                self.schedule_reconnect_locked(core);
            }
            return Err(err);
        }

        info!(%driver_id, "channel open");
        core.state = ConnectionState::Open;
        let (out_tx, out_rx) = mpsc::channel(32);
        core.outbound = Some(out_tx);
        let chan = self.clone();
        core.io_task = Some(tokio::spawn(async move {
            chan.run_io(generation, conn, out_rx).await;
        }));
        let _ = self.inner.events.send(ChannelEvent::Opened).await;
        Ok(())
    }

    async fn run_io(
        self,
        generation: u64,
        mut conn: Box<dyn Connection>,
        mut commands: mpsc::Receiver<IoCommand>,
    ) {
        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(IoCommand::Send(text)) => {
                        if let Err(err) = conn.send(text).await {
                            warn!(%err, "outbound send failed");
                            self.on_closed(generation, None).await;
                            return;
                        }
                    }
                    Some(IoCommand::Close) | None => {
                        let _ = conn.close(NORMAL_CLOSURE).await;
                        self.on_closed(generation, Some(NORMAL_CLOSURE)).await;
                        return;
                    }
                },
                frame = conn.next() => match frame {
                    Some(Ok(Frame::Text(text))) => self.on_text(&text).await,
                    Some(Ok(Frame::Closed { code })) => {
                        self.on_closed(generation, code).await;
                        return;
                    }
                    Some(Err(err)) => {
                        warn!(%err, "socket error");
                        self.on_closed(generation, None).await;
                        return;
                    }
                    None => {
                        self.on_closed(generation, None).await;
                        return;
                    }
                },
            }
        }
    }

    async fn on_text(&self, text: &str) {
        match serde_json::from_str::<ServerMessage>(text) {
            Ok(message) => {
                let _ = self.inner.events.send(ChannelEvent::Message(message)).await;
            }
            Err(err) => warn!(%err, "dropping malformed frame"),
        }
    }

    async fn on_closed(&self, generation: u64, code: Option<u16>) {
        let mut core = self.inner.core.lock().await;
        if generation != core.generation || core.state == ConnectionState::Disconnected {
            return;
        }
        core.state = ConnectionState::Disconnected;
        core.outbound = None;
        core.io_task = None;
        let _ = self.inner.events.send(ChannelEvent::Closed { code }).await;
        if core.session_active && code != Some(NORMAL_CLOSURE) {
            self.schedule_reconnect_locked(&mut core);
        }
    }

    /// Arm a single delayed reconnect. No-op when one is already pending.
    fn schedule_reconnect_locked(&self, core: &mut Core) {
        if core.reconnect.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        let delay = self.inner.reconnect_delay;
        debug!(delay_ms = delay.as_millis() as u64, "reconnect scheduled");
        let chan = self.clone();
        core.reconnect = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            chan.attempt_reconnect().await;
        }));
    }

    async fn attempt_reconnect(&self) {
        let mut core = self.inner.core.lock().await;
        // This task was the pending attempt; clear it so a failure can arm
        // the next one.
        core.reconnect = None;
        if !core.session_active || core.state.is_open() {
            return;
        }
        if let Err(err) = self.open_locked(&mut core).await {
            warn!(%err, "reconnect attempt failed");
        }
    }
}
