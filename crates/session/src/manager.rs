use std::sync::Arc;

use async_trait::async_trait;
use courier_channel::{ChannelError, ChannelEvent, RealtimeChannel};
use courier_gateway::{GatewayError, LoginResponse, RestGateway};
use courier_orders::OrderCoordinator;
use courier_telemetry::TelemetryPublisher;
use courier_types::{Role, Session, SessionSignal};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::store::{clear_session, load_session, save_session, CredentialStore, StoreError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("missing required field: {field}")]
    MissingField { field: String },
}

/// Application foreground/background transitions, reported by the host shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppPhase {
    Foreground,
    Background,
}

/// Authentication surface of the gateway. Split from `DispatchApi` so the
/// manager can be tested without HTTP.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn login(&self, phone_number: &str) -> Result<LoginResponse, GatewayError>;
    async fn fetch_profile(&self) -> Result<Value, GatewayError>;
    fn set_token(&self, token: &str);
    fn clear_token(&self);
}

#[async_trait]
impl AuthGateway for RestGateway {
    async fn login(&self, phone_number: &str) -> Result<LoginResponse, GatewayError> {
        RestGateway::login(self, phone_number).await
    }

    async fn fetch_profile(&self) -> Result<Value, GatewayError> {
        courier_gateway::DispatchApi::fetch_profile(self).await
    }

    fn set_token(&self, token: &str) {
        RestGateway::set_token(self, token);
    }

    fn clear_token(&self) {
        RestGateway::clear_token(self);
    }
}

/// Composes gateway, channel, coordinator, telemetry, and the credential
/// store into the driver's session lifecycle.
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    auth: Arc<dyn AuthGateway>,
    channel: RealtimeChannel,
    coordinator: Arc<OrderCoordinator>,
    telemetry: Arc<TelemetryPublisher>,
    session: Mutex<Option<Session>>,
    events: Mutex<Option<mpsc::Receiver<ChannelEvent>>>,
    signals: Mutex<Option<mpsc::Receiver<SessionSignal>>>,
}

impl SessionManager {
    pub fn builder() -> SessionManagerBuilder {
        SessionManagerBuilder::default()
    }

    pub async fn session(&self) -> Option<Session> {
        self.session.lock().await.clone()
    }

    /// Online means exactly one thing: the realtime channel is open.
    pub async fn is_online(&self) -> bool {
        self.channel.state().await.is_open()
    }

    /// Phone-number login. Credentials are persisted before the channel
    /// comes up; a failed initial connect is left to the reconnect policy.
    pub async fn login(&self, phone_number: &str) -> Result<Session, SessionError> {
        let response = self.auth.login(phone_number).await?;
        self.auth.set_token(&response.token);

        let session = Session::new(response.id, response.token, Role::Delivery);
        save_session(self.store.as_ref(), &session).await?;
        *self.session.lock().await = Some(session.clone());
        info!(driver_id = %session.driver_id, new_account = response.is_new, "logged in");

        if let Err(err) = self.channel.connect(&session.driver_id).await {
            warn!(%err, "initial connect failed, reconnect scheduled");
        }
        Ok(session)
    }

    /// Cold-start restore from the credential store. No-op when empty.
    pub async fn restore(&self) -> Result<Option<Session>, SessionError> {
        let Some(session) = load_session(self.store.as_ref()).await? else {
            debug!("no stored session");
            return Ok(None);
        };
        self.auth.set_token(&session.bearer_token);
        *self.session.lock().await = Some(session.clone());
        info!(driver_id = %session.driver_id, "session restored");

        if let Err(err) = self.channel.connect(&session.driver_id).await {
            warn!(%err, "initial connect failed, reconnect scheduled");
        }
        Ok(Some(session))
    }

    /// Tear the session down everywhere. Idempotent.
    pub async fn logout(&self) -> Result<(), SessionError> {
        self.channel.disconnect().await;
        self.telemetry.stop().await;
        clear_session(self.store.as_ref()).await?;
        self.auth.clear_token();
        self.coordinator.clear().await;
        *self.session.lock().await = None;
        info!("logged out");
        Ok(())
    }

    /// Foregrounding with an active session reconnects and refreshes;
    /// telemetry restarts via the subsequent `Opened` event.
    pub async fn on_app_phase(&self, phase: AppPhase) {
        if phase != AppPhase::Foreground {
            return;
        }
        let Some(session) = self.session.lock().await.clone() else {
            return;
        };
        if !self.channel.state().await.is_open() {
            if let Err(err) = self.channel.connect(&session.driver_id).await {
                warn!(%err, "foreground reconnect failed");
            }
        }
        self.coordinator.refresh_logged().await;
    }

    /// Event loop. Consumes channel events and session signals until both
    /// senders are gone. Call once, typically from a spawned task.
    pub async fn run(&self) {
        let Some(mut events) = self.events.lock().await.take() else {
            warn!("event loop already running");
            return;
        };
        let Some(mut signals) = self.signals.lock().await.take() else {
            warn!("event loop already running");
            return;
        };

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(ChannelEvent::Opened) => self.on_channel_opened().await,
                    Some(ChannelEvent::Message(message)) => {
                        self.coordinator.apply_push(&message).await;
                    }
                    Some(ChannelEvent::Closed { code }) => {
                        debug!(?code, "channel closed");
                        self.telemetry.stop().await;
                    }
                    None => break,
                },
                signal = signals.recv() => match signal {
                    Some(SessionSignal::AuthExpired) => {
                        warn!("credentials rejected, forcing logout");
                        if let Err(err) = self.logout().await {
                            warn!(%err, "forced logout incomplete");
                        }
                    }
                    None => break,
                },
            }
        }
    }

    async fn on_channel_opened(&self) {
        self.coordinator.refresh_logged().await;

        let Some(mut session) = self.session.lock().await.clone() else {
            return;
        };
        match self.auth.fetch_profile().await {
            Ok(profile) => {
                session.profile = Some(profile);
                if let Err(err) = save_session(self.store.as_ref(), &session).await {
                    warn!(%err, "profile persist failed");
                }
                *self.session.lock().await = Some(session.clone());
            }
            Err(err) => warn!(%err, "profile refresh failed"),
        }

        if session.role == Role::Delivery {
            if let Err(err) = self.telemetry.start(&session).await {
                warn!(%err, "telemetry start failed");
            }
        }
    }
}

#[derive(Default)]
pub struct SessionManagerBuilder {
    store: Option<Arc<dyn CredentialStore>>,
    auth: Option<Arc<dyn AuthGateway>>,
    channel: Option<RealtimeChannel>,
    coordinator: Option<Arc<OrderCoordinator>>,
    telemetry: Option<Arc<TelemetryPublisher>>,
    events: Option<mpsc::Receiver<ChannelEvent>>,
    signals: Option<mpsc::Receiver<SessionSignal>>,
}

impl SessionManagerBuilder {
    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn auth(mut self, auth: Arc<dyn AuthGateway>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn channel(mut self, channel: RealtimeChannel) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn coordinator(mut self, coordinator: Arc<OrderCoordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    pub fn telemetry(mut self, telemetry: Arc<TelemetryPublisher>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn events(mut self, events: mpsc::Receiver<ChannelEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn signals(mut self, signals: mpsc::Receiver<SessionSignal>) -> Self {
        self.signals = Some(signals);
        self
    }

    pub fn build(self) -> Result<SessionManager, BuilderError> {
        let store = self.store.ok_or_else(|| BuilderError::MissingField {
            field: "store".to_string(),
        })?;
        let auth = self.auth.ok_or_else(|| BuilderError::MissingField {
            field: "auth".to_string(),
        })?;
        let channel = self.channel.ok_or_else(|| BuilderError::MissingField {
            field: "channel".to_string(),
        })?;
        let coordinator = self.coordinator.ok_or_else(|| BuilderError::MissingField {
            field: "coordinator".to_string(),
        })?;
        let telemetry = self.telemetry.ok_or_else(|| BuilderError::MissingField {
            field: "telemetry".to_string(),
        })?;
        let events = self.events.ok_or_else(|| BuilderError::MissingField {
            field: "events".to_string(),
        })?;
        let signals = self.signals.ok_or_else(|| BuilderError::MissingField {
            field: "signals".to_string(),
        })?;

        Ok(SessionManager {
            store,
            auth,
            channel,
            coordinator,
            telemetry,
            session: Mutex::new(None),
            events: Mutex::new(Some(events)),
            signals: Mutex::new(Some(signals)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, KEY_DRIVER_ID, KEY_ROLE, KEY_TOKEN};
    use courier_channel::{Connection, Frame, Transport};
    use courier_gateway::{DispatchApi, OrdersSnapshot};
    use courier_orders::ResponseSink;
    use courier_telemetry::{LocationSource, PermissionProbe, TelemetryError, WatchSettings};
    use courier_types::{
        ConnectionState, Decision, DeliveryStatus, RawOrder, TelemetrySample,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    struct OpenConnection;

    #[async_trait]
    impl Connection for OpenConnection {
        async fn send(&mut self, _text: String) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn next(&mut self) -> Option<Result<Frame, ChannelError>> {
            std::future::pending::<()>().await;
            None
        }

        async fn close(&mut self, _code: u16) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    struct AlwaysOpenTransport {
        dials: AtomicUsize,
    }

    struct TransportHandle(Arc<AlwaysOpenTransport>);

    #[async_trait]
    impl Transport for TransportHandle {
        async fn connect(&self, _url: &str) -> Result<Box<dyn Connection>, ChannelError> {
            self.0.dials.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(OpenConnection))
        }
    }

    struct MockAuth {
        login_response: StdMutex<Option<LoginResponse>>,
        token: StdMutex<Option<String>>,
        profile: Value,
    }

    impl MockAuth {
        fn new(profile: Value) -> Self {
            Self {
                login_response: StdMutex::new(None),
                token: StdMutex::new(None),
                profile,
            }
        }

        fn queue_login(&self, id: &str, token: &str) {
            *self.login_response.lock().unwrap() = Some(
                serde_json::from_value(json!({ "id": id, "token": token, "new": false }))
                    .unwrap(),
            );
        }

        fn token(&self) -> Option<String> {
            self.token.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AuthGateway for MockAuth {
        async fn login(&self, _phone_number: &str) -> Result<LoginResponse, GatewayError> {
            self.login_response
                .lock()
                .unwrap()
                .take()
                .ok_or(GatewayError::AuthMissing)
        }

        async fn fetch_profile(&self) -> Result<Value, GatewayError> {
            Ok(self.profile.clone())
        }

        fn set_token(&self, token: &str) {
            *self.token.lock().unwrap() = Some(token.to_string());
        }

        fn clear_token(&self) {
            *self.token.lock().unwrap() = None;
        }
    }

    #[derive(Default)]
    struct MockDispatch {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl DispatchApi for MockDispatch {
        async fn fetch_orders(&self) -> Result<OrdersSnapshot, GatewayError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(OrdersSnapshot::default())
        }

        async fn fetch_profile(&self) -> Result<Value, GatewayError> {
            Ok(json!({}))
        }

        async fn track_order(&self, order_id: &str) -> Result<RawOrder, GatewayError> {
            Err(GatewayError::Decode(format!("no scripted order {order_id}")))
        }

        async fn update_status(
            &self,
            _order_id: &str,
            _status: DeliveryStatus,
        ) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn update_location(
            &self,
            _sample: &TelemetrySample,
            _live: bool,
        ) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    struct NullSink;

    #[async_trait]
    impl ResponseSink for NullSink {
        async fn send_response(
            &self,
            _order_id: &str,
            _decision: Decision,
        ) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    struct IdleSource {
        watches: AtomicUsize,
    }

    struct SourceHandle(Arc<IdleSource>);

    #[async_trait]
    impl LocationSource for SourceHandle {
        async fn watch(
            &self,
            _settings: &WatchSettings,
        ) -> Result<mpsc::Receiver<TelemetrySample>, TelemetryError> {
            self.0.watches.fetch_add(1, Ordering::SeqCst);
            let (_tx, rx) = mpsc::channel(1);
            // The sender is dropped; the watch simply yields nothing.
            Ok(rx)
        }
    }

    struct Granted;

    #[async_trait]
    impl PermissionProbe for Granted {
        async fn location_granted(&self) -> bool {
            true
        }
    }

    struct Fixture {
        auth: Arc<MockAuth>,
        dispatch: Arc<MockDispatch>,
        source: Arc<IdleSource>,
        transport: Arc<AlwaysOpenTransport>,
        store: Arc<MemoryStore>,
        signal_tx: mpsc::Sender<SessionSignal>,
        manager: Arc<SessionManager>,
    }

    fn fixture() -> Fixture {
        let transport = Arc::new(AlwaysOpenTransport {
            dials: AtomicUsize::new(0),
        });
        let (channel, events) = RealtimeChannel::new(
            Box::new(TransportHandle(Arc::clone(&transport))),
            "ws://dispatch.test/api/ws/delivery",
            Duration::from_secs(5),
        );

        let auth = Arc::new(MockAuth::new(json!({ "name": "Ravi" })));
        let dispatch = Arc::new(MockDispatch::default());
        let coordinator = Arc::new(OrderCoordinator::new(
            Arc::clone(&dispatch) as Arc<dyn DispatchApi>,
            Arc::new(NullSink) as Arc<dyn ResponseSink>,
        ));

        let source = Arc::new(IdleSource {
            watches: AtomicUsize::new(0),
        });
        let (signal_tx, signal_rx) = mpsc::channel(4);
        let telemetry = Arc::new(TelemetryPublisher::new(
            Arc::clone(&dispatch) as Arc<dyn DispatchApi>,
            Arc::new(SourceHandle(Arc::clone(&source))) as Arc<dyn LocationSource>,
            Arc::new(Granted),
            WatchSettings::default(),
            signal_tx.clone(),
        ));

        let store = Arc::new(MemoryStore::default());
        let manager = SessionManager::builder()
            .store(Arc::clone(&store) as Arc<dyn CredentialStore>)
            .auth(Arc::clone(&auth) as Arc<dyn AuthGateway>)
            .channel(channel)
            .coordinator(coordinator)
            .telemetry(telemetry)
            .events(events)
            .signals(signal_rx)
            .build()
            .unwrap();

        Fixture {
            auth,
            dispatch,
            source,
            transport,
            store,
            signal_tx,
            manager: Arc::new(manager),
        }
    }

    #[test]
    fn builder_reports_missing_fields() {
        let result = SessionManager::builder().build();
        match result {
            Err(BuilderError::MissingField { field }) => assert_eq!(field, "store"),
            Ok(_) => panic!("builder must fail without components"),
        }
    }

    #[tokio::test]
    async fn login_persists_credentials_and_connects() {
        let fx = fixture();
        fx.auth.queue_login("drv-7", "token-abc");

        let session = fx.manager.login("9999911111").await.unwrap();
        assert_eq!(session.driver_id, "drv-7");
        assert_eq!(session.role, Role::Delivery);

        assert_eq!(fx.auth.token().as_deref(), Some("token-abc"));
        assert_eq!(
            fx.store.get(KEY_TOKEN).await.unwrap().as_deref(),
            Some("token-abc")
        );
        assert_eq!(
            fx.store.get(KEY_DRIVER_ID).await.unwrap().as_deref(),
            Some("drv-7")
        );
        assert_eq!(
            fx.store.get(KEY_ROLE).await.unwrap().as_deref(),
            Some("delivery")
        );
        assert!(fx.manager.is_online().await);
    }

    #[tokio::test]
    async fn restore_with_empty_store_is_a_noop() {
        let fx = fixture();
        assert!(fx.manager.restore().await.unwrap().is_none());
        assert_eq!(fx.transport.dials.load(Ordering::SeqCst), 0);
        assert!(!fx.manager.is_online().await);
    }

    #[tokio::test]
    async fn restore_reuses_saved_credentials() {
        let fx = fixture();
        save_session(
            fx.store.as_ref(),
            &Session::new("drv-9", "token-xyz", Role::Delivery),
        )
        .await
        .unwrap();

        let session = fx.manager.restore().await.unwrap().unwrap();
        assert_eq!(session.driver_id, "drv-9");
        assert_eq!(fx.auth.token().as_deref(), Some("token-xyz"));
        assert!(fx.manager.is_online().await);
    }

    #[tokio::test]
    async fn opened_event_refreshes_profile_and_starts_telemetry() {
        let fx = fixture();
        fx.auth.queue_login("drv-7", "token-abc");

        let runner = tokio::spawn({
            let manager = Arc::clone(&fx.manager);
            async move { manager.run().await }
        });

        fx.manager.login("9999911111").await.unwrap();

        // Give the event loop a chance to process Opened.
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }

        assert!(fx.dispatch.fetches.load(Ordering::SeqCst) >= 1);
        assert_eq!(fx.source.watches.load(Ordering::SeqCst), 1);
        let session = fx.manager.session().await.unwrap();
        assert_eq!(session.profile, Some(json!({ "name": "Ravi" })));

        runner.abort();
    }

    #[tokio::test]
    async fn auth_expired_signal_forces_logout() {
        let fx = fixture();
        fx.auth.queue_login("drv-7", "token-abc");

        let runner = tokio::spawn({
            let manager = Arc::clone(&fx.manager);
            async move { manager.run().await }
        });

        fx.manager.login("9999911111").await.unwrap();
        fx.signal_tx.send(SessionSignal::AuthExpired).await.unwrap();

        for _ in 0..20 {
            tokio::task::yield_now().await;
        }

        assert!(fx.manager.session().await.is_none());
        assert_eq!(fx.auth.token(), None);
        assert_eq!(fx.store.get(KEY_TOKEN).await.unwrap(), None);
        assert!(!fx.manager.is_online().await);

        runner.abort();
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let fx = fixture();
        fx.auth.queue_login("drv-7", "token-abc");
        fx.manager.login("9999911111").await.unwrap();

        fx.manager.logout().await.unwrap();
        fx.manager.logout().await.unwrap();

        for _ in 0..20 {
            tokio::task::yield_now().await;
        }

        assert!(fx.manager.session().await.is_none());
        assert_eq!(fx.manager.channel.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn foreground_with_session_reconnects_and_refreshes() {
        let fx = fixture();
        fx.auth.queue_login("drv-7", "token-abc");
        fx.manager.login("9999911111").await.unwrap();
        let fetches_before = fx.dispatch.fetches.load(Ordering::SeqCst);

        fx.manager.on_app_phase(AppPhase::Foreground).await;

        assert!(fx.dispatch.fetches.load(Ordering::SeqCst) > fetches_before);
        // Already online; no extra dial.
        assert_eq!(fx.transport.dials.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn foreground_without_session_does_nothing() {
        let fx = fixture();
        fx.manager.on_app_phase(AppPhase::Foreground).await;
        assert_eq!(fx.transport.dials.load(Ordering::SeqCst), 0);
        assert_eq!(fx.dispatch.fetches.load(Ordering::SeqCst), 0);
    }
}
