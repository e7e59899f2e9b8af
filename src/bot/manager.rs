use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, warn};

use super::auto_eat;
use super::events::{event_channel, BotEvent, EventReceiver};
use super::threat;
use crate::adapters::{BedrockAdapter, JavaAdapter, ProtocolAdapter, SessionHandle};
use crate::config::BotSettings;
use crate::state::StateManager;
use crate::store::LogSink;
use crate::types::{BotStatus, ConnectionState, LogKind, ProtocolVariant, SessionConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
    Failed(String),
    /// `stop()` ran before the connect finished
    Cancelled,
}

struct ActiveSession {
    generation: u64,
    handle: Arc<dyn SessionHandle>,
    dispatcher: JoinHandle<()>,
    auto_eat: JoinHandle<()>,
}

enum Slot {
    /// Adapter connect still in flight
    Connecting { generation: u64, connect: AbortHandle },
    Active(ActiveSession),
}

impl Slot {
    fn generation(&self) -> u64 {
        match self {
            Slot::Connecting { generation, .. } => *generation,
            Slot::Active(session) => session.generation,
        }
    }
}

struct Inner {
    status: RwLock<BotStatus>,
    state: StateManager,
    /// Never held across an await
    session: Mutex<Option<Slot>>,
    generation: AtomicU64,
    logs: Arc<dyn LogSink>,
    java: Arc<dyn ProtocolAdapter>,
    bedrock: Arc<dyn ProtocolAdapter>,
    settings: BotSettings,
}

/// Owns the single bot session and the status snapshot derived from it
#[derive(Clone)]
pub struct BotManager {
    inner: Arc<Inner>,
}

impl BotManager {
    pub fn new(logs: Arc<dyn LogSink>, settings: BotSettings) -> Self {
        Self::with_adapters(
            logs,
            settings,
            Arc::new(JavaAdapter::new()),
            Arc::new(BedrockAdapter::new()),
        )
    }

    pub fn with_adapters(
        logs: Arc<dyn LogSink>,
        settings: BotSettings,
        java: Arc<dyn ProtocolAdapter>,
        bedrock: Arc<dyn ProtocolAdapter>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                status: RwLock::new(BotStatus::default()),
                state: StateManager::new(),
                session: Mutex::new(None),
                generation: AtomicU64::new(0),
                logs,
                java,
                bedrock,
                settings,
            }),
        }
    }

    /// Open a session unless one already exists or is connecting.
    ///
    /// The connect runs in its own task so `stop()` can abort it; this call
    /// waits for that task and reports how it ended.
    pub async fn start(&self, config: SessionConfig) -> StartOutcome {
        let (generation, connect) = {
            let mut slot = self.inner.session.lock();
            if slot.is_some() {
                debug!("Start requested while a session is active");
                return StartOutcome::AlreadyRunning;
            }

            let variant = config.variant();
            let adapter = match variant {
                ProtocolVariant::Java => self.inner.java.clone(),
                ProtocolVariant::Bedrock => self.inner.bedrock.clone(),
            };

            self.inner.logs.add_log(
                LogKind::Info,
                &format!(
                    "Connecting to {}:{} as {} ({})...",
                    config.host, config.port, config.username, variant
                ),
            );
            self.inner.state.set(ConnectionState::Connecting);

            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let connect = tokio::spawn(establish(self.inner.clone(), generation, adapter, config));
            *slot = Some(Slot::Connecting {
                generation,
                connect: connect.abort_handle(),
            });
            (generation, connect)
        };

        match connect.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => {
                debug!("Connect for session {} cancelled", generation);
                StartOutcome::Cancelled
            }
            Err(e) => {
                error!("Connect task for session {} panicked", generation);
                self.inner.fail_connect(generation, e.to_string())
            }
        }
    }

    /// Tear down the active or connecting session, if any
    pub async fn stop(&self) {
        let taken = {
            let mut slot = self.inner.session.lock();
            let Some(taken) = slot.take() else {
                debug!("Stop requested with no active session");
                return;
            };

            match &taken {
                Slot::Connecting { connect, .. } => connect.abort(),
                Slot::Active(session) => {
                    session.auto_eat.abort();
                    session.dispatcher.abort();
                }
            }

            {
                let mut status = self.inner.status.write();
                status.online = false;
                status.position = None;
            }
            self.inner.state.set(ConnectionState::Disconnected);
            self.inner.logs.add_log(LogKind::Info, "Bot disconnected manually.");
            taken
        };

        if let Slot::Active(session) = taken {
            let _ = session.auto_eat.await;
            let _ = session.dispatcher.await;
            session.handle.disconnect().await;
        }
    }

    /// Send a chat line as the bot. Returns false when there is no session.
    pub async fn chat(&self, message: &str) -> bool {
        let handle = match self.inner.session.lock().as_ref() {
            Some(Slot::Active(session)) => session.handle.clone(),
            _ => return false,
        };

        if let Err(e) = handle.send_chat(message).await {
            warn!("Failed to send chat message: {:#}", e);
        }
        self.inner.logs.add_log(LogKind::Chat, &format!("> {message}"));
        true
    }

    pub fn get_status(&self) -> BotStatus {
        self.inner.status.read().clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.state.get()
    }
}

async fn establish(
    inner: Arc<Inner>,
    generation: u64,
    adapter: Arc<dyn ProtocolAdapter>,
    config: SessionConfig,
) -> StartOutcome {
    let (events, receiver) = event_channel();
    match adapter.connect(&config, events).await {
        Ok(handle) => {
            let handle: Arc<dyn SessionHandle> = Arc::from(handle);
            if inner.install(generation, &config, handle.clone(), receiver) {
                StartOutcome::Started
            } else {
                debug!("Session {} stopped while connecting, closing it", generation);
                handle.disconnect().await;
                StartOutcome::Cancelled
            }
        }
        Err(e) => inner.fail_connect(generation, format!("{e:#}")),
    }
}

async fn dispatch(
    inner: Arc<Inner>,
    generation: u64,
    variant: ProtocolVariant,
    username: String,
    mut events: EventReceiver,
) {
    while let Some(event) = events.recv().await {
        if !inner.apply_current(generation, variant, &username, event) {
            return;
        }
    }
    inner.reap(generation).await;
}

impl Inner {
    fn is_current(slot: &Option<Slot>, generation: u64) -> bool {
        slot.as_ref().map(Slot::generation) == Some(generation)
    }

    /// Swap a connecting slot for the live session. False when the slot
    /// was stopped or replaced meanwhile.
    fn install(
        self: &Arc<Self>,
        generation: u64,
        config: &SessionConfig,
        handle: Arc<dyn SessionHandle>,
        receiver: EventReceiver,
    ) -> bool {
        let mut slot = self.session.lock();
        if !matches!(slot.as_ref(), Some(Slot::Connecting { generation: g, .. }) if *g == generation) {
            return false;
        }

        let variant = config.variant();
        let auto_eat = tokio::spawn(auto_eat::run(
            variant,
            handle.player(),
            Duration::from_secs(self.settings.auto_eat_interval_secs.max(1)),
            self.settings.auto_eat_food_threshold,
            self.logs.clone(),
        ));
        let dispatcher = tokio::spawn(dispatch(
            self.clone(),
            generation,
            variant,
            config.username.clone(),
            receiver,
        ));

        *slot = Some(Slot::Active(ActiveSession {
            generation,
            handle,
            dispatcher,
            auto_eat,
        }));
        true
    }

    fn fail_connect(&self, generation: u64, message: String) -> StartOutcome {
        let mut slot = self.session.lock();
        if !Self::is_current(&slot, generation) {
            return StartOutcome::Cancelled;
        }
        *slot = None;
        self.logs
            .add_log(LogKind::Error, &format!("Failed to start bot: {message}"));
        self.state.set(ConnectionState::Error);
        StartOutcome::Failed(message)
    }

    /// Apply `event` if it belongs to the live session
    fn apply_current(&self, generation: u64, variant: ProtocolVariant, username: &str, event: BotEvent) -> bool {
        let slot = self.session.lock();
        if !Self::is_current(&slot, generation) {
            debug!("Dropping event from stale session {}", generation);
            return false;
        }
        self.apply_event(variant, username, event);
        true
    }

    fn set_online(&self, online: bool) {
        self.status.write().online = online;
    }

    fn apply_event(&self, variant: ProtocolVariant, username: &str, event: BotEvent) {
        match event {
            BotEvent::SessionEstablished => {
                self.set_online(true);
                self.state.set(ConnectionState::Online);
                let message = match variant {
                    ProtocolVariant::Java => "Java Bot spawned.",
                    ProtocolVariant::Bedrock => "Bedrock Bot joined server.",
                };
                self.logs.add_log(LogKind::Info, message);
            }
            BotEvent::SessionEnded { reason } => {
                self.set_online(false);
                self.state.set(ConnectionState::Disconnected);
                let message = match variant {
                    ProtocolVariant::Java => format!("Java Bot disconnected: {reason}"),
                    ProtocolVariant::Bedrock => format!("Bedrock connection closed: {reason}"),
                };
                self.logs.add_log(LogKind::Warning, &message);
            }
            BotEvent::SessionRejected { reason } => {
                self.set_online(false);
                self.state.set(ConnectionState::Error);
                self.logs
                    .add_log(LogKind::Error, &format!("{variant} Bot kicked: {reason}"));
            }
            BotEvent::TransportError { message } => {
                self.set_online(false);
                self.state.set(ConnectionState::Error);
                self.logs
                    .add_log(LogKind::Error, &format!("{variant} Connection Error: {message}"));
            }
            BotEvent::ChatReceived { speaker, text } => {
                if speaker.as_deref() == Some(username) {
                    return;
                }
                let line = match speaker {
                    Some(speaker) => format!("<{speaker}> {text}"),
                    None => text,
                };
                self.logs.add_log(LogKind::Chat, &line);
            }
            BotEvent::HealthUpdated { health, food } => {
                let mut status = self.status.write();
                status.health = health;
                status.food = food;
            }
            BotEvent::PositionUpdated(position) => {
                self.status.write().position = Some(position);
            }
            BotEvent::ProximityTick { own, others } => {
                let nearby = threat::count_nearby(&own, &others, self.settings.threat_radius);
                self.status.write().nearby_players = nearby;
            }
            BotEvent::InventoryUpdated { full } => {
                self.status.write().inventory_full = full;
            }
        }
    }

    /// Drop the session whose event stream just ended, unless it was
    /// already replaced or stopped
    async fn reap(&self, generation: u64) {
        let session = {
            let mut slot = self.session.lock();
            if !Self::is_current(&slot, generation) {
                return;
            }
            let Some(Slot::Active(session)) = slot.take() else {
                return;
            };

            session.auto_eat.abort();
            self.set_online(false);
            if matches!(
                self.state.get(),
                ConnectionState::Online | ConnectionState::Connecting
            ) {
                self.state.set(ConnectionState::Disconnected);
            }
            session
        };

        session.handle.disconnect().await;
        debug!("Session {} ended, handle released", generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::PlayerControl;
    use crate::bot::events::EventSender;
    use crate::store::LogStore;
    use crate::types::{AuthMode, InventoryItem, Position};
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Never hungry; counts how often the auto-eat loop looks at it
    #[derive(Default)]
    struct CountingPlayer {
        checks: AtomicUsize,
    }

    #[async_trait]
    impl PlayerControl for CountingPlayer {
        fn food(&self) -> Option<u32> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            Some(20)
        }

        fn inventory(&self) -> Vec<InventoryItem> {
            Vec::new()
        }

        async fn equip(&self, _item: &InventoryItem) -> Result<()> {
            Ok(())
        }

        async fn consume(&self) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeHandle {
        disconnects: AtomicUsize,
        chats: parking_lot::Mutex<Vec<String>>,
        player: Arc<CountingPlayer>,
    }

    struct SharedHandle(Arc<FakeHandle>);

    #[async_trait]
    impl SessionHandle for SharedHandle {
        async fn disconnect(&self) {
            self.0.disconnects.fetch_add(1, Ordering::SeqCst);
        }

        async fn send_chat(&self, text: &str) -> Result<()> {
            self.0.chats.lock().push(text.to_string());
            Ok(())
        }

        fn player(&self) -> Option<Arc<dyn PlayerControl>> {
            Some(self.0.player.clone())
        }
    }

    /// Connect that never completes, like a server that accepts and goes silent
    struct HangingAdapter;

    #[async_trait]
    impl ProtocolAdapter for HangingAdapter {
        async fn connect(&self, _config: &SessionConfig, _events: EventSender) -> Result<Box<dyn SessionHandle>> {
            std::future::pending().await
        }
    }

    struct FakeAdapter {
        fail: bool,
        connects: AtomicUsize,
        handle: Arc<FakeHandle>,
        senders: parking_lot::Mutex<Vec<EventSender>>,
    }

    impl FakeAdapter {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                connects: AtomicUsize::new(0),
                handle: Arc::new(FakeHandle::default()),
                senders: parking_lot::Mutex::new(Vec::new()),
            })
        }

        fn emit(&self, event: BotEvent) {
            let senders = self.senders.lock();
            senders.last().unwrap().send(event).unwrap();
        }

        fn hang_up(&self) {
            self.senders.lock().clear();
        }
    }

    #[async_trait]
    impl ProtocolAdapter for FakeAdapter {
        async fn connect(&self, _config: &SessionConfig, events: EventSender) -> Result<Box<dyn SessionHandle>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("connection refused"));
            }
            self.senders.lock().push(events);
            Ok(Box::new(SharedHandle(self.handle.clone())))
        }
    }

    fn session_config(is_bedrock: bool) -> SessionConfig {
        SessionConfig {
            host: "localhost".to_string(),
            port: 25565,
            username: "AnarchyBot".to_string(),
            version: "1.20.1".to_string(),
            auth: AuthMode::Offline,
            is_bedrock,
        }
    }

    fn manager(java: Arc<FakeAdapter>) -> (BotManager, Arc<LogStore>) {
        let logs = Arc::new(LogStore::new(100));
        let bedrock = FakeAdapter::new(false);
        let manager = BotManager::with_adapters(logs.clone(), BotSettings::default(), java, bedrock);
        (manager, logs)
    }

    async fn eventually(check: impl Fn() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    fn messages(logs: &LogStore) -> Vec<String> {
        logs.recent(100).into_iter().map(|e| e.message).collect()
    }

    #[tokio::test]
    async fn test_repeated_start_connects_once() {
        let java = FakeAdapter::new(false);
        let (manager, logs) = manager(java.clone());

        assert_eq!(manager.start(session_config(false)).await, StartOutcome::Started);
        assert_eq!(manager.start(session_config(false)).await, StartOutcome::AlreadyRunning);

        assert_eq!(java.connects.load(Ordering::SeqCst), 1);
        let connecting = messages(&logs)
            .iter()
            .filter(|m| m.starts_with("Connecting to localhost:25565 as AnarchyBot (Java)"))
            .count();
        assert_eq!(connecting, 1);
        assert_eq!(manager.connection_state(), ConnectionState::Connecting);
    }

    #[tokio::test]
    async fn test_stop_without_session_is_noop() {
        let java = FakeAdapter::new(false);
        let (manager, logs) = manager(java);

        manager.stop().await;

        assert_eq!(manager.get_status(), BotStatus::default());
        assert!(logs.is_empty());
        assert_eq!(manager.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_session_end_keeps_position() {
        let java = FakeAdapter::new(false);
        let (manager, logs) = manager(java.clone());
        manager.start(session_config(false)).await;

        java.emit(BotEvent::SessionEstablished);
        java.emit(BotEvent::PositionUpdated(Position::new(1.0, 70.0, -3.0)));
        eventually(|| manager.get_status().position.is_some()).await;
        assert!(manager.get_status().online);
        assert_eq!(manager.connection_state(), ConnectionState::Online);

        java.emit(BotEvent::SessionEnded {
            reason: "server closed".to_string(),
        });
        eventually(|| !manager.get_status().online).await;

        let status = manager.get_status();
        assert_eq!(status.position, Some(Position::new(1.0, 70.0, -3.0)));
        assert_eq!(manager.connection_state(), ConnectionState::Disconnected);
        assert!(messages(&logs).contains(&"Java Bot disconnected: server closed".to_string()));
    }

    #[tokio::test]
    async fn test_stop_clears_position_and_disconnects() {
        let java = FakeAdapter::new(false);
        let (manager, logs) = manager(java.clone());
        manager.start(session_config(false)).await;

        java.emit(BotEvent::SessionEstablished);
        java.emit(BotEvent::PositionUpdated(Position::new(5.0, 64.0, 5.0)));
        eventually(|| manager.get_status().position.is_some()).await;

        manager.stop().await;

        let status = manager.get_status();
        assert!(!status.online);
        assert_eq!(status.position, None);
        assert_eq!(java.handle.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(manager.connection_state(), ConnectionState::Disconnected);
        assert_eq!(messages(&logs)[0], "Bot disconnected manually.");
        assert!(!manager.chat("anyone?").await);
    }

    #[tokio::test]
    async fn test_failed_start_can_be_retried() {
        let java = FakeAdapter::new(true);
        let (manager, logs) = manager(java.clone());

        let outcome = manager.start(session_config(false)).await;
        assert_eq!(outcome, StartOutcome::Failed("connection refused".to_string()));
        assert_eq!(messages(&logs)[0], "Failed to start bot: connection refused");
        assert_eq!(manager.connection_state(), ConnectionState::Error);
        assert!(!manager.get_status().online);

        manager.start(session_config(false)).await;
        assert_eq!(java.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_bedrock_config_uses_bedrock_adapter() {
        let java = FakeAdapter::new(true);
        let (manager, logs) = manager(java.clone());

        assert_eq!(manager.start(session_config(true)).await, StartOutcome::Started);
        assert_eq!(java.connects.load(Ordering::SeqCst), 0);
        assert!(messages(&logs)[0].ends_with("(Bedrock)..."));
    }

    #[tokio::test]
    async fn test_own_chat_is_suppressed() {
        let java = FakeAdapter::new(false);
        let (manager, logs) = manager(java.clone());
        manager.start(session_config(false)).await;
        let baseline = logs.len();

        java.emit(BotEvent::ChatReceived {
            speaker: Some("AnarchyBot".to_string()),
            text: "echo".to_string(),
        });
        java.emit(BotEvent::ChatReceived {
            speaker: Some("Steve".to_string()),
            text: "hello".to_string(),
        });
        eventually(|| logs.len() > baseline).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(logs.len(), baseline + 1);
        let entry = &logs.recent(1)[0];
        assert_eq!(entry.kind, LogKind::Chat);
        assert_eq!(entry.message, "<Steve> hello");
    }

    #[tokio::test]
    async fn test_system_chat_has_no_speaker() {
        let java = FakeAdapter::new(false);
        let (manager, logs) = manager(java.clone());
        manager.start(session_config(false)).await;

        java.emit(BotEvent::ChatReceived {
            speaker: None,
            text: "Server restarting".to_string(),
        });
        eventually(|| logs.recent(1)[0].message == "Server restarting").await;
    }

    #[tokio::test]
    async fn test_operator_chat() {
        let java = FakeAdapter::new(false);
        let (manager, logs) = manager(java.clone());

        assert!(!manager.chat("nobody home").await);
        assert!(logs.is_empty());

        manager.start(session_config(false)).await;
        assert!(manager.chat("hi").await);
        assert_eq!(*java.handle.chats.lock(), vec!["hi".to_string()]);
        let entry = &logs.recent(1)[0];
        assert_eq!(entry.kind, LogKind::Chat);
        assert_eq!(entry.message, "> hi");
    }

    #[tokio::test]
    async fn test_kick_marks_error() {
        let java = FakeAdapter::new(false);
        let (manager, logs) = manager(java.clone());
        manager.start(session_config(false)).await;

        java.emit(BotEvent::SessionEstablished);
        java.emit(BotEvent::SessionRejected {
            reason: "Banned".to_string(),
        });
        eventually(|| manager.connection_state() == ConnectionState::Error).await;

        assert!(!manager.get_status().online);
        let entry = &logs.recent(1)[0];
        assert_eq!(entry.kind, LogKind::Error);
        assert_eq!(entry.message, "Java Bot kicked: Banned");
    }

    #[tokio::test]
    async fn test_vitals_and_proximity() {
        let java = FakeAdapter::new(false);
        let (manager, _logs) = manager(java.clone());
        manager.start(session_config(false)).await;

        java.emit(BotEvent::HealthUpdated { health: 12.5, food: 9.0 });
        java.emit(BotEvent::InventoryUpdated { full: true });
        java.emit(BotEvent::ProximityTick {
            own: Position::new(0.0, 0.0, 0.0),
            others: [10.0, 29.9, 30.0, 31.0]
                .iter()
                .map(|x| Some(Position::new(*x, 0.0, 0.0)))
                .chain(std::iter::once(None))
                .collect(),
        });
        eventually(|| manager.get_status().nearby_players == 2).await;

        let status = manager.get_status();
        assert_eq!(status.health, 12.5);
        assert_eq!(status.food, 9.0);
        assert!(status.inventory_full);
    }

    #[tokio::test]
    async fn test_closed_stream_reaps_session() {
        let java = FakeAdapter::new(false);
        let (manager, _logs) = manager(java.clone());
        manager.start(session_config(false)).await;

        java.emit(BotEvent::SessionEstablished);
        eventually(|| manager.get_status().online).await;

        java.hang_up();
        eventually(|| java.handle.disconnects.load(Ordering::SeqCst) == 1).await;

        assert!(!manager.get_status().online);
        assert!(!manager.chat("still there?").await);
        assert_eq!(manager.start(session_config(false)).await, StartOutcome::Started);
    }

    #[tokio::test]
    async fn test_stop_cancels_pending_connect() {
        let logs = Arc::new(LogStore::new(100));
        let manager = BotManager::with_adapters(
            logs.clone(),
            BotSettings::default(),
            Arc::new(HangingAdapter),
            Arc::new(HangingAdapter),
        );

        let starter = manager.clone();
        let pending = tokio::spawn(async move { starter.start(session_config(false)).await });
        eventually(|| manager.connection_state() == ConnectionState::Connecting).await;

        assert!(!manager.chat("anyone?").await);
        assert_eq!(manager.start(session_config(false)).await, StartOutcome::AlreadyRunning);

        tokio::time::timeout(Duration::from_secs(1), manager.stop())
            .await
            .expect("stop waited on the pending connect");

        assert_eq!(pending.await.unwrap(), StartOutcome::Cancelled);
        assert_eq!(manager.connection_state(), ConnectionState::Disconnected);
        assert_eq!(messages(&logs)[0], "Bot disconnected manually.");

        let again = tokio::time::timeout(Duration::from_millis(50), manager.start(session_config(false))).await;
        assert!(again.is_err(), "a fresh start should be connecting again");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_auto_eat() {
        let java = FakeAdapter::new(false);
        let (manager, _logs) = manager(java.clone());
        manager.start(session_config(false)).await;

        tokio::time::sleep(Duration::from_secs(11)).await;
        let before = java.handle.player.checks.load(Ordering::SeqCst);
        assert!(before >= 2, "auto-eat ticked {before} times");

        manager.stop().await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(java.handle.player.checks.load(Ordering::SeqCst), before);
    }

    #[tokio::test]
    async fn test_stale_session_leaves_newer_one_alone() {
        let java = FakeAdapter::new(false);
        let (manager, _logs) = manager(java.clone());

        manager.start(session_config(false)).await;
        manager.stop().await;
        manager.start(session_config(false)).await;
        java.emit(BotEvent::SessionEstablished);
        eventually(|| manager.get_status().online).await;

        // first session's stream closing, then its late events and reap
        drop(java.senders.lock().remove(0));
        assert!(!manager.inner.apply_current(
            1,
            ProtocolVariant::Java,
            "AnarchyBot",
            BotEvent::SessionEnded {
                reason: "late".to_string()
            },
        ));
        manager.inner.reap(1).await;

        assert!(manager.get_status().online);
        assert_eq!(manager.connection_state(), ConnectionState::Online);
        assert!(manager.chat("still here").await);
        assert_eq!(java.handle.disconnects.load(Ordering::SeqCst), 1);
    }
}
