//! Session driver
//!
//! Runs a [`SyncSession`] against a real transport and store. One task owns
//! the session and multiplexes its inputs with `tokio::select!`:
//!
//! - commands from the [`BridgeHandle`] (retry, shutdown)
//! - validated messages from the editor
//! - the import deadline
//!
//! Saves are handed to a separate persistence worker so a slow store never
//! delays protocol replies. The worker applies them strictly in order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use super::commands::EditorCommands;
use super::session::{Effect, Phase, SyncSession};
use super::transport::{BridgeTransport, Subscription};
use crate::config::Config;
use crate::editor;
use crate::models::{ProjectId, ProjectUpdate};
use crate::store::ProjectStore;

/// Default time the editor gets to answer an import
pub const DEFAULT_IMPORT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for a bridge session
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Full editor URL the peer window is pointed at
    pub editor_url: String,
    /// Time allowed for the editor to answer an import
    pub import_timeout: Duration,
}

impl BridgeConfig {
    /// Build from application config, composing the controller-mode URL
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            editor_url: editor::editor_url(&config.editor_url, &config.controller_id)?,
            import_timeout: config.import_timeout(),
        })
    }
}

/// Save indicator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    /// A save is in flight
    Saving,
    /// Everything reported by the editor has been stored
    Saved,
    /// The last save failed; the next edit retries
    Unsaved,
}

/// Commands sent to the session task
#[derive(Debug, Clone)]
pub enum BridgeCommand {
    /// Restart the handshake from scratch
    Retry,
    /// Stop the session task
    Shutdown,
}

/// Events emitted by the session task
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// The session entered a new phase
    PhaseChanged(Phase),
    /// The import was rejected or timed out
    ImportFailed(String),
    /// The save indicator changed
    SaveStatusChanged(SaveStatus),
    /// A save did not reach the store
    PersistFailed(String),
}

/// Current session state, for surfaces that poll
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub error: Option<String>,
    pub save_status: SaveStatus,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            error: None,
            save_status: SaveStatus::Saved,
        }
    }
}

/// Handle to control and observe a running session
pub struct BridgeHandle {
    command_tx: mpsc::Sender<BridgeCommand>,
    /// Receive events from the session task
    pub event_rx: mpsc::UnboundedReceiver<BridgeEvent>,
    /// Watch the session state
    pub status_rx: watch::Receiver<SessionSnapshot>,
    commands: EditorCommands,
    task: JoinHandle<()>,
}

impl BridgeHandle {
    /// Command facade bound to this session
    pub fn commands(&self) -> EditorCommands {
        self.commands.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.status_rx.borrow().clone()
    }

    /// Ask the session to restart its handshake
    pub fn retry(&self) {
        if self.command_tx.try_send(BridgeCommand::Retry).is_err() {
            debug!("Retry not delivered, session busy or stopped");
        }
    }

    /// Stop the session and wait for the task to exit
    ///
    /// Saves already queued are still written by the persistence worker.
    pub async fn shutdown(self) {
        let _ = self.command_tx.send(BridgeCommand::Shutdown).await;
        if let Err(e) = self.task.await {
            warn!("Bridge task ended abnormally: {}", e);
        }
    }
}

/// Spawn a session for `project_id`, importing `payload` once the editor loads
///
/// The subscription is attached before the task starts, so nothing the
/// editor sends after navigation can be missed.
pub fn spawn_bridge<S>(
    config: BridgeConfig,
    transport: BridgeTransport,
    store: Arc<S>,
    project_id: ProjectId,
    payload: Value,
) -> BridgeHandle
where
    S: ProjectStore + 'static,
{
    let (command_tx, command_rx) = mpsc::channel(16);
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = watch::channel(SessionSnapshot::default());
    let status_tx = Arc::new(status_tx);

    let subscription = transport.subscribe();
    let alive = Arc::new(());
    let commands = EditorCommands::attached(transport.clone(), &alive);

    let saves = SaveTracker {
        outstanding: Arc::new(AtomicUsize::new(0)),
        status_tx: status_tx.clone(),
        event_tx: event_tx.clone(),
    };
    let (persist_tx, persist_rx) = mpsc::unbounded_channel();
    tokio::spawn(persist_loop(store, project_id, persist_rx, saves.clone()));

    let driver = Driver {
        session: SyncSession::new(payload),
        config,
        transport,
        deadline: None,
        persist_tx,
        saves,
        status_tx,
        event_tx,
    };
    let task = tokio::spawn(session_loop(driver, subscription, command_rx, alive));

    BridgeHandle {
        command_tx,
        event_rx,
        status_rx,
        commands,
        task,
    }
}

/// Main session task loop
async fn session_loop(
    mut driver: Driver,
    mut subscription: Subscription,
    mut command_rx: mpsc::Receiver<BridgeCommand>,
    alive: Arc<()>,
) {
    // Let the spawner finish wiring up before the editor is asked to load
    tokio::task::yield_now().await;

    let effects = driver.session.start();
    driver.apply(effects);

    loop {
        let deadline = driver.deadline.as_ref().map(|(at, _)| *at);

        tokio::select! {
            cmd = command_rx.recv() => {
                match cmd {
                    Some(BridgeCommand::Retry) => {
                        info!("Retrying editor handshake");
                        let effects = driver.session.retry();
                        driver.apply(effects);
                    }
                    Some(BridgeCommand::Shutdown) | None => break,
                }
            }

            message = subscription.next() => {
                match message {
                    Some(message) => {
                        let effects = driver.session.handle(message);
                        driver.apply(effects);
                    }
                    None => {
                        debug!("Message bus closed");
                        break;
                    }
                }
            }

            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Some((_, token)) = driver.deadline.take() {
                    let effects = driver.session.import_timed_out(&token);
                    driver.apply(effects);
                }
            }
        }
    }

    debug!("Bridge session stopped");
    drop(alive);
}

/// Session plus everything needed to carry out its effects
struct Driver {
    session: SyncSession,
    config: BridgeConfig,
    transport: BridgeTransport,
    deadline: Option<(Instant, String)>,
    persist_tx: mpsc::UnboundedSender<Value>,
    saves: SaveTracker,
    status_tx: Arc<watch::Sender<SessionSnapshot>>,
    event_tx: mpsc::UnboundedSender<BridgeEvent>,
}

impl Driver {
    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send(message) => {
                    if let Err(e) = self.transport.send(&message) {
                        debug!(action = message.action(), "Message not delivered: {}", e);
                    }
                }
                Effect::LoadPeer => {
                    if let Err(e) = self.transport.load_peer(&self.config.editor_url) {
                        debug!("Editor navigation not delivered: {}", e);
                    }
                }
                Effect::ArmImportTimeout(token) => {
                    self.deadline = Some((Instant::now() + self.config.import_timeout, token));
                }
                Effect::Persist(payload) => {
                    self.saves.begin();
                    if self.persist_tx.send(payload).is_err() {
                        warn!("Persistence worker stopped, save dropped");
                        self.saves.finish(Err("Persistence worker stopped".to_string()));
                    }
                }
                Effect::Transition(phase) => self.transition(phase),
            }
        }
    }

    fn transition(&mut self, phase: Phase) {
        info!(phase = %phase, "Bridge phase changed");
        if phase != Phase::Importing {
            self.deadline = None;
        }

        let error = self.session.error().map(str::to_string);
        self.status_tx.send_modify(|snapshot| {
            snapshot.phase = phase;
            snapshot.error = error.clone();
        });

        let _ = self.event_tx.send(BridgeEvent::PhaseChanged(phase));
        if phase == Phase::Failed {
            if let Some(error) = error {
                let _ = self.event_tx.send(BridgeEvent::ImportFailed(error));
            }
        }
    }
}

/// Tracks in-flight saves and drives the save indicator
#[derive(Clone)]
struct SaveTracker {
    outstanding: Arc<AtomicUsize>,
    status_tx: Arc<watch::Sender<SessionSnapshot>>,
    event_tx: mpsc::UnboundedSender<BridgeEvent>,
}

impl SaveTracker {
    fn begin(&self) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        self.set(SaveStatus::Saving);
    }

    fn finish(&self, result: std::result::Result<(), String>) {
        let remaining = self.outstanding.fetch_sub(1, Ordering::SeqCst) - 1;
        match result {
            Ok(()) if remaining == 0 => self.set(SaveStatus::Saved),
            Ok(()) => {}
            Err(error) => {
                self.set(SaveStatus::Unsaved);
                let _ = self.event_tx.send(BridgeEvent::PersistFailed(error));
            }
        }
    }

    fn set(&self, status: SaveStatus) {
        let changed = self.status_tx.send_if_modified(|snapshot| {
            if snapshot.save_status == status {
                return false;
            }
            snapshot.save_status = status;
            true
        });
        if changed {
            let _ = self.event_tx.send(BridgeEvent::SaveStatusChanged(status));
        }
    }
}

/// Persistence worker: applies saves one at a time, in arrival order
async fn persist_loop<S>(
    store: Arc<S>,
    project_id: ProjectId,
    mut persist_rx: mpsc::UnboundedReceiver<Value>,
    saves: SaveTracker,
) where
    S: ProjectStore + 'static,
{
    while let Some(payload) = persist_rx.recv().await {
        let result = store
            .upsert(&project_id, ProjectUpdate::payload(payload))
            .await;

        match result {
            Ok(project) => {
                debug!(id = %project_id, updated_at = %project.updated_at, "Project saved");
                saves.finish(Ok(()));
            }
            Err(e) => {
                warn!(
                    id = %project_id,
                    transient = e.is_transient(),
                    "Failed to save project: {}",
                    e
                );
                saves.finish(Err(e.to_string()));
            }
        }
    }
    debug!(id = %project_id, "Persistence worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::session::IMPORT_TIMEOUT_ERROR;
    use crate::bridge::transport::{LocalWindow, MessageBus, PeerFrame};
    use crate::models::{Project, ProjectSummary};
    use crate::store::{SqliteStore, StoreError, StoreResult};
    use serde_json::json;

    const ORIGIN: &str = "https://makecode.microbit.org";
    const EDITOR_URL: &str = "https://makecode.microbit.org/?controller=1&embed=1";

    struct Harness {
        bus: MessageBus,
        frames: mpsc::UnboundedReceiver<PeerFrame>,
        handle: BridgeHandle,
    }

    impl Harness {
        fn post(&self, data: Value) {
            self.bus.post(ORIGIN, data);
        }

        async fn next_frame(&mut self) -> PeerFrame {
            self.frames.recv().await.expect("window closed")
        }

        /// Next posted message with the given action, skipping others
        async fn next_action(&mut self, action: &str) -> Value {
            loop {
                if let PeerFrame::Post { data, .. } = self.next_frame().await {
                    if data["action"] == action {
                        return data;
                    }
                }
            }
        }

        async fn next_event(&mut self) -> BridgeEvent {
            self.handle.event_rx.recv().await.expect("session ended")
        }

        async fn wait_for(&mut self, wanted: BridgeEvent) {
            loop {
                if self.next_event().await == wanted {
                    return;
                }
            }
        }

        /// Drive the handshake to `active`
        async fn activate(&mut self) -> String {
            self.post(json!({"type": "pxthost", "action": "editorcontentloaded"}));
            let import = self.next_action("importproject").await;
            let token = import["id"].as_str().unwrap().to_string();
            self.post(json!({"type": "pxteditor", "id": token, "success": true}));
            self.wait_for(BridgeEvent::PhaseChanged(Phase::Active)).await;
            token
        }
    }

    fn spawn_with<S: ProjectStore + 'static>(store: Arc<S>, payload: Value) -> Harness {
        let bus = MessageBus::new();
        let (window, frames) = LocalWindow::new();
        let transport = BridgeTransport::new(ORIGIN, Arc::new(window), bus.clone());
        let config = BridgeConfig {
            editor_url: EDITOR_URL.to_string(),
            import_timeout: DEFAULT_IMPORT_TIMEOUT,
        };
        let handle = spawn_bridge(
            config,
            transport,
            store,
            ProjectId::parse("abc").unwrap(),
            payload,
        );
        Harness {
            bus,
            frames,
            handle,
        }
    }

    fn payload() -> Value {
        json!({"header": {"id": "abc"}, "text": {"main.ts": ""}})
    }

    /// Store whose writes always fail
    struct FailingStore;

    impl ProjectStore for FailingStore {
        async fn list(&self) -> StoreResult<Vec<ProjectSummary>> {
            Ok(Vec::new())
        }

        async fn get(&self, _id: &ProjectId) -> StoreResult<Option<Project>> {
            Ok(None)
        }

        async fn upsert(&self, _id: &ProjectId, _update: ProjectUpdate) -> StoreResult<Project> {
            Err(StoreError::Status {
                status: 503,
                message: "unavailable".to_string(),
            })
        }

        async fn delete(&self, _id: &ProjectId) -> StoreResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_config_from_app_config() {
        let config = Config::default();
        let bridge = BridgeConfig::from_config(&config).unwrap();
        assert!(bridge
            .editor_url
            .starts_with("https://makecode.microbit.org/?controller=1&controllerId="));
        assert_eq!(bridge.import_timeout, DEFAULT_IMPORT_TIMEOUT);
    }

    #[test]
    fn test_zero_import_timeout_still_waits() {
        let config = Config {
            import_timeout_secs: 0,
            ..Config::default()
        };
        let bridge = BridgeConfig::from_config(&config).unwrap();
        assert_eq!(bridge.import_timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_loads_editor_and_imports_payload() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut h = spawn_with(store, payload());

        assert_eq!(
            h.next_frame().await,
            PeerFrame::Navigate {
                url: EDITOR_URL.to_string()
            }
        );

        // Early readiness announcement right after navigation
        h.post(json!({"type": "pxthost", "action": "editorcontentloaded"}));
        let fullscreen = h.next_action("setsimulatorfullscreen").await;
        assert_eq!(fullscreen["enabled"], false);
        let import = h.next_action("importproject").await;
        assert_eq!(import["project"], payload());
        assert_eq!(import["response"], true);

        assert_eq!(h.handle.snapshot().phase, Phase::Importing);
    }

    #[tokio::test]
    async fn test_workspace_sync_replied_while_loading() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut h = spawn_with(store, payload());

        h.post(json!({"type": "pxthost", "action": "workspacesync", "id": "42"}));
        let reply = h.next_action("workspacesync").await;
        assert_eq!(reply["id"], "42");
        assert_eq!(reply["success"], true);
        assert_eq!(reply["projects"], json!([]));
    }

    #[tokio::test]
    async fn test_saves_persist_in_order_last_wins() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut h = spawn_with(store.clone(), payload());
        h.activate().await;

        h.post(json!({"type": "pxthost", "action": "workspacesave", "project": {"rev": 1}}));
        h.post(json!({"type": "pxthost", "action": "workspacesave", "project": {"rev": 2}}));

        h.wait_for(BridgeEvent::SaveStatusChanged(SaveStatus::Saving))
            .await;

        let id = ProjectId::parse("abc").unwrap();
        loop {
            h.wait_for(BridgeEvent::SaveStatusChanged(SaveStatus::Saved))
                .await;
            let project = store.get(&id).await.unwrap().unwrap();
            if project.payload == Some(json!({"rev": 2})) {
                break;
            }
            // Only the first save has landed so far
            assert_eq!(project.payload, Some(json!({"rev": 1})));
        }
        assert_eq!(h.handle.snapshot().save_status, SaveStatus::Saved);
    }

    #[tokio::test]
    async fn test_save_survives_foreign_burst() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut h = spawn_with(store.clone(), payload());
        h.activate().await;

        h.post(json!({"type": "pxthost", "action": "workspacesave", "project": {"rev": 1}}));
        for _ in 0..300 {
            h.bus.post(
                "https://evil.example",
                json!({"type": "pxthost", "action": "workspacesave", "project": {"rev": 666}}),
            );
        }

        h.wait_for(BridgeEvent::SaveStatusChanged(SaveStatus::Saved))
            .await;
        let id = ProjectId::parse("abc").unwrap();
        let project = store.get(&id).await.unwrap().unwrap();
        assert_eq!(project.payload, Some(json!({"rev": 1})));
    }

    #[tokio::test]
    async fn test_saves_before_import_are_dropped() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut h = spawn_with(store.clone(), payload());

        h.post(json!({"type": "pxthost", "action": "workspacesave", "project": {"rev": 1}}));
        h.activate().await;
        h.handle.shutdown().await;

        let id = ProjectId::parse("abc").unwrap();
        assert!(store.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persist_failure_marks_unsaved() {
        let mut h = spawn_with(Arc::new(FailingStore), payload());
        h.activate().await;

        h.post(json!({"type": "pxthost", "action": "workspacesave", "project": {"rev": 1}}));

        h.wait_for(BridgeEvent::SaveStatusChanged(SaveStatus::Unsaved))
            .await;
        match h.next_event().await {
            BridgeEvent::PersistFailed(error) => assert!(error.contains("unavailable")),
            other => panic!("unexpected event: {:?}", other),
        }
        // Still active: persistence errors never fail the session
        assert_eq!(h.handle.snapshot().phase, Phase::Active);
    }

    #[tokio::test]
    async fn test_import_failure_and_retry() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut h = spawn_with(store, payload());

        h.post(json!({"type": "pxthost", "action": "editorcontentloaded"}));
        let first = h.next_action("importproject").await;
        h.post(json!({"type": "pxteditor", "id": first["id"], "success": false, "error": "bad format"}));

        h.wait_for(BridgeEvent::ImportFailed("bad format".to_string()))
            .await;
        assert_eq!(h.handle.snapshot().error.as_deref(), Some("bad format"));

        h.handle.retry();
        assert_eq!(
            h.next_frame().await,
            PeerFrame::Navigate {
                url: EDITOR_URL.to_string()
            }
        );
        h.post(json!({"type": "pxthost", "action": "editorcontentloaded"}));
        let second = h.next_action("importproject").await;

        assert_ne!(first["id"], second["id"]);
        assert_eq!(second["project"], payload());
    }

    #[tokio::test(start_paused = true)]
    async fn test_import_timeout() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut h = spawn_with(store, payload());

        h.post(json!({"type": "pxthost", "action": "editorcontentloaded"}));
        h.next_action("importproject").await;

        h.wait_for(BridgeEvent::ImportFailed(IMPORT_TIMEOUT_ERROR.to_string()))
            .await;
        assert_eq!(h.handle.snapshot().phase, Phase::Failed);
    }

    #[tokio::test]
    async fn test_commands_inert_after_shutdown() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let h = spawn_with(store, payload());
        let commands = h.handle.commands();
        assert!(commands.is_attached());

        h.handle.shutdown().await;

        assert!(!commands.is_attached());
        commands.compile();
    }
}
