//! Sync session state machine
//!
//! A [`SyncSession`] owns the protocol state for one project loaded into one
//! editor. It performs no I/O: every input returns the [`Effect`]s the driver
//! must carry out, in order.
//!
//! ```text
//! idle ──start──▶ peer-loading ──content-loaded──▶ peer-ready ──▶ importing
//!                                                                  │    │
//!                                          matching success ◀──────┘    └──▶ failed
//!                                                  │                (error / timeout)
//!                                                  ▼
//!                                               active
//! ```
//!
//! `retry` returns any non-idle session to idle and starts over.

use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use super::message::{EditorCommand, InboundMessage, OutboundMessage};

/// Error shown when the editor rejects an import without saying why
pub const DEFAULT_IMPORT_ERROR: &str = "Failed to import project";

/// Error shown when the editor never answers the import
pub const IMPORT_TIMEOUT_ERROR: &str = "Timed out waiting for the editor to import the project";

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Created, or reset by retry; nothing requested yet
    Idle,
    /// Editor navigation requested, waiting for its content
    PeerLoading,
    /// Editor content loaded, import not yet sent
    PeerReady,
    /// Import sent, waiting for the matching response
    Importing,
    /// Import confirmed; edits are persisted
    Active,
    /// Import rejected or timed out
    Failed,
}

impl Phase {
    /// Message shown while the session is still loading
    pub fn loading_message(&self) -> Option<&'static str> {
        match self {
            Phase::Idle | Phase::PeerLoading => Some("Loading editor..."),
            Phase::PeerReady | Phase::Importing => Some("Loading project..."),
            Phase::Active | Phase::Failed => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::PeerLoading => "peer-loading",
            Phase::PeerReady => "peer-ready",
            Phase::Importing => "importing",
            Phase::Active => "active",
            Phase::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Work the driver must perform on behalf of the session
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Post a message to the editor
    Send(OutboundMessage),
    /// Navigate the editor window to the editor URL
    LoadPeer,
    /// Start the import deadline for this token
    ArmImportTimeout(String),
    /// Save this payload to the project store
    Persist(Value),
    /// The session entered a new phase
    Transition(Phase),
}

/// Protocol state for one project in one editor
#[derive(Debug)]
pub struct SyncSession {
    nonce: String,
    sequence: u64,
    phase: Phase,
    latest_payload: Value,
    pending_token: Option<String>,
    saving_enabled: bool,
    error: Option<String>,
}

impl SyncSession {
    /// Create an idle session that will import `payload`
    pub fn new(payload: Value) -> Self {
        let nonce = Uuid::new_v4().simple().to_string()[..8].to_string();
        Self {
            nonce,
            sequence: 0,
            phase: Phase::Idle,
            latest_payload: payload,
            pending_token: None,
            saving_enabled: false,
            error: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Error text while in [`Phase::Failed`]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn saving_enabled(&self) -> bool {
        self.saving_enabled
    }

    /// Payload the next import will carry
    pub fn latest_payload(&self) -> &Value {
        &self.latest_payload
    }

    pub fn pending_token(&self) -> Option<&str> {
        self.pending_token.as_deref()
    }

    /// Begin the handshake. Only meaningful while idle.
    pub fn start(&mut self) -> Vec<Effect> {
        if self.phase != Phase::Idle {
            debug!(phase = %self.phase, "Ignoring start outside idle");
            return Vec::new();
        }
        let mut effects = Vec::new();
        self.transition(Phase::PeerLoading, &mut effects);
        effects.push(Effect::LoadPeer);
        effects
    }

    /// Process one validated inbound message
    pub fn handle(&mut self, message: InboundMessage) -> Vec<Effect> {
        let mut effects = Vec::new();

        match message {
            InboundMessage::WorkspaceSync { id } => {
                effects.push(Effect::Send(OutboundMessage::workspace_sync_reply(id)));
            }
            InboundMessage::EditorContentLoaded => {
                // Keep the simulator from covering the editor after every load
                effects.push(Effect::Send(OutboundMessage::Editor(
                    EditorCommand::SetSimulatorFullscreen { enabled: false },
                )));

                if self.phase == Phase::PeerLoading {
                    self.transition(Phase::PeerReady, &mut effects);
                    self.send_import(&mut effects);
                } else {
                    debug!(phase = %self.phase, "Content loaded, no import needed");
                }
            }
            InboundMessage::CommandResponse { id, success, error } => {
                let matches_pending = self.pending_token.as_deref() == Some(id.as_str());
                if self.phase != Phase::Importing || !matches_pending {
                    debug!(id = %id, "Ignoring stale or unrelated command response");
                    return effects;
                }
                self.pending_token = None;

                if success {
                    self.saving_enabled = true;
                    self.transition(Phase::Active, &mut effects);
                } else {
                    let error = error.unwrap_or_else(|| DEFAULT_IMPORT_ERROR.to_string());
                    self.fail(error, &mut effects);
                }
            }
            InboundMessage::WorkspaceSave { project } => {
                if !self.saving_enabled {
                    debug!(phase = %self.phase, "Dropping save before import completed");
                    return effects;
                }
                self.latest_payload = project.clone();
                effects.push(Effect::Persist(project));
            }
        }

        effects
    }

    /// The deadline armed for `token` has passed
    pub fn import_timed_out(&mut self, token: &str) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.phase == Phase::Importing && self.pending_token.as_deref() == Some(token) {
            self.pending_token = None;
            self.fail(IMPORT_TIMEOUT_ERROR.to_string(), &mut effects);
        } else {
            debug!(token, "Ignoring stale import timeout");
        }
        effects
    }

    /// Reset to idle and run the whole handshake again
    pub fn retry(&mut self) -> Vec<Effect> {
        if self.phase == Phase::Idle {
            return Vec::new();
        }

        self.pending_token = None;
        self.saving_enabled = false;
        self.error = None;

        let mut effects = Vec::new();
        self.transition(Phase::Idle, &mut effects);
        effects.extend(self.start());
        effects
    }

    fn send_import(&mut self, effects: &mut Vec<Effect>) {
        self.sequence += 1;
        let token = format!("import-{}-{}", self.nonce, self.sequence);
        self.pending_token = Some(token.clone());

        effects.push(Effect::Send(OutboundMessage::import(
            token.clone(),
            self.latest_payload.clone(),
        )));
        effects.push(Effect::ArmImportTimeout(token));
        self.transition(Phase::Importing, effects);
    }

    fn fail(&mut self, error: String, effects: &mut Vec<Effect>) {
        info!(error = %error, "Project import failed");
        self.error = Some(error);
        self.transition(Phase::Failed, effects);
    }

    fn transition(&mut self, phase: Phase, effects: &mut Vec<Effect>) {
        debug!(from = %self.phase, to = %phase, "Session phase change");
        self.phase = phase;
        effects.push(Effect::Transition(phase));
    }
}
