//! Editor synchronization bridge
//!
//! Loads a project into the embedded MakeCode editor and persists the edits
//! it reports back.
//!
//! ## Components
//!
//! - **Messages** (`message`): the closed set of wire messages
//! - **Transport** (`transport`): origin-checked inbound subscriptions and the
//!   outbound peer window
//! - **Session** (`session`): the sans-IO protocol state machine
//! - **Driver** (`driver`): the task that runs a session and persists saves
//! - **Commands** (`commands`): fire-and-forget editor commands
//! - **Relay** (`relay`): a peer window reached over WebSocket
//!
//! ## Protocol
//!
//! ```text
//! host                                   editor
//!  │ ── navigate(editor_url) ─────────────▶ │
//!  │ ◀──────── pxthost/workspacesync {id} ─ │   answered at once, any phase
//!  │ ◀───────── pxthost/editorcontentloaded │
//!  │ ── pxteditor/importproject {id} ─────▶ │   once, with a fresh token
//!  │ ◀──────── pxteditor {id, success} ──── │   only the pending token counts
//!  │ ◀──── pxthost/workspacesave {project} ─│   persisted once active
//! ```

pub mod commands;
pub mod driver;
pub mod message;
pub mod relay;
pub mod session;
pub mod transport;

pub use commands::EditorCommands;
pub use driver::{
    spawn_bridge, BridgeCommand, BridgeConfig, BridgeEvent, BridgeHandle, SaveStatus,
    SessionSnapshot, DEFAULT_IMPORT_TIMEOUT,
};
pub use message::{EditorCommand, InboundMessage, OutboundMessage};
pub use relay::RelayWindow;
pub use session::{Effect, Phase, SyncSession};
pub use transport::{
    BridgeTransport, Envelope, LocalWindow, MessageBus, PeerFrame, PeerWindow, Subscription,
    TransportError,
};
