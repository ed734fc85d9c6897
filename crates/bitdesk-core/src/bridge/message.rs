//! Bridge wire messages
//!
//! The editor speaks a loosely typed JSON protocol. Inbound data is
//! validated here, once, into a closed [`InboundMessage`] enum; anything
//! that does not match a known `(type, action)` pair is rejected and never
//! reaches the session.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Message type used by host queries and host replies
pub const HOST_TYPE: &str = "pxthost";

/// Message type used by editor commands and their responses
pub const EDITOR_TYPE: &str = "pxteditor";

/// Validated message received from the editor
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// The editor asks for the host's workspace listing
    WorkspaceSync { id: String },
    /// The editor finished loading its content (also sent on view switches)
    EditorContentLoaded,
    /// The user changed the project
    WorkspaceSave { project: Value },
    /// Response to a command that asked for one
    CommandResponse {
        id: String,
        success: bool,
        error: Option<String>,
    },
}

/// Loose shape every inbound message is read through
#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: Option<String>,
    action: Option<String>,
    id: Option<Value>,
    success: Option<bool>,
    error: Option<Value>,
    project: Option<Value>,
}

impl InboundMessage {
    /// Classify raw message data. Returns `None` for anything unrecognised.
    pub fn from_value(data: &Value) -> Option<Self> {
        if !data.is_object() {
            return None;
        }
        let raw: RawMessage = serde_json::from_value(data.clone()).ok()?;

        match (raw.kind.as_deref()?, raw.action.as_deref()) {
            (HOST_TYPE, Some("workspacesync")) => Some(InboundMessage::WorkspaceSync {
                id: id_string(raw.id?)?,
            }),
            (HOST_TYPE, Some("editorcontentloaded")) => Some(InboundMessage::EditorContentLoaded),
            (HOST_TYPE, Some("workspacesave")) => match raw.project? {
                Value::Null => None,
                project => Some(InboundMessage::WorkspaceSave { project }),
            },
            (EDITOR_TYPE, _) => Some(InboundMessage::CommandResponse {
                id: id_string(raw.id?)?,
                success: raw.success.unwrap_or(false),
                error: raw.error.and_then(error_text),
            }),
            _ => None,
        }
    }
}

/// Ids are strings on the wire, but tolerate numbers
fn id_string(id: Value) -> Option<String> {
    match id {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Error text is either a bare string or an object with `message`
fn error_text(error: Value) -> Option<String> {
    match error {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Object(map) => match map.get("message") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Options for the compile command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompileOptions {
    pub native: bool,
}

/// Command sent to the editor
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum EditorCommand {
    SwitchBlocks,
    SwitchJavascript,
    SwitchPython,
    Compile { options: CompileOptions },
    OpenSettings,
    /// Opens the extensions dialog
    AddPackage,
    Pair,
    Print,
    SetHighContrast { on: bool },
    SetGreenScreen { on: bool },
    SetSimulatorFullscreen { enabled: bool },
    ImportProject {
        id: String,
        project: Value,
        response: bool,
    },
}

/// Message sent to the editor
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Editor(EditorCommand),
    WorkspaceSyncReply { id: String },
}

impl OutboundMessage {
    pub fn import(id: String, project: Value) -> Self {
        OutboundMessage::Editor(EditorCommand::ImportProject {
            id,
            project,
            response: true,
        })
    }

    pub fn workspace_sync_reply(id: impl Into<String>) -> Self {
        OutboundMessage::WorkspaceSyncReply { id: id.into() }
    }

    /// Action name, for logging
    pub fn action(&self) -> &'static str {
        match self {
            OutboundMessage::WorkspaceSyncReply { .. } => "workspacesync",
            OutboundMessage::Editor(command) => match command {
                EditorCommand::SwitchBlocks => "switchblocks",
                EditorCommand::SwitchJavascript => "switchjavascript",
                EditorCommand::SwitchPython => "switchpython",
                EditorCommand::Compile { .. } => "compile",
                EditorCommand::OpenSettings => "opensettings",
                EditorCommand::AddPackage => "addpackage",
                EditorCommand::Pair => "pair",
                EditorCommand::Print => "print",
                EditorCommand::SetHighContrast { .. } => "sethighcontrast",
                EditorCommand::SetGreenScreen { .. } => "setgreenscreen",
                EditorCommand::SetSimulatorFullscreen { .. } => "setsimulatorfullscreen",
                EditorCommand::ImportProject { .. } => "importproject",
            },
        }
    }

    /// Encode as the JSON object posted to the editor window
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            OutboundMessage::WorkspaceSyncReply { id } => Ok(json!({
                "type": HOST_TYPE,
                "id": id,
                "action": "workspacesync",
                "success": true,
                "editor": true,
                "projects": [],
            })),
            OutboundMessage::Editor(command) => {
                let mut value = serde_json::to_value(command)?;
                if let Value::Object(map) = &mut value {
                    let mut tagged = Map::with_capacity(map.len() + 1);
                    tagged.insert("type".to_string(), Value::from(EDITOR_TYPE));
                    tagged.append(map);
                    value = Value::Object(tagged);
                }
                Ok(value)
            }
        }
    }
}
