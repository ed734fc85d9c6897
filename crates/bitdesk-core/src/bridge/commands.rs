//! Editor command facade
//!
//! [`EditorCommands`] is the handle the host surface uses to drive the
//! editor: view switches, compile, dialogs and display toggles. Every call
//! posts one message and returns immediately. The editor does not answer
//! these commands, so failures are only logged.

use std::sync::{Arc, Weak};

use tracing::debug;

use super::message::{CompileOptions, EditorCommand, OutboundMessage};
use super::transport::BridgeTransport;

/// Fire-and-forget commands for a running session
#[derive(Debug, Clone, Default)]
pub struct EditorCommands {
    link: Option<Link>,
}

#[derive(Debug, Clone)]
struct Link {
    transport: BridgeTransport,
    /// Dead once the session task has exited
    alive: Weak<()>,
}

impl EditorCommands {
    /// A handle not bound to any session; every call does nothing
    pub fn detached() -> Self {
        Self { link: None }
    }

    pub(crate) fn attached(transport: BridgeTransport, alive: &Arc<()>) -> Self {
        Self {
            link: Some(Link {
                transport,
                alive: Arc::downgrade(alive),
            }),
        }
    }

    /// Whether commands currently reach a live session
    pub fn is_attached(&self) -> bool {
        self.link
            .as_ref()
            .is_some_and(|link| link.alive.strong_count() > 0)
    }

    pub fn switch_to_blocks(&self) {
        self.send(EditorCommand::SwitchBlocks);
    }

    pub fn switch_to_javascript(&self) {
        self.send(EditorCommand::SwitchJavascript);
    }

    pub fn switch_to_python(&self) {
        self.send(EditorCommand::SwitchPython);
    }

    /// Build the program for download to the device
    pub fn compile(&self) {
        self.send(EditorCommand::Compile {
            options: CompileOptions { native: true },
        });
    }

    pub fn open_settings(&self) {
        self.send(EditorCommand::OpenSettings);
    }

    pub fn open_extensions(&self) {
        self.send(EditorCommand::AddPackage);
    }

    /// Start WebUSB pairing with a micro:bit
    pub fn pair_device(&self) {
        self.send(EditorCommand::Pair);
    }

    pub fn print(&self) {
        self.send(EditorCommand::Print);
    }

    pub fn set_high_contrast(&self, on: bool) {
        self.send(EditorCommand::SetHighContrast { on });
    }

    pub fn set_green_screen(&self, on: bool) {
        self.send(EditorCommand::SetGreenScreen { on });
    }

    pub fn set_simulator_fullscreen(&self, on: bool) {
        self.send(EditorCommand::SetSimulatorFullscreen { enabled: on });
    }

    fn send(&self, command: EditorCommand) {
        let Some(link) = &self.link else {
            return;
        };
        if link.alive.strong_count() == 0 {
            debug!("Editor command dropped, session has shut down");
            return;
        }

        let message = OutboundMessage::Editor(command);
        if let Err(e) = link.transport.send(&message) {
            debug!(action = message.action(), "Editor command not delivered: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::transport::{LocalWindow, MessageBus, PeerFrame};
    use serde_json::json;

    const ORIGIN: &str = "https://makecode.microbit.org";

    #[test]
    fn test_detached_is_inert() {
        let commands = EditorCommands::detached();
        assert!(!commands.is_attached());
        commands.compile();
        commands.set_green_screen(true);
    }

    #[test]
    fn test_attached_sends_commands() {
        let (window, mut frames) = LocalWindow::new();
        let transport = BridgeTransport::new(ORIGIN, Arc::new(window), MessageBus::new());
        let alive = Arc::new(());
        let commands = EditorCommands::attached(transport, &alive);

        commands.compile();
        commands.open_extensions();
        commands.set_simulator_fullscreen(true);

        let data: Vec<_> = std::iter::from_fn(|| frames.try_recv().ok())
            .map(|frame| match frame {
                PeerFrame::Post {
                    target_origin,
                    data,
                } => {
                    assert_eq!(target_origin, ORIGIN);
                    data
                }
                other => panic!("unexpected frame: {:?}", other),
            })
            .collect();

        assert_eq!(
            data,
            vec![
                json!({"type": "pxteditor", "action": "compile", "options": {"native": true}}),
                json!({"type": "pxteditor", "action": "addpackage"}),
                json!({"type": "pxteditor", "action": "setsimulatorfullscreen", "enabled": true}),
            ]
        );
    }

    #[test]
    fn test_inert_after_session_ends() {
        let (window, mut frames) = LocalWindow::new();
        let transport = BridgeTransport::new(ORIGIN, Arc::new(window), MessageBus::new());
        let alive = Arc::new(());
        let commands = EditorCommands::attached(transport, &alive);
        let clone = commands.clone();

        drop(alive);

        assert!(!clone.is_attached());
        clone.pair_device();
        commands.print();
        assert!(frames.try_recv().is_err());
    }
}
