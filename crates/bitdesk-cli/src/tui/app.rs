//! Host surface state
//!
//! Everything shown on screen is derived from the bridge events received so
//! far. Key presses map to [`KeyAction`]s that the run loop carries out.

use std::time::{Duration, Instant};

use crossterm::event::KeyCode;

use bitdesk_core::bridge::{BridgeEvent, Phase, SaveStatus};

use crate::commands::edit::EditTarget;
use crate::output::save_status_label;

/// Most recent activity lines kept for the ready screen
const MAX_ACTIVITY: usize = 50;

/// How long a status message stays in the toolbar
const STATUS_TIMEOUT: Duration = Duration::from_secs(3);

/// What the body of the screen shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen<'a> {
    /// Handshake in progress
    Loading(&'static str),
    /// Import failed; retry is possible
    Error(&'a str),
    /// Editor loaded and saving
    Ready,
}

/// Work requested by a key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Compile,
    Pair,
    SwitchBlocks,
    SwitchJavascript,
    SwitchPython,
    OpenSettings,
    OpenExtensions,
    Print,
    SetHighContrast(bool),
    SetGreenScreen(bool),
    Retry,
    OpenEditor,
    Quit,
    None,
}

/// Application state
pub struct App {
    /// Project being edited
    pub target: EditTarget,
    /// Last phase reported by the session
    pub phase: Phase,
    /// Last import error, while failed
    pub error: Option<String>,
    /// Save indicator
    pub save_status: SaveStatus,
    /// Recent activity, oldest first
    pub activity: Vec<String>,
    /// High contrast toggle as last requested
    pub high_contrast: bool,
    /// Green screen toggle as last requested
    pub green_screen: bool,
    /// Whether help overlay is visible
    pub show_help: bool,
    /// Whether the app should exit
    pub should_quit: bool,
    /// Status message to display temporarily
    pub status_message: Option<String>,
    /// When the status message was set (for auto-dismiss)
    pub status_message_time: Option<Instant>,
}

impl App {
    pub fn new(target: EditTarget) -> Self {
        Self {
            target,
            phase: Phase::Idle,
            error: None,
            save_status: SaveStatus::Saved,
            activity: Vec::new(),
            high_contrast: false,
            green_screen: false,
            show_help: false,
            should_quit: false,
            status_message: None,
            status_message_time: None,
        }
    }

    /// Fold one session event into the view
    pub fn apply(&mut self, event: BridgeEvent) {
        match event {
            BridgeEvent::PhaseChanged(phase) => {
                self.phase = phase;
                if phase != Phase::Failed {
                    self.error = None;
                }
                if phase == Phase::Active {
                    self.log("Project loaded");
                }
            }
            BridgeEvent::ImportFailed(error) => {
                self.log(format!("Import failed: {}", error));
                self.error = Some(error);
            }
            BridgeEvent::SaveStatusChanged(status) => {
                self.save_status = status;
                if status == SaveStatus::Saved {
                    self.log("Saved");
                }
            }
            BridgeEvent::PersistFailed(error) => {
                self.log(format!("Save failed: {}", error));
            }
        }
    }

    pub fn screen(&self) -> Screen<'_> {
        match self.phase {
            Phase::Failed => Screen::Error(
                self.error
                    .as_deref()
                    .unwrap_or(bitdesk_core::bridge::session::DEFAULT_IMPORT_ERROR),
            ),
            Phase::Active => Screen::Ready,
            phase => Screen::Loading(phase.loading_message().unwrap_or("Loading...")),
        }
    }

    /// Badge shown next to the project name
    pub fn id_badge(&self) -> String {
        format!("ID: {}...", self.target.id.short())
    }

    pub fn save_label(&self) -> &'static str {
        save_status_label(self.save_status)
    }

    /// Map a key press to an action, updating local toggles
    pub fn on_key(&mut self, code: KeyCode) -> KeyAction {
        let action = match code {
            KeyCode::Char('q') | KeyCode::Esc => KeyAction::Quit,
            KeyCode::Char('?') => {
                self.show_help = !self.show_help;
                KeyAction::None
            }
            KeyCode::Char('r') if self.phase != Phase::Idle => KeyAction::Retry,
            KeyCode::Char('o') => KeyAction::OpenEditor,
            KeyCode::Char('d') => KeyAction::Compile,
            KeyCode::Char('p') => KeyAction::Pair,
            KeyCode::Char('b') => KeyAction::SwitchBlocks,
            KeyCode::Char('j') => KeyAction::SwitchJavascript,
            KeyCode::Char('y') => KeyAction::SwitchPython,
            KeyCode::Char('s') => KeyAction::OpenSettings,
            KeyCode::Char('x') => KeyAction::OpenExtensions,
            KeyCode::Char('P') => KeyAction::Print,
            KeyCode::Char('h') => {
                self.high_contrast = !self.high_contrast;
                KeyAction::SetHighContrast(self.high_contrast)
            }
            KeyCode::Char('g') => {
                self.green_screen = !self.green_screen;
                KeyAction::SetGreenScreen(self.green_screen)
            }
            _ => KeyAction::None,
        };

        if let Some(message) = action_message(action) {
            self.set_status(message);
        }
        if action == KeyAction::Quit {
            self.should_quit = true;
        }
        action
    }

    /// Set a temporary status message
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.status_message_time = Some(Instant::now());
    }

    /// Check and clear expired status message
    pub fn check_status_timeout(&mut self) {
        if let Some(time) = self.status_message_time {
            if time.elapsed() > STATUS_TIMEOUT {
                self.status_message = None;
                self.status_message_time = None;
            }
        }
    }

    fn log(&mut self, line: impl Into<String>) {
        let stamp = chrono::Local::now().format("%H:%M:%S");
        self.activity.push(format!("{} {}", stamp, line.into()));
        if self.activity.len() > MAX_ACTIVITY {
            let excess = self.activity.len() - MAX_ACTIVITY;
            self.activity.drain(..excess);
        }
    }
}

fn action_message(action: KeyAction) -> Option<String> {
    let message = match action {
        KeyAction::Compile => "Downloading...".to_string(),
        KeyAction::Pair => "Pairing device...".to_string(),
        KeyAction::SwitchBlocks => "Switched to Blocks".to_string(),
        KeyAction::SwitchJavascript => "Switched to JavaScript".to_string(),
        KeyAction::SwitchPython => "Switched to Python".to_string(),
        KeyAction::Retry => "Retrying...".to_string(),
        KeyAction::SetHighContrast(on) => format!("High contrast {}", on_off(on)),
        KeyAction::SetGreenScreen(on) => format!("Green screen {}", on_off(on)),
        _ => return None,
    };
    Some(message)
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}
