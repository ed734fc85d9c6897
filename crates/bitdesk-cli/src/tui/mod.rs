//! Editor host TUI
//!
//! Terminal surface for one editing session. The editor itself runs in the
//! relay's browser page; this screen shows the project, the session state
//! and the save indicator, and turns key presses into editor commands.
//!
//! ## Layout
//!
//! - Header: project name, `ID: xxxxxxxx...` badge, save indicator
//! - Body: loading message, import error, or editor URL and activity
//! - Toolbar: key bindings or a temporary status message
//!
//! ## Keys
//!
//! - d: Download (compile)
//! - p: Pair device
//! - b/j/y: Blocks / JavaScript / Python
//! - s / x: Settings / Extensions
//! - P: Print
//! - h / g: High contrast / Green screen
//! - r: Retry after a failed load
//! - o: Open the editor URL in a browser
//! - ?: Help
//! - q: Quit

mod app;
mod ui;

use std::fs::File;
use std::io::stdout;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use app::{App, KeyAction};
use bitdesk_core::bridge::{BridgeHandle, EditorCommands};
use bitdesk_core::Config;

use crate::commands::edit::EditTarget;

/// Run the TUI for a started session
pub async fn run(config: &Config, target: EditTarget, handle: BridgeHandle) -> Result<()> {
    // Initialize TUI logging (file-based, only if BITDESK_LOG is set)
    init_tui_logging(config);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = App::new(target);
    let mut handle = handle;

    let result = run_app(&mut terminal, &mut app, &mut handle).await;

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    handle.shutdown().await;
    result
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    handle: &mut BridgeHandle,
) -> Result<()> {
    let commands = handle.commands();

    loop {
        app.check_status_timeout();

        terminal.draw(|frame| ui::draw(frame, app))?;

        tokio::select! {
            biased;

            bridge_event = handle.event_rx.recv() => {
                match bridge_event {
                    Some(event) => app.apply(event),
                    None => {
                        warn!("Bridge session ended");
                        return Ok(());
                    }
                }
            }

            // Poll for terminal events
            _ = tokio::time::sleep(Duration::from_millis(50)) => {
                if !event::poll(Duration::from_millis(0))? {
                    continue;
                }
                let Event::Key(key) = event::read()? else {
                    continue;
                };
                // Only handle key press events (not release)
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                // If help is showing, any key dismisses it
                if app.show_help {
                    app.show_help = false;
                    continue;
                }

                let action = app.on_key(key.code);
                perform(action, app, handle, &commands);

                if app.should_quit {
                    return Ok(());
                }
            }
        }
    }
}

/// Carry out a key action
fn perform(action: KeyAction, app: &mut App, handle: &BridgeHandle, commands: &EditorCommands) {
    match action {
        KeyAction::Compile => commands.compile(),
        KeyAction::Pair => commands.pair_device(),
        KeyAction::SwitchBlocks => commands.switch_to_blocks(),
        KeyAction::SwitchJavascript => commands.switch_to_javascript(),
        KeyAction::SwitchPython => commands.switch_to_python(),
        KeyAction::OpenSettings => commands.open_settings(),
        KeyAction::OpenExtensions => commands.open_extensions(),
        KeyAction::Print => commands.print(),
        KeyAction::SetHighContrast(on) => commands.set_high_contrast(on),
        KeyAction::SetGreenScreen(on) => commands.set_green_screen(on),
        KeyAction::Retry => handle.retry(),
        KeyAction::OpenEditor => {
            if let Err(e) = open::that(&app.target.editor_url) {
                app.set_status(format!("Failed to open browser: {}", e));
            }
        }
        KeyAction::Quit | KeyAction::None => {}
    }
}

/// Initialize file-based logging for TUI mode
///
/// Only logs if BITDESK_LOG is set; the terminal belongs to the UI.
fn init_tui_logging(config: &Config) {
    let Ok(log_level) = std::env::var("BITDESK_LOG") else {
        return;
    };

    let log_path = config.log_path();

    let log_file = match File::create(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not create log file {:?}: {}", log_path, e);
            return;
        }
    };

    let env_filter = EnvFilter::new(format!("bitdesk_core={},bitdesk={}", log_level, log_level));

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(log_file)
        .try_init();

    info!("TUI logging initialized to {:?}", log_path);
}
