//! Edit command handler
//!
//! Opens a project in the embedded editor: loads the record, connects the
//! relay window, starts a bridge session and hands it to the TUI (or prints
//! its events with `--headless`).

use std::sync::Arc;

use anyhow::{Context, Result};

use bitdesk_core::bridge::{
    spawn_bridge, BridgeConfig, BridgeHandle, BridgeTransport, MessageBus, RelayWindow,
};
use bitdesk_core::models::DEFAULT_PROJECT_NAME;
use bitdesk_core::{editor, Config, ProjectId, ProjectStore, StoreBackend};

use crate::output::Output;
use crate::tui;

/// What the host surface shows about the project being edited
#[derive(Debug, Clone)]
pub struct EditTarget {
    pub id: ProjectId,
    pub name: String,
    pub editor_url: String,
}

pub async fn run(config: &Config, id: String, headless: bool, output: &Output) -> Result<()> {
    let id = ProjectId::parse(&id)?;
    let store = Arc::new(StoreBackend::from_config(config)?);

    let project = store.get(&id).await.context("Failed to load project")?;
    let name = project
        .as_ref()
        .map(|p| p.name.clone())
        .unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string());
    // Never-saved projects open on the starter payload
    let payload = editor::payload_or_default(&id, project.and_then(|p| p.payload));

    let relay_url = config.relay_url.as_deref().context(
        "No editor relay configured.\nSet one with: bitdesk config set relay_url ws://localhost:8080",
    )?;
    let bridge_config = BridgeConfig::from_config(config)?;

    let bus = MessageBus::new();
    let window = RelayWindow::connect(relay_url, bus.clone()).await?;
    let transport = BridgeTransport::new(config.editor_origin.clone(), Arc::new(window), bus);

    let target = EditTarget {
        id: id.clone(),
        name,
        editor_url: bridge_config.editor_url.clone(),
    };
    let handle = spawn_bridge(bridge_config, transport, store, id, payload);

    if headless {
        run_headless(target, handle, output).await
    } else {
        tui::run(config, target, handle).await
    }
}

/// Print session events until Ctrl-C
async fn run_headless(target: EditTarget, mut handle: BridgeHandle, output: &Output) -> Result<()> {
    output.message(&format!(
        "Editing {} (ID: {}...), press Ctrl-C to stop",
        target.name,
        target.id.short()
    ));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = handle.event_rx.recv() => {
                match event {
                    Some(event) => output.print_event(&event),
                    None => break,
                }
            }
            _ = &mut ctrl_c => break,
        }
    }

    handle.shutdown().await;
    Ok(())
}
