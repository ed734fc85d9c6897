//! Serve command handler

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use bitdesk_core::api::{self, AppState};
use bitdesk_core::{Config, SqliteStore};

use crate::output::Output;

/// Serve the persistence HTTP API from the local database until Ctrl-C
pub async fn run(config: &Config, addr: Option<String>, output: &Output) -> Result<()> {
    let addr = addr.unwrap_or_else(|| config.listen_addr.clone());
    let store = SqliteStore::open_with_config(config).context("Failed to open project database")?;

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let local_addr = listener.local_addr()?;

    info!(db = %config.sqlite_path().display(), "Serving projects on http://{}", local_addr);
    output.message(&format!("Listening on http://{}", local_addr));

    api::serve(listener, AppState::new(store), shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
