//! Status command handler

use anyhow::{Context, Result};

use bitdesk_core::{Config, ProjectStore, StoreBackend};

use crate::output::{Output, OutputFormat};

/// Show status information
pub async fn show(config: &Config, store: &StoreBackend, output: &Output) -> Result<()> {
    let projects = store
        .list()
        .await
        .with_context(|| format!("Failed to reach project store at {}", store.location()))?;
    let backend = match store {
        StoreBackend::Local(_) => "local",
        StoreBackend::Remote(_) => "remote",
    };

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "store": {
                        "backend": backend,
                        "location": store.location(),
                    },
                    "projects": projects.len(),
                    "editor": {
                        "url": config.editor_url,
                        "origin": config.editor_origin,
                        "relay_url": config.relay_url,
                        "import_timeout_secs": config.import_timeout_secs,
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", projects.len());
        }
        OutputFormat::Human => {
            println!("bitdesk Status");
            println!("==============");
            println!();
            println!("Store:");
            println!("  Backend:  {}", backend);
            println!("  Location: {}", store.location());
            println!("  Projects: {}", projects.len());
            println!();
            println!("Editor:");
            println!("  URL:    {}", config.editor_url);
            println!("  Origin: {}", config.editor_origin);
            println!(
                "  Relay:  {}",
                config.relay_url.as_deref().unwrap_or("(not set)")
            );
            if let Some(latest) = projects.first() {
                println!();
                println!(
                    "Last edited: {} ({})",
                    latest.name,
                    latest.updated_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
    }

    Ok(())
}
