//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use bitdesk_core::Config;

use crate::output::{Output, OutputFormat};

const VALID_KEYS: &str = "data_dir, store_url, relay_url, editor_url, editor_origin, \
                          controller_id, import_timeout_secs, listen_addr, log_file";

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "store_url": config.store_url,
                    "relay_url": config.relay_url,
                    "editor_url": config.editor_url,
                    "editor_origin": config.editor_origin,
                    "controller_id": config.controller_id,
                    "import_timeout_secs": config.import_timeout_secs,
                    "listen_addr": config.listen_addr,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:            {}", config.data_dir.display());
            println!(
                "  store_url:           {}",
                config.store_url.as_deref().unwrap_or("(not set, local database)")
            );
            println!(
                "  relay_url:           {}",
                config.relay_url.as_deref().unwrap_or("(not set)")
            );
            println!("  editor_url:          {}", config.editor_url);
            println!("  editor_origin:       {}", config.editor_origin);
            println!("  controller_id:       {}", config.controller_id);
            println!("  import_timeout_secs: {}", config.import_timeout_secs);
            println!("  listen_addr:         {}", config.listen_addr);
            println!(
                "  log_file:            {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

/// Apply one `key = value` assignment
fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => config.data_dir = value.into(),
        "store_url" => config.store_url = optional(value),
        "relay_url" => config.relay_url = optional(value),
        "editor_url" => {
            bitdesk_core::editor::editor_url(value, &config.controller_id)?;
            config.editor_url = value.to_string();
        }
        "editor_origin" => config.editor_origin = value.trim_end_matches('/').to_string(),
        "controller_id" => config.controller_id = value.to_string(),
        "import_timeout_secs" => {
            let secs: u64 = value
                .parse()
                .context("Invalid value for import_timeout_secs. Use a whole number of seconds.")?;
            if secs == 0 {
                bail!("import_timeout_secs must be at least 1");
            }
            config.import_timeout_secs = secs;
        }
        "listen_addr" => config.listen_addr = value.to_string(),
        "log_file" => config.log_file = optional(value).map(PathBuf::from),
        _ => {
            bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                VALID_KEYS
            );
        }
    }
    Ok(())
}

/// Empty or "none" clears an optional setting
fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}
