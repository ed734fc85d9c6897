//! bitdesk CLI
//!
//! Command-line interface for bitdesk - micro:bit projects with an embedded
//! MakeCode editor.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bitdesk_core::{Config, StoreBackend};

mod commands;
mod output;
mod tui;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "bitdesk")]
#[command(about = "bitdesk - micro:bit projects in an embedded MakeCode editor")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all projects
    #[command(alias = "ls")]
    List,
    /// Create a new project
    New {
        /// Project name
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Show project details
    Show {
        /// Project ID
        id: String,
    },
    /// Rename a project
    Rename {
        /// Project ID
        id: String,
        /// New name
        name: String,
    },
    /// Delete a project
    #[command(alias = "rm")]
    Delete {
        /// Project ID
        id: String,
    },
    /// Open a project in the editor
    Edit {
        /// Project ID
        id: String,
        /// Print session events instead of starting the TUI
        #[arg(long)]
        headless: bool,
    },
    /// Serve the project persistence API over HTTP
    Serve {
        /// Address to listen on (defaults to listen_addr)
        #[arg(long)]
        addr: Option<String>,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Show store and editor status
    Status,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, store_url, editor_url, relay_url, ...)
        key: String,
        /// Configuration value ("none" clears optional keys)
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Config commands work on the file itself, even a broken one
    if let Commands::Config { command } = &cli.command {
        init_cli_logging();
        return handle_config_command(command.clone(), config_path, &output);
    }

    let config = Config::load_with_cli_override(config_path)?;

    match cli.command {
        Commands::Serve { addr } => {
            init_server_logging();
            commands::serve::run(&config, addr, &output).await
        }
        Commands::Edit { id, headless } => {
            // The TUI logs to a file of its own
            if headless {
                init_cli_logging();
            }
            commands::edit::run(&config, id, headless, &output).await
        }
        command => {
            init_cli_logging();
            let store = StoreBackend::from_config(&config)?;
            handle_store_command(command, &config, &store, &output).await
        }
    }
}

async fn handle_store_command(
    command: Commands,
    config: &Config,
    store: &StoreBackend,
    output: &Output,
) -> Result<()> {
    match command {
        Commands::List => commands::project::list(store, output).await,
        Commands::New { name } => commands::project::create(store, name, output).await,
        Commands::Show { id } => commands::project::show(store, id, output).await,
        Commands::Rename { id, name } => commands::project::rename(store, id, name, output).await,
        Commands::Delete { id } => commands::project::delete(store, id, output).await,
        Commands::Status => commands::status::show(config, store, output).await,
        Commands::Edit { .. } | Commands::Serve { .. } | Commands::Config { .. } => {
            unreachable!() // Handled in main
        }
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Log to stderr, only when BITDESK_LOG is set
fn init_cli_logging() {
    let Ok(log_level) = std::env::var("BITDESK_LOG") else {
        return;
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!(
            "bitdesk_core={},bitdesk={}",
            log_level, log_level
        )))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Log to stderr at info unless BITDESK_LOG says otherwise
fn init_server_logging() {
    let log_level = std::env::var("BITDESK_LOG").unwrap_or_else(|_| "info".to_string());

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!(
            "bitdesk_core={},bitdesk={}",
            log_level, log_level
        )))
        .with_writer(std::io::stderr)
        .try_init();
}
