//! bitdesk Core Library
//!
//! This crate provides the core functionality for bitdesk, a manager for
//! micro:bit coding projects that are edited inside an embedded MakeCode
//! editor.
//!
//! # Architecture
//!
//! - **Store**: project records (id, name, timestamps, opaque payload) kept
//!   in SQLite locally or behind the HTTP persistence service
//! - **Bridge**: the protocol state machine that loads a project into the
//!   embedded editor and persists the edits it reports back
//!
//! # Quick Start
//!
//! ```text
//! let store = SqliteStore::open_with_config(&config)?;
//! let project = store.create(None).await?;
//!
//! let bus = MessageBus::new();
//! let window = RelayWindow::connect(&relay_url, bus.clone()).await?;
//! let transport = BridgeTransport::new(config.editor_origin.clone(), Arc::new(window), bus);
//!
//! let handle = spawn_bridge(BridgeConfig::from_config(&config)?, transport, Arc::new(store), project.id, payload);
//! handle.commands().compile();
//! ```
//!
//! # Modules
//!
//! - `config`: Application configuration
//! - `models`: Project records and update requests
//! - `editor`: Default editor payload and editor URL
//! - `store`: Project Store Client (SQLite and HTTP)
//! - `api`: Persistence HTTP surface
//! - `bridge`: Editor synchronization bridge

pub mod api;
pub mod bridge;
pub mod config;
pub mod editor;
pub mod models;
pub mod store;

pub use config::Config;
pub use models::{Project, ProjectId, ProjectSummary, ProjectUpdate};
pub use store::{HttpStore, ProjectStore, SqliteStore, StoreBackend, StoreError};
