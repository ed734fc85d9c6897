//! Project Store Client
//!
//! Four operations mapping 1:1 onto persistence, behind the `ProjectStore`
//! trait:
//!
//! - `list`: summaries, most recently updated first
//! - `get`: the record, or `None` (a missing project is not an error)
//! - `upsert`: create when absent, otherwise update only supplied fields
//! - `delete`: idempotent removal
//!
//! ## Backends
//!
//! - **SQLite** (`SqliteStore`): local database under the data directory
//! - **HTTP** (`HttpStore`): the persistence service served by `bitdesk serve`

pub mod error;
pub mod http;
pub mod schema;
pub mod sqlite;

use std::future::Future;

use anyhow::{Context, Result};

pub use error::{StoreError, StoreResult};
pub use http::HttpStore;
pub use sqlite::SqliteStore;

use crate::config::Config;
use crate::models::{Project, ProjectId, ProjectSummary, ProjectUpdate, DEFAULT_PROJECT_NAME};

/// Typed request/response wrapper over project persistence
pub trait ProjectStore: Send + Sync {
    /// All projects, most recently updated first
    fn list(&self) -> impl Future<Output = StoreResult<Vec<ProjectSummary>>> + Send;

    /// A single project, `None` when it does not exist
    fn get(&self, id: &ProjectId) -> impl Future<Output = StoreResult<Option<Project>>> + Send;

    /// Create or update a project and return the resulting record
    fn upsert(
        &self,
        id: &ProjectId,
        update: ProjectUpdate,
    ) -> impl Future<Output = StoreResult<Project>> + Send;

    /// Remove a project; removing a missing project succeeds
    fn delete(&self, id: &ProjectId) -> impl Future<Output = StoreResult<()>> + Send;

    /// Create a new, empty project under a fresh id
    fn create(&self, name: Option<String>) -> impl Future<Output = StoreResult<Project>> + Send {
        async move {
            let id = ProjectId::generate();
            let update = ProjectUpdate {
                name: Some(name.unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string())),
                payload: None,
            };
            self.upsert(&id, update).await
        }
    }
}

/// Store selected by configuration
pub enum StoreBackend {
    Local(SqliteStore),
    Remote(HttpStore),
}

impl StoreBackend {
    /// Remote store when `store_url` is set, local SQLite otherwise
    pub fn from_config(config: &Config) -> Result<Self> {
        match &config.store_url {
            Some(url) => {
                let store = HttpStore::new(url).context("Failed to create persistence client")?;
                Ok(StoreBackend::Remote(store))
            }
            None => {
                let store = SqliteStore::open_with_config(config)
                    .context("Failed to open local project store")?;
                Ok(StoreBackend::Local(store))
            }
        }
    }

    /// Human-readable location of the backing store
    pub fn location(&self) -> String {
        match self {
            StoreBackend::Local(store) => store
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| ":memory:".to_string()),
            StoreBackend::Remote(store) => store.base_url().to_string(),
        }
    }
}

impl ProjectStore for StoreBackend {
    async fn list(&self) -> StoreResult<Vec<ProjectSummary>> {
        match self {
            StoreBackend::Local(store) => store.list().await,
            StoreBackend::Remote(store) => store.list().await,
        }
    }

    async fn get(&self, id: &ProjectId) -> StoreResult<Option<Project>> {
        match self {
            StoreBackend::Local(store) => store.get(id).await,
            StoreBackend::Remote(store) => store.get(id).await,
        }
    }

    async fn upsert(&self, id: &ProjectId, update: ProjectUpdate) -> StoreResult<Project> {
        match self {
            StoreBackend::Local(store) => store.upsert(id, update).await,
            StoreBackend::Remote(store) => store.upsert(id, update).await,
        }
    }

    async fn delete(&self, id: &ProjectId) -> StoreResult<()> {
        match self {
            StoreBackend::Local(store) => store.delete(id).await,
            StoreBackend::Remote(store) => store.delete(id).await,
        }
    }
}
