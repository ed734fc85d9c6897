//! Persistence HTTP surface
//!
//! Route hierarchy:
//!
//! ```text
//! /health                 service status
//! /projects               list (GET), create (POST)
//! /projects/{id}          get, upsert (PUT), delete
//! ```
//!
//! Errors are JSON bodies of the form `{"error": "..."}`.

mod error;
mod handlers;

use std::future::Future;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

pub use error::{ApiError, ApiResult};

use crate::store::SqliteStore;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SqliteStore>,
}

impl AppState {
    pub fn new(store: SqliteStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/projects", get(handlers::list).post(handlers::create))
        .route(
            "/projects/{id}",
            get(handlers::get_by_id)
                .put(handlers::upsert)
                .delete(handlers::delete),
        )
        .with_state(state)
}

/// Serve the router on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
