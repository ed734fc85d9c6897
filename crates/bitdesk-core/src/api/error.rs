use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::models::InvalidProjectId;
use crate::store::StoreError;

/// Error type for HTTP handlers.
///
/// Every variant renders as `{"error": "..."}` with a matching status code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The requested project does not exist.
    #[error("Project not found")]
    NotFound,

    /// The path id failed validation.
    #[error(transparent)]
    InvalidId(#[from] InvalidProjectId),

    /// The store failed; `action` names what was being attempted.
    #[error("Failed to {action}: {source}")]
    Store {
        action: &'static str,
        #[source]
        source: StoreError,
    },
}

/// Convenience type alias for handler return values.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn store(action: &'static str) -> impl FnOnce(StoreError) -> ApiError {
        move |source| ApiError::Store { action, source }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::InvalidId(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            ApiError::Store { action, source } => {
                tracing::error!(error = %source, "Failed to {}", action);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to {}", action),
                )
            }
        };

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}
