//! Handlers for the `/projects` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::models::{Project, ProjectId, ProjectSummary, ProjectUpdate, DEFAULT_PROJECT_NAME};
use crate::store::ProjectStore;

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /projects
pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<ProjectSummary>>> {
    let projects = state
        .store
        .list()
        .await
        .map_err(ApiError::store("fetch projects"))?;
    Ok(Json(projects))
}

/// POST /projects
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<ProjectUpdate>,
) -> ApiResult<Json<Project>> {
    let id = ProjectId::generate();
    let update = ProjectUpdate {
        name: Some(input.name.unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string())),
        payload: input.payload,
    };
    let project = state
        .store
        .upsert(&id, update)
        .await
        .map_err(ApiError::store("create project"))?;
    Ok(Json(project))
}

/// GET /projects/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Project>> {
    let id = ProjectId::parse(&id)?;
    let project = state
        .store
        .get(&id)
        .await
        .map_err(ApiError::store("fetch project"))?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(project))
}

/// PUT /projects/{id}
pub async fn upsert(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<ProjectUpdate>,
) -> ApiResult<Json<Project>> {
    let id = ProjectId::parse(&id)?;
    let project = state
        .store
        .upsert(&id, input)
        .await
        .map_err(ApiError::store("update project"))?;
    Ok(Json(project))
}

/// DELETE /projects/{id}
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let id = ProjectId::parse(&id)?;
    state
        .store
        .delete(&id)
        .await
        .map_err(ApiError::store("delete project"))?;
    Ok((StatusCode::OK, Json(json!({ "success": true }))))
}
