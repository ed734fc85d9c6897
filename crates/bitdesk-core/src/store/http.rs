//! HTTP project store
//!
//! Client for the persistence service (`bitdesk serve`, or any service with
//! the same surface):
//!
//! - `GET /projects`
//! - `GET /projects/{id}` (404 means "not found", not an error)
//! - `PUT /projects/{id}` with `{name?, payload?}`
//! - `DELETE /projects/{id}`

use std::time::Duration;

use reqwest::{Client, Response, Url};
use serde::Deserialize;
use tracing::debug;

use super::error::{StoreError, StoreResult};
use super::ProjectStore;
use crate::models::{Project, ProjectId, ProjectSummary, ProjectUpdate};

/// Request timeout for persistence calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Project store backed by the HTTP persistence service
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    base_url: Url,
}

/// Error body returned by the service
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpStore {
    /// Create a client for the service at `base_url`
    pub fn new(base_url: &str) -> StoreResult<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| StoreError::InvalidUrl(format!("'{}': {}", base_url, e)))?;

        // Keep any path prefix when joining relative routes
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn projects_url(&self) -> StoreResult<Url> {
        self.join("projects")
    }

    fn project_url(&self, id: &ProjectId) -> StoreResult<Url> {
        self.join(&format!("projects/{}", id))
    }

    fn join(&self, path: &str) -> StoreResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| StoreError::InvalidUrl(format!("'{}': {}", path, e)))
    }
}

/// Turn a non-success response into a typed error
async fn check(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);

    Err(StoreError::Status {
        status: status.as_u16(),
        message,
    })
}

impl ProjectStore for HttpStore {
    async fn list(&self) -> StoreResult<Vec<ProjectSummary>> {
        let response = self.client.get(self.projects_url()?).send().await?;
        let projects = check(response).await?.json().await?;
        Ok(projects)
    }

    async fn get(&self, id: &ProjectId) -> StoreResult<Option<Project>> {
        let response = self.client.get(self.project_url(id)?).send().await?;
        match check(response).await {
            Ok(response) => Ok(Some(response.json().await?)),
            Err(e) if e.is_not_found() => {
                debug!(id = %id, "Project not found on persistence service");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn upsert(&self, id: &ProjectId, update: ProjectUpdate) -> StoreResult<Project> {
        let response = self
            .client
            .put(self.project_url(id)?)
            .json(&update)
            .send()
            .await?;
        let project = check(response).await?.json().await?;
        Ok(project)
    }

    async fn delete(&self, id: &ProjectId) -> StoreResult<()> {
        let response = self.client.delete(self.project_url(id)?).send().await?;
        match check(response).await {
            Ok(_) => Ok(()),
            // Deleting an absent project is not an error
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }
}
