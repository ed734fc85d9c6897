//! Data models for bitdesk
//!
//! Defines the persisted project record and the request shapes used to
//! create or update it. The payload is the editor's serialized project and
//! is never interpreted here.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Name given to projects created without one
pub const DEFAULT_PROJECT_NAME: &str = "Untitled Project";

/// Longest id accepted from callers
const MAX_ID_LEN: usize = 64;

/// Opaque project identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    /// Generate a fresh identifier (base58 of a random UUID)
    pub fn generate() -> Self {
        Self(bs58::encode(Uuid::new_v4().as_bytes()).into_string())
    }

    /// Validate and wrap a caller-supplied identifier
    pub fn parse(s: &str) -> Result<Self, InvalidProjectId> {
        let valid = !s.is_empty()
            && s.len() <= MAX_ID_LEN
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidProjectId(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form shown in badges: first 8 characters
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProjectId {
    type Err = InvalidProjectId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Rejected project identifier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid project id '{0}': use 1-64 letters, digits, '-' or '_'")]
pub struct InvalidProjectId(pub String);

/// A persisted micro:bit project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Unique identifier, immutable
    pub id: ProjectId,
    /// Display name
    pub name: String,
    /// When this project was created
    pub created_at: DateTime<Utc>,
    /// When this project was last persisted
    pub updated_at: DateTime<Utc>,
    /// Serialized editor project, replaced wholesale on every save
    #[serde(default)]
    pub payload: Option<Value>,
}

impl Project {
    /// Create a new, empty project
    pub fn new(id: ProjectId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            created_at: now,
            updated_at: now,
            payload: None,
        }
    }

    /// Apply an update: only supplied fields change, `updated_at` never moves back
    pub fn apply(&mut self, update: ProjectUpdate, now: DateTime<Utc>) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(payload) = update.payload {
            self.payload = Some(payload);
        }
        self.updated_at = now.max(self.updated_at);
    }

    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Project without its payload, as returned by list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: ProjectId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Upsert request body: absent fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        alias = "makecodeProject",
        skip_serializing_if = "Option::is_none"
    )]
    pub payload: Option<Value>,
}

impl ProjectUpdate {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            payload: None,
        }
    }

    pub fn payload(payload: Value) -> Self {
        Self {
            name: None,
            payload: Some(payload),
        }
    }
}
