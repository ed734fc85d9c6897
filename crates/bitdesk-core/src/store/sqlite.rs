//! Local SQLite project store
//!
//! One row per project. Timestamps are stored as Unix milliseconds, the
//! payload as JSON text exactly as received.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use super::error::{StoreError, StoreResult};
use super::schema::{init_schema, needs_init};
use super::ProjectStore;
use crate::config::Config;
use crate::models::{Project, ProjectId, ProjectSummary, ProjectUpdate, DEFAULT_PROJECT_NAME};

/// Project store backed by a local SQLite database
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open the store in the configured data directory
    pub fn open_with_config(config: &Config) -> StoreResult<Self> {
        Self::open(&config.sqlite_path())
    }

    /// Open or create the SQLite database at `path`
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        if needs_init(&conn) {
            init_schema(&conn)?;
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Database file, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl ProjectStore for SqliteStore {
    async fn list(&self) -> StoreResult<Vec<ProjectSummary>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, name, created_at, updated_at FROM projects \
             ORDER BY updated_at DESC, created_at DESC, id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(SummaryRow {
                id: row.get(0)?,
                name: row.get(1)?,
                created_at: row.get(2)?,
                updated_at: row.get(3)?,
            })
        })?;

        let mut projects = Vec::new();
        for row in rows {
            projects.push(row?.hydrate()?);
        }
        Ok(projects)
    }

    async fn get(&self, id: &ProjectId) -> StoreResult<Option<Project>> {
        let conn = self.conn.lock().await;
        select_project(&conn, id)
    }

    async fn upsert(&self, id: &ProjectId, update: ProjectUpdate) -> StoreResult<Project> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let now = Utc::now();

        let project = match select_project(&tx, id)? {
            Some(mut project) => {
                project.apply(update, now);
                tx.execute(
                    "UPDATE projects SET name = ?2, payload = ?3, updated_at = ?4 WHERE id = ?1",
                    params![
                        project.id.as_str(),
                        project.name,
                        encode_payload(&project.payload)?,
                        project.updated_at.timestamp_millis(),
                    ],
                )?;
                debug!(id = %id, "Updated project");
                project
            }
            None => {
                let name = update
                    .name
                    .unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string());
                let mut project = Project::new(id.clone(), name);
                project.created_at = now;
                project.updated_at = now;
                project.payload = update.payload;
                tx.execute(
                    "INSERT INTO projects (id, name, payload, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        project.id.as_str(),
                        project.name,
                        encode_payload(&project.payload)?,
                        project.created_at.timestamp_millis(),
                        project.updated_at.timestamp_millis(),
                    ],
                )?;
                debug!(id = %id, "Created project");
                project
            }
        };

        tx.commit()?;

        // Millisecond storage: hand back what a later `get` will read
        Ok(Project {
            created_at: truncate_millis(project.created_at),
            updated_at: truncate_millis(project.updated_at),
            ..project
        })
    }

    async fn delete(&self, id: &ProjectId) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        let removed = conn.execute("DELETE FROM projects WHERE id = ?1", params![id.as_str()])?;
        debug!(id = %id, removed, "Deleted project");
        Ok(())
    }
}

/// Raw summary row before timestamp conversion
struct SummaryRow {
    id: String,
    name: String,
    created_at: i64,
    updated_at: i64,
}

impl SummaryRow {
    fn hydrate(self) -> StoreResult<ProjectSummary> {
        Ok(ProjectSummary {
            created_at: from_millis(&self.id, self.created_at)?,
            updated_at: from_millis(&self.id, self.updated_at)?,
            id: ProjectId::parse(&self.id)?,
            name: self.name,
        })
    }
}

fn select_project(conn: &Connection, id: &ProjectId) -> StoreResult<Option<Project>> {
    let row = conn
        .query_row(
            "SELECT id, name, payload, created_at, updated_at FROM projects WHERE id = ?1",
            params![id.as_str()],
            read_project_row,
        )
        .optional()?;

    let Some((summary, payload)) = row else {
        return Ok(None);
    };

    let summary = summary.hydrate()?;
    let payload = payload
        .map(|text| serde_json::from_str::<Value>(&text))
        .transpose()
        .map_err(|e| StoreError::CorruptRecord {
            id: id.to_string(),
            details: format!("payload is not valid JSON: {}", e),
        })?;

    Ok(Some(Project {
        id: summary.id,
        name: summary.name,
        created_at: summary.created_at,
        updated_at: summary.updated_at,
        payload,
    }))
}

fn read_project_row(row: &Row<'_>) -> rusqlite::Result<(SummaryRow, Option<String>)> {
    Ok((
        SummaryRow {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        },
        row.get(2)?,
    ))
}

fn encode_payload(payload: &Option<Value>) -> StoreResult<Option<String>> {
    payload
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(Into::into)
}

fn from_millis(id: &str, millis: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| StoreError::CorruptRecord {
        id: id.to_string(),
        details: format!("timestamp out of range: {}", millis),
    })
}

fn truncate_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn id(s: &str) -> ProjectId {
        ProjectId::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get(&id("abc")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates() {
        let store = SqliteStore::open_in_memory().unwrap();

        let created = store
            .upsert(&id("p1"), ProjectUpdate::name("Compass"))
            .await
            .unwrap();
        assert_eq!(created.name, "Compass");
        assert!(created.payload.is_none());

        let payload = json!({"header": {"id": "p1"}, "text": {"main.ts": "input.compassHeading()"}});
        let updated = store
            .upsert(&id("p1"), ProjectUpdate::payload(payload.clone()))
            .await
            .unwrap();

        assert_eq!(updated.name, "Compass");
        assert_eq!(updated.payload, Some(payload.clone()));
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);

        let fetched = store.get(&id("p1")).await.unwrap().unwrap();
        assert_eq!(fetched, updated);
    }

    #[tokio::test]
    async fn test_upsert_without_name_uses_default() {
        let store = SqliteStore::open_in_memory().unwrap();
        let project = store
            .upsert(&id("p1"), ProjectUpdate::payload(json!({"a": 1})))
            .await
            .unwrap();
        assert_eq!(project.name, DEFAULT_PROJECT_NAME);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let payload = json!({"text": {"main.py": "basic.show_string('hi')"}});

        let first = store
            .upsert(&id("p1"), ProjectUpdate::payload(payload.clone()))
            .await
            .unwrap();
        let second = store
            .upsert(&id("p1"), ProjectUpdate::payload(payload.clone()))
            .await
            .unwrap();

        assert_eq!(second.payload, Some(payload));
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sequential_saves_last_wins() {
        let store = SqliteStore::open_in_memory().unwrap();

        store
            .upsert(&id("p1"), ProjectUpdate::payload(json!({"rev": 1})))
            .await
            .unwrap();
        store
            .upsert(&id("p1"), ProjectUpdate::payload(json!({"rev": 2})))
            .await
            .unwrap();

        let project = store.get(&id("p1")).await.unwrap().unwrap();
        assert_eq!(project.payload, Some(json!({"rev": 2})));
    }

    #[tokio::test]
    async fn test_list_most_recent_first() {
        let store = SqliteStore::open_in_memory().unwrap();

        store.upsert(&id("old"), ProjectUpdate::name("Old")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.upsert(&id("new"), ProjectUpdate::name("New")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        // Touching "old" moves it back to the top
        store
            .upsert(&id("old"), ProjectUpdate::payload(json!({})))
            .await
            .unwrap();

        let names: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Old", "New"]);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert(&id("p1"), ProjectUpdate::name("x")).await.unwrap();

        store.delete(&id("p1")).await.unwrap();
        store.delete(&id("p1")).await.unwrap();
        store.delete(&id("never-existed")).await.unwrap();

        assert!(store.get(&id("p1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persists_to_disk() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("bitdesk.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .upsert(&id("p1"), ProjectUpdate::payload(json!({"kept": true})))
                .await
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let project = store.get(&id("p1")).await.unwrap().unwrap();
        assert_eq!(project.payload, Some(json!({"kept": true})));
        assert_eq!(store.path(), Some(path.as_path()));
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_reported() {
        let store = SqliteStore::open_in_memory().unwrap();
        {
            let conn = store.conn.lock().await;
            conn.execute(
                "INSERT INTO projects (id, name, payload, created_at, updated_at) \
                 VALUES ('bad', 'Bad', '{not json', 0, 0)",
                [],
            )
            .unwrap();
        }

        let err = store.get(&id("bad")).await.unwrap_err();
        assert!(matches!(err, StoreError::CorruptRecord { .. }));
    }
}
