//! Exercises `HttpStore` against the real HTTP surface on an ephemeral port.

use bitdesk_core::api::{self, AppState};
use bitdesk_core::models::{ProjectId, ProjectUpdate};
use bitdesk_core::{HttpStore, ProjectStore, SqliteStore};
use serde_json::json;
use tokio::net::TcpListener;

async fn serve() -> HttpStore {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = api::router(AppState::new(SqliteStore::open_in_memory().unwrap()));

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    HttpStore::new(&format!("http://{}", addr)).unwrap()
}

#[tokio::test]
async fn missing_project_is_none() {
    let store = serve().await;
    let id = ProjectId::parse("abc").unwrap();

    assert!(store.get(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn upsert_get_and_list() {
    let store = serve().await;
    let id = ProjectId::parse("blinky").unwrap();
    let payload = json!({"header": {"id": "blinky"}, "text": {"main.ts": "basic.showIcon(IconNames.Heart)"}});

    let created = store
        .upsert(
            &id,
            ProjectUpdate {
                name: Some("Blinky".to_string()),
                payload: Some(payload.clone()),
            },
        )
        .await
        .unwrap();
    assert_eq!(created.name, "Blinky");

    let renamed = store
        .upsert(&id, ProjectUpdate::name("Heartbeat"))
        .await
        .unwrap();
    assert_eq!(renamed.payload, Some(payload.clone()));
    assert!(renamed.updated_at >= created.updated_at);

    let fetched = store.get(&id).await.unwrap().unwrap();
    assert_eq!(fetched.name, "Heartbeat");
    assert_eq!(fetched.payload, Some(payload));

    let list = store.list().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].id, id);
}

#[tokio::test]
async fn create_uses_default_name() {
    let store = serve().await;

    let project = store.create(None).await.unwrap();

    assert_eq!(project.name, "Untitled Project");
    assert!(project.payload.is_none());
    assert!(store.get(&project.id).await.unwrap().is_some());
}

#[tokio::test]
async fn delete_is_idempotent() {
    let store = serve().await;
    let id = ProjectId::parse("gone").unwrap();

    store.upsert(&id, ProjectUpdate::name("x")).await.unwrap();
    store.delete(&id).await.unwrap();
    store.delete(&id).await.unwrap();

    assert!(store.get(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn unreachable_service_is_transient() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let store = HttpStore::new(&format!("http://{}", addr)).unwrap();
    let err = store.list().await.unwrap_err();

    assert!(err.is_transient());
}
