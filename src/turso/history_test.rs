use super::*;
use crate::history::HistoryStore;
use crate::turso::initialize_schema;
use chrono::{Duration, TimeZone};
use std::sync::Arc;
use tempfile::TempDir;

async fn setup_client() -> (TursoClient, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let client = TursoClient::new(temp_dir.path().to_path_buf())
        .await
        .expect("Failed to create client");
    initialize_schema(&client)
        .await
        .expect("Failed to initialize schema");
    (client, temp_dir)
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 5, 14, 30, 12).unwrap()
}

fn artifact(id: ArtifactId, created_at: DateTime<Utc>, segments: Vec<Vec<u8>>) -> Artifact {
    Artifact::from_segments(
        id,
        format!("REC_SR1_{}.mp4", id),
        created_at,
        "video/mp4".to_string(),
        segments,
    )
}

#[tokio::test]
async fn test_put_and_get_round_trip_payload() {
    let (client, _temp) = setup_client().await;
    let original = artifact(1, base_time(), vec![vec![0xAB; 500], vec![0xCD; 700]]);

    client.put(&original).await.expect("Failed to put");

    let fetched = client.get(1).await.unwrap().expect("entry should exist");
    assert_eq!(fetched, original);
    assert_eq!(fetched.size_bytes, 1200);
}

#[tokio::test]
async fn test_get_missing_returns_none() {
    let (client, _temp) = setup_client().await;
    assert_eq!(client.get(404).await.unwrap(), None);
}

#[tokio::test]
async fn test_read_all_desc_orders_by_created_at_then_insertion() {
    let (client, _temp) = setup_client().await;
    client
        .put(&artifact(1, base_time(), vec![vec![1]]))
        .await
        .unwrap();
    client
        .put(&artifact(2, base_time() + Duration::milliseconds(1), vec![vec![2]]))
        .await
        .unwrap();
    client
        .put(&artifact(3, base_time(), vec![vec![3]]))
        .await
        .unwrap();

    let ids: Vec<ArtifactId> = client
        .read_all_desc()
        .await
        .unwrap()
        .iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(ids, vec![2, 3, 1]);
}

#[tokio::test]
async fn test_delete_removes_only_listed_ids() {
    let (client, _temp) = setup_client().await;
    for id in 1..=4 {
        client
            .put(&artifact(id, base_time() + Duration::seconds(id), vec![vec![0]]))
            .await
            .unwrap();
    }

    client.delete(&[1, 3]).await.unwrap();
    client.delete(&[]).await.unwrap();

    let ids: Vec<ArtifactId> = client
        .read_all_desc()
        .await
        .unwrap()
        .iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(ids, vec![4, 2]);
}

#[tokio::test]
async fn test_put_overwrites_existing_id() {
    let (client, _temp) = setup_client().await;
    client
        .put(&artifact(5, base_time(), vec![vec![1; 10]]))
        .await
        .unwrap();
    client
        .put(&artifact(5, base_time(), vec![vec![2; 20]]))
        .await
        .unwrap();

    let listed = client.read_all_desc().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].size_bytes, 20);
}

#[tokio::test]
async fn test_store_over_libsql_keeps_latest_within_capacity() {
    let (client, _temp) = setup_client().await;
    let store = HistoryStore::new(Arc::new(client), 100);

    for i in 0..101 {
        store
            .insert(&artifact(
                1_000 + i,
                base_time() + Duration::seconds(i),
                vec![vec![i as u8; 4]],
            ))
            .await
            .unwrap();
    }

    let listed = store.list(100).await.unwrap();
    assert_eq!(listed.len(), 100);
    assert_eq!(listed[0].id, 1_100);
    assert!(listed.iter().all(|e| e.id != 1_000));
    assert_eq!(store.get_by_id(1_000).await.unwrap(), None);
}

async fn insert_unreadable_row(client: &TursoClient, id: ArtifactId) {
    client
        .execute(
            r#"INSERT INTO recording (id, name, created_at, mime_type, size_bytes, payload, seq)
               VALUES (?1, 'broken.webm', 'not-a-date', 'video/webm', 3, X'010203', 0)"#,
            params![id],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unreadable_row_is_skipped_in_listing() {
    let (client, _temp) = setup_client().await;
    insert_unreadable_row(&client, 77).await;
    client
        .put(&artifact(1, base_time(), vec![vec![1]]))
        .await
        .unwrap();

    let listed = client.read_all_desc().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, 1);
    assert!(matches!(client.get(77).await, Err(PersistenceError::Corrupt(_))));
}

#[tokio::test]
async fn test_eviction_still_bounds_store_with_unreadable_row() {
    let (client, _temp) = setup_client().await;
    insert_unreadable_row(&client, 77).await;
    let client = Arc::new(client);
    let store = HistoryStore::new(client.clone(), 2);

    for i in 0..5 {
        store
            .insert(&artifact(
                100 + i,
                base_time() + Duration::seconds(i),
                vec![vec![i as u8]],
            ))
            .await
            .unwrap();
    }

    // Every row counts toward capacity, readable or not
    assert_eq!(client.ids_desc().await.unwrap().len(), 2);
    let listed = store.list(10).await.unwrap();
    assert!(listed.len() <= 2);
    assert!(listed.iter().all(|e| e.id == 104 || e.id == 77));
}

#[tokio::test]
async fn test_history_persists_across_reopen() {
    let temp_dir = TempDir::new().unwrap();
    {
        let client = TursoClient::new(temp_dir.path().to_path_buf()).await.unwrap();
        initialize_schema(&client).await.unwrap();
        client
            .put(&artifact(9, base_time(), vec![vec![9; 32]]))
            .await
            .unwrap();
    }

    let reopened = TursoClient::new(temp_dir.path().to_path_buf()).await.unwrap();
    initialize_schema(&reopened).await.unwrap();
    let fetched = reopened.get(9).await.unwrap().expect("entry should persist");
    assert_eq!(fetched.payload, vec![9; 32]);
}

#[test]
fn test_turso_errors_map_to_persistence_errors() {
    assert_eq!(
        PersistenceError::from(TursoError::Connection("locked".to_string())),
        PersistenceError::Connection("locked".to_string())
    );
    assert!(matches!(
        PersistenceError::from(TursoError::Constraint("dup".to_string())),
        PersistenceError::Query(_)
    ));
}
