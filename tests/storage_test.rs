//! Integration tests for SQLite session storage
//!
//! Sessions are written to a file database in a temporary directory so the
//! tests also cover reopening a store from disk.

mod common;

use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

use langbase_factfind::config::DatabaseConfig;
use langbase_factfind::error::StorageError;
use langbase_factfind::orchestrator::{Orchestrator, Phase};
use langbase_factfind::storage::{SessionRecord, SessionStore, SqliteStorage, TurnRecord};

use common::{small_registry, Scripted};

fn database(dir: &TempDir) -> DatabaseConfig {
    DatabaseConfig {
        path: dir.path().join("nested").join("factfind.db"),
        max_connections: 2,
    }
}

fn orchestrator(advisors: &std::sync::Arc<Scripted>) -> Orchestrator {
    Orchestrator::new(
        small_registry(),
        advisors.advisor_set(),
        Default::default(),
    )
}

#[tokio::test]
async fn test_file_database_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let advisors = Scripted::new();
    let mut orch = orchestrator(&advisors);
    orch.start().await;

    let record = {
        let storage = SqliteStorage::new(&database(&dir)).await.unwrap();
        let record = SessionRecord::new(orch.snapshot().unwrap());
        storage.save_session(&record).await.unwrap();
        record
    };

    let storage = SqliteStorage::new(&database(&dir)).await.unwrap();
    let loaded = storage.load_session(&record.id).await.unwrap().unwrap();
    assert_eq!(loaded.snapshot, record.snapshot);
    assert_eq!(loaded.phase, Phase::DataGathering);
}

#[tokio::test]
async fn test_turn_log_is_ordered_and_listed() {
    let dir = TempDir::new().unwrap();
    let storage = SqliteStorage::new(&database(&dir)).await.unwrap();
    let advisors = Scripted::new();
    let mut orch = orchestrator(&advisors);
    orch.start().await;

    let mut record = SessionRecord::new(orch.snapshot().unwrap());
    storage.save_session(&record).await.unwrap();

    advisors.facts(json!({"updates": [
        {"node_name": "Personal", "field_name": "age", "value": 41}
    ]}));
    for text in ["I'm 41", "I'd rather not say"] {
        let directive = orch.submit_turn(text).await;
        record.update(orch.snapshot().unwrap());
        let turn = TurnRecord::new(record.id.clone(), record.turn_count(), text, directive);
        assert_ok!(storage.save_turn(&record, &turn).await);
    }

    let turns = storage.session_turns(&record.id).await.unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].turn_index, 1);
    assert_eq!(turns[0].user_text, "I'm 41");
    assert_eq!(turns[0].directive.data["Personal"]["age"], json!(41));
    assert_eq!(turns[1].turn_index, 2);

    let sessions = storage.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, record.id);
    assert_eq!(sessions[0].turn_count, 2);
}

#[tokio::test]
async fn test_duplicate_turn_index_rolls_back_session_update() {
    let storage = SqliteStorage::new_in_memory().await.unwrap();
    let advisors = Scripted::new();
    let mut orch = orchestrator(&advisors);

    let mut record = SessionRecord::new(orch.snapshot().unwrap());
    storage.save_session(&record).await.unwrap();

    let directive = orch.submit_turn("hello").await;
    record.update(orch.snapshot().unwrap());
    let turn = TurnRecord::new(record.id.clone(), 1, "hello", directive.clone());
    storage.save_turn(&record, &turn).await.unwrap();

    orch.submit_turn("again").await;
    let mut newer = record.clone();
    newer.update(orch.snapshot().unwrap());
    let clash = TurnRecord::new(record.id.clone(), 1, "again", directive);
    assert_err!(storage.save_turn(&newer, &clash).await);

    let loaded = storage.load_session(&record.id).await.unwrap().unwrap();
    assert_eq!(loaded.turn_count(), 1);
    assert_eq!(storage.session_turns(&record.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_removes_turns() {
    let storage = SqliteStorage::new_in_memory().await.unwrap();
    let advisors = Scripted::new();
    let mut orch = orchestrator(&advisors);

    let mut record = SessionRecord::new(orch.snapshot().unwrap());
    let directive = orch.submit_turn("hello").await;
    record.update(orch.snapshot().unwrap());
    let turn = TurnRecord::new(record.id.clone(), 1, "hello", directive);
    storage.save_turn(&record, &turn).await.unwrap();

    storage.delete_session(&record.id).await.unwrap();

    assert!(storage.load_session(&record.id).await.unwrap().is_none());
    assert!(storage.session_turns(&record.id).await.unwrap().is_empty());
    assert!(matches!(
        storage.delete_session(&record.id).await,
        Err(StorageError::SessionNotFound { .. })
    ));
}
