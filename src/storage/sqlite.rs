use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::str::FromStr;
use tracing::{debug, info};

use super::{SessionRecord, SessionStore, SessionSummary, TurnRecord};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use crate::orchestrator::Phase;

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed session store
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        Self::connect(options, config.max_connections).await
    }

    /// Private in-memory database, for tests and throwaway sessions.
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .foreign_keys(true);

        // Every in-memory connection is its own database.
        Self::connect(options, 1).await
    }

    async fn connect(options: SqliteConnectOptions, max_connections: u32) -> StorageResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn upsert_session(
        tx: &mut Transaction<'_, Sqlite>,
        session: &SessionRecord,
    ) -> StorageResult<()> {
        let snapshot = to_json(&session.snapshot)?;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, phase, turn_count, snapshot, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                phase = excluded.phase,
                turn_count = excluded.turn_count,
                snapshot = excluded.snapshot,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&session.id)
        .bind(session.phase.as_str())
        .bind(session.turn_count() as i64)
        .bind(&snapshot)
        .bind(session.created_at.to_rfc3339())
        .bind(session.updated_at.to_rfc3339())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteStorage {
    async fn save_session(&self, session: &SessionRecord) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::upsert_session(&mut tx, session).await?;
        tx.commit().await?;

        debug!(session_id = %session.id, phase = %session.phase, "Session saved");
        Ok(())
    }

    async fn save_turn(&self, session: &SessionRecord, turn: &TurnRecord) -> StorageResult<()> {
        let directive = to_json(&turn.directive)?;

        let mut tx = self.pool.begin().await?;
        Self::upsert_session(&mut tx, session).await?;
        sqlx::query(
            r#"
            INSERT INTO session_turns (session_id, turn_index, user_text, phase, directive, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&turn.session_id)
        .bind(turn.turn_index as i64)
        .bind(&turn.user_text)
        .bind(turn.phase.as_str())
        .bind(&directive)
        .bind(turn.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(
            session_id = %session.id,
            turn = turn.turn_index,
            "Turn saved"
        );
        Ok(())
    }

    async fn load_session(&self, id: &str) -> StorageResult<Option<SessionRecord>> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, phase, turn_count, snapshot, created_at, updated_at
            FROM sessions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SessionRecord::try_from).transpose()
    }

    async fn session_turns(&self, session_id: &str) -> StorageResult<Vec<TurnRecord>> {
        let rows: Vec<TurnRow> = sqlx::query_as(
            r#"
            SELECT session_id, turn_index, user_text, phase, directive, created_at
            FROM session_turns
            WHERE session_id = ?
            ORDER BY turn_index ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TurnRecord::try_from).collect()
    }

    async fn list_sessions(&self) -> StorageResult<Vec<SessionSummary>> {
        let rows: Vec<SummaryRow> = sqlx::query_as(
            r#"
            SELECT id, phase, turn_count, created_at, updated_at
            FROM sessions
            ORDER BY updated_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SessionSummary::try_from).collect()
    }

    async fn delete_session(&self, id: &str) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM session_turns WHERE session_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::SessionNotFound {
                session_id: id.to_string(),
            });
        }
        tx.commit().await?;

        Ok(())
    }
}

fn to_json<T: Serialize>(value: &T) -> StorageResult<String> {
    serde_json::to_string(value).map_err(|e| StorageError::Serialization {
        message: e.to_string(),
    })
}

fn from_json<T: DeserializeOwned>(raw: &str) -> StorageResult<T> {
    serde_json::from_str(raw).map_err(|e| StorageError::Serialization {
        message: e.to_string(),
    })
}

fn parse_phase(raw: &str) -> StorageResult<Phase> {
    raw.parse()
        .map_err(|message| StorageError::Serialization { message })
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// Internal row types for SQLx mapping
#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    phase: String,
    #[allow(dead_code)]
    turn_count: i64,
    snapshot: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<SessionRow> for SessionRecord {
    type Error = StorageError;

    fn try_from(row: SessionRow) -> StorageResult<Self> {
        Ok(Self {
            phase: parse_phase(&row.phase)?,
            snapshot: from_json(&row.snapshot)?,
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
            id: row.id,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TurnRow {
    session_id: String,
    turn_index: i64,
    user_text: String,
    phase: String,
    directive: String,
    created_at: String,
}

impl TryFrom<TurnRow> for TurnRecord {
    type Error = StorageError;

    fn try_from(row: TurnRow) -> StorageResult<Self> {
        Ok(Self {
            phase: parse_phase(&row.phase)?,
            directive: from_json(&row.directive)?,
            turn_index: row.turn_index.max(0) as u64,
            created_at: parse_timestamp(&row.created_at),
            session_id: row.session_id,
            user_text: row.user_text,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: String,
    phase: String,
    turn_count: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<SummaryRow> for SessionSummary {
    type Error = StorageError;

    fn try_from(row: SummaryRow) -> StorageResult<Self> {
        Ok(Self {
            phase: parse_phase(&row.phase)?,
            turn_count: row.turn_count.max(0) as u64,
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
            id: row.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{OrchestratorState, SessionSnapshot};
    use crate::goals::ScenarioQueue;
    use crate::graph::GraphStore;

    fn snapshot(turns: u64) -> SessionSnapshot {
        SessionSnapshot {
            graph: GraphStore::with_pending(["Personal"]).dump().unwrap(),
            state: OrchestratorState {
                turn_count: turns,
                ..Default::default()
            },
            queue: ScenarioQueue::new(),
        }
    }

    #[tokio::test]
    async fn test_save_and_load_session() {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        let record = SessionRecord::new(snapshot(0));

        storage.save_session(&record).await.unwrap();
        let loaded = storage.load_session(&record.id).await.unwrap().unwrap();

        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.snapshot, record.snapshot);
        assert_eq!(loaded.phase, Phase::DataGathering);
    }

    #[tokio::test]
    async fn test_load_missing_session() {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        assert!(storage.load_session("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_session_upserts() {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        let mut record = SessionRecord::new(snapshot(0));
        storage.save_session(&record).await.unwrap();

        record.update(snapshot(3));
        storage.save_session(&record).await.unwrap();

        let sessions = storage.list_sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].turn_count, 3);
    }

    #[tokio::test]
    async fn test_delete_missing_session_errors() {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        let err = storage.delete_session("ghost").await.unwrap_err();
        assert!(matches!(err, StorageError::SessionNotFound { .. }));
    }

    #[test]
    fn test_corrupt_snapshot_is_a_serialization_error() {
        let row = SessionRow {
            id: "s1".to_string(),
            phase: "data_gathering".to_string(),
            turn_count: 0,
            snapshot: "{not json".to_string(),
            created_at: Utc::now().to_rfc3339(),
            updated_at: Utc::now().to_rfc3339(),
        };
        let err = SessionRecord::try_from(row).unwrap_err();
        assert!(matches!(err, StorageError::Serialization { .. }));
    }
}
