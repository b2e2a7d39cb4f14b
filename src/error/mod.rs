use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Langbase error: {0}")]
    Langbase(#[from] LangbaseError),

    #[error("Advisor error: {0}")]
    Advisor(#[from] AdvisorError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Serialization failed: {message}")]
    Serialization { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Langbase API errors
#[derive(Debug, Error)]
pub enum LangbaseError {
    #[error("Langbase unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failures of a single advisor call.
///
/// These never reach the caller of `submit_turn`; the orchestrator logs them
/// and degrades the advisor to a no-op for the turn.
#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("{advisor} timed out after {timeout_ms}ms")]
    Timeout { advisor: String, timeout_ms: u64 },

    #[error("{advisor} unavailable: {message}")]
    Unavailable { advisor: String, message: String },

    #[error("{advisor} returned malformed output: {message}")]
    MalformedOutput { advisor: String, message: String },

    #[error("Langbase error: {0}")]
    Langbase(#[from] LangbaseError),
}

/// Errors raised while restoring a session snapshot
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Snapshot violates invariant: {message}")]
    Invariant { message: String },
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for Langbase operations
pub type LangbaseResult<T> = Result<T, LangbaseError>;

/// Result type alias for advisor calls
pub type AdvisorResult<T> = Result<T, AdvisorError>;

/// Result type alias for snapshot restore
pub type SnapshotResult<T> = Result<T, SnapshotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Config {
            message: "missing key".to_string(),
        };
        assert_eq!(err.to_string(), "Configuration error: missing key");

        let err = AppError::Internal {
            message: "unexpected".to_string(),
        };
        assert_eq!(err.to_string(), "Internal error: unexpected");
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::SessionNotFound {
            session_id: "sess-123".to_string(),
        };
        assert_eq!(err.to_string(), "Session not found: sess-123");

        let err = StorageError::Serialization {
            message: "bad snapshot".to_string(),
        };
        assert_eq!(err.to_string(), "Serialization failed: bad snapshot");

        let err = StorageError::Migration {
            message: "version mismatch".to_string(),
        };
        assert_eq!(err.to_string(), "Migration failed: version mismatch");
    }

    #[test]
    fn test_langbase_error_display() {
        let err = LangbaseError::Unavailable {
            message: "server down".to_string(),
            retries: 3,
        };
        assert_eq!(err.to_string(), "Langbase unavailable: server down (retries: 3)");

        let err = LangbaseError::Api {
            status: 401,
            message: "unauthorized".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 401 - unauthorized");

        let err = LangbaseError::Timeout { timeout_ms: 5000 };
        assert_eq!(err.to_string(), "Request timeout after 5000ms");
    }

    #[test]
    fn test_advisor_error_display() {
        let err = AdvisorError::Timeout {
            advisor: "fact_extractor".to_string(),
            timeout_ms: 250,
        };
        assert_eq!(err.to_string(), "fact_extractor timed out after 250ms");

        let err = AdvisorError::MalformedOutput {
            advisor: "scenario".to_string(),
            message: "no JSON object".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "scenario returned malformed output: no JSON object"
        );
    }

    #[test]
    fn test_snapshot_error_display() {
        let err = SnapshotError::Invariant {
            message: "node Income in two frontier sets".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Snapshot violates invariant: node Income in two frontier sets"
        );
    }

    #[test]
    fn test_conversions_to_app_error() {
        let app_err: AppError = StorageError::SessionNotFound {
            session_id: "test-123".to_string(),
        }
        .into();
        assert!(matches!(app_err, AppError::Storage(_)));

        let app_err: AppError = LangbaseError::Timeout { timeout_ms: 1000 }.into();
        assert!(matches!(app_err, AppError::Langbase(_)));

        let app_err: AppError = AdvisorError::Unavailable {
            advisor: "goal_details".to_string(),
            message: "down".to_string(),
        }
        .into();
        assert!(matches!(app_err, AppError::Advisor(_)));
    }

    #[test]
    fn test_langbase_error_converts_to_advisor_error() {
        let err: AdvisorError = LangbaseError::Api {
            status: 500,
            message: "boom".to_string(),
        }
        .into();
        assert!(matches!(err, AdvisorError::Langbase(_)));
        assert!(err.to_string().contains("500"));
    }
}
