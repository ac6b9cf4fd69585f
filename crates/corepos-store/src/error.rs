//! Errors raised by the register's local key/value store.
//!
//! ```text
//! sqlx::Error ─┐
//! MigrateError ┼──► DbError ──► SyncError::Storage   (corepos-sync)
//! serde_json ──┘              └─► ErrorCode::StorageError (corepos-client)
//! ```

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// A required key has no value.
    #[error("no {entity} stored for '{id}'")]
    NotFound { entity: String, id: String },

    /// The SQLite file could not be opened or the pool is closed.
    #[error("cannot open local storage: {0}")]
    ConnectionFailed(String),

    #[error("local storage schema upgrade failed: {0}")]
    MigrationFailed(String),

    #[error("local storage statement failed: {0}")]
    QueryFailed(String),

    /// The value under `key` is not the JSON shape the caller asked for,
    /// or the caller's value could not be encoded.
    #[error("value under '{key}' is unreadable: {reason}")]
    InvalidData { key: String, reason: String },

    /// Every window's connection is busy and the acquire timed out.
    #[error("timed out waiting for a storage connection")]
    PoolExhausted,

    #[error("local storage failure: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn invalid_data(key: impl Into<String>, reason: impl ToString) -> Self {
        DbError::InvalidData {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("row", "?"),
            sqlx::Error::Database(db_err) => DbError::QueryFailed(db_err.message().to_string()),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
