//! # Local Storage Repository
//!
//! String keys to string values, the way the browser's `localStorage`
//! behaves, with JSON helpers on top.
//!
//! Writes are upserts. Removing a missing key is not an error.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};

/// A stored row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StoredEntry {
    pub key: String,
    pub value: String,
    /// RFC 3339 time of the last write.
    pub updated_at: String,
}

/// Repository for the `local_storage` table.
#[derive(Debug, Clone)]
pub struct LocalStorageRepository {
    pool: SqlitePool,
}

impl LocalStorageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LocalStorageRepository { pool }
    }

    /// Raw value under `key`.
    pub async fn get(&self, key: &str) -> DbResult<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM local_storage WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    /// Full row under `key`.
    pub async fn entry(&self, key: &str) -> DbResult<Option<StoredEntry>> {
        let entry = sqlx::query_as::<_, StoredEntry>(
            "SELECT key, value, updated_at FROM local_storage WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }

    /// Decodes the JSON value under `key`.
    ///
    /// ## Returns
    /// * `Ok(None)` - Key absent
    /// * `Err(DbError::InvalidData)` - Value present but not the expected shape
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> DbResult<Option<T>> {
        let Some(raw) = self.get(key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw).map(Some).map_err(|e| {
            warn!(key, error = %e, "Stored value failed to decode");
            DbError::invalid_data(key, e)
        })
    }

    /// Writes `value` under `key`, replacing any previous value.
    pub async fn set(&self, key: &str, value: &str) -> DbResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO local_storage (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        debug!(key, bytes = value.len(), "Stored value");
        Ok(())
    }

    /// Encodes `value` as JSON and stores it. Returns the stored text.
    pub async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> DbResult<String> {
        let raw = serde_json::to_string(value).map_err(|e| DbError::invalid_data(key, e))?;
        self.set(key, &raw).await?;
        Ok(raw)
    }

    /// Deletes `key`. Returns whether anything was removed.
    pub async fn remove(&self, key: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM local_storage WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes every listed key. Returns how many rows went away.
    pub async fn remove_all(&self, keys: &[&str]) -> DbResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0;
        for key in keys {
            removed += sqlx::query("DELETE FROM local_storage WHERE key = ?")
                .bind(*key)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;

        debug!(requested = keys.len(), removed, "Removed keys");
        Ok(removed)
    }

    /// Keys starting with `prefix`, sorted.
    pub async fn keys_with_prefix(&self, prefix: &str) -> DbResult<Vec<String>> {
        let pattern = format!("{}%", escape_like(prefix));
        let keys: Vec<String> = sqlx::query_scalar(
            "SELECT key FROM local_storage WHERE key LIKE ? ESCAPE '\\' ORDER BY key",
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(keys)
    }
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys;
    use crate::pool::{Database, DbConfig};
    use serde::Deserialize;

    async fn repo() -> LocalStorageRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().local_storage()
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Selected {
        id: i64,
        name: String,
    }

    #[tokio::test]
    async fn test_set_get_overwrite() {
        let repo = repo().await;
        assert_eq!(repo.get(keys::TOKEN).await.unwrap(), None);

        repo.set(keys::TOKEN, "first").await.unwrap();
        repo.set(keys::TOKEN, "second").await.unwrap();
        assert_eq!(repo.get(keys::TOKEN).await.unwrap().as_deref(), Some("second"));

        let entry = repo.entry(keys::TOKEN).await.unwrap().unwrap();
        assert_eq!(entry.value, "second");
        assert!(!entry.updated_at.is_empty());
    }

    #[tokio::test]
    async fn test_json_values() {
        let repo = repo().await;
        let store = Selected { id: 3, name: "Main St".into() };
        repo.set_json(keys::SELECTED_STORE, &store).await.unwrap();

        let loaded: Option<Selected> = repo.get_json(keys::SELECTED_STORE).await.unwrap();
        assert_eq!(loaded, Some(store));

        repo.set(keys::SELECTED_CUSTOMER, "not json").await.unwrap();
        let err = repo.get_json::<Selected>(keys::SELECTED_CUSTOMER).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidData { .. }));
    }

    #[tokio::test]
    async fn test_remove() {
        let repo = repo().await;
        repo.set(keys::COMPANY_ID, "7").await.unwrap();
        assert!(repo.remove(keys::COMPANY_ID).await.unwrap());
        assert!(!repo.remove(keys::COMPANY_ID).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_session_keys_keeps_others() {
        let repo = repo().await;
        repo.set(keys::TOKEN, "t").await.unwrap();
        repo.set(keys::CURRENT_CART_STATE, "{}").await.unwrap();
        repo.set(keys::ORDER_HISTORY, "[]").await.unwrap();

        let removed = repo.remove_all(keys::SESSION_KEYS).await.unwrap();
        assert_eq!(removed, 2);
        assert!(repo.get(keys::ORDER_HISTORY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_keys_with_prefix() {
        let repo = repo().await;
        repo.set(&keys::event_key("order-completed"), "1").await.unwrap();
        repo.set(&keys::event_key("cart-cleared"), "2").await.unwrap();
        repo.set("pos-eventual", "3").await.unwrap();

        let found = repo.keys_with_prefix(keys::EVENT_PREFIX).await.unwrap();
        assert_eq!(found, vec!["pos-event:cart-cleared", "pos-event:order-completed"]);

        // LIKE wildcards in the prefix are literal.
        repo.set("a_b", "x").await.unwrap();
        repo.set("axb", "y").await.unwrap();
        assert_eq!(repo.keys_with_prefix("a_").await.unwrap(), vec!["a_b"]);
    }
}
