use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::debug;

use quotebot_core::errors::HostError;
use quotebot_core::host::KeyValueStore;

use super::RepositoryError;
use crate::DbPool;

/// One stored key with its last write time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyEntry {
    pub key: String,
    pub size_bytes: usize,
    pub updated_at: DateTime<Utc>,
}

pub struct SqlKeyValueStore {
    pool: DbPool,
}

impl SqlKeyValueStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, RepositoryError> {
        let row = sqlx::query("SELECT value FROM plugin_kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| row.get::<Vec<u8>, _>("value")))
    }

    pub async fn upsert(&self, key: &str, value: &[u8]) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO plugin_kv (key, value, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(event_name = "db.kv.upserted", key, size_bytes = value.len(), "kv value stored");
        Ok(())
    }

    pub async fn entries(&self) -> Result<Vec<KeyEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT key, LENGTH(value) AS size_bytes, updated_at
             FROM plugin_kv
             ORDER BY key ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let updated_at = row.get::<String, _>("updated_at");
                let updated_at = DateTime::parse_from_rfc3339(&updated_at)
                    .map_err(|error| {
                        RepositoryError::Decode(format!(
                            "invalid updated_at `{updated_at}`: {error}"
                        ))
                    })?
                    .with_timezone(&Utc);
                Ok(KeyEntry {
                    key: row.get::<String, _>("key"),
                    size_bytes: usize::try_from(row.get::<i64, _>("size_bytes")).unwrap_or(0),
                    updated_at,
                })
            })
            .collect()
    }
}

#[async_trait]
impl KeyValueStore for SqlKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, HostError> {
        Ok(self.fetch(key).await?)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), HostError> {
        Ok(self.upsert(key, &value).await?)
    }
}

#[cfg(test)]
mod tests {
    use quotebot_core::host::KeyValueStore;

    use super::SqlKeyValueStore;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn missing_key_reads_as_none() {
        let store = SqlKeyValueStore::new(setup_pool().await);

        assert_eq!(store.get("quotes").await.expect("get"), None);
    }

    #[tokio::test]
    async fn set_overwrites_the_previous_value() {
        let store = SqlKeyValueStore::new(setup_pool().await);

        store.set("quotes", br#"["a"]"#.to_vec()).await.expect("first write");
        store.set("quotes", br#"["a","b"]"#.to_vec()).await.expect("second write");

        assert_eq!(store.get("quotes").await.expect("get"), Some(br#"["a","b"]"#.to_vec()));
        let entries = store.entries().await.expect("entries");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "quotes");
        assert_eq!(entries[0].size_bytes, 9);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let store = SqlKeyValueStore::new(setup_pool().await);

        store.set("quotes", b"[]".to_vec()).await.expect("write quotes");
        store.set("other", b"[\"x\"]".to_vec()).await.expect("write other");

        assert_eq!(store.get("quotes").await.expect("get"), Some(b"[]".to_vec()));
        let keys: Vec<String> =
            store.entries().await.expect("entries").into_iter().map(|entry| entry.key).collect();
        assert_eq!(keys, vec!["other".to_string(), "quotes".to_string()]);
    }
}
