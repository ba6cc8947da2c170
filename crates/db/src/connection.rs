use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;

use quotebot_core::config::StorageConfig;

pub type DbPool = sqlx::SqlitePool;

pub async fn connect_storage(storage: &StorageConfig) -> Result<DbPool, sqlx::Error> {
    let pool =
        connect_with_settings(&storage.url, storage.max_connections, storage.timeout_secs).await?;
    info!(
        event_name = "db.pool.connected",
        max_connections = storage.max_connections,
        "storage pool ready"
    );
    Ok(pool)
}

/// Opens a SQLite pool, creating the database file when it does not exist yet.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(&with_create_mode(database_url))
        .await
}

fn with_create_mode(database_url: &str) -> String {
    let is_file = database_url.starts_with("sqlite://") && !database_url.contains(":memory:");
    if is_file && !database_url.contains("mode=") {
        let separator = if database_url.contains('?') { '&' } else { '?' };
        format!("{database_url}{separator}mode=rwc")
    } else {
        database_url.to_string()
    }
}
