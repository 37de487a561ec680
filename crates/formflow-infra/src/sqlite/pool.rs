//! Database pool with split reader/writer connections in WAL mode.
//!
//! SQLite allows one writer at a time, so writes go through a single-connection
//! pool while reads share a small multi-connection pool.

use std::path::Path;
use std::str::FromStr;

use formflow_types::config::GlobalConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

/// Split read/write pool for SQLite with WAL mode.
#[derive(Clone)]
pub struct DatabasePool {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
}

impl DatabasePool {
    /// Open both pools and run pending migrations on the writer.
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let base_opts = SqliteConnectOptions::from_str(database_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(std::time::Duration::from_secs(5))
            .create_if_missing(true);

        let read_opts = base_opts.clone().read_only(true);

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(base_opts)
            .await?;

        // Migrations must land before any reader connects.
        sqlx::migrate!("../../migrations").run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(read_opts)
            .await?;

        tracing::debug!(url = database_url, "database pool ready");
        Ok(Self { reader, writer })
    }
}

/// SQLite URL for the configured database file inside `data_dir`.
pub fn database_url(data_dir: &Path, config: &GlobalConfig) -> String {
    format!(
        "sqlite://{}?mode=rwc",
        data_dir.join(&config.database_file).display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_pool(name: &str) -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join(name).display());
        let pool = DatabasePool::new(&url).await.unwrap();
        std::mem::forget(dir);
        pool
    }

    #[tokio::test]
    async fn test_pool_creates_tables() {
        let pool = temp_pool("tables.db").await;

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name != '_sqlx_migrations' ORDER BY name",
        )
        .fetch_all(&pool.reader)
        .await
        .unwrap();

        let names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
        assert_eq!(names, vec!["questions", "workflow_versions"]);
    }

    #[tokio::test]
    async fn test_pool_wal_mode() {
        let pool = temp_pool("wal.db").await;
        let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool.writer)
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[tokio::test]
    async fn test_reader_is_read_only() {
        let pool = temp_pool("ro.db").await;
        let result = sqlx::query("DELETE FROM questions").execute(&pool.reader).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_database_url_uses_configured_file() {
        let config = GlobalConfig {
            database_file: "forms.db".to_string(),
            log_filter: None,
        };
        let url = database_url(Path::new("/tmp/ff"), &config);
        assert_eq!(url, "sqlite:///tmp/ff/forms.db?mode=rwc");
    }
}
