use std::{sync::Arc, time::Duration};

use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Sqlite, SqlitePool};
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::{self, DatabaseConfig};
use crate::error::{AppError, AppResult};

/// Shared database handle.
///
/// Built once at startup and handed to request handlers through
/// [`AppState`](crate::state::AppState). The pool itself is created lazily on
/// first use; concurrent first callers wait on the same initialization.
#[derive(Debug)]
pub struct Database {
    config: DatabaseConfig,
    pool: OnceCell<SqlitePool>,
}

impl Database {
    pub fn new(config: DatabaseConfig) -> Arc<Self> {
        Arc::new(Self { config, pool: OnceCell::new() })
    }

    /// Wraps an already connected pool. Schema initialization is left to the caller.
    pub fn from_pool(config: DatabaseConfig, pool: SqlitePool) -> Arc<Self> {
        Arc::new(Self { config, pool: OnceCell::new_with(Some(pool)) })
    }

    /// Returns the connection pool, connecting on first call.
    pub async fn pool(&self) -> AppResult<&SqlitePool> {
        self.pool.get_or_try_init(|| connect(&self.config)).await.map_err(|e| {
            tracing::error!("Failed to initialize database pool: {:?}", e);
            AppError::ServiceUnavailable("Database is not available".to_string())
        })
    }

    pub fn is_connected(&self) -> bool {
        self.pool.initialized()
    }

    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
        }
    }
}

async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<SqlitePool> {
    let url = &cfg.url;
    config::ensure_sqlite_parent_dir(url)?;
    if !Sqlite::database_exists(url).await.unwrap_or(false) {
        info!("Creating SQLite database at {}", url);
        Sqlite::create_database(url).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(cfg.max_connections)
        .acquire_timeout(Duration::from_secs(cfg.acquire_timeout_secs))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys=ON;").execute(&mut *conn).await?;
                let _ = sqlx::query("PRAGMA busy_timeout=10000;").execute(&mut *conn).await;
                Ok(())
            })
        })
        .connect(url)
        .await?;

    init_db(&pool).await?;
    info!("Database pool ready ({} max connections)", cfg.max_connections);
    Ok(pool)
}

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    // Pragmas for better durability/performance
    if let Err(e) = sqlx::query("PRAGMA journal_mode=WAL;").execute(pool).await {
        tracing::warn!("Failed to set WAL journal mode: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA synchronous=NORMAL;").execute(pool).await {
        tracing::warn!("Failed to set synchronous mode: {}", e);
    }

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS users (
            user_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            mobile TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
