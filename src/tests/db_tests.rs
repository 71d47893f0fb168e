#[cfg(test)]
mod tests {
    use crate::config::DatabaseConfig;
    use crate::db::{self, Database};
    use sqlx::sqlite::SqlitePoolOptions;
    use tempfile::NamedTempFile;

    fn db_config(url: String) -> DatabaseConfig {
        DatabaseConfig { url, max_connections: 2, acquire_timeout_secs: 5 }
    }

    async fn setup_test_db() -> (sqlx::SqlitePool, NamedTempFile) {
        let temp_db = NamedTempFile::new().unwrap();
        let db_url = format!("sqlite:{}", temp_db.path().display());

        let pool = SqlitePoolOptions::new().max_connections(1).connect(&db_url).await.unwrap();

        db::init_db(&pool).await.unwrap();

        (pool, temp_db)
    }

    #[tokio::test]
    async fn test_init_db() {
        let (pool, _temp) = setup_test_db().await;

        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .fetch_all(&pool)
                .await
                .unwrap();

        assert!(tables.contains(&"users".to_string()));
    }

    #[tokio::test]
    async fn test_init_db_is_idempotent() {
        let (pool, _temp) = setup_test_db().await;
        db::init_db(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_mobile_is_unique() {
        let (pool, _temp) = setup_test_db().await;

        let insert = "INSERT INTO users (name, mobile, password_hash) VALUES (?1, ?2, ?3)";
        sqlx::query(insert).bind("a").bind("13800000000").bind("h").execute(&pool).await.unwrap();
        let err = sqlx::query(insert).bind("b").bind("13800000000").bind("h").execute(&pool).await.unwrap_err();

        match err {
            sqlx::Error::Database(db_err) => assert!(db_err.is_unique_violation()),
            other => panic!("Expected unique violation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_from_pool_is_connected() {
        let (pool, temp) = setup_test_db().await;
        let database = Database::from_pool(db_config(format!("sqlite:{}", temp.path().display())), pool);

        assert!(database.is_connected());
        let pool = database.pool().await.unwrap();
        let one: i64 = sqlx::query_scalar("SELECT 1").fetch_one(pool).await.unwrap();
        assert_eq!(one, 1);
    }

    #[tokio::test]
    async fn test_lazy_connect_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("stone.db");
        let database = Database::new(db_config(format!("sqlite://{}", path.display())));

        assert!(!database.is_connected());
        assert!(!path.exists());

        // Concurrent first users share one initialization
        let (a, b) = tokio::join!(database.pool(), database.pool());
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(std::ptr::eq(a, b));
        assert!(database.is_connected());
        assert!(path.exists());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(a).await.unwrap();
        assert_eq!(count, 0);
        database.close().await;
    }

    #[tokio::test]
    async fn test_unreachable_database_is_unavailable() {
        // A regular file cannot be used as a parent directory
        let blocker = NamedTempFile::new().unwrap();
        let url = format!("sqlite://{}/sub/stone.db", blocker.path().display());
        let database = Database::new(db_config(url));

        let err = database.pool().await.unwrap_err();
        assert!(matches!(err, crate::error::AppError::ServiceUnavailable(_)));
        assert!(!database.is_connected());
    }
}
