//! Integration and unit tests for the Stone backend.
//!
//! ## Test Modules
//!
//! - **csrf_tests**: CSRF middleware behavior through a router
//! - **api_tests**: Registration endpoint end to end
//! - **error_tests**: Error rendering and conversions
//! - **config_tests**: Configuration loading and validation
//! - **db_tests**: Database handle and schema
//! - **health_api_tests**: Health check endpoints
//!
//! Individual test modules can be run with:
//! ```bash
//! cargo test csrf_tests
//! cargo test api_tests
//! # etc.
//! ```

pub mod db_tests;

use axum::response::Response;
use axum_extra::extract::cookie::Cookie;
use http_body_util::BodyExt;
use sqlx::sqlite::SqlitePoolOptions;
use tempfile::NamedTempFile;

use crate::config::AppConfig;
use crate::db::{self, Database};
use crate::middleware::csrf::CsrfConfig;
use crate::state::AppState;

/// App state backed by a fresh SQLite file. Keep the temp file alive for the test.
pub(crate) async fn test_state(csrf: CsrfConfig) -> (AppState, NamedTempFile) {
    let temp_db = NamedTempFile::new().unwrap();
    let db_url = format!("sqlite:{}", temp_db.path().display());

    let pool = SqlitePoolOptions::new().max_connections(1).connect(&db_url).await.unwrap();
    db::init_db(&pool).await.unwrap();

    let mut config = AppConfig::default();
    config.database.url = db_url;
    config.csrf = csrf;

    let db = Database::from_pool(config.database.clone(), pool);
    (AppState::new(db, config).unwrap(), temp_db)
}

/// The CSRF cookie set on a response, if any.
pub(crate) fn set_cookie(res: &Response, name: &str) -> Option<Cookie<'static>> {
    res.headers()
        .get_all(axum::http::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| Cookie::parse(v.to_string()).ok())
        .find(|c| c.name() == name)
}

pub(crate) async fn body_json(res: Response) -> serde_json::Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
