use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::Database;
use crate::middleware::csrf::Csrf;

/// The shared application state.
///
/// Cloned into every handler by Axum; all members are reference counted.
#[derive(Clone)]
pub struct AppState {
    /// The database handle. Connects lazily on first use.
    pub db: Arc<Database>,
    /// The application configuration.
    pub config: Arc<AppConfig>,
    /// The CSRF guard, built once from `config.csrf`.
    pub csrf: Arc<Csrf>,
}

impl AppState {
    /// Creates a new `AppState`.
    ///
    /// Fails if the CSRF section of the configuration cannot be turned into a guard.
    pub fn new(db: Arc<Database>, config: AppConfig) -> anyhow::Result<Self> {
        let csrf = Csrf::new(config.csrf.clone())?;
        Ok(Self { db, config: Arc::new(config), csrf: Arc::new(csrf) })
    }
}
