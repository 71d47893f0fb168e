//! # Stone Backend Library
//!
//! A small Axum backend: user registration behind a CSRF guard, backed by a
//! lazily connected SQLite pool and layered configuration.
//!
//! ## Core Components
//!
//! - [`config`]: Application configuration management
//! - [`context`]: Request-scoped values shared by middleware and handlers
//! - [`db`]: Database handle and schema initialization
//! - [`error`]: Centralized error handling and HTTP error responses
//! - [`extract`]: Request body extractors
//! - [`middleware`]: HTTP middleware (CSRF protection)
//! - [`routes`]: HTTP API endpoint handlers
//! - [`state`]: Shared application state
//! - [`types`]: Data transfer objects and response envelopes

pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Builds the application router.
///
/// Everything under `/api` runs behind the CSRF guard; the probes do not.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .route("/register", post(routes::register::register))
        .route("/csrf", get(routes::csrf::csrf_token))
        .layer(from_fn_with_state(state.csrf.clone(), middleware::csrf::csrf_middleware));

    Router::new()
        .route("/healthz", get(routes::health::healthz))
        .route("/readyz", get(routes::health::readyz))
        .route("/version", get(routes::health::version))
        .nest("/api", api)
        .with_state(state)
        // Globales Body-Limit (10 MB) – schützt vor übergroßen Requests
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
}
