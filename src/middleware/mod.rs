//! Middleware components for HTTP request processing.
//!
//! Layered onto the router with `axum::middleware::from_fn_with_state`.

pub mod csrf;
