//! HTTP route handlers for the Stone API.
//!
//! - `csrf`: hands the current CSRF token to clients
//! - `health`: health check and build info endpoints
//! - `register`: user registration

pub mod csrf;
pub mod health;
pub mod register;
