//! Request-scoped values shared between middleware and handlers.

use std::{collections::HashMap, convert::Infallible};

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

/// String key/value store attached to a single request.
///
/// Middleware writes into it (the CSRF guard stores its token under the
/// configured context key) and handlers read from it through the extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextValues(HashMap<String, String>);

impl ContextValues {
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

impl<S> FromRequestParts<S> for ContextValues
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<ContextValues>().cloned().unwrap_or_default())
    }
}

/// The CSRF token issued for the current request.
///
/// Always equal to the value of the CSRF cookie set on the response. Only
/// available on routes behind the CSRF middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken(pub String);

impl<S> FromRequestParts<S> for CsrfToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CsrfToken>()
            .cloned()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("CSRF middleware is not installed on this route")))
    }
}
