//! Cross-Site Request Forgery (CSRF) protection middleware.
//!
//! Implements the double-submit cookie scheme: every client receives a random
//! token in a cookie, and state-changing requests must echo that token back
//! through a header, a form field or a query parameter. Nothing is stored on
//! the server; the cookie is the only source of truth.

use std::{str::FromStr, sync::Arc};

use axum::{
    body::{self, Body},
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use rand::{distributions::Alphanumeric, Rng};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use time::{Duration, OffsetDateTime};

use crate::context::{ContextValues, CsrfToken};
use crate::error::AppError;
use crate::extract::{form_kind, FormKind};

pub const DEFAULT_TOKEN_LENGTH: usize = 32;
pub const DEFAULT_TOKEN_LOOKUP: &str = "header:X-CSRF-Token";
pub const DEFAULT_CONTEXT_KEY: &str = "csrf";
pub const DEFAULT_COOKIE_NAME: &str = "_csrf";
pub const DEFAULT_COOKIE_MAX_AGE: u64 = 86400;

// Same ceiling as the router's DefaultBodyLimit.
const MAX_FORM_BODY: usize = 10 * 1024 * 1024;

/// Raw CSRF settings as they appear in the `[csrf]` config section.
///
/// Zero values (`0`, `""`) mean "unset" and are replaced by the defaults when
/// the guard is built with [`Csrf::new`].
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CsrfConfig {
    /// Length of generated tokens.
    pub token_length: usize,
    /// `"<source>:<key>"` where source is `header`, `form` or `query`.
    pub token_lookup: String,
    /// Request context key the token is stored under.
    pub context_key: String,
    pub cookie_name: String,
    pub cookie_domain: String,
    pub cookie_path: String,
    /// Cookie lifetime in seconds.
    pub cookie_max_age: u64,
    pub cookie_secure: bool,
    pub cookie_http_only: bool,
}

/// Errors raised while building a [`Csrf`] guard from its config.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CsrfConfigError {
    #[error("token lookup '{0}' must have the form '<source>:<key>'")]
    MalformedLookup(String),
    #[error("token lookup '{0}' has an empty key")]
    EmptyLookupKey(String),
    #[error("unknown token lookup source '{0}' (expected header, form or query)")]
    UnknownSource(String),
    #[error("invalid header name '{0}' in token lookup")]
    InvalidHeaderName(String),
}

/// Rejections produced while validating a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CsrfError {
    /// The client did not submit a token where the guard looks for one.
    #[error("{0}")]
    ExtractionFailed(&'static str),
    /// The request body could not be buffered to look for a form token.
    #[error("failed to read request body: {0}")]
    UnreadableBody(String),
    /// The submitted token does not match the cookie.
    #[error("csrf token is invalid")]
    TokenMismatch,
}

/// Where the client-submitted token is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenLookup {
    Header(HeaderName),
    Form(String),
    Query(String),
}

impl FromStr for TokenLookup {
    type Err = CsrfConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (source, key) =
            s.split_once(':').ok_or_else(|| CsrfConfigError::MalformedLookup(s.to_string()))?;
        if key.is_empty() {
            return Err(CsrfConfigError::EmptyLookupKey(s.to_string()));
        }
        match source {
            "header" => HeaderName::from_bytes(key.as_bytes())
                .map(TokenLookup::Header)
                .map_err(|_| CsrfConfigError::InvalidHeaderName(key.to_string())),
            "form" => Ok(TokenLookup::Form(key.to_string())),
            "query" => Ok(TokenLookup::Query(key.to_string())),
            other => Err(CsrfConfigError::UnknownSource(other.to_string())),
        }
    }
}

impl TokenLookup {
    /// Reads the client token from the request.
    ///
    /// The request is handed back because the form source has to buffer and
    /// re-attach the body. A missing header yields an empty token rather than
    /// an error, so it fails later as a mismatch; form and query sources
    /// reject a missing or empty value outright.
    pub async fn extract(&self, req: Request) -> Result<(Request, String), CsrfError> {
        match self {
            TokenLookup::Header(name) => {
                let token = req
                    .headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Ok((req, token))
            }
            TokenLookup::Form(field) => {
                let (req, token) = form_value(req, field).await?;
                match token {
                    Some(token) if !token.is_empty() => Ok((req, token)),
                    _ => Err(CsrfError::ExtractionFailed("empty csrf token in form param")),
                }
            }
            TokenLookup::Query(param) => match query_value(req.uri(), param) {
                Some(token) if !token.is_empty() => Ok((req, token)),
                _ => Err(CsrfError::ExtractionFailed("empty csrf token in query param")),
            },
        }
    }
}

/// A configured CSRF guard. Immutable once built and shared across requests.
#[derive(Debug, Clone)]
pub struct Csrf {
    token_length: usize,
    lookup: TokenLookup,
    context_key: String,
    cookie_name: String,
    cookie_domain: Option<String>,
    cookie_path: Option<String>,
    cookie_max_age: Duration,
    cookie_secure: bool,
    cookie_http_only: bool,
}

impl Default for Csrf {
    fn default() -> Self {
        Self {
            token_length: DEFAULT_TOKEN_LENGTH,
            lookup: TokenLookup::Header(HeaderName::from_static("x-csrf-token")),
            context_key: DEFAULT_CONTEXT_KEY.to_string(),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cookie_domain: None,
            cookie_path: None,
            cookie_max_age: max_age(DEFAULT_COOKIE_MAX_AGE),
            cookie_secure: false,
            cookie_http_only: false,
        }
    }
}

impl Csrf {
    /// Builds a guard, filling every unset field with its default.
    pub fn new(config: CsrfConfig) -> Result<Self, CsrfConfigError> {
        let lookup = if config.token_lookup.is_empty() {
            DEFAULT_TOKEN_LOOKUP.parse()?
        } else {
            config.token_lookup.parse()?
        };

        Ok(Self {
            token_length: or_default(config.token_length, DEFAULT_TOKEN_LENGTH),
            lookup,
            context_key: non_empty(config.context_key).unwrap_or_else(|| DEFAULT_CONTEXT_KEY.to_string()),
            cookie_name: non_empty(config.cookie_name).unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_string()),
            cookie_domain: non_empty(config.cookie_domain),
            cookie_path: non_empty(config.cookie_path),
            cookie_max_age: max_age(or_default(config.cookie_max_age, DEFAULT_COOKIE_MAX_AGE)),
            cookie_secure: config.cookie_secure,
            cookie_http_only: config.cookie_http_only,
        })
    }

    pub fn token_length(&self) -> usize {
        self.token_length
    }

    pub fn lookup(&self) -> &TokenLookup {
        &self.lookup
    }

    pub fn context_key(&self) -> &str {
        &self.context_key
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Returns the token carried by the CSRF cookie, or mints a new one.
    ///
    /// An existing cookie value is reused verbatim, whatever its shape.
    pub fn session_token(&self, jar: &CookieJar) -> String {
        match jar.get(&self.cookie_name) {
            Some(cookie) => cookie.value().to_string(),
            None => generate_token(self.token_length),
        }
    }

    /// Checks the client token against the session token in constant time.
    pub fn verify(&self, session_token: &str, client_token: &str) -> Result<(), CsrfError> {
        if tokens_match(session_token, client_token) {
            Ok(())
        } else {
            Err(CsrfError::TokenMismatch)
        }
    }

    /// Builds the cookie that carries `token` back to the client.
    pub fn cookie(&self, token: &str) -> Cookie<'static> {
        let mut cookie = Cookie::new(self.cookie_name.clone(), token.to_string());
        if let Some(path) = &self.cookie_path {
            cookie.set_path(path.clone());
        }
        if let Some(domain) = &self.cookie_domain {
            cookie.set_domain(domain.clone());
        }
        cookie.set_expires(OffsetDateTime::now_utc().saturating_add(self.cookie_max_age));
        cookie.set_secure(self.cookie_secure);
        cookie.set_http_only(self.cookie_http_only);
        cookie
    }
}

/// CSRF protection middleware, installed with `from_fn_with_state`.
///
/// Safe methods (GET, HEAD, OPTIONS, TRACE) are never validated. Every other
/// method must present a token equal to the cookie's, otherwise the request is
/// rejected before the handler runs. Accepted requests get the token in their
/// context and the cookie refreshed on the response.
pub async fn csrf_middleware(
    State(csrf): State<Arc<Csrf>>,
    jar: CookieJar,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = csrf.session_token(&jar);

    // http's notion of "safe" is exactly GET, HEAD, OPTIONS and TRACE
    let mut req = if req.method().is_safe() {
        req
    } else {
        let method = req.method().clone();
        let (req, client_token) = csrf.lookup.extract(req).await.inspect_err(|e| {
            tracing::debug!(%method, "CSRF token extraction failed: {}", e);
        })?;
        csrf.verify(&token, &client_token).inspect_err(|_| {
            tracing::debug!(%method, "CSRF token mismatch");
        })?;
        req
    };

    let mut values = req.extensions_mut().remove::<ContextValues>().unwrap_or_default();
    values.set(csrf.context_key.clone(), token.clone());
    req.extensions_mut().insert(values);
    req.extensions_mut().insert(CsrfToken(token.clone()));

    let res = next.run(req).await;

    let mut res = (CookieJar::new().add(csrf.cookie(&token)), res).into_response();
    res.headers_mut().append(header::VARY, HeaderValue::from_static("Cookie"));
    Ok(res)
}

/// Generates a random alphanumeric token of `length` characters.
pub fn generate_token(length: usize) -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(length).map(char::from).collect()
}

/// Constant-time equality. Tokens of different lengths never match.
pub fn tokens_match(expected: &str, provided: &str) -> bool {
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

fn or_default<T: Default + PartialEq>(value: T, default: T) -> T {
    if value == T::default() {
        default
    } else {
        value
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn max_age(seconds: u64) -> Duration {
    Duration::seconds(i64::try_from(seconds).unwrap_or(i64::MAX))
}

fn first_value(pairs: Vec<(String, String)>, key: &str) -> Option<String> {
    pairs.into_iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

fn query_value(uri: &Uri, key: &str) -> Option<String> {
    let query = uri.query()?;
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).ok()?;
    first_value(pairs, key)
}

/// Form value lookup: fields of an urlencoded or multipart body take
/// precedence over the query string. The buffered body is put back so the
/// handler can still read it.
async fn form_value(req: Request, field: &str) -> Result<(Request, Option<String>), CsrfError> {
    let Some(kind) = form_kind(req.headers()) else {
        let value = query_value(req.uri(), field);
        return Ok((req, value));
    };

    let (parts, raw) = req.into_parts();
    let bytes = body::to_bytes(raw, MAX_FORM_BODY)
        .await
        .map_err(|e| CsrfError::UnreadableBody(e.to_string()))?;
    let from_body = match kind {
        FormKind::UrlEncoded => serde_urlencoded::from_bytes::<Vec<(String, String)>>(&bytes)
            .ok()
            .and_then(|pairs| first_value(pairs, field)),
        FormKind::Multipart(boundary) => multipart_value(&bytes, boundary, field).await,
    };
    let value = from_body.or_else(|| query_value(&parts.uri, field));

    Ok((Request::from_parts(parts, Body::from(bytes)), value))
}

/// First non-file part named `field`. A malformed body counts as absent.
async fn multipart_value(bytes: &[u8], boundary: String, field: &str) -> Option<String> {
    let mut multipart = multer::Multipart::with_reader(bytes, boundary);
    while let Ok(Some(part)) = multipart.next_field().await {
        if part.file_name().is_none() && part.name() == Some(field) {
            return part.text().await.ok();
        }
    }
    None
}
