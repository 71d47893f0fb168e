use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::{header::CONTENT_TYPE, HeaderMap},
    Json,
};
use mime::Mime;
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// Form encodings recognised from a `Content-Type` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormKind {
    UrlEncoded,
    /// `multipart/form-data` with its boundary.
    Multipart(String),
}

/// Classifies the request body by its media type. Type and subtype compare
/// case-insensitively; the multipart boundary keeps its case.
pub fn form_kind(headers: &HeaderMap) -> Option<FormKind> {
    let mime: Mime = headers.get(CONTENT_TYPE)?.to_str().ok()?.parse().ok()?;
    let (ty, sub) = (mime.type_().as_str(), mime.subtype().as_str());

    if ty.eq_ignore_ascii_case("application") && sub.eq_ignore_ascii_case("x-www-form-urlencoded") {
        Some(FormKind::UrlEncoded)
    } else if ty.eq_ignore_ascii_case("multipart") && sub.eq_ignore_ascii_case("form-data") {
        let boundary = mime.get_param(mime::BOUNDARY)?;
        Some(FormKind::Multipart(boundary.as_str().to_string()))
    } else {
        None
    }
}

/// Request body accepted either as JSON or as an urlencoded form.
///
/// The `Content-Type` header decides; anything that is not
/// `application/x-www-form-urlencoded` is parsed as JSON. Rejections are
/// rendered through [`AppError`] so clients get the usual error envelope.
#[derive(Debug, Clone)]
pub struct Payload<T>(pub T);

impl<T, S> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if form_kind(req.headers()) == Some(FormKind::UrlEncoded) {
            // axum's Form matches the content type case-sensitively, so decode here
            let bytes = Bytes::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            let value = serde_urlencoded::from_bytes(&bytes)
                .map_err(|e| AppError::BadRequest(format!("Failed to deserialize form body: {}", e)))?;
            Ok(Payload(value))
        } else {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            Ok(Payload(value))
        }
    }
}
