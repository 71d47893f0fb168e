use axum::Json;

use crate::{
    context::CsrfToken,
    types::{ApiResponse, CsrfTokenResponse},
};

/// Returns the CSRF token issued for this request.
///
/// The same value is set in the CSRF cookie on the response, so a client can
/// echo it back on its next state-changing request.
pub async fn csrf_token(CsrfToken(token): CsrfToken) -> Json<ApiResponse<CsrfTokenResponse>> {
    Json(ApiResponse::ok(CsrfTokenResponse { token }))
}
