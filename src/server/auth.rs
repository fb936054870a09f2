//! Single-password HTTP Basic auth gate for `/api/*`.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::AppState;

/// `true` when `headers` carry Basic credentials whose password matches.
/// The user name is ignored.
pub fn basic_auth_matches(headers: &HeaderMap, expected: &str) -> bool {
    let Some(encoded) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
    else {
        return false;
    };
    let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
        return false;
    };
    let Ok(credentials) = String::from_utf8(decoded) else {
        return false;
    };
    credentials
        .split_once(':')
        .is_some_and(|(_, password)| password == expected)
}

pub async fn require_password(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.password.as_deref() else {
        return next.run(request).await;
    };
    if basic_auth_matches(request.headers(), expected) {
        return next.run(request).await;
    }
    tracing::debug!(path = %request.uri().path(), "rejected unauthenticated request");
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"Billarr\"")],
        axum::Json(serde_json::json!({ "error": "Unauthorized" })),
    )
        .into_response()
}
