use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::BillarrError;

/// Error returned by REST handlers.
#[derive(Debug)]
pub enum ApiError {
    /// One message per invalid field.
    Validation(Vec<String>),
    /// Bill id absent or not a bill id at all.
    NotFound,
    /// A notification check is already running.
    Busy,
    /// Store or other internal failure.
    Internal(String),
}

impl From<BillarrError> for ApiError {
    fn from(err: BillarrError) -> Self {
        match err {
            BillarrError::Validation(messages) => Self::Validation(messages),
            BillarrError::NotFound(_) => Self::NotFound,
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(vec![rejection.body_text()])
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "errors": errors })),
            )
                .into_response(),
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": "Bill not found" })),
            )
                .into_response(),
            Self::Busy => (
                StatusCode::CONFLICT,
                Json(serde_json::json!({ "error": "Notification check already in progress" })),
            )
                .into_response(),
            Self::Internal(message) => {
                tracing::error!("request failed: {message}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": message })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn billarr_errors_map_to_statuses() {
        let cases = [
            (BillarrError::Validation(vec!["x".to_owned()]), StatusCode::BAD_REQUEST),
            (BillarrError::NotFound(3), StatusCode::NOT_FOUND),
            (BillarrError::Store("disk".to_owned()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
        assert_eq!(ApiError::Busy.into_response().status(), StatusCode::CONFLICT);
    }
}
