//! API request handlers

pub mod campaigns;
pub mod dispatch;
pub mod health;
pub mod plan;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use wacast_common::Error;

/// Error response body
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Map a domain error onto its HTTP representation
pub fn error_reply(err: Error) -> (StatusCode, Json<ErrorResponse>) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ErrorResponse {
            error: err.code().to_lowercase(),
            message: err.to_string(),
        }),
    )
}

/// Map a repository error onto a 500 without leaking internals
pub fn internal_reply(context: &str, err: sqlx::Error) -> (StatusCode, Json<ErrorResponse>) {
    tracing::error!(error = %err, "{}", context);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "internal_error".to_string(),
            message: context.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_reply_mapping() {
        let (status, body) = error_reply(Error::NotFound("Campaign x".to_string()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "not_found");

        let (status, _) = error_reply(Error::AmbiguousSender("two defaults".to_string()));
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = error_reply(Error::Conflict("already sending".to_string()));
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = error_reply(Error::Provider("gateway down".to_string()));
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }
}
