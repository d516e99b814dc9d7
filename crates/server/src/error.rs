//! Error taxonomy for the chat service.
//!
//! Room, membership and message errors are surfaced synchronously to the
//! caller. Fact-check dependency failures are absorbed inside the pipeline
//! and never reach a send response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Malformed input (empty room name/topic, empty message content).
    #[error("{0}")]
    Validation(String),

    /// Operation referenced a room that does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Missing or invalid session token.
    #[error("{0}")]
    Unauthenticated(String),

    /// Operation attempted by a non-member where membership is required.
    #[error("{0}")]
    Authorization(String),

    /// Operation precondition not met (e.g. leaving a room never joined).
    #[error("{0}")]
    Precondition(String),

    /// External text-generation capability unavailable or errored.
    #[error("fact-check dependency failed: {0}")]
    Dependency(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = core::result::Result<T, ChatError>;

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ChatError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ChatError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ChatError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, msg),
            ChatError::Authorization(msg) => (StatusCode::FORBIDDEN, msg),
            ChatError::Precondition(msg) => (StatusCode::CONFLICT, msg),
            ChatError::Dependency(msg) => (StatusCode::BAD_GATEWAY, msg),
            ChatError::Internal(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        };

        let body = Json(json!({
            "error": {
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        ChatError::Internal(err.into())
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Internal(err.into())
    }
}

impl From<sqlx::Error> for ChatError {
    fn from(err: sqlx::Error) -> Self {
        ChatError::Internal(err.into())
    }
}

impl From<bcrypt::BcryptError> for ChatError {
    fn from(err: bcrypt::BcryptError) -> Self {
        ChatError::Internal(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ChatError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (ChatError::NotFound("gone".into()), StatusCode::NOT_FOUND),
            (ChatError::Unauthenticated("no".into()), StatusCode::UNAUTHORIZED),
            (ChatError::Authorization("no".into()), StatusCode::FORBIDDEN),
            (ChatError::Precondition("no".into()), StatusCode::CONFLICT),
            (ChatError::Dependency("down".into()), StatusCode::BAD_GATEWAY),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
