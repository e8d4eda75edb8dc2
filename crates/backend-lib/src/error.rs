// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use livedeck_common::SessionStatus;
use thiserror::Error;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid transition: cannot {action} while session is {from}")]
    InvalidTransition {
        from: SessionStatus,
        action: &'static str,
    },

    #[error("session is not active")]
    SessionNotActive,

    #[error("session has ended")]
    SessionEnded,

    #[error("could not reserve a unique join code")]
    CodeSpaceExhausted,

    #[error("session not found")]
    SessionNotFound,

    #[error("slide not found")]
    SlideNotFound,

    #[error("speaker is already connected")]
    SpeakerAlreadyConnected,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("connection lost")]
    ConnectionLost,

    #[error("AI generation failed: {0}")]
    AiGenerationFailed(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidTransition { .. }
            | AppError::SessionNotActive
            | AppError::SessionEnded => StatusCode::CONFLICT,
            AppError::SessionNotFound | AppError::SlideNotFound => StatusCode::NOT_FOUND,
            AppError::SpeakerAlreadyConnected => StatusCode::CONFLICT,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::ConnectionLost
            | AppError::CodeSpaceExhausted
            | AppError::AiGenerationFailed(_)
            | AppError::Json(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the wire error code for this error. These codes are stable
    /// and clients dispatch on them.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::SessionNotActive => "session_not_active",
            AppError::SessionEnded => "session_ended",
            AppError::CodeSpaceExhausted => "code_space_exhausted",
            AppError::SessionNotFound => "session_not_found",
            AppError::SlideNotFound => "slide_not_found",
            AppError::SpeakerAlreadyConnected => "speaker_already_connected",
            AppError::Forbidden(_) => "forbidden",
            AppError::InvalidToken => "invalid_token",
            AppError::ConnectionLost => "connection_lost",
            AppError::AiGenerationFailed(_) => "ai_generation_failed",
            AppError::Validation(_) => "validation_error",
            AppError::Json(_) => "invalid_json",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for AppError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        AppError::Internal("session actor is gone".to_string())
    }
}
