use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Phonemization(String),

    #[error("{0}")]
    Synthesis(String),

    #[error("{0}")]
    Storage(String),

    #[error("{0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Stable name of the failure kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Phonemization(_) => "PHONEMIZATION_ERROR",
            AppError::Synthesis(_) => "SYNTHESIS_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Io(_) => "IO_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Phonemization(_)
            | AppError::Synthesis(_)
            | AppError::Storage(_)
            | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!("Request failed: {} - {}", self.kind(), message);
        } else {
            tracing::warn!("Request rejected: {} - {}", self.kind(), message);
        }

        (
            status,
            Json(ErrorResponse {
                success: false,
                error: message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(
            AppError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Phonemization("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Synthesis("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Storage("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_message_is_collaborator_text_only() {
        let err = AppError::Phonemization("model exploded".into());
        assert_eq!(err.to_string(), "model exploded");
        assert_eq!(err.kind(), "PHONEMIZATION_ERROR");
    }
}
