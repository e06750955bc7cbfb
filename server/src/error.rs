//! Error types for the application

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use groundfinder_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Analysis not found: {0}")]
    AnalysisNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Failed to decode image: {0}")]
    ImageDecode(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::AnalysisNotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidRequest(_)
            | AppError::ImageDecode(_)
            | AppError::Core(CoreError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            AppError::ImageProcessing(_)
            | AppError::Core(CoreError::NoMatchFound)
            | AppError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::AnalysisNotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::ImageDecode("x".into()), StatusCode::BAD_REQUEST),
            (CoreError::invalid("x").into(), StatusCode::BAD_REQUEST),
            (CoreError::NoMatchFound.into(), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::ImageProcessing("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }
}
