use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::ai::AnalysisError;

/// Application error taxonomy.
///
/// Per-product failures inside the batch report run never surface through
/// this type; they are converted into the run's failure list. Only request
/// handlers and startup paths propagate `AppError`.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("analysis: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("fatal config: {0}")]
    FatalConfig(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Analysis(_) => StatusCode::BAD_GATEWAY,
            AppError::FatalConfig(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Internal(e.into())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status()).json(serde_json::json!({
            "success": false,
            "error": self.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_status_codes() {
        assert_eq!(
            AppError::validation("bad score").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::not_found("no such product").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::FatalConfig("GEMINI_API_KEY missing".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn analysis_errors_are_bad_gateway() {
        let err = AppError::from(AnalysisError::Other("model unavailable".into()));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }
}
