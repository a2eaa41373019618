//! API error type
//!
//! Every error response has the body
//! `{"error_code": "...", "error_description": "..."}`.
//! Internal faults are logged in full and answered with a generic
//! description.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::services::{CodecError, ConfirmationError, QueryError, SubmissionError};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or out-of-range input (400)
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Reading already reported for this date-time and type (409)
    #[error("Double report")]
    DoubleReport,

    /// Unknown measure_uuid (404)
    #[error("Measure not found")]
    MeasureNotFound,

    /// Measurement already confirmed (409)
    #[error("Confirmation duplicate")]
    ConfirmationDuplicate,

    /// Bad measure_type filter (400)
    #[error("Invalid type")]
    InvalidType,

    /// Listing matched nothing (404)
    #[error("Measures not found")]
    MeasuresNotFound,

    /// Unknown image artifact (404)
    #[error("Image not found")]
    ImageNotFound,

    /// Recognition failure or unexpected fault (500); detail is never sent
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error_code: &'static str,
    pub error_description: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidData(_) | ApiError::InvalidType => StatusCode::BAD_REQUEST,
            ApiError::DoubleReport | ApiError::ConfirmationDuplicate => StatusCode::CONFLICT,
            ApiError::MeasureNotFound | ApiError::MeasuresNotFound | ApiError::ImageNotFound => {
                StatusCode::NOT_FOUND
            }
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::InvalidData(_) => "INVALID_DATA",
            ApiError::DoubleReport => "DOUBLE_REPORT",
            ApiError::MeasureNotFound => "MEASURE_NOT_FOUND",
            ApiError::ConfirmationDuplicate => "CONFIRMATION_DUPLICATE",
            ApiError::InvalidType => "INVALID_TYPE",
            ApiError::MeasuresNotFound => "MEASURES_NOT_FOUND",
            ApiError::ImageNotFound => "IMAGE_NOT_FOUND",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn description(&self) -> String {
        match self {
            ApiError::InvalidData(msg) => msg.clone(),
            ApiError::DoubleReport => {
                "A reading for this date-time and measure type has already been reported"
                    .to_string()
            }
            ApiError::MeasureNotFound => "Measure not found".to_string(),
            ApiError::ConfirmationDuplicate => "Measure already confirmed".to_string(),
            ApiError::InvalidType => "Measure type must be WATER or GAS".to_string(),
            ApiError::MeasuresNotFound => "No measures found".to_string(),
            ApiError::ImageNotFound => "Image not found".to_string(),
            ApiError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            error!("Request failed with internal error: {}", detail);
        }

        let body = Json(ErrorBody {
            error_code: self.error_code(),
            error_description: self.description(),
        });

        (self.status(), body).into_response()
    }
}

impl From<SubmissionError> for ApiError {
    fn from(err: SubmissionError) -> Self {
        match err {
            SubmissionError::Invalid(e) => ApiError::InvalidData(e.to_string()),
            SubmissionError::DoubleReport(_) => ApiError::DoubleReport,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ConfirmationError> for ApiError {
    fn from(err: ConfirmationError) -> Self {
        match err {
            ConfirmationError::Invalid(e) => ApiError::InvalidData(e.to_string()),
            ConfirmationError::NotFound(_) => ApiError::MeasureNotFound,
            ConfirmationError::AlreadyConfirmed(_) => ApiError::ConfirmationDuplicate,
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::InvalidType(_) => ApiError::InvalidType,
            QueryError::NoneFound(_) => ApiError::MeasuresNotFound,
        }
    }
}

impl From<CodecError> for ApiError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::NotFound(_) => ApiError::ImageNotFound,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{DuplicateReport, RecognitionError};
    use crate::validators::ValidationError;
    use uuid::Uuid;

    #[test]
    fn test_submission_mapping() {
        let invalid: ApiError = SubmissionError::Invalid(ValidationError::CustomerCode).into();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        assert_eq!(invalid.error_code(), "INVALID_DATA");
        assert_eq!(invalid.description(), "customer_code must be a non-empty string");

        let double: ApiError = SubmissionError::DoubleReport(DuplicateReport {
            existing: Uuid::new_v4(),
        })
        .into();
        assert_eq!(double.status(), StatusCode::CONFLICT);
        assert_eq!(double.error_code(), "DOUBLE_REPORT");
    }

    #[test]
    fn test_recognition_failure_hides_detail() {
        let err: ApiError =
            SubmissionError::Recognition(RecognitionError::Api(403, "API key invalid".into()))
                .into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
        assert!(!err.description().contains("API key"));
    }

    #[test]
    fn test_query_mapping() {
        let invalid: ApiError = QueryError::InvalidType("X".into()).into();
        assert_eq!((invalid.status(), invalid.error_code()), (StatusCode::BAD_REQUEST, "INVALID_TYPE"));

        let none: ApiError = QueryError::NoneFound("C1".into()).into();
        assert_eq!((none.status(), none.error_code()), (StatusCode::NOT_FOUND, "MEASURES_NOT_FOUND"));
    }

    #[test]
    fn test_confirmation_mapping() {
        let missing: ApiError = ConfirmationError::NotFound("x".into()).into();
        assert_eq!((missing.status(), missing.error_code()), (StatusCode::NOT_FOUND, "MEASURE_NOT_FOUND"));
    }
}
