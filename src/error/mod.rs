//! Centralized API error handling for the billing engine
//!
//! This module provides a unified error type for API responses with proper
//! HTTP status code mapping and JSON error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::services::LoanError;

/// API error type with HTTP status code mapping
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A loan operation refused by business rules; `reason` names the rule
    #[error("Validation error: {message}")]
    LoanRejected {
        reason: &'static str,
        message: String,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// JSON error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

/// Error details in the response
#[derive(Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    /// Get the error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::LoanRejected { .. } => "VALIDATION_ERROR",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::LoanRejected { .. } => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            ApiError::LoanRejected { reason, .. } => Some(reason.to_string()),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let details = self.details();
        let message = self.to_string();

        // Log server errors
        match &self {
            ApiError::DatabaseError(_)
            | ApiError::ServiceUnavailable(_) => {
                tracing::error!(error = %message, code = %error_code, "Server error occurred");
            }
            _ => {
                tracing::debug!(error = %message, code = %error_code, "Client error occurred");
            }
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code: error_code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<LoanError> for ApiError {
    fn from(err: LoanError) -> Self {
        let message = err.to_string();
        match err {
            LoanError::DuplicateActiveLoan => ApiError::LoanRejected {
                reason: "DUPLICATE_ACTIVE_LOAN",
                message,
            },
            LoanError::NoActiveLoan => ApiError::LoanRejected {
                reason: "NO_ACTIVE_LOAN",
                message,
            },
            LoanError::NothingToPay => ApiError::LoanRejected {
                reason: "NOTHING_TO_PAY",
                message,
            },
            LoanError::Conflict(_) => ApiError::Conflict(message),
            LoanError::Cancelled => ApiError::ServiceUnavailable(message),
            LoanError::Infrastructure(_) => ApiError::DatabaseError(message),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

/// Result type alias using ApiError
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RepositoryError;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ApiError::BadRequest("test".to_string()).error_code(),
            "BAD_REQUEST"
        );
        assert_eq!(
            ApiError::Conflict("test".to_string()).error_code(),
            "CONFLICT"
        );
        assert_eq!(
            ApiError::DatabaseError("test".to_string()).error_code(),
            "DATABASE_ERROR"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::ValidationError("test".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::ServiceUnavailable("test".to_string()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::LoanRejected {
                reason: "NO_ACTIVE_LOAN",
                message: "test".to_string(),
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_loan_errors_map_to_distinct_reasons() {
        let cases = [
            (LoanError::DuplicateActiveLoan, "DUPLICATE_ACTIVE_LOAN"),
            (LoanError::NoActiveLoan, "NO_ACTIVE_LOAN"),
            (LoanError::NothingToPay, "NOTHING_TO_PAY"),
        ];

        for (err, reason) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.status_code(), StatusCode::BAD_REQUEST);
            assert_eq!(api.details().as_deref(), Some(reason));
        }
    }

    #[test]
    fn test_infrastructure_errors_are_internal() {
        let err = LoanError::Infrastructure(RepositoryError::Unavailable("down".to_string()));
        let api: ApiError = err.into();
        assert_eq!(api.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let api: ApiError = LoanError::Cancelled.into();
        assert_eq!(api.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let api: ApiError = LoanError::Conflict("paid".to_string()).into();
        assert_eq!(api.status_code(), StatusCode::CONFLICT);
    }
}
