use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::repository::RepositoryError;
use crate::validation::AmountMismatch;

/// JSON body returned for every error.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<Decimal>,
}

impl ErrorResponse {
    fn message(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            field: None,
            expected: None,
            received: None,
        }
    }
}

/// Application-level error; every handler returns it.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or out-of-range input
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    AmountMismatch(#[from] AmountMismatch),

    #[error("authorization header required")]
    MissingToken,

    /// Any bearer token failure. Deliberately carries no detail.
    #[error("invalid token")]
    InvalidToken,

    /// Unknown email or wrong password, indistinguishable on purpose.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::AmountMismatch(_) => StatusCode::BAD_REQUEST,
            AppError::MissingToken | AppError::InvalidToken | AppError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("Invalid request data: {}", err))
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => AppError::NotFound("Invoice not found".to_string()),
            RepositoryError::DuplicateNumber => {
                AppError::Conflict("Invoice number already exists".to_string())
            }
            RepositoryError::DuplicateEmail => {
                AppError::Conflict("email already exists".to_string())
            }
            RepositoryError::Database(e) => AppError::Internal(anyhow::Error::new(e)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            AppError::AmountMismatch(ref m) => ErrorResponse {
                error: m.to_string(),
                field: Some(m.field.as_str()),
                expected: Some(m.expected),
                received: Some(m.received),
            },
            AppError::Internal(ref e) => {
                // Don't leak internal error detail to client
                error!(error = ?e, "Request failed with internal error");
                ErrorResponse::message("Internal server error")
            }
            ref other => ErrorResponse::message(other.to_string()),
        };

        (status, Json(body)).into_response()
    }
}
