/// Unified error types for the Leadflow backend
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the backend
#[derive(Error, Debug)]
pub enum AppError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Malformed or missing input
    #[error("{0}")]
    Validation(String),

    /// Bad credentials or bad/expired token
    #[error("{0}")]
    Auth(String),

    /// Role or ownership mismatch
    #[error("{0}")]
    Forbidden(String),

    /// Forced password rotation gate
    #[error("You must change your password before continuing")]
    PasswordChangeRequired,

    /// Not found errors
    #[error("{0}")]
    NotFound(String),

    /// Duplicate resource (e.g., email already registered)
    #[error("{0}")]
    Conflict(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Generic credential failure. Same message for unknown email and wrong
    /// password so login cannot be used to enumerate accounts.
    pub fn invalid_credentials() -> Self {
        AppError::Auth("Invalid credentials".to_string())
    }
}

/// JSON error body: every response carries a `success` flag
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "mustChangePassword")]
    pub must_change_password: Option<bool>,
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let must_change_password =
            matches!(self, AppError::PasswordChangeRequired).then_some(true);

        let (status, message) = match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Auth(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Forbidden(_) | AppError::PasswordChangeRequired => {
                (StatusCode::FORBIDDEN, self.to_string())
            }
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                // Don't leak details to the client
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Internal(_) | AppError::Io(_) => {
                tracing::error!("Internal error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            message,
            errors: None,
            must_change_password,
        });

        (status, body).into_response()
    }
}

/// Result type alias for backend operations
pub type AppResult<T> = Result<T, AppError>;
