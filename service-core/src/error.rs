use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    /// Guard failure. The reason stays server-side.
    #[error("Unauthorized: {0}")]
    Unauthorized(anyhow::Error),

    #[error("Invalid or expired code")]
    InvalidOrExpiredCode,

    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    #[error("Too many requests: {0}")]
    TooManyRequests(String, Option<u64>),

    /// Store unreachable, dependency timeout or email dispatch failure. Safe to retry.
    #[error("Transient dependency failure: {0}")]
    TransientDependencyFailure(String),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Email error: {0}")]
    EmailError(String),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl AppError {
    /// HTTP status and machine-readable code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::InvalidOrExpiredCode => (StatusCode::UNAUTHORIZED, "invalid_or_expired_code"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::TooManyRequests(_, _) => (StatusCode::TOO_MANY_REQUESTS, "too_many_requests"),
            AppError::TransientDependencyFailure(_)
            | AppError::DatabaseError(_)
            | AppError::EmailError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "transient_dependency_failure",
            ),
            AppError::InvalidToken(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::InternalError(_) | AppError::ConfigError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }

    /// Message safe to hand to a caller. Internal causes never leave the process.
    fn public_message(&self) -> String {
        match self {
            AppError::ValidationError(errors) => {
                let mut fields: Vec<String> =
                    errors.field_errors().keys().map(|k| k.to_string()).collect();
                fields.sort_unstable();
                format!("Invalid field(s): {}", fields.join(", "))
            }
            AppError::BadRequest(err) | AppError::NotFound(err) | AppError::Conflict(err) => {
                err.to_string()
            }
            AppError::Unauthorized(_) | AppError::InvalidToken(_) => "Unauthorized".to_string(),
            AppError::InvalidOrExpiredCode => "Invalid or expired code".to_string(),
            AppError::TooManyRequests(msg, _) => msg.clone(),
            AppError::TransientDependencyFailure(_)
            | AppError::DatabaseError(_)
            | AppError::EmailError(_) => "Temporary failure, please retry".to_string(),
            AppError::InternalError(_) | AppError::ConfigError(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(err: lettre::error::Error) -> Self {
        AppError::EmailError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        match &self {
            AppError::Unauthorized(reason) => {
                tracing::debug!(reason = %reason, "Request rejected as unauthorized");
            }
            AppError::InvalidOrExpiredCode
            | AppError::ValidationError(_)
            | AppError::BadRequest(_)
            | AppError::NotFound(_)
            | AppError::Conflict(_)
            | AppError::TooManyRequests(_, _)
            | AppError::InvalidToken(_) => {}
            other => {
                tracing::error!(error = %other, status = %status.as_u16(), "Request failed");
            }
        }

        let retry_after = match &self {
            AppError::TooManyRequests(_, retry) => *retry,
            _ => None,
        };

        let mut res = (
            status,
            Json(ErrorBody {
                error: code,
                message: self.public_message(),
            }),
        )
            .into_response();

        if let Some(retry) = retry_after {
            res.headers_mut()
                .insert(axum::http::header::RETRY_AFTER, retry.into());
        }

        res
    }
}
