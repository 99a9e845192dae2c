use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0} did not answer in time")]
    Timeout(&'static str),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Email error: {0}")]
    EmailError(String),

    #[error("Invalid or expired code")]
    InvalidOrExpiredCode,

    #[error("Brand account already exists")]
    BrandAlreadyExists,

    #[error("Brand account not found")]
    BrandNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => {
                AppError::TransientDependencyFailure(format!("database: {}", e))
            }
            ServiceError::Timeout(dependency) => {
                AppError::TransientDependencyFailure(format!("{} timed out", dependency))
            }
            ServiceError::EmailError(e) => AppError::EmailError(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::InvalidOrExpiredCode => AppError::InvalidOrExpiredCode,
            ServiceError::BrandAlreadyExists => {
                AppError::Conflict(anyhow::anyhow!("Brand account already exists"))
            }
            ServiceError::BrandNotFound => {
                AppError::NotFound(anyhow::anyhow!("Brand account not found"))
            }
            ServiceError::ValidationError(e) => AppError::BadRequest(anyhow::anyhow!(e)),
        }
    }
}
