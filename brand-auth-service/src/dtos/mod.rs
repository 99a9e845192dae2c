pub mod admin;
pub mod otp;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "invalid_or_expired_code")]
    pub error: String,
    #[schema(example = "Invalid or expired code")]
    pub message: String,
}
