use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::models::BrandAccount;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBrandRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "brand@example.com")]
    pub email: String,

    #[validate(length(min = 2, max = 64), custom(function = "validate_slug"))]
    #[schema(example = "acme-coffee")]
    pub slug: String,

    #[validate(length(min = 1, max = 200, message = "Display name is required"))]
    #[schema(example = "Acme Coffee")]
    pub display_name: String,
}

fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    let valid = slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !slug.starts_with('-')
        && !slug.ends_with('-');
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("slug_format"))
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateBrandStatusRequest {
    pub active: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BrandListResponse {
    pub brands: Vec<BrandAccount>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PurgeResponse {
    #[schema(example = 12)]
    pub purged: u64,
}
