use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// A brand account that may log in by emailed code while `active`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BrandAccount {
    pub id: Uuid,
    #[schema(example = "brand@example.com")]
    pub email: String,
    #[schema(example = "acme-coffee")]
    pub slug: String,
    #[schema(example = "Acme Coffee")]
    pub display_name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl BrandAccount {
    pub fn new(email: &str, slug: &str, display_name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.trim().to_lowercase(),
            slug: slug.trim().to_lowercase(),
            display_name: display_name.trim().to_string(),
            active: true,
            created_at: Utc::now(),
        }
    }
}
