//! Storage seams for OTP records and brand accounts.
//!
//! Production uses [`crate::services::PgStore`]; tests use [`crate::services::InMemoryStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{BrandAccount, OtpRecord};
use crate::services::ServiceError;

#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn insert_otp(&self, record: &OtpRecord) -> Result<(), ServiceError>;

    /// Delete every record with `expires_at <= now`. Returns the number removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, ServiceError>;

    /// Records for `email` that are still valid at `now`, newest first.
    async fn find_active_by_email(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<OtpRecord>, ServiceError>;

    /// Delete the record if it still exists and is valid at `now`.
    /// Returns `false` when another request consumed it first.
    async fn consume(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, ServiceError>;

    /// Remove every outstanding record for `email`.
    async fn delete_by_email(&self, email: &str) -> Result<u64, ServiceError>;

    async fn health_check(&self) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait BrandDirectory: Send + Sync {
    async fn find_brand_by_email(&self, email: &str) -> Result<Option<BrandAccount>, ServiceError>;

    async fn find_brand_by_slug(&self, slug: &str) -> Result<Option<BrandAccount>, ServiceError>;

    async fn list_brands(&self) -> Result<Vec<BrandAccount>, ServiceError>;

    /// Fails with [`ServiceError::BrandAlreadyExists`] on a duplicate email or slug.
    async fn insert_brand(&self, brand: &BrandAccount) -> Result<(), ServiceError>;

    async fn set_brand_active(
        &self,
        slug: &str,
        active: bool,
    ) -> Result<Option<BrandAccount>, ServiceError>;
}
