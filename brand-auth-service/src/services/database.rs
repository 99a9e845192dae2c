//! PostgreSQL-backed OTP store and brand directory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::models::{BrandAccount, OtpRecord};
use crate::services::{BrandDirectory, OtpStore, ServiceError};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl OtpStore for PgStore {
    async fn insert_otp(&self, record: &OtpRecord) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO otp_codes (id, email, code_hash, issued_from_ip, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id)
        .bind(&record.email)
        .bind(&record.code_hash)
        .bind(&record.issued_from_ip)
        .bind(record.expires_at)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, ServiceError> {
        let result = sqlx::query("DELETE FROM otp_codes WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn find_active_by_email(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<OtpRecord>, ServiceError> {
        let records = sqlx::query_as::<_, OtpRecord>(
            r#"
            SELECT id, email, code_hash, issued_from_ip, expires_at, created_at
            FROM otp_codes
            WHERE email = $1 AND expires_at > $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(email.to_lowercase())
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn consume(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, ServiceError> {
        let deleted: Option<Uuid> = sqlx::query_scalar(
            "DELETE FROM otp_codes WHERE id = $1 AND expires_at > $2 RETURNING id",
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(deleted.is_some())
    }

    async fn delete_by_email(&self, email: &str) -> Result<u64, ServiceError> {
        let result = sqlx::query("DELETE FROM otp_codes WHERE email = $1")
            .bind(email.to_lowercase())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        crate::db::health_check(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl BrandDirectory for PgStore {
    async fn find_brand_by_email(&self, email: &str) -> Result<Option<BrandAccount>, ServiceError> {
        let brand = sqlx::query_as::<_, BrandAccount>(
            "SELECT id, email, slug, display_name, active, created_at FROM brand_accounts WHERE email = $1",
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(brand)
    }

    async fn find_brand_by_slug(&self, slug: &str) -> Result<Option<BrandAccount>, ServiceError> {
        let brand = sqlx::query_as::<_, BrandAccount>(
            "SELECT id, email, slug, display_name, active, created_at FROM brand_accounts WHERE slug = $1",
        )
        .bind(slug.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(brand)
    }

    async fn list_brands(&self) -> Result<Vec<BrandAccount>, ServiceError> {
        let brands = sqlx::query_as::<_, BrandAccount>(
            "SELECT id, email, slug, display_name, active, created_at FROM brand_accounts ORDER BY slug",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(brands)
    }

    async fn insert_brand(&self, brand: &BrandAccount) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO brand_accounts (id, email, slug, display_name, active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(brand.id)
        .bind(&brand.email)
        .bind(&brand.slug)
        .bind(&brand.display_name)
        .bind(brand.active)
        .bind(brand.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::BrandAlreadyExists
            } else {
                ServiceError::Database(e)
            }
        })?;
        Ok(())
    }

    async fn set_brand_active(
        &self,
        slug: &str,
        active: bool,
    ) -> Result<Option<BrandAccount>, ServiceError> {
        let brand = sqlx::query_as::<_, BrandAccount>(
            r#"
            UPDATE brand_accounts SET active = $2 WHERE slug = $1
            RETURNING id, email, slug, display_name, active, created_at
            "#,
        )
        .bind(slug.trim().to_lowercase())
        .bind(active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(brand)
    }
}
