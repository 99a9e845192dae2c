use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::models::{BrandAccount, OtpRecord};
use crate::services::{BrandDirectory, OtpStore, ServiceError};

/// Process-local store for tests and local development without PostgreSQL.
#[derive(Default)]
pub struct InMemoryStore {
    otps: Mutex<HashMap<Uuid, OtpRecord>>,
    brands: Mutex<Vec<BrandAccount>>,
    fail_purges: AtomicBool,
    fail_all: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `purge_expired` fail, to exercise the non-fatal purge path.
    pub fn set_fail_purges(&self, fail: bool) {
        self.fail_purges.store(fail, Ordering::SeqCst);
    }

    /// Make every OTP operation fail as if the store were unreachable.
    pub fn set_unavailable(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// All OTP records, including expired ones not yet purged.
    pub fn otp_records(&self) -> Vec<OtpRecord> {
        self.otps
            .lock()
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    fn otps(&self) -> Result<MutexGuard<'_, HashMap<Uuid, OtpRecord>>, ServiceError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(ServiceError::Database(sqlx::Error::PoolTimedOut));
        }
        self.otps
            .lock()
            .map_err(|_| ServiceError::Internal(anyhow::anyhow!("otp store lock poisoned")))
    }

    fn brands(&self) -> Result<MutexGuard<'_, Vec<BrandAccount>>, ServiceError> {
        self.brands
            .lock()
            .map_err(|_| ServiceError::Internal(anyhow::anyhow!("brand store lock poisoned")))
    }
}

#[async_trait]
impl OtpStore for InMemoryStore {
    async fn insert_otp(&self, record: &OtpRecord) -> Result<(), ServiceError> {
        self.otps()?.insert(record.id, record.clone());
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, ServiceError> {
        if self.fail_purges.load(Ordering::SeqCst) {
            return Err(ServiceError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut otps = self.otps()?;
        let before = otps.len();
        otps.retain(|_, r| r.is_valid_at(now));
        Ok((before - otps.len()) as u64)
    }

    async fn find_active_by_email(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<OtpRecord>, ServiceError> {
        let email = email.to_lowercase();
        let mut found: Vec<OtpRecord> = self
            .otps()?
            .values()
            .filter(|r| r.email == email && r.is_valid_at(now))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn consume(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, ServiceError> {
        let mut otps = self.otps()?;
        match otps.get(&id) {
            Some(r) if r.is_valid_at(now) => {
                otps.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_by_email(&self, email: &str) -> Result<u64, ServiceError> {
        let email = email.to_lowercase();
        let mut otps = self.otps()?;
        let before = otps.len();
        otps.retain(|_, r| r.email != email);
        Ok((before - otps.len()) as u64)
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        self.otps().map(|_| ())
    }
}

#[async_trait]
impl BrandDirectory for InMemoryStore {
    async fn find_brand_by_email(&self, email: &str) -> Result<Option<BrandAccount>, ServiceError> {
        let email = email.trim().to_lowercase();
        Ok(self.brands()?.iter().find(|b| b.email == email).cloned())
    }

    async fn find_brand_by_slug(&self, slug: &str) -> Result<Option<BrandAccount>, ServiceError> {
        let slug = slug.trim().to_lowercase();
        Ok(self.brands()?.iter().find(|b| b.slug == slug).cloned())
    }

    async fn list_brands(&self) -> Result<Vec<BrandAccount>, ServiceError> {
        let mut brands = self.brands()?.clone();
        brands.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(brands)
    }

    async fn insert_brand(&self, brand: &BrandAccount) -> Result<(), ServiceError> {
        let mut brands = self.brands()?;
        if brands
            .iter()
            .any(|b| b.email == brand.email || b.slug == brand.slug)
        {
            return Err(ServiceError::BrandAlreadyExists);
        }
        brands.push(brand.clone());
        Ok(())
    }

    async fn set_brand_active(
        &self,
        slug: &str,
        active: bool,
    ) -> Result<Option<BrandAccount>, ServiceError> {
        let slug = slug.trim().to_lowercase();
        let mut brands = self.brands()?;
        Ok(brands.iter_mut().find(|b| b.slug == slug).map(|b| {
            b.active = active;
            b.clone()
        }))
    }
}
