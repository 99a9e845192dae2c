//! OTP record model - one outstanding one-time code.

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Only the digest of the code is ever stored; the plaintext lives in the email body.
#[derive(Debug, Clone, FromRow)]
pub struct OtpRecord {
    pub id: Uuid,
    pub email: String,
    pub code_hash: String,
    pub issued_from_ip: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl OtpRecord {
    /// Create a record that expires `ttl_seconds` after `now`.
    pub fn new(
        email: &str,
        code_hash: String,
        issued_from_ip: String,
        now: DateTime<Utc>,
        ttl_seconds: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_lowercase(),
            code_hash,
            issued_from_ip,
            expires_at: now + Duration::seconds(ttl_seconds),
            created_at: now,
        }
    }

    /// Valid strictly before `expires_at`; a record expiring exactly now is expired.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_valid_at(now)
    }
}
