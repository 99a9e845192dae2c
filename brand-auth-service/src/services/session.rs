//! Bearer-token sessions shared with the rest of the platform.
//!
//! Tokens are HS256 JWTs signed with `SESSION_SECRET`. The platform's main login mints user and
//! administrator sessions with the same secret; this service mints brand sessions after a
//! successful code verification.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::services::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRole {
    User,
    Brand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub email: Option<String>,
}

/// The authenticated caller of the current request.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: SessionUser,
    pub role: SessionRole,
    pub brand_slug: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// JWT claims. `email` is optional so that malformed upstream sessions still decode and are
/// rejected by the guard rather than by the parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_role")]
    pub role: SessionRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_slug: Option<String>,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

fn default_role() -> SessionRole {
    SessionRole::User
}

/// A freshly minted token and its lifetime in seconds.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct SessionService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_minutes: i64,
}

impl SessionService {
    pub fn new(config: &SessionConfig) -> Self {
        let secret = config.secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl_minutes: config.ttl_minutes,
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_minutes * 60
    }

    /// Mint a token for `email` with the given role.
    pub fn issue(
        &self,
        email: &str,
        role: SessionRole,
        brand_slug: Option<&str>,
    ) -> Result<IssuedSession, ServiceError> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.ttl_minutes);

        let sub = match (role, brand_slug) {
            (SessionRole::Brand, Some(slug)) => format!("brand:{}", slug),
            _ => email.to_lowercase(),
        };

        let claims = SessionClaims {
            sub,
            email: Some(email.to_lowercase()),
            role,
            brand_slug: brand_slug.map(str::to_string),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode session token: {}", e))?;

        Ok(IssuedSession {
            token,
            expires_in: self.ttl_seconds(),
        })
    }

    /// Validate signature and expiry, then project the claims into a `Session`.
    pub fn decode(&self, token: &str) -> Result<Session, AppError> {
        let data = decode::<SessionClaims>(
            token,
            &self.decoding_key,
            &Validation::new(Algorithm::HS256),
        )?;
        let claims = data.claims;

        Ok(Session {
            user: SessionUser {
                email: claims.email.filter(|e| !e.trim().is_empty()),
            },
            role: claims.role,
            brand_slug: claims.brand_slug,
            expires_at: Utc
                .timestamp_opt(claims.exp, 0)
                .single()
                .unwrap_or_else(Utc::now),
        })
    }
}
