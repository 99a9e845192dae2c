//! Login codes for brand accounts.
//!
//! Issuance purges expired records, checks the brand whitelist, stores only a digest of a fresh
//! six-digit code and emails the plaintext. Verification compares digests in constant time and
//! consumes the matched record with a single conditional delete.

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::Rng;
use service_core::utils::secure_eq;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::OtpConfig;
use crate::models::{BrandAccount, OtpRecord};
use crate::services::email::{login_code_html, EmailProvider, LOGIN_CODE_SUBJECT};
use crate::services::metrics::{self, VerificationOutcome};
use crate::services::{
    BrandDirectory, Clock, IssuedSession, OtpStore, ServiceError, SessionRole, SessionService,
};

pub const CODE_LENGTH: usize = 6;
const CODE_SPACE: u32 = 1_000_000;

/// Uniform code in `[0, 1_000_000)` from the OS CSPRNG, zero-padded to six digits.
pub fn generate_code() -> String {
    let n: u32 = OsRng.gen_range(0..CODE_SPACE);
    format!("{:0width$}", n, width = CODE_LENGTH)
}

/// Hex SHA-256 of `lower(email) ":" code`. Binding the email in keeps equal codes for different
/// recipients from sharing a digest.
pub fn hash_code(email: &str, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.trim().to_lowercase().as_bytes());
    hasher.update(b":");
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn is_well_formed_code(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}

/// A successful verification: the brand and its freshly minted session.
#[derive(Debug, Clone)]
pub struct VerifiedBrand {
    pub brand: BrandAccount,
    pub session: IssuedSession,
}

#[derive(Clone)]
pub struct OtpService {
    store: Arc<dyn OtpStore>,
    brands: Arc<dyn BrandDirectory>,
    email: Arc<dyn EmailProvider>,
    clock: Arc<dyn Clock>,
    sessions: SessionService,
    ttl_seconds: i64,
    timeout: Duration,
    min_response: Duration,
}

impl OtpService {
    pub fn new(
        store: Arc<dyn OtpStore>,
        brands: Arc<dyn BrandDirectory>,
        email: Arc<dyn EmailProvider>,
        clock: Arc<dyn Clock>,
        sessions: SessionService,
        config: &OtpConfig,
    ) -> Self {
        Self {
            store,
            brands,
            email,
            clock,
            sessions,
            ttl_seconds: config.ttl_seconds,
            timeout: config.dependency_timeout(),
            min_response: config.min_response(),
        }
    }

    async fn guarded<T, F>(&self, dependency: &'static str, fut: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| ServiceError::Timeout(dependency))?
    }

    /// Issue a code for `email` if it belongs to an active brand.
    ///
    /// Returns `Ok(())` for unknown and inactive brands too, so callers cannot tell the cases
    /// apart. Every call, whatever its outcome, lasts at least the configured minimum response
    /// time so the email dispatch does not show up in latency.
    #[tracing::instrument(skip(self, email, origin_ip))]
    pub async fn request_code(&self, email: &str, origin_ip: &str) -> Result<(), ServiceError> {
        let started = tokio::time::Instant::now();
        let result = self.issue(email, origin_ip).await;
        tokio::time::sleep_until(started + self.min_response).await;
        result
    }

    async fn issue(&self, email: &str, origin_ip: &str) -> Result<(), ServiceError> {
        let email = email.trim().to_lowercase();
        let now = self.clock.now();

        if let Err(e) = self.purge_expired_at(now).await {
            tracing::warn!(error = %e, "Purging expired login codes failed; continuing");
        }

        let brand = self
            .guarded("brand directory", self.brands.find_brand_by_email(&email))
            .await?;
        match brand {
            Some(brand) if brand.active => {}
            _ => {
                // Same hashing and store round trip as a real issuance.
                let _ = hash_code(&email, &generate_code());
                self.guarded("otp store", self.store.delete_by_email(&email))
                    .await?;
                tracing::debug!(email = %email, "No active brand for login code request");
                return Ok(());
            }
        }

        let code = generate_code();
        let record = OtpRecord::new(
            &email,
            hash_code(&email, &code),
            origin_ip.to_string(),
            now,
            self.ttl_seconds,
        );

        let replaced = self
            .guarded("otp store", self.store.delete_by_email(&email))
            .await?;
        self.guarded("otp store", self.store.insert_otp(&record))
            .await?;

        let body = login_code_html(&code, self.ttl_seconds / 60);
        tokio::time::timeout(
            self.timeout,
            self.email.send(&email, LOGIN_CODE_SUBJECT, &body),
        )
        .await
        .map_err(|_| ServiceError::Timeout("email provider"))?
        .map_err(|e| ServiceError::EmailError(e.to_string()))?;

        metrics::record_code_issued();
        tracing::info!(
            otp_id = %record.id,
            replaced,
            expires_at = %record.expires_at,
            "Login code issued"
        );
        Ok(())
    }

    /// Check `code` for `email` and, on a match, consume it and mint a brand session.
    #[tracing::instrument(skip(self, email, code))]
    pub async fn verify_code(&self, email: &str, code: &str) -> Result<VerifiedBrand, ServiceError> {
        let result = self.verify(email, code).await;
        let outcome = match &result {
            Ok(_) => VerificationOutcome::Success,
            Err(ServiceError::InvalidOrExpiredCode) => VerificationOutcome::Rejected,
            Err(_) => VerificationOutcome::Error,
        };
        metrics::record_verification(outcome);
        result
    }

    async fn verify(&self, email: &str, code: &str) -> Result<VerifiedBrand, ServiceError> {
        if !is_well_formed_code(code) {
            return Err(ServiceError::ValidationError(
                "code must be exactly six digits".to_string(),
            ));
        }

        let email = email.trim().to_lowercase();
        let now = self.clock.now();

        let candidates = self
            .guarded("otp store", self.store.find_active_by_email(&email, now))
            .await?;

        let matched = match_digest(&candidates, &hash_code(&email, code), now);
        let Some(otp_id) = matched else {
            tracing::debug!(candidates = candidates.len(), "Login code rejected");
            return Err(ServiceError::InvalidOrExpiredCode);
        };

        // Consumed before the brand re-check, so a matched code is spent even if login fails.
        let consumed = self
            .guarded("otp store", self.store.consume(otp_id, now))
            .await?;
        if !consumed {
            tracing::debug!(otp_id = %otp_id, "Login code already consumed or expired");
            return Err(ServiceError::InvalidOrExpiredCode);
        }

        if let Err(e) = self
            .guarded("otp store", self.store.delete_by_email(&email))
            .await
        {
            tracing::warn!(error = %e, "Failed to clear remaining login codes");
        }

        let brand = self
            .guarded("brand directory", self.brands.find_brand_by_email(&email))
            .await?
            .filter(|b| b.active)
            .ok_or(ServiceError::InvalidOrExpiredCode)?;

        let session = self
            .sessions
            .issue(&email, SessionRole::Brand, Some(&brand.slug))?;

        tracing::info!(otp_id = %otp_id, brand_slug = %brand.slug, "Login code verified");
        Ok(VerifiedBrand { brand, session })
    }

    /// Delete every record expired at the current clock time.
    pub async fn purge_expired(&self) -> Result<u64, ServiceError> {
        self.purge_expired_at(self.clock.now()).await
    }

    async fn purge_expired_at(&self, now: DateTime<Utc>) -> Result<u64, ServiceError> {
        let purged = self
            .guarded("otp store", self.store.purge_expired(now))
            .await?;
        if purged > 0 {
            metrics::record_purged(purged);
            tracing::debug!(purged, "Purged expired login codes");
        }
        Ok(purged)
    }

    pub async fn health_check(&self) -> Result<(), ServiceError> {
        self.guarded("otp store", self.store.health_check()).await
    }

    /// Purge expired records every `every` on a background task. Failures are logged and the
    /// loop carries on.
    pub fn spawn_sweeper(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if let Err(e) = service.purge_expired().await {
                    tracing::warn!(error = %e, "Background purge of login codes failed");
                }
            }
        })
    }
}

/// Compare `submitted` against every live candidate without stopping at the first hit.
/// With no candidates a throwaway digest is compared instead.
fn match_digest(candidates: &[OtpRecord], submitted: &str, now: DateTime<Utc>) -> Option<Uuid> {
    if candidates.is_empty() {
        let dummy = hash_code("", "");
        let _ = secure_eq(&dummy, submitted);
        return None;
    }

    let mut matched = None;
    for record in candidates {
        let equal = secure_eq(&record.code_hash, submitted);
        if equal && record.is_valid_at(now) && matched.is_none() {
            matched = Some(record.id);
        }
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::services::{InMemoryStore, ManualClock, MockEmailService};
    use chrono::Duration as ChronoDuration;
    use secrecy::Secret;
    use service_core::error::AppError;

    const BRAND_EMAIL: &str = "brand@acme.test";

    struct Fixture {
        service: OtpService,
        store: Arc<InMemoryStore>,
        email: Arc<MockEmailService>,
        clock: Arc<ManualClock>,
    }

    async fn fixture() -> Fixture {
        fixture_with(OtpConfig {
            dependency_timeout_ms: 200,
            min_response_ms: 0,
            ..OtpConfig::default()
        })
        .await
    }

    async fn fixture_with(config: OtpConfig) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_brand(&BrandAccount::new(BRAND_EMAIL, "acme", "Acme"))
            .await
            .unwrap();

        let mut inactive = BrandAccount::new("gone@acme.test", "gone", "Gone");
        inactive.active = false;
        store.insert_brand(&inactive).await.unwrap();

        let email = Arc::new(MockEmailService::new());
        let clock = Arc::new(ManualClock::default());
        let sessions = SessionService::new(&SessionConfig {
            secret: Secret::new("otp-test-secret".to_string()),
            ttl_minutes: 60,
        });

        let service = OtpService::new(
            store.clone(),
            store.clone(),
            email.clone(),
            clock.clone(),
            sessions,
            &config,
        );

        Fixture {
            service,
            store,
            email,
            clock,
        }
    }

    fn emailed_code(f: &Fixture) -> String {
        f.email
            .last_sent_to(BRAND_EMAIL)
            .and_then(|m| m.code())
            .expect("a code was emailed")
    }

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..500 {
            let code = generate_code();
            assert!(is_well_formed_code(&code), "bad code {code}");
        }
    }

    #[test]
    fn digest_is_deterministic_and_bound_to_email() {
        assert_eq!(hash_code("A@x.com", "123456"), hash_code("a@x.com", "123456"));
        assert_ne!(hash_code("a@x.com", "123456"), hash_code("a@x.com", "123457"));
        assert_ne!(hash_code("a@x.com", "123456"), hash_code("b@x.com", "123456"));
        assert_eq!(hash_code("a@x.com", "123456").len(), 64);
    }

    #[test]
    fn code_shape_is_checked() {
        assert!(is_well_formed_code("000000"));
        assert!(!is_well_formed_code("12345"));
        assert!(!is_well_formed_code("1234567"));
        assert!(!is_well_formed_code("12a456"));
        assert!(!is_well_formed_code("١٢٣٤٥٦"));
    }

    #[tokio::test]
    async fn issued_code_verifies_once() {
        let f = fixture().await;
        f.service
            .request_code("Brand@Acme.test", "203.0.113.9")
            .await
            .unwrap();

        let records = f.store.otp_records();
        assert_eq!(records.len(), 1);
        let code = emailed_code(&f);
        assert_eq!(records[0].email, BRAND_EMAIL);
        assert_eq!(records[0].code_hash, hash_code(BRAND_EMAIL, &code));
        assert_eq!(records[0].issued_from_ip, "203.0.113.9");
        assert_eq!(records[0].expires_at, f.clock.now() + ChronoDuration::minutes(10));

        let verified = f.service.verify_code(BRAND_EMAIL, &code).await.unwrap();
        assert_eq!(verified.brand.slug, "acme");
        assert!(!verified.session.token.is_empty());
        assert!(f.store.otp_records().is_empty());

        let again = f.service.verify_code(BRAND_EMAIL, &code).await;
        assert!(matches!(again, Err(ServiceError::InvalidOrExpiredCode)));
    }

    #[tokio::test]
    async fn plaintext_code_is_never_stored() {
        let f = fixture().await;
        f.service.request_code(BRAND_EMAIL, "unknown").await.unwrap();
        let code = emailed_code(&f);
        assert!(f.store.otp_records().iter().all(|r| !r.code_hash.contains(&code)));
    }

    #[tokio::test]
    async fn wrong_code_is_rejected_and_record_survives() {
        let f = fixture().await;
        f.service.request_code(BRAND_EMAIL, "unknown").await.unwrap();
        let code = emailed_code(&f);
        let wrong = if code == "000000" { "000001" } else { "000000" };

        let err = f.service.verify_code(BRAND_EMAIL, wrong).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidOrExpiredCode));
        assert_eq!(f.store.otp_records().len(), 1);

        assert!(f.service.verify_code(BRAND_EMAIL, &code).await.is_ok());
    }

    #[tokio::test]
    async fn code_expires_exactly_at_ttl() {
        let f = fixture().await;
        f.service.request_code(BRAND_EMAIL, "unknown").await.unwrap();
        let code = emailed_code(&f);

        f.clock.advance(ChronoDuration::seconds(600));
        let err = f.service.verify_code(BRAND_EMAIL, &code).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidOrExpiredCode));

        assert_eq!(f.service.purge_expired().await.unwrap(), 1);
        assert_eq!(f.service.purge_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn code_is_valid_just_before_expiry() {
        let f = fixture().await;
        f.service.request_code(BRAND_EMAIL, "unknown").await.unwrap();
        let code = emailed_code(&f);

        f.clock.advance(ChronoDuration::seconds(599));
        assert!(f.service.verify_code(BRAND_EMAIL, &code).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_and_inactive_emails_get_silent_success() {
        let f = fixture().await;
        f.service
            .request_code("nobody@else.test", "unknown")
            .await
            .unwrap();
        f.service
            .request_code("gone@acme.test", "unknown")
            .await
            .unwrap();

        assert!(f.store.otp_records().is_empty());
        assert!(f.email.sent().is_empty());
    }

    #[tokio::test]
    async fn new_code_invalidates_previous_one() {
        let f = fixture().await;
        f.service.request_code(BRAND_EMAIL, "unknown").await.unwrap();
        let first = emailed_code(&f);
        f.service.request_code(BRAND_EMAIL, "unknown").await.unwrap();
        let second = emailed_code(&f);

        assert_eq!(f.store.otp_records().len(), 1);
        if first != second {
            assert!(f.service.verify_code(BRAND_EMAIL, &first).await.is_err());
        }
        assert!(f.service.verify_code(BRAND_EMAIL, &second).await.is_ok());
    }

    #[tokio::test]
    async fn issuance_purges_expired_records() {
        let f = fixture().await;
        let stale = OtpRecord::new(
            "other@acme.test",
            "digest".into(),
            "unknown".into(),
            f.clock.now() - ChronoDuration::minutes(30),
            600,
        );
        f.store.insert_otp(&stale).await.unwrap();

        f.service.request_code(BRAND_EMAIL, "unknown").await.unwrap();
        let records = f.store.otp_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].email, BRAND_EMAIL);
    }

    #[tokio::test]
    async fn purge_failure_does_not_block_issuance() {
        let f = fixture().await;
        f.store.set_fail_purges(true);

        f.service.request_code(BRAND_EMAIL, "unknown").await.unwrap();
        assert_eq!(f.email.sent().len(), 1);
        assert!(f.service.purge_expired().await.is_err());
    }

    #[tokio::test]
    async fn email_failure_surfaces_as_transient_error() {
        let f = fixture().await;
        f.email.set_fail(true);

        let err = f
            .service
            .request_code(BRAND_EMAIL, "unknown")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::EmailError(_)));
        let app: AppError = err.into();
        assert_eq!(app.status_and_code().1, "transient_dependency_failure");
    }

    #[tokio::test]
    async fn slow_email_provider_times_out() {
        let f = fixture_with(OtpConfig {
            dependency_timeout_ms: 20,
            min_response_ms: 0,
            ..OtpConfig::default()
        })
        .await;
        f.email.set_delay(Some(Duration::from_millis(500)));

        let err = f
            .service
            .request_code(BRAND_EMAIL, "unknown")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Timeout("email provider")));
    }

    #[tokio::test]
    async fn unreachable_store_fails_verification() {
        let f = fixture().await;
        f.store.set_unavailable(true);

        let err = f
            .service
            .verify_code(BRAND_EMAIL, "123456")
            .await
            .unwrap_err();
        let app: AppError = err.into();
        assert_eq!(app.status_and_code().1, "transient_dependency_failure");
    }

    #[tokio::test]
    async fn malformed_code_is_a_validation_error() {
        let f = fixture().await;
        let err = f.service.verify_code(BRAND_EMAIL, "12ab56").await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn deactivated_brand_cannot_finish_login() {
        let f = fixture().await;
        f.service.request_code(BRAND_EMAIL, "unknown").await.unwrap();
        let code = emailed_code(&f);

        f.store.set_brand_active("acme", false).await.unwrap();
        let err = f.service.verify_code(BRAND_EMAIL, &code).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidOrExpiredCode));

        f.store.set_brand_active("acme", true).await.unwrap();
        let err = f.service.verify_code(BRAND_EMAIL, &code).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidOrExpiredCode));
    }

    #[tokio::test]
    async fn sweeper_purges_in_background() {
        let f = fixture().await;
        let stale = OtpRecord::new(
            BRAND_EMAIL,
            "digest".into(),
            "unknown".into(),
            f.clock.now() - ChronoDuration::hours(1),
            600,
        );
        f.store.insert_otp(&stale).await.unwrap();

        let handle = f.service.spawn_sweeper(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert!(f.store.otp_records().is_empty());
    }

    async fn timed_request(f: &Fixture, email: &str) -> Duration {
        let started = std::time::Instant::now();
        f.service.request_code(email, "unknown").await.unwrap();
        started.elapsed()
    }

    #[tokio::test]
    async fn unknown_and_registered_emails_take_the_same_time() {
        let f = fixture_with(OtpConfig {
            dependency_timeout_ms: 200,
            min_response_ms: 300,
            ..OtpConfig::default()
        })
        .await;
        f.email.set_delay(Some(Duration::from_millis(150)));

        let unknown = timed_request(&f, "stranger@nowhere.test").await;
        let inactive = timed_request(&f, "gone@acme.test").await;
        let registered = timed_request(&f, BRAND_EMAIL).await;
        assert_eq!(f.email.sent().len(), 1);

        for elapsed in [unknown, inactive, registered] {
            assert!(elapsed >= Duration::from_millis(300), "{:?}", elapsed);
        }
        let slowest = unknown.max(inactive).max(registered);
        let fastest = unknown.min(inactive).min(registered);
        assert!(
            slowest - fastest < Duration::from_millis(100),
            "spread {:?}",
            slowest - fastest
        );
    }

    #[tokio::test]
    async fn failed_requests_are_padded_too() {
        let f = fixture_with(OtpConfig {
            dependency_timeout_ms: 200,
            min_response_ms: 150,
            ..OtpConfig::default()
        })
        .await;
        f.email.set_fail(true);

        let started = std::time::Instant::now();
        assert!(f.service.request_code(BRAND_EMAIL, "unknown").await.is_err());
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[test]
    fn no_candidates_means_no_match() {
        assert!(match_digest(&[], &hash_code("a@x.com", "123456"), Utc::now()).is_none());
    }
}
