//! Shared setup for brand-auth-service integration tests.
//!
//! Builds the full router over the in-memory store, a recording email provider and a manual
//! clock, so the HTTP surface can be driven with `oneshot` and no external services.

#![allow(dead_code)]

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Method, Request, StatusCode},
    Router,
};
use brand_auth_service::{
    build_router,
    config::{
        DatabaseConfig, Environment, OtpConfig, RateLimitConfig, SecurityConfig, ServiceConfig,
        SessionConfig, SmtpConfig, SwaggerConfig, SwaggerMode,
    },
    models::BrandAccount,
    services::{
        AdminAllowList, AdminGuard, BrandDirectory, InMemoryStore, ManualClock, MockEmailService,
        OtpService, SessionClaims, SessionRole, SessionService,
    },
    AppState,
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use secrecy::Secret;
use serde_json::Value;
use service_core::middleware::rate_limit::{create_ip_rate_limiter, create_keyed_rate_limiter};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

pub const ADMIN_EMAIL: &str = "admin@platform.test";
pub const BRAND_EMAIL: &str = "owner@acme.test";
pub const BRAND_SLUG: &str = "acme";
pub const INACTIVE_BRAND_EMAIL: &str = "owner@dormant.test";
pub const SESSION_SECRET: &str = "integration-test-session-secret";

pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        common: Default::default(),
        environment: Environment::Dev,
        service_name: "brand-auth-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: "postgres://localhost/brand_auth_test".to_string(),
            max_connections: 1,
            min_connections: 1,
        },
        admin_emails: format!("{}, ops@platform.test", ADMIN_EMAIL.to_uppercase()),
        session: SessionConfig {
            secret: Secret::new(SESSION_SECRET.to_string()),
            ttl_minutes: 60,
        },
        otp: OtpConfig {
            ttl_seconds: 600,
            purge_interval_seconds: 0,
            dependency_timeout_ms: 500,
            min_response_ms: 0,
        },
        smtp: SmtpConfig {
            host: "localhost".to_string(),
            port: 2525,
            user: "test".to_string(),
            password: Secret::new("test".to_string()),
            from_email: "no-reply@platform.test".to_string(),
            from_name: "Brand Login".to_string(),
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        swagger: SwaggerConfig {
            enabled: SwaggerMode::Disabled,
        },
        rate_limit: RateLimitConfig {
            otp_request_attempts: 100,
            otp_request_window_seconds: 60,
            otp_verify_attempts: 100,
            otp_verify_window_seconds: 60,
            otp_verify_email_attempts: 100,
            otp_verify_email_window_seconds: 60,
            global_ip_limit: 1000,
            global_ip_window_seconds: 60,
        },
    }
}

/// A parsed response.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub email: Arc<MockEmailService>,
    pub clock: Arc<ManualClock>,
    pub peer: SocketAddr,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: ServiceConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_brand(&BrandAccount::new(BRAND_EMAIL, BRAND_SLUG, "Acme"))
            .await
            .unwrap();
        let mut dormant = BrandAccount::new(INACTIVE_BRAND_EMAIL, "dormant", "Dormant");
        dormant.active = false;
        store.insert_brand(&dormant).await.unwrap();

        let email = Arc::new(MockEmailService::new());
        let clock = Arc::new(ManualClock::default());
        let sessions = SessionService::new(&config.session);

        let otp = OtpService::new(
            store.clone(),
            store.clone(),
            email.clone(),
            clock.clone(),
            sessions.clone(),
            &config.otp,
        );

        let state = AppState {
            admin_guard: AdminGuard::new(AdminAllowList::from_csv(&config.admin_emails)),
            sessions,
            otp,
            brands: store.clone(),
            otp_request_rate_limiter: create_ip_rate_limiter(
                config.rate_limit.otp_request_attempts,
                config.rate_limit.otp_request_window_seconds,
            ),
            otp_verify_rate_limiter: create_ip_rate_limiter(
                config.rate_limit.otp_verify_attempts,
                config.rate_limit.otp_verify_window_seconds,
            ),
            otp_verify_email_rate_limiter: create_keyed_rate_limiter(
                config.rate_limit.otp_verify_email_attempts,
                config.rate_limit.otp_verify_email_window_seconds,
            ),
            ip_rate_limiter: create_ip_rate_limiter(
                config.rate_limit.global_ip_limit,
                config.rate_limit.global_ip_window_seconds,
            ),
            config,
        };

        let router = build_router(state.clone())
            .await
            .expect("Failed to build router");

        Self {
            router,
            state,
            store,
            email,
            clock,
            peer: "192.0.2.10:40000".parse().unwrap(),
        }
    }

    /// Bearer token signed with the shared session secret.
    pub fn token(&self, email: Option<&str>, role: SessionRole) -> String {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: email.unwrap_or("anonymous").to_string(),
            email: email.map(str::to_string),
            role,
            brand_slug: None,
            exp: (now + Duration::minutes(30)).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SESSION_SECRET.as_bytes()),
        )
        .unwrap()
    }

    pub fn admin_token(&self) -> String {
        self.token(Some(ADMIN_EMAIL), SessionRole::User)
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let mut request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        request.extensions_mut().insert(ConnectInfo(self.peer));

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn post(&self, uri: &str, body: Value, token: Option<&str>) -> TestResponse {
        self.send(Method::POST, uri, Some(body), token, &[]).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::GET, uri, None, token, &[]).await
    }

    pub async fn request_code(&self, email: &str) -> TestResponse {
        self.post("/auth/otp/request", serde_json::json!({ "email": email }), None)
            .await
    }

    pub async fn verify_code(&self, email: &str, code: &str) -> TestResponse {
        self.post(
            "/auth/otp/verify",
            serde_json::json!({ "email": email, "code": code }),
            None,
        )
        .await
    }

    /// The code in the most recent email to `to`.
    pub fn last_code_for(&self, to: &str) -> String {
        self.email
            .last_sent_to(to)
            .and_then(|m| m.code())
            .expect("no login code was emailed")
    }
}
