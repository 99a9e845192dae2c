pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Json, Router,
};
use service_core::middleware::{
    rate_limit::{ip_rate_limit_middleware, IpRateLimiter, KeyedRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{Environment, ServiceConfig, SwaggerMode};
use crate::services::{AdminGuard, BrandDirectory, OtpService, SessionService};
use service_core::error::AppError;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::otp::request_code,
        handlers::otp::verify_code,
        handlers::session::current_session,
        handlers::admin::list_brands,
        handlers::admin::create_brand,
        handlers::admin::update_brand_status,
        handlers::admin::purge_codes,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::otp::RequestCodeRequest,
            dtos::otp::VerifyCodeRequest,
            dtos::otp::OkResponse,
            dtos::otp::VerifyCodeResponse,
            dtos::otp::SessionInfoResponse,
            dtos::admin::CreateBrandRequest,
            dtos::admin::UpdateBrandStatusRequest,
            dtos::admin::BrandListResponse,
            dtos::admin::PurgeResponse,
            models::BrandAccount,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Brand Login", description = "Emailed one-time codes for brand accounts"),
        (name = "Admin", description = "Administrator-only brand management"),
        (name = "Observability", description = "Health and metrics")
    ),
    info(
        title = "Brand Auth Service API",
        version = "1.0.0",
        description = "Admin allow-list guard and passwordless login for brand accounts"
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: ServiceConfig,
    pub admin_guard: AdminGuard,
    pub sessions: SessionService,
    pub otp: OtpService,
    pub brands: Arc<dyn BrandDirectory>,
    pub otp_request_rate_limiter: IpRateLimiter,
    pub otp_verify_rate_limiter: IpRateLimiter,
    /// Keyed on the lower-cased email, so rotating source addresses does not reset it.
    pub otp_verify_email_rate_limiter: KeyedRateLimiter<String>,
    pub ip_rate_limiter: IpRateLimiter,
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    let admin_routes = Router::new()
        .route(
            "/admin/brands",
            get(handlers::admin::list_brands).post(handlers::admin::create_brand),
        )
        .route(
            "/admin/brands/:slug",
            patch(handlers::admin::update_brand_status),
        )
        .route("/admin/otp/purge", post(handlers::admin::purge_codes))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::admin_guard_middleware,
        ));

    let request_code_route = Router::new()
        .route("/auth/otp/request", post(handlers::otp::request_code))
        .layer(from_fn_with_state(
            state.otp_request_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let verify_code_route = Router::new()
        .route("/auth/otp/verify", post(handlers::otp::verify_code))
        .layer(from_fn_with_state(
            state.otp_verify_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics));

    let swagger_enabled = match state.config.environment {
        Environment::Dev => true,
        Environment::Prod => state.config.swagger.enabled == SwaggerMode::Public,
    };

    if swagger_enabled {
        app = app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        );
    }

    let allowed_origins: Vec<HeaderValue> = state
        .config
        .security
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::error!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let app = app
        .route("/auth/session", get(handlers::session::current_session))
        .merge(request_code_route)
        .merge(verify_code_route)
        .merge(admin_routes)
        .with_state(state.clone())
        .layer(from_fn_with_state(
            state.clone(),
            middleware::session_middleware,
        ))
        .layer(from_fn_with_state(
            state.ip_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ))
        .layer(from_fn(middleware::metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        );

    Ok(app)
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 500, description = "OTP store unavailable", body = dtos::ErrorResponse)
    ),
    tag = "Observability"
)]
pub async fn health_check(
    service_core::axum::extract::State(state): service_core::axum::extract::State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.otp.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "OTP store health check failed");
        AppError::from(e)
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "otp_store": "up"
        }
    })))
}
