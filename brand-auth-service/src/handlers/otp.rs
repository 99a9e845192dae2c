//! Passwordless login for brand accounts.

use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
    Json,
};
use service_core::{
    error::AppError, middleware::rate_limit::check_keyed_limit, utils::forwarded_ip,
};
use std::net::SocketAddr;

use crate::dtos::otp::{OkResponse, RequestCodeRequest, VerifyCodeRequest, VerifyCodeResponse};
use crate::utils::ValidatedJson;
use crate::AppState;

/// Best-effort origin of the request: first `X-Forwarded-For` hop, then the socket peer.
fn origin_ip(headers: &HeaderMap, peer: Option<ConnectInfo<SocketAddr>>) -> String {
    forwarded_ip(headers)
        .or_else(|| peer.map(|ConnectInfo(addr)| addr.ip()))
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Email a login code to a brand account.
///
/// Answers `{ "ok": true }` whether or not the email belongs to an active brand.
#[utoipa::path(
    post,
    path = "/auth/otp/request",
    request_body = RequestCodeRequest,
    responses(
        (status = 200, description = "Request accepted", body = OkResponse),
        (status = 400, description = "Invalid email", body = crate::dtos::ErrorResponse),
        (status = 429, description = "Too many requests", body = crate::dtos::ErrorResponse),
        (status = 500, description = "Dependency failure, retry later", body = crate::dtos::ErrorResponse)
    ),
    tag = "Brand Login"
)]
pub async fn request_code(
    State(state): State<AppState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    ValidatedJson(req): ValidatedJson<RequestCodeRequest>,
) -> Result<Json<OkResponse>, AppError> {
    let origin_ip = origin_ip(&headers, peer);
    state.otp.request_code(&req.email, &origin_ip).await?;
    Ok(Json(OkResponse::ok()))
}

/// Exchange a login code for a brand session token.
#[utoipa::path(
    post,
    path = "/auth/otp/verify",
    request_body = VerifyCodeRequest,
    responses(
        (status = 200, description = "Code accepted", body = VerifyCodeResponse),
        (status = 400, description = "Malformed email or code", body = crate::dtos::ErrorResponse),
        (status = 401, description = "Invalid or expired code", body = crate::dtos::ErrorResponse),
        (status = 429, description = "Too many requests", body = crate::dtos::ErrorResponse),
        (status = 500, description = "Dependency failure, retry later", body = crate::dtos::ErrorResponse)
    ),
    tag = "Brand Login"
)]
pub async fn verify_code(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<VerifyCodeRequest>,
) -> Result<Json<VerifyCodeResponse>, AppError> {
    let email = req.email.trim().to_lowercase();
    if let Err(e) = check_keyed_limit(
        &state.otp_verify_email_rate_limiter,
        &email,
        "Too many attempts for this email. Please try again later.",
    ) {
        tracing::warn!("Verification attempts exhausted for email");
        return Err(e);
    }

    let verified = state.otp.verify_code(&req.email, &req.code).await?;

    Ok(Json(VerifyCodeResponse {
        ok: true,
        token: verified.session.token,
        token_type: "Bearer".to_string(),
        expires_in: verified.session.expires_in,
        brand_slug: verified.brand.slug,
    }))
}
