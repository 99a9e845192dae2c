//! Brand account management and OTP maintenance. Mounted behind the admin guard.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use crate::dtos::admin::{
    BrandListResponse, CreateBrandRequest, PurgeResponse, UpdateBrandStatusRequest,
};
use crate::models::BrandAccount;
use crate::services::ServiceError;
use crate::utils::ValidatedJson;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/admin/brands",
    responses(
        (status = 200, description = "All brand accounts", body = BrandListResponse),
        (status = 401, description = "Unauthorized", body = crate::dtos::ErrorResponse)
    ),
    tag = "Admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_brands(
    State(state): State<AppState>,
) -> Result<Json<BrandListResponse>, AppError> {
    let brands = state.brands.list_brands().await?;
    Ok(Json(BrandListResponse { brands }))
}

#[utoipa::path(
    post,
    path = "/admin/brands",
    request_body = CreateBrandRequest,
    responses(
        (status = 201, description = "Brand account created", body = BrandAccount),
        (status = 400, description = "Validation error", body = crate::dtos::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::dtos::ErrorResponse),
        (status = 409, description = "Email or slug already registered", body = crate::dtos::ErrorResponse)
    ),
    tag = "Admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_brand(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateBrandRequest>,
) -> Result<(StatusCode, Json<BrandAccount>), AppError> {
    let brand = BrandAccount::new(&req.email, &req.slug, &req.display_name);
    state.brands.insert_brand(&brand).await?;

    tracing::info!(brand_id = %brand.id, slug = %brand.slug, "Brand account created");
    Ok((StatusCode::CREATED, Json(brand)))
}

/// Suspend or reactivate a brand. Suspended brands receive no login codes.
#[utoipa::path(
    patch,
    path = "/admin/brands/{slug}",
    params(
        ("slug" = String, Path, description = "Brand slug")
    ),
    request_body = UpdateBrandStatusRequest,
    responses(
        (status = 200, description = "Brand account updated", body = BrandAccount),
        (status = 401, description = "Unauthorized", body = crate::dtos::ErrorResponse),
        (status = 404, description = "Brand not found", body = crate::dtos::ErrorResponse)
    ),
    tag = "Admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_brand_status(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateBrandStatusRequest>,
) -> Result<Json<BrandAccount>, AppError> {
    let brand = state
        .brands
        .set_brand_active(&slug, req.active)
        .await?
        .ok_or(ServiceError::BrandNotFound)?;

    tracing::info!(slug = %brand.slug, active = brand.active, "Brand account status changed");
    Ok(Json(brand))
}

#[utoipa::path(
    post,
    path = "/admin/otp/purge",
    responses(
        (status = 200, description = "Expired codes deleted", body = PurgeResponse),
        (status = 401, description = "Unauthorized", body = crate::dtos::ErrorResponse),
        (status = 500, description = "Store unavailable", body = crate::dtos::ErrorResponse)
    ),
    tag = "Admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn purge_codes(State(state): State<AppState>) -> Result<Json<PurgeResponse>, AppError> {
    let purged = state.otp.purge_expired().await?;
    Ok(Json(PurgeResponse { purged }))
}
