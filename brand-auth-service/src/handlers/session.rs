use axum::{extract::State, Json};

use crate::dtos::otp::SessionInfoResponse;
use crate::middleware::AuthSession;
use crate::services::SessionRole;
use crate::AppState;

/// Describe the caller's session.
#[utoipa::path(
    get,
    path = "/auth/session",
    responses(
        (status = 200, description = "Current session", body = SessionInfoResponse),
        (status = 401, description = "Missing or invalid session", body = crate::dtos::ErrorResponse)
    ),
    tag = "Brand Login",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn current_session(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> Json<SessionInfoResponse> {
    let is_admin = state.admin_guard.is_admin(Some(&session));
    let role = match session.role {
        SessionRole::User => "user",
        SessionRole::Brand => "brand",
    };

    Json(SessionInfoResponse {
        email: session.user.email,
        role: role.to_string(),
        brand_slug: session.brand_slug,
        is_admin,
    })
}
