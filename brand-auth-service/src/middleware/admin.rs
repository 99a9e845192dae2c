use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::{services::Session, AppState};

/// Reject with 401 unless the request's session belongs to an allow-listed administrator.
/// Runs after [`super::session_middleware`].
pub async fn admin_guard_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let admin = state
        .admin_guard
        .require_admin(req.extensions().get::<Session>())?
        .user
        .email
        .clone();

    tracing::debug!(admin = ?admin, path = %req.uri().path(), "Admin request admitted");
    Ok(next.run(req).await)
}
