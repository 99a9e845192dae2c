use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::{services::Session, AppState};

/// Decode an `Authorization: Bearer` token, if any, into a [`Session`] request extension.
///
/// A missing or invalid token leaves the request anonymous; routes that need a session reject
/// it themselves.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    if let Some(token) = token {
        match state.sessions.decode(token) {
            Ok(session) => {
                req.extensions_mut().insert(session);
            }
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring invalid session token");
            }
        }
    }

    next.run(req).await
}

/// The caller's session, or 401.
pub struct AuthSession(pub Session);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .map(AuthSession)
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("missing or invalid session")))
    }
}
