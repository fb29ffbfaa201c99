//! Request authentication and role gating.
//!
//! `authenticate` resolves the bearer token to an [`Identity`] and stores it in
//! the request extensions; `require_admin` runs after it and lets only
//! admins through. Both short-circuit with an [`AppError`] response.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{error::AppError, state::AppState, users::repo_types::Role};

/// The authenticated caller, attached to the request by [`authenticate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub role: Role,
}

/// Token from `Authorization: Bearer <token>`, if one is present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Verifies the token and looks the user up.
///
/// A token for a user that no longer exists is reported as
/// [`AppError::InvalidToken`], same as a forged or expired one.
pub async fn resolve_identity(state: &AppState, headers: &HeaderMap) -> Result<Identity, AppError> {
    let token = bearer_token(headers).ok_or(AppError::Unauthenticated)?;

    let claims = state.keys.verify(token).map_err(|e| {
        warn!(error = %e, "invalid or expired token");
        AppError::InvalidToken
    })?;

    let user = state.users.find_by_id(claims.id).await?.ok_or_else(|| {
        warn!(user_id = %claims.id, "token refers to unknown user");
        AppError::InvalidToken
    })?;

    debug!(user_id = %user.id, role = %user.role, "request authenticated");
    Ok(Identity {
        id: user.id,
        role: user.role,
    })
}

pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = resolve_identity(&state, request.headers()).await?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Succeeds only if an identity is present and holds `required`.
pub fn authorize(identity: Option<&Identity>, required: Role) -> Result<(), AppError> {
    match identity {
        Some(identity) if identity.role == required => Ok(()),
        Some(identity) => {
            warn!(user_id = %identity.id, role = %identity.role, required = %required, "forbidden");
            Err(AppError::Forbidden)
        }
        None => {
            warn!(required = %required, "no identity on request");
            Err(AppError::Forbidden)
        }
    }
}

pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    authorize(request.extensions().get::<Identity>(), Role::Admin)?;
    Ok(next.run(request).await)
}
