use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use super::jwt::{JwtKeys, TokenKind};
use crate::{error::AppError, state::AppState};

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header".into()))
}

/// Session gate: the caller holds an access token whose session has not been revoked.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub email: String,
}

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = JwtKeys::from_ref(state).verify_kind(token, TokenKind::Access)?;
        let id = claims
            .sid
            .ok_or_else(|| AppError::Unauthorized("Token carries no session".into()))?;

        match state.sessions.find(id).await? {
            Some(owner) if owner == claims.sub => Ok(Session { id, email: owner }),
            _ => {
                warn!(session_id = %id, "session revoked or unknown");
                Err(AppError::Unauthorized("Session has ended, please log in".into()))
            }
        }
    }
}

/// A session whose owner is listed in `ADMIN_EMAILS`.
#[derive(Debug, Clone)]
pub struct AdminSession(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        if !state.config.is_admin(&session.email) {
            warn!(email = %session.email, "admin route refused");
            return Err(AppError::Forbidden("Administrator access required".into()));
        }
        Ok(AdminSession(session))
    }
}

/// Holder of a password-reset link token.
#[derive(Debug, Clone)]
pub struct ResetGrant {
    pub email: String,
}

#[async_trait]
impl FromRequestParts<AppState> for ResetGrant {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = JwtKeys::from_ref(state).verify_kind(token, TokenKind::Reset)?;
        Ok(ResetGrant { email: claims.sub })
    }
}
