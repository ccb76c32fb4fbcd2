use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use super::jwt::JwtKeys;
use crate::{error::AppError, state::AppState, users::repo_types::Role};

/// Caller identity, resolved against the store once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
    pub name: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn is_moderator(&self) -> bool {
        self.role.is_moderator()
    }
}

/// Any authenticated caller.
pub struct AuthUser(pub CurrentUser);

/// Authenticated caller with an elevated role.
pub struct Moderator(pub CurrentUser);

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?;

    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::unauthorized("Invalid Authorization header"))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = bearer_token(parts)?;
        let keys = JwtKeys::from_ref(state);

        let claims = keys.verify_access(token).map_err(|e| {
            warn!(error = %e, "rejected credential");
            AppError::unauthorized("Invalid or expired token")
        })?;

        // Tokens outlive deleted accounts and role changes, so the row is the source of truth.
        let user = state
            .store
            .find_user(claims.sub)
            .await?
            .ok_or_else(|| {
                warn!(user_id = claims.sub, "token for unknown user");
                AppError::unauthorized("User not found")
            })?;

        Ok(AuthUser(CurrentUser {
            id: user.id,
            name: user.name,
            role: user.role,
        }))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Moderator {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_moderator() {
            warn!(user_id = user.id, "moderator route denied");
            return Err(AppError::forbidden("No permissions!"));
        }
        Ok(Moderator(user))
    }
}
