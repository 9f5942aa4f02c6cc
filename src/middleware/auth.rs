use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{HeaderValue, header, request::Parts},
};
use sea_orm::{ConnectionTrait, EntityTrait};

use crate::{
    entity::{
        AuthTokens, Users,
        users::{Model as UserModel, Role},
    },
    error::{AppError, AppResult},
    state::AppState,
};

/// Identity resolved from an `Authorization: Token <key>` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i32,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub is_staff: bool,
}

impl From<&UserModel> for AuthUser {
    fn from(user: &UserModel) -> Self {
        AuthUser {
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name(),
            role: user.role,
            is_staff: user.is_staff,
        }
    }
}

/// Access gate for catalog mutation and order administration: the caller must
/// be authenticated and carry the elevated-access flag.
pub fn has_elevated_access(user: Option<&AuthUser>) -> bool {
    user.is_some_and(|u| u.is_staff)
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    if !has_elevated_access(Some(user)) {
        tracing::warn!(user_id = user.user_id, "admin capability denied");
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// Accepts both the `Token` and `Bearer` schemes.
pub fn token_from_header(value: &str) -> Option<&str> {
    let token = value
        .strip_prefix("Token ")
        .or_else(|| value.strip_prefix("Bearer "))?
        .trim();
    (!token.is_empty()).then_some(token)
}

pub async fn resolve_token<C: ConnectionTrait>(conn: &C, key: &str) -> AppResult<Option<AuthUser>> {
    let found = AuthTokens::find_by_id(key.to_string())
        .find_also_related(Users)
        .one(conn)
        .await?;
    Ok(found.and_then(|(_, user)| user).map(|user| AuthUser::from(&user)))
}

async fn authenticate(state: &AppState, value: &HeaderValue) -> AppResult<AuthUser> {
    let raw = value
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header".into()))?;
    let token = token_from_header(raw)
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization scheme".into()))?;

    resolve_token(&state.orm, token)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid token.".into()))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let value = parts.headers.get(header::AUTHORIZATION).ok_or_else(|| {
            AppError::Unauthorized("Authentication credentials were not provided.".into())
        })?;
        authenticate(state, value).await
    }
}

/// `Option<AuthUser>` is `None` for anonymous callers. A header that is present
/// but wrong is still rejected.
impl OptionalFromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        match parts.headers.get(header::AUTHORIZATION) {
            Some(value) => authenticate(state, value).await.map(Some),
            None => Ok(None),
        }
    }
}
