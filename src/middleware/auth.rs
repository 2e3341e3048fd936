//! Session-backed authentication extractors.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tower_sessions::Session;

use crate::error::ApiError;
use crate::middleware::session::keys;
use crate::services::CurrentUser;

/// Any signed-in account. Rejects with 401 otherwise.
#[derive(Debug, Clone)]
pub struct RequireUser(pub CurrentUser);

/// A signed-in admin. Rejects with 401 when signed out and 403 for
/// customer accounts.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub CurrentUser);

async fn current_user(parts: &Parts) -> Result<CurrentUser, ApiError> {
    let session = parts
        .extensions
        .get::<Session>()
        .cloned()
        .ok_or_else(|| ApiError::Internal("session layer missing".to_string()))?;

    session
        .get::<CurrentUser>(keys::CURRENT_USER)
        .await?
        .ok_or(ApiError::Unauthorized)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_user(parts).await.map(Self)
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = current_user(parts).await?;
        if !user.is_admin() {
            tracing::warn!(user_id = %user.id, path = %parts.uri.path(), "Non-admin hit admin route");
            return Err(ApiError::Forbidden);
        }
        Ok(Self(user))
    }
}
