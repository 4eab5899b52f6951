//! Request extractors.

use axum::{extract::FromRequestParts, http::request::Parts};
use democrasite_common::AppError;
use democrasite_db::entities::user;

/// Authenticated user extractor.
///
/// Rejects with `401` unless [`crate::auth_middleware`] resolved a user.
#[derive(Debug, Clone)]
pub struct AuthUser(pub user::Model);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<user::Model>()
            .cloned()
            .map(AuthUser)
            .ok_or(AppError::Unauthorized)
    }
}
