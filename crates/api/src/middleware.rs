//! API middleware.

#![allow(missing_docs)]

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use democrasite_core::{
    FavoriteService, RegistrationService, SearchService, TopicAccessService, TopicService,
    UserService, VoteService,
};
use tracing::debug;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub registration_service: RegistrationService,
    pub topic_service: TopicService,
    pub vote_service: VoteService,
    pub topic_access_service: TopicAccessService,
    pub favorite_service: FavoriteService,
    pub search_service: SearchService,
}

/// Authentication middleware.
///
/// A valid `Authorization: Bearer <token>` header places the user in the
/// request extensions. Anything else passes through anonymously and is
/// rejected later by [`crate::extractors::AuthUser`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get(header::AUTHORIZATION)
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        match state.user_service.resolve_token(token.trim()).await {
            Ok(user) => {
                req.extensions_mut().insert(user);
            }
            Err(e) => debug!(error = %e, "Rejected bearer token"),
        }
    }

    next.run(req).await
}
