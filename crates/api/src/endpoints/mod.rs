//! API endpoints.

mod auth;
mod favorites;
mod topics;
mod users;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .merge(topics::router())
        .merge(favorites::router())
}
