//! Current-user endpoints.

use axum::{Router, extract::State, routing::get};
use democrasite_common::AppResult;
use democrasite_core::{AccountDeletionResult, UserProfile, UserStats};

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

async fn me(AuthUser(user): AuthUser) -> ApiResponse<UserProfile> {
    ApiResponse::ok(user.into())
}

async fn stats(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<UserStats>> {
    let stats = state.user_service.stats(&user).await?;
    Ok(ApiResponse::ok(stats))
}

/// Delete the caller's account with its topics, votes and favorites.
async fn delete_account(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<AccountDeletionResult>> {
    let result = state.user_service.delete_account(&user.id).await?;
    Ok(ApiResponse::ok(result))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me).delete(delete_account))
        .route("/me/stats", get(stats))
}
