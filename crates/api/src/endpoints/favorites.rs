//! Topic favorites endpoints.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use democrasite_common::AppResult;
use democrasite_core::TopicSummary;

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// List the caller's favorites, most recent first.
async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<TopicSummary>>> {
    let topics = state.favorite_service.list(&user.id).await?;
    Ok(ApiResponse::ok(topics))
}

async fn add(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(share_code): Path<String>,
) -> AppResult<StatusCode> {
    state.favorite_service.add(&share_code, &user.id).await?;
    Ok(StatusCode::CREATED)
}

async fn remove(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(share_code): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.favorite_service.remove(&share_code, &user.id).await?;
    Ok(no_content())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/favorites", get(list))
        .route("/favorites/{share_code}", post(add).delete(remove))
}
