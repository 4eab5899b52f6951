//! Sign-up, email verification and login endpoints.

use axum::{Json, Router, extract::State, routing::post};
use democrasite_common::AppResult;
use democrasite_core::{
    AccessToken, LoginInput, MessageResponse, RegisterInput, RegistrationOutcome, UserProfile,
};
use serde::Deserialize;

use crate::{middleware::AppState, response::ApiResponse};

/// Email verification request.
#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

/// Resend verification request.
#[derive(Debug, Deserialize)]
pub struct ResendVerificationRequest {
    pub email: String,
}

/// Create an account, or a pending registration when verification is on.
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterInput>,
) -> AppResult<ApiResponse<RegistrationOutcome>> {
    let outcome = state.registration_service.register(req).await?;
    Ok(ApiResponse::created(outcome))
}

/// Turn a pending registration into an account.
async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<VerifyEmailRequest>,
) -> AppResult<ApiResponse<UserProfile>> {
    let user = state.registration_service.verify_email(&req.token).await?;
    Ok(ApiResponse::ok(user.into()))
}

async fn resend_verification(
    State(state): State<AppState>,
    Json(req): Json<ResendVerificationRequest>,
) -> AppResult<ApiResponse<MessageResponse>> {
    let message = state
        .registration_service
        .resend_verification(&req.email)
        .await?;
    Ok(ApiResponse::ok(message))
}

/// Exchange credentials for a bearer token.
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginInput>,
) -> AppResult<ApiResponse<AccessToken>> {
    let token = state.user_service.login(&req).await?;
    Ok(ApiResponse::ok(token))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/verify-email", post(verify_email))
        .route("/resend-verification", post(resend_verification))
        .route("/login", post(login))
}
