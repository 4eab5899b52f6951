//! Topic endpoints: creation, discovery, voting and access lists.

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch, post},
};
use chrono::{DateTime, FixedOffset};
use democrasite_common::AppResult;
use democrasite_core::{
    AccessList, AddOptionResult, CreateTopicInput, DeleteTopicResult, GrantResult, LeaveResult,
    RevokeResult, SearchPage, SearchParams, TopicView,
};
use democrasite_db::entities::topic;
use serde::{Deserialize, Serialize};

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Newly created topic.
#[derive(Serialize)]
pub struct CreatedTopicResponse {
    pub id: String,
    pub share_code: String,
    pub title: String,
    pub created_at: DateTime<FixedOffset>,
}

impl From<topic::Model> for CreatedTopicResponse {
    fn from(topic: topic::Model) -> Self {
        Self {
            id: topic.id,
            share_code: topic.share_code,
            title: topic.title,
            created_at: topic.created_at,
        }
    }
}

/// A topic as seen by the caller.
#[derive(Serialize)]
pub struct TopicResponse {
    pub id: String,
    pub share_code: String,
    pub title: String,
    pub description: Option<String>,
    pub answers: Vec<String>,
    pub is_public: bool,
    pub is_editable: bool,
    pub allow_multi_select: bool,
    pub created_at: DateTime<FixedOffset>,
    pub total_votes: i64,
    pub favorite_count: i64,
    pub vote_breakdown: BTreeMap<String, u64>,
    pub tags: Vec<String>,
    pub creator_username: String,
    pub is_favorited: bool,
    pub my_choices: Vec<String>,
}

impl From<TopicView> for TopicResponse {
    fn from(view: TopicView) -> Self {
        let answers = view.topic.answer_list();
        let tags = view.topic.tag_list();
        let topic = view.topic;
        Self {
            id: topic.id,
            share_code: topic.share_code,
            title: topic.title,
            description: topic.description,
            answers,
            is_public: topic.is_public,
            is_editable: topic.is_editable,
            allow_multi_select: topic.allow_multi_select,
            created_at: topic.created_at,
            total_votes: topic.vote_count,
            favorite_count: topic.favorite_count,
            vote_breakdown: view.vote_breakdown,
            tags,
            creator_username: view.creator_username,
            is_favorited: view.is_favorited,
            my_choices: view.my_choices,
        }
    }
}

/// Vote request.
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub choices: Vec<String>,
}

/// Recorded vote.
#[derive(Serialize)]
pub struct VoteResponse {
    pub message: &'static str,
    pub choices: Vec<String>,
}

/// Add option request.
#[derive(Debug, Deserialize)]
pub struct AddOptionRequest {
    pub option: String,
}

/// Replace tags request.
#[derive(Debug, Deserialize)]
pub struct UpdateTagsRequest {
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Serialize)]
pub struct TagsResponse {
    pub tags: Vec<String>,
}

/// Replace description request. `null` or blank clears it.
#[derive(Debug, Deserialize)]
pub struct UpdateDescriptionRequest {
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Serialize)]
pub struct DescriptionResponse {
    pub description: Option<String>,
}

/// Grant or revoke request.
#[derive(Debug, Deserialize)]
pub struct UsernamesRequest {
    pub usernames: Vec<String>,
}

async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateTopicInput>,
) -> AppResult<ApiResponse<CreatedTopicResponse>> {
    let topic = state.topic_service.create(&user, req).await?;
    Ok(ApiResponse::created(topic.into()))
}

/// Search topics visible to the caller.
async fn search(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<ApiResponse<SearchPage>> {
    let page = state.search_service.search(&user.id, &params).await?;
    Ok(ApiResponse::ok(page))
}

/// Show a topic. Opening a private topic's link joins it.
async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(share_code): Path<String>,
) -> AppResult<ApiResponse<TopicResponse>> {
    let view = state.topic_service.view(&share_code, &user.id).await?;
    Ok(ApiResponse::ok(view.into()))
}

async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(share_code): Path<String>,
) -> AppResult<ApiResponse<DeleteTopicResult>> {
    let result = state.topic_service.delete(&share_code, &user.id).await?;
    Ok(ApiResponse::ok(result))
}

/// Replace the caller's vote.
async fn vote(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(share_code): Path<String>,
    Json(req): Json<VoteRequest>,
) -> AppResult<ApiResponse<VoteResponse>> {
    let choices = state
        .vote_service
        .submit_vote(&share_code, &user.id, &req.choices)
        .await?;
    Ok(ApiResponse::ok(VoteResponse {
        message: "Vote submitted successfully",
        choices,
    }))
}

async fn add_option(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(share_code): Path<String>,
    Json(req): Json<AddOptionRequest>,
) -> AppResult<ApiResponse<AddOptionResult>> {
    let result = state
        .topic_service
        .add_option(&share_code, &user.id, &req.option)
        .await?;
    Ok(ApiResponse::created(result))
}

async fn update_tags(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(share_code): Path<String>,
    Json(req): Json<UpdateTagsRequest>,
) -> AppResult<ApiResponse<TagsResponse>> {
    let tags = state
        .topic_service
        .update_tags(&share_code, &user.id, &req.tags)
        .await?;
    Ok(ApiResponse::ok(TagsResponse { tags }))
}

async fn update_description(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(share_code): Path<String>,
    Json(req): Json<UpdateDescriptionRequest>,
) -> AppResult<ApiResponse<DescriptionResponse>> {
    let description = state
        .topic_service
        .update_description(&share_code, &user.id, req.description.as_deref())
        .await?;
    Ok(ApiResponse::ok(DescriptionResponse { description }))
}

/// Access list of a private topic, creator only.
async fn list_users(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(share_code): Path<String>,
) -> AppResult<ApiResponse<AccessList>> {
    let list = state
        .topic_access_service
        .list_access(&share_code, &user.id)
        .await?;
    Ok(ApiResponse::ok(list))
}

async fn grant_users(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(share_code): Path<String>,
    Json(req): Json<UsernamesRequest>,
) -> AppResult<ApiResponse<GrantResult>> {
    let result = state
        .topic_access_service
        .grant_users(&share_code, &user.id, &req.usernames)
        .await?;
    Ok(ApiResponse::ok(result))
}

async fn revoke_users(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(share_code): Path<String>,
    Json(req): Json<UsernamesRequest>,
) -> AppResult<ApiResponse<RevokeResult>> {
    let result = state
        .topic_access_service
        .revoke_users(&share_code, &user.id, &req.usernames)
        .await?;
    Ok(ApiResponse::ok(result))
}

/// Leave a private topic, dropping the caller's votes.
async fn leave(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(share_code): Path<String>,
) -> AppResult<ApiResponse<LeaveResult>> {
    let result = state
        .topic_access_service
        .leave(&share_code, &user.id)
        .await?;
    Ok(ApiResponse::ok(result))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/topics", post(create))
        .route("/topics/search", get(search))
        .route("/topics/{share_code}", get(show).delete(delete))
        .route("/topics/{share_code}/votes", post(vote))
        .route("/topics/{share_code}/options", post(add_option))
        .route("/topics/{share_code}/tags", patch(update_tags))
        .route("/topics/{share_code}/description", patch(update_description))
        .route(
            "/topics/{share_code}/users",
            get(list_users).post(grant_users).delete(revoke_users),
        )
        .route("/topics/{share_code}/leave", post(leave))
}
