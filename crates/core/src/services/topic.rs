//! Topic ledger service.

use std::collections::BTreeMap;

use chrono::Utc;
use democrasite_common::{AppError, AppResult, IdGenerator};
use democrasite_db::{
    entities::{topic, topic_favorite, user},
    repositories::{
        TopicAccessRepository, TopicFavoriteRepository, TopicRepository, UserRepository,
        VoteRepository,
    },
};
use sea_orm::{ConnectionTrait, Set};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use validator::Validate;

use super::{access::AccessControl, commit, vote::tally};

pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_DESCRIPTION_LENGTH: usize = 2000;
pub const MAX_ANSWERS: usize = 1000;
pub const MAX_ANSWER_LENGTH: usize = 200;
pub const MAX_TAGS: usize = 10;
pub const MAX_TAG_LENGTH: usize = 50;

/// Share code draws before giving up. 36^8 codes make a second draw rare.
const SHARE_CODE_ATTEMPTS: usize = 10;

/// Input for creating a topic.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTopicInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 1000))]
    pub answers: Vec<String>,
    #[serde(default = "default_true")]
    pub is_public: bool,
    #[serde(default)]
    pub is_editable: bool,
    #[serde(default)]
    pub allow_multi_select: bool,
    /// Usernames granted access to a private topic. Ignored for public topics.
    #[serde(default)]
    pub allowed_users: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

const fn default_true() -> bool {
    true
}

/// Outcome of deleting a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteTopicResult {
    pub votes_deleted: u64,
    pub access_records_deleted: u64,
}

/// Outcome of appending an answer option.
#[derive(Debug, Clone, Serialize)]
pub struct AddOptionResult {
    pub option: String,
    pub total_options: usize,
}

/// A topic as seen by one user.
#[derive(Debug, Clone)]
pub struct TopicView {
    pub topic: topic::Model,
    pub creator_username: String,
    pub vote_breakdown: BTreeMap<String, u64>,
    pub is_favorited: bool,
    /// The viewer's current choices, in answer order.
    pub my_choices: Vec<String>,
}

/// Normalize tags: strip control characters, trim, uppercase and dedupe.
///
/// Empty tags are dropped. Order of first occurrence is kept.
pub fn normalize_tags(tags: &[String]) -> AppResult<Vec<String>> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());

    for tag in tags {
        let cleaned: String = tag.chars().filter(|c| !c.is_control()).collect();
        let cleaned = cleaned.trim().to_uppercase();
        if cleaned.is_empty() {
            continue;
        }
        if cleaned.chars().count() > MAX_TAG_LENGTH {
            return Err(AppError::Validation(format!(
                "Tags must be at most {MAX_TAG_LENGTH} characters"
            )));
        }
        if !normalized.contains(&cleaned) {
            normalized.push(cleaned);
        }
    }

    if normalized.len() > MAX_TAGS {
        return Err(AppError::Validation(format!(
            "A topic can have at most {MAX_TAGS} tags"
        )));
    }

    Ok(normalized)
}

/// Trim answers and reject empty, overlong or case-insensitively repeated ones.
pub fn normalize_answers(answers: &[String]) -> AppResult<Vec<String>> {
    if answers.is_empty() || answers.len() > MAX_ANSWERS {
        return Err(AppError::Validation(format!(
            "A topic needs between 1 and {MAX_ANSWERS} answers"
        )));
    }

    let mut seen = std::collections::HashSet::with_capacity(answers.len());
    let mut normalized = Vec::with_capacity(answers.len());

    for answer in answers {
        let answer = validate_option_text(answer)?;
        if !seen.insert(answer.to_lowercase()) {
            return Err(AppError::Validation(format!(
                "Duplicate answer: {answer}"
            )));
        }
        normalized.push(answer);
    }

    Ok(normalized)
}

fn validate_option_text(text: &str) -> AppResult<String> {
    let text = text.trim();
    if text.is_empty() || text.chars().count() > MAX_ANSWER_LENGTH {
        return Err(AppError::Validation(format!(
            "Answers must be between 1 and {MAX_ANSWER_LENGTH} characters"
        )));
    }
    Ok(text.to_string())
}

fn normalize_description(description: Option<&str>) -> AppResult<Option<String>> {
    let Some(description) = description.map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(None);
    };
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(AppError::Validation(format!(
            "Description must be at most {MAX_DESCRIPTION_LENGTH} characters"
        )));
    }
    Ok(Some(description.to_string()))
}

/// Removes a topic together with everything that references it.
#[derive(Clone)]
pub struct TopicCascade {
    topic_repo: TopicRepository,
    vote_repo: VoteRepository,
    access_repo: TopicAccessRepository,
    favorite_repo: TopicFavoriteRepository,
}

impl TopicCascade {
    #[must_use]
    pub const fn new(
        topic_repo: TopicRepository,
        vote_repo: VoteRepository,
        access_repo: TopicAccessRepository,
        favorite_repo: TopicFavoriteRepository,
    ) -> Self {
        Self {
            topic_repo,
            vote_repo,
            access_repo,
            favorite_repo,
        }
    }

    /// Delete votes, grants, favorites and finally the topic row on `conn`.
    pub async fn delete<C: ConnectionTrait>(
        &self,
        conn: &C,
        topic_id: &str,
    ) -> AppResult<DeleteTopicResult> {
        let votes_deleted = self.vote_repo.delete_by_topic(conn, topic_id).await?;
        let access_records_deleted = self.access_repo.delete_by_topic(conn, topic_id).await?;
        self.favorite_repo.delete_by_topic(conn, topic_id).await?;
        self.topic_repo.delete(conn, topic_id).await?;

        Ok(DeleteTopicResult {
            votes_deleted,
            access_records_deleted,
        })
    }
}

/// Topic service: creation, editing, deletion and per-user views.
#[derive(Clone)]
pub struct TopicService {
    topic_repo: TopicRepository,
    user_repo: UserRepository,
    access_repo: TopicAccessRepository,
    vote_repo: VoteRepository,
    favorite_repo: TopicFavoriteRepository,
    access: AccessControl,
    cascade: TopicCascade,
    id_gen: IdGenerator,
}

impl TopicService {
    /// Create a new topic service.
    #[must_use]
    pub fn new(
        topic_repo: TopicRepository,
        user_repo: UserRepository,
        access_repo: TopicAccessRepository,
        vote_repo: VoteRepository,
        favorite_repo: TopicFavoriteRepository,
    ) -> Self {
        Self {
            access: AccessControl::new(access_repo.clone()),
            cascade: TopicCascade::new(
                topic_repo.clone(),
                vote_repo.clone(),
                access_repo.clone(),
                favorite_repo.clone(),
            ),
            topic_repo,
            user_repo,
            access_repo,
            vote_repo,
            favorite_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a topic owned by `creator`.
    ///
    /// The creator favorites the topic and, for private topics, holds an
    /// explicit grant alongside every existing user named in `allowed_users`.
    pub async fn create(
        &self,
        creator: &user::Model,
        input: CreateTopicInput,
    ) -> AppResult<topic::Model> {
        input.validate()?;

        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::Validation("Title must not be empty".to_string()));
        }
        let description = normalize_description(input.description.as_deref())?;
        let answers = normalize_answers(&input.answers)?;
        let tags = normalize_tags(&input.tags)?;

        let allowed = if input.is_public {
            vec![]
        } else {
            self.user_repo.find_by_usernames(&input.allowed_users).await?
        };

        let txn = self.topic_repo.begin().await?;
        let share_code = self.allocate_share_code(&txn).await?;
        let now = Utc::now();

        let model = topic::ActiveModel {
            id: Set(self.id_gen.generate()),
            share_code: Set(share_code),
            title: Set(title),
            description: Set(description),
            creator_id: Set(creator.id.clone()),
            answers: Set(json!(answers)),
            is_public: Set(input.is_public),
            is_editable: Set(input.is_editable),
            allow_multi_select: Set(input.allow_multi_select),
            search_tags: Set(topic::search_tags_value(&tags)),
            tags: Set(json!(tags)),
            vote_count: Set(0),
            favorite_count: Set(1),
            created_at: Set(now.into()),
        };
        let topic = self.topic_repo.create(&txn, model).await?;

        if !topic.is_public {
            self.access_repo.grant(&txn, &topic.id, &creator.id).await?;
            for user in &allowed {
                self.access_repo.grant(&txn, &topic.id, &user.id).await?;
            }
        }

        self.favorite_repo
            .create(
                &txn,
                topic_favorite::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    user_id: Set(creator.id.clone()),
                    topic_id: Set(topic.id.clone()),
                    created_at: Set(now.into()),
                },
            )
            .await?;

        commit(txn).await?;

        info!(
            topic_id = %topic.id,
            share_code = %topic.share_code,
            creator_id = %creator.id,
            is_public = topic.is_public,
            "Created topic"
        );
        Ok(topic)
    }

    async fn allocate_share_code<C: ConnectionTrait>(&self, conn: &C) -> AppResult<String> {
        for _ in 0..SHARE_CODE_ATTEMPTS {
            let code = self.id_gen.generate_share_code();
            if !self.topic_repo.share_code_exists(conn, &code).await? {
                return Ok(code);
            }
        }
        Err(AppError::Internal(
            "Could not allocate a unique share code".to_string(),
        ))
    }

    /// Load a topic for `user_id`, joining private topics on first view.
    pub async fn view(&self, share_code: &str, user_id: &str) -> AppResult<TopicView> {
        let topic = self.topic_repo.get_by_share_code(share_code).await?;
        self.access.grant_access_on_first_view(user_id, &topic).await?;

        let creator = self.user_repo.get_by_id(&topic.creator_id).await?;
        let votes = self.vote_repo.find_by_topic(&topic.id).await?;
        let answers = topic.answer_list();
        let vote_breakdown = tally(&answers, &votes);

        let mine: Vec<&str> = votes
            .iter()
            .filter(|v| v.user_id == user_id)
            .map(|v| v.choice.as_str())
            .collect();
        let my_choices = answers
            .iter()
            .filter(|a| mine.contains(&a.as_str()))
            .cloned()
            .collect();

        let is_favorited = self.favorite_repo.is_favorited(user_id, &topic.id).await?;

        Ok(TopicView {
            topic,
            creator_username: creator.username,
            vote_breakdown,
            is_favorited,
            my_choices,
        })
    }

    /// Append an answer option to an editable topic.
    pub async fn add_option(
        &self,
        share_code: &str,
        user_id: &str,
        option: &str,
    ) -> AppResult<AddOptionResult> {
        let topic = self.topic_repo.get_by_share_code(share_code).await?;

        let txn = self.topic_repo.begin().await?;
        let locked = self.topic_repo.lock(&txn, &topic.id).await?;
        self.access.ensure_can_view_in(&txn, user_id, &locked).await?;
        if !locked.is_editable {
            return Err(AppError::Forbidden(
                "This topic does not accept new options".to_string(),
            ));
        }
        let option = validate_option_text(option)?;

        let mut answers = locked.answer_list();
        let lowered = option.to_lowercase();
        if answers.iter().any(|a| a.to_lowercase() == lowered) {
            return Err(AppError::Conflict(format!(
                "Option already exists: {option}"
            )));
        }
        if answers.len() >= MAX_ANSWERS {
            return Err(AppError::Validation(format!(
                "A topic can have at most {MAX_ANSWERS} answers"
            )));
        }

        answers.push(option.clone());
        let total_options = answers.len();

        let mut active: topic::ActiveModel = locked.into();
        active.answers = Set(json!(answers));
        self.topic_repo.update(&txn, active).await?;
        commit(txn).await?;

        info!(topic_id = %topic.id, user_id = %user_id, option = %option, "Added topic option");
        Ok(AddOptionResult {
            option,
            total_options,
        })
    }

    /// Replace a topic's tags. Returns the stored tags.
    pub async fn update_tags(
        &self,
        share_code: &str,
        user_id: &str,
        tags: &[String],
    ) -> AppResult<Vec<String>> {
        let topic = self.topic_repo.get_by_share_code(share_code).await?;
        self.access.ensure_can_modify(user_id, &topic, "edit tags")?;
        let tags = normalize_tags(tags)?;

        let txn = self.topic_repo.begin().await?;
        let mut active: topic::ActiveModel = topic.into();
        active.search_tags = Set(topic::search_tags_value(&tags));
        active.tags = Set(json!(tags));
        let updated = self.topic_repo.update(&txn, active).await?;
        commit(txn).await?;

        info!(topic_id = %updated.id, tags = ?tags, "Updated topic tags");
        Ok(tags)
    }

    /// Replace or clear a topic's description. Returns the stored description.
    pub async fn update_description(
        &self,
        share_code: &str,
        user_id: &str,
        description: Option<&str>,
    ) -> AppResult<Option<String>> {
        let topic = self.topic_repo.get_by_share_code(share_code).await?;
        self.access
            .ensure_can_modify(user_id, &topic, "edit the description")?;
        let description = normalize_description(description)?;

        let txn = self.topic_repo.begin().await?;
        let mut active: topic::ActiveModel = topic.into();
        active.description = Set(description.clone());
        let updated = self.topic_repo.update(&txn, active).await?;
        commit(txn).await?;

        info!(topic_id = %updated.id, "Updated topic description");
        Ok(description)
    }

    /// Delete a topic and everything attached to it.
    pub async fn delete(&self, share_code: &str, user_id: &str) -> AppResult<DeleteTopicResult> {
        let topic = self.topic_repo.get_by_share_code(share_code).await?;
        self.access
            .ensure_can_modify(user_id, &topic, "delete this topic")?;

        let txn = self.topic_repo.begin().await?;
        self.topic_repo.lock(&txn, &topic.id).await?;
        let result = self.cascade.delete(&txn, &topic.id).await?;
        commit(txn).await?;

        info!(
            topic_id = %topic.id,
            votes_deleted = result.votes_deleted,
            access_records_deleted = result.access_records_deleted,
            "Deleted topic"
        );
        Ok(result)
    }
}
