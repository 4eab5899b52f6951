//! Access list management for private topics.

use std::collections::{BTreeMap, HashMap};

use democrasite_common::{AppError, AppResult};
use democrasite_db::{
    entities::{topic, user},
    repositories::{TopicAccessRepository, TopicRepository, UserRepository, VoteRepository},
};
use sea_orm::ConnectionTrait;
use serde::Serialize;
use tracing::info;

use super::{access::AccessControl, commit};

/// Per-username outcome of granting access.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GrantResult {
    pub added: Vec<String>,
    pub not_found: Vec<String>,
    pub already_added: Vec<String>,
}

/// Per-username outcome of revoking access.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RevokeResult {
    pub removed: Vec<String>,
    pub not_found: Vec<String>,
    pub votes_removed: u64,
}

/// A private topic's access list.
#[derive(Debug, Clone, Serialize)]
pub struct AccessList {
    pub topic_title: String,
    pub creator: String,
    pub allowed_users: Vec<String>,
    /// Choices per voting username.
    pub vote_details: BTreeMap<String, Vec<String>>,
}

/// Outcome of leaving a topic.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LeaveResult {
    pub votes_removed: u64,
}

/// Lowercase, trim and dedupe a username list. At least one name is required.
fn normalize_usernames(usernames: &[String]) -> AppResult<Vec<String>> {
    let mut names: Vec<String> = Vec::with_capacity(usernames.len());
    for name in usernames {
        let name = name.trim().to_lowercase();
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
    if names.is_empty() {
        return Err(AppError::Validation(
            "At least one username is required".to_string(),
        ));
    }
    Ok(names)
}

/// Topic access list service.
#[derive(Clone)]
pub struct TopicAccessService {
    topic_repo: TopicRepository,
    user_repo: UserRepository,
    access_repo: TopicAccessRepository,
    vote_repo: VoteRepository,
    access: AccessControl,
}

impl TopicAccessService {
    /// Create a new access list service.
    #[must_use]
    pub fn new(
        topic_repo: TopicRepository,
        user_repo: UserRepository,
        access_repo: TopicAccessRepository,
        vote_repo: VoteRepository,
    ) -> Self {
        Self {
            access: AccessControl::new(access_repo.clone()),
            topic_repo,
            user_repo,
            access_repo,
            vote_repo,
        }
    }

    /// Load a topic the requester may manage.
    async fn managed_topic(
        &self,
        share_code: &str,
        requester_id: &str,
        action: &str,
    ) -> AppResult<topic::Model> {
        let topic = self.topic_repo.get_by_share_code(share_code).await?;
        self.access.ensure_can_modify(requester_id, &topic, action)?;
        self.access.ensure_private(&topic)?;
        Ok(topic)
    }

    async fn users_by_name(&self, names: &[String]) -> AppResult<HashMap<String, user::Model>> {
        Ok(self
            .user_repo
            .find_by_usernames(names)
            .await?
            .into_iter()
            .map(|u| (u.username.clone(), u))
            .collect())
    }

    /// Remove a user's votes on a locked topic, adjusting `vote_count`.
    async fn remove_votes<C: ConnectionTrait>(
        &self,
        conn: &C,
        topic_id: &str,
        user_id: &str,
    ) -> AppResult<u64> {
        let removed = self
            .vote_repo
            .delete_by_topic_and_user(conn, topic_id, user_id)
            .await?;
        if removed > 0 {
            self.topic_repo.decrement_vote_count(conn, topic_id).await?;
        }
        Ok(removed)
    }

    /// Grant access to each named user.
    pub async fn grant_users(
        &self,
        share_code: &str,
        requester_id: &str,
        usernames: &[String],
    ) -> AppResult<GrantResult> {
        let topic = self
            .managed_topic(share_code, requester_id, "manage the access list")
            .await?;
        let names = normalize_usernames(usernames)?;
        let users = self.users_by_name(&names).await?;

        let mut result = GrantResult::default();
        let txn = self.access_repo.begin().await?;

        for name in names {
            match users.get(&name) {
                None => result.not_found.push(name),
                Some(user) if topic.is_creator(&user.id) => result.already_added.push(name),
                Some(user) => {
                    if self.access_repo.grant(&txn, &topic.id, &user.id).await? {
                        result.added.push(name);
                    } else {
                        result.already_added.push(name);
                    }
                }
            }
        }

        commit(txn).await?;

        info!(
            topic_id = %topic.id,
            added = result.added.len(),
            not_found = result.not_found.len(),
            already_added = result.already_added.len(),
            "Granted topic access"
        );
        Ok(result)
    }

    /// Revoke access from each named user and delete their votes.
    ///
    /// Naming the creator fails the whole request before anything changes.
    pub async fn revoke_users(
        &self,
        share_code: &str,
        requester_id: &str,
        usernames: &[String],
    ) -> AppResult<RevokeResult> {
        let topic = self
            .managed_topic(share_code, requester_id, "manage the access list")
            .await?;
        let names = normalize_usernames(usernames)?;
        let users = self.users_by_name(&names).await?;

        if users.values().any(|u| topic.is_creator(&u.id)) {
            return Err(AppError::InvalidOperation(
                "The topic creator cannot be removed".to_string(),
            ));
        }

        let mut result = RevokeResult::default();
        let txn = self.topic_repo.begin().await?;
        self.topic_repo.lock(&txn, &topic.id).await?;

        for name in names {
            let Some(user) = users.get(&name) else {
                result.not_found.push(name);
                continue;
            };

            let revoked = self.access_repo.revoke(&txn, &topic.id, &user.id).await?;
            result.votes_removed += self.remove_votes(&txn, &topic.id, &user.id).await?;

            if revoked > 0 {
                result.removed.push(name);
            } else {
                result.not_found.push(name);
            }
        }

        commit(txn).await?;

        info!(
            topic_id = %topic.id,
            removed = result.removed.len(),
            votes_removed = result.votes_removed,
            "Revoked topic access"
        );
        Ok(result)
    }

    /// The access list of a private topic, with each member's choices.
    pub async fn list_access(&self, share_code: &str, requester_id: &str) -> AppResult<AccessList> {
        let topic = self
            .managed_topic(share_code, requester_id, "view the access list")
            .await?;
        let creator = self.user_repo.get_by_id(&topic.creator_id).await?;

        let grants = self.access_repo.find_by_topic(&topic.id).await?;
        let votes = self.vote_repo.find_by_topic(&topic.id).await?;

        let mut user_ids: Vec<String> = grants.iter().map(|g| g.user_id.clone()).collect();
        user_ids.extend(votes.iter().map(|v| v.user_id.clone()));
        user_ids.sort();
        user_ids.dedup();

        let usernames: HashMap<String, String> = self
            .user_repo
            .find_by_ids(&user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u.username))
            .collect();

        let allowed_users = grants
            .iter()
            .filter_map(|g| usernames.get(&g.user_id).cloned())
            .collect();

        let mut vote_details: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for vote in votes {
            if let Some(username) = usernames.get(&vote.user_id) {
                vote_details
                    .entry(username.clone())
                    .or_default()
                    .push(vote.choice);
            }
        }

        Ok(AccessList {
            topic_title: topic.title,
            creator: creator.username,
            allowed_users,
            vote_details,
        })
    }

    /// Remove the caller from a private topic's access list.
    pub async fn leave(&self, share_code: &str, user_id: &str) -> AppResult<LeaveResult> {
        let topic = self.topic_repo.get_by_share_code(share_code).await?;
        if topic.is_public {
            return Err(AppError::InvalidOperation(
                "Cannot leave a public topic".to_string(),
            ));
        }
        if topic.is_creator(user_id) {
            return Err(AppError::InvalidOperation(
                "The topic creator cannot leave; delete the topic instead".to_string(),
            ));
        }

        let txn = self.topic_repo.begin().await?;
        self.topic_repo.lock(&txn, &topic.id).await?;
        if self.access_repo.revoke(&txn, &topic.id, user_id).await? == 0 {
            return Err(AppError::NotFound(
                "You are not on this topic's access list".to_string(),
            ));
        }
        let votes_removed = self.remove_votes(&txn, &topic.id, user_id).await?;
        commit(txn).await?;

        info!(topic_id = %topic.id, user_id = %user_id, votes_removed, "Left topic");
        Ok(LeaveResult { votes_removed })
    }
}
