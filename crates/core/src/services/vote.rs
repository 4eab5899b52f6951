//! Vote submission and tallying.

use std::collections::BTreeMap;

use democrasite_common::{AppError, AppResult};
use democrasite_db::{
    entities::vote,
    repositories::{TopicAccessRepository, TopicRepository, VoteRepository},
};
use tracing::info;

use super::{access::AccessControl, commit};

/// Maximum number of choices accepted in one submission.
pub const MAX_CHOICES: usize = 100;

/// Count votes per answer. Every answer is present, unvoted ones at zero.
///
/// Rows whose choice is no longer an answer are ignored.
#[must_use]
pub fn tally(answers: &[String], votes: &[vote::Model]) -> BTreeMap<String, u64> {
    let mut counts: BTreeMap<String, u64> = answers.iter().map(|a| (a.clone(), 0)).collect();
    for vote in votes {
        if let Some(count) = counts.get_mut(&vote.choice) {
            *count += 1;
        }
    }
    counts
}

/// Drop repeated choices, keeping first occurrences in order.
fn dedupe_choices(choices: &[String]) -> AppResult<Vec<String>> {
    if choices.is_empty() {
        return Err(AppError::Validation(
            "At least one choice is required".to_string(),
        ));
    }
    if choices.len() > MAX_CHOICES {
        return Err(AppError::Validation(format!(
            "At most {MAX_CHOICES} choices can be submitted"
        )));
    }

    let mut unique: Vec<String> = Vec::with_capacity(choices.len());
    for choice in choices {
        if !unique.contains(choice) {
            unique.push(choice.clone());
        }
    }
    Ok(unique)
}

/// Vote service.
#[derive(Clone)]
pub struct VoteService {
    topic_repo: TopicRepository,
    vote_repo: VoteRepository,
    access: AccessControl,
}

impl VoteService {
    /// Create a new vote service.
    #[must_use]
    pub const fn new(
        topic_repo: TopicRepository,
        vote_repo: VoteRepository,
        access_repo: TopicAccessRepository,
    ) -> Self {
        Self {
            topic_repo,
            vote_repo,
            access: AccessControl::new(access_repo),
        }
    }

    /// Replace the user's votes on a topic with `choices`.
    ///
    /// Single-select topics keep only the first choice. The topic row stays
    /// locked from the access check until commit, so concurrent voters
    /// serialize on `vote_count` and a revocation committed before the lock is
    /// honored. Returns the recorded choices.
    pub async fn submit_vote(
        &self,
        share_code: &str,
        user_id: &str,
        choices: &[String],
    ) -> AppResult<Vec<String>> {
        let topic = self.topic_repo.get_by_share_code(share_code).await?;

        let txn = self.topic_repo.begin().await?;
        let locked = self.topic_repo.lock(&txn, &topic.id).await?;
        self.access.ensure_can_vote_in(&txn, user_id, &locked).await?;
        let choices = dedupe_choices(choices)?;

        let answers = locked.answer_list();
        if let Some(invalid) = choices.iter().find(|c| !answers.contains(c)) {
            return Err(AppError::Validation(format!("Invalid choice: {invalid}")));
        }

        let recorded = if locked.allow_multi_select {
            choices
        } else {
            choices.into_iter().take(1).collect()
        };

        let prior = self
            .vote_repo
            .count_by_topic_and_user(&txn, &locked.id, user_id)
            .await?;
        self.vote_repo
            .delete_by_topic_and_user(&txn, &locked.id, user_id)
            .await?;
        self.vote_repo
            .insert_choices(&txn, &locked.id, user_id, &recorded)
            .await?;
        if prior == 0 {
            self.topic_repo
                .increment_vote_count(&txn, &locked.id)
                .await?;
        }

        commit(txn).await?;

        info!(
            topic_id = %locked.id,
            user_id = %user_id,
            choices = recorded.len(),
            first_vote = prior == 0,
            "Recorded vote"
        );
        Ok(recorded)
    }

    /// Vote counts per answer for a topic the user may see.
    pub async fn breakdown(
        &self,
        share_code: &str,
        user_id: &str,
    ) -> AppResult<BTreeMap<String, u64>> {
        let topic = self.topic_repo.get_by_share_code(share_code).await?;
        self.access.ensure_can_view(user_id, &topic).await?;
        let votes = self.vote_repo.find_by_topic(&topic.id).await?;
        Ok(tally(&topic.answer_list(), &votes))
    }
}
