//! Access control for topics.
//!
//! Public topics are open to every authenticated user for viewing and voting.
//! Private topics are open to their creator and to users holding an explicit
//! grant. Modification is always reserved to the creator.

use democrasite_common::{AppError, AppResult};
use democrasite_db::{entities::topic, repositories::TopicAccessRepository};
use sea_orm::ConnectionTrait;
use tracing::info;

fn private_topic_denied() -> AppError {
    AppError::AccessDenied("Access denied to this private topic".to_string())
}

/// Decides what a user may do with a topic.
#[derive(Clone)]
pub struct AccessControl {
    access_repo: TopicAccessRepository,
}

impl AccessControl {
    /// Create a new access evaluator.
    #[must_use]
    pub const fn new(access_repo: TopicAccessRepository) -> Self {
        Self { access_repo }
    }

    /// Whether the user may see the topic's contents and results.
    pub async fn can_view(&self, user_id: &str, topic: &topic::Model) -> AppResult<bool> {
        if topic.is_public || topic.is_creator(user_id) {
            return Ok(true);
        }
        self.access_repo.has_access(&topic.id, user_id).await
    }

    /// Whether the user may vote on the topic.
    pub async fn can_vote(&self, user_id: &str, topic: &topic::Model) -> AppResult<bool> {
        self.can_view(user_id, topic).await
    }

    /// Whether the user may modify the topic.
    #[must_use]
    pub fn can_modify(&self, user_id: &str, topic: &topic::Model) -> bool {
        topic.is_creator(user_id)
    }

    /// Whether the user may view the topic, reading grants through `conn`.
    ///
    /// Called inside a transaction that holds the topic lock, this sees the
    /// access list as it stands for the rest of that transaction.
    pub async fn can_view_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
        topic: &topic::Model,
    ) -> AppResult<bool> {
        if topic.is_public || topic.is_creator(user_id) {
            return Ok(true);
        }
        self.access_repo.exists(conn, &topic.id, user_id).await
    }

    /// Fail with `AccessDenied` unless the user may view the topic.
    pub async fn ensure_can_view(&self, user_id: &str, topic: &topic::Model) -> AppResult<()> {
        if self.can_view(user_id, topic).await? {
            Ok(())
        } else {
            Err(private_topic_denied())
        }
    }

    /// Fail with `AccessDenied` unless the user may vote on the topic.
    pub async fn ensure_can_vote(&self, user_id: &str, topic: &topic::Model) -> AppResult<()> {
        if self.can_vote(user_id, topic).await? {
            Ok(())
        } else {
            Err(private_topic_denied())
        }
    }

    /// [`Self::ensure_can_view`] reading grants through `conn`.
    pub async fn ensure_can_view_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
        topic: &topic::Model,
    ) -> AppResult<()> {
        if self.can_view_in(conn, user_id, topic).await? {
            Ok(())
        } else {
            Err(private_topic_denied())
        }
    }

    /// [`Self::ensure_can_vote`] reading grants through `conn`.
    pub async fn ensure_can_vote_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
        topic: &topic::Model,
    ) -> AppResult<()> {
        self.ensure_can_view_in(conn, user_id, topic).await
    }

    /// Fail with `Forbidden` unless the user created the topic.
    pub fn ensure_can_modify(
        &self,
        user_id: &str,
        topic: &topic::Model,
        action: &str,
    ) -> AppResult<()> {
        if self.can_modify(user_id, topic) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Only the topic creator can {action}"
            )))
        }
    }

    /// Fail with `InvalidOperation` for public topics, which have no access list.
    pub fn ensure_private(&self, topic: &topic::Model) -> AppResult<()> {
        if topic.is_public {
            Err(AppError::InvalidOperation(
                "Public topics have no access list".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    /// Record a grant for a non-creator opening a private topic by share code.
    ///
    /// Returns `true` when a grant was created by this call.
    pub async fn grant_access_on_first_view(
        &self,
        user_id: &str,
        topic: &topic::Model,
    ) -> AppResult<bool> {
        if topic.is_public || topic.is_creator(user_id) {
            return Ok(false);
        }

        let txn = self.access_repo.begin().await?;
        let granted = self.access_repo.grant(&txn, &topic.id, user_id).await?;
        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if granted {
            info!(topic_id = %topic.id, user_id = %user_id, "Joined private topic via share code");
        }
        Ok(granted)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::test_support::{Fixture, TopicOptions};

    #[tokio::test]
    async fn test_public_topic_open_to_all() {
        let fx = Fixture::new().await;
        let alice = fx.user("alice").await;
        let bob = fx.user("bob").await;
        let topic = fx.topic(&alice, TopicOptions::public()).await;

        assert!(fx.access.can_view(&bob.id, &topic).await.unwrap());
        assert!(fx.access.can_vote(&bob.id, &topic).await.unwrap());
        assert!(!fx.access.can_modify(&bob.id, &topic));
        assert!(fx.access.can_modify(&alice.id, &topic));
        assert!(matches!(
            fx.access.ensure_private(&topic),
            Err(AppError::InvalidOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_private_topic_requires_grant() {
        let fx = Fixture::new().await;
        let alice = fx.user("alice").await;
        let bob = fx.user("bob").await;
        let topic = fx.topic(&alice, TopicOptions::private()).await;

        assert!(fx.access.can_view(&alice.id, &topic).await.unwrap());
        assert!(fx.access.can_vote(&alice.id, &topic).await.unwrap());
        assert!(!fx.access.can_view(&bob.id, &topic).await.unwrap());
        assert!(matches!(
            fx.access.ensure_can_vote(&bob.id, &topic).await,
            Err(AppError::AccessDenied(_))
        ));
        assert!(matches!(
            fx.access.ensure_can_modify(&bob.id, &topic, "delete this topic"),
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_first_view_grant_is_idempotent() {
        let fx = Fixture::new().await;
        let alice = fx.user("alice").await;
        let bob = fx.user("bob").await;
        let topic = fx.topic(&alice, TopicOptions::private()).await;

        assert!(
            fx.access
                .grant_access_on_first_view(&bob.id, &topic)
                .await
                .unwrap()
        );
        assert!(
            !fx.access
                .grant_access_on_first_view(&bob.id, &topic)
                .await
                .unwrap()
        );
        assert!(
            !fx.access
                .grant_access_on_first_view(&alice.id, &topic)
                .await
                .unwrap()
        );
        assert!(fx.access.can_vote(&bob.id, &topic).await.unwrap());
    }

    #[tokio::test]
    async fn test_checks_inside_transaction_see_uncommitted_revocation() {
        let fx = Fixture::new().await;
        let alice = fx.user("alice").await;
        let bob = fx.user("bob").await;
        let topic = fx.topic(&alice, TopicOptions::private()).await;
        fx.access
            .grant_access_on_first_view(&bob.id, &topic)
            .await
            .unwrap();

        let txn = fx.topic_repo.begin().await.unwrap();
        let locked = fx.topic_repo.lock(&txn, &topic.id).await.unwrap();
        assert!(fx.access.can_view_in(&txn, &bob.id, &locked).await.unwrap());

        fx.access_repo
            .revoke(&txn, &topic.id, &bob.id)
            .await
            .unwrap();
        assert!(matches!(
            fx.access.ensure_can_vote_in(&txn, &bob.id, &locked).await,
            Err(AppError::AccessDenied(_))
        ));
        fx.access
            .ensure_can_view_in(&txn, &alice.id, &locked)
            .await
            .unwrap();
    }
}
