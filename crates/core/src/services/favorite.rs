//! Topic favorite (bookmark) service.

use democrasite_common::{AppError, AppResult, IdGenerator};
use democrasite_db::{
    entities::topic_favorite,
    repositories::{TopicFavoriteRepository, TopicRepository, UserRepository},
};
use sea_orm::Set;
use tracing::debug;

use super::{
    commit,
    search::{TopicSummary, summarize},
};

/// Favorite service for bookmarking topics.
///
/// Favorites are independent of access control: favoriting neither needs
/// nor grants view rights.
#[derive(Clone)]
pub struct FavoriteService {
    favorite_repo: TopicFavoriteRepository,
    topic_repo: TopicRepository,
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

impl FavoriteService {
    /// Create a new favorite service.
    #[must_use]
    pub const fn new(
        favorite_repo: TopicFavoriteRepository,
        topic_repo: TopicRepository,
        user_repo: UserRepository,
    ) -> Self {
        Self {
            favorite_repo,
            topic_repo,
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Add a topic to favorites.
    pub async fn add(&self, share_code: &str, user_id: &str) -> AppResult<()> {
        let topic = self.topic_repo.get_by_share_code(share_code).await?;

        let txn = self.topic_repo.begin().await?;
        self.topic_repo.lock(&txn, &topic.id).await?;

        if self
            .favorite_repo
            .find_by_user_and_topic(&txn, user_id, &topic.id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("Topic already favorited".to_string()));
        }

        let model = topic_favorite::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            topic_id: Set(topic.id.clone()),
            created_at: Set(chrono::Utc::now().into()),
        };
        self.favorite_repo.create(&txn, model).await?;
        self.topic_repo
            .increment_favorite_count(&txn, &topic.id)
            .await?;
        commit(txn).await?;

        debug!(topic_id = %topic.id, user_id = %user_id, "Added favorite");
        Ok(())
    }

    /// Remove a topic from favorites.
    pub async fn remove(&self, share_code: &str, user_id: &str) -> AppResult<()> {
        let topic = self.topic_repo.get_by_share_code(share_code).await?;

        let txn = self.topic_repo.begin().await?;
        self.topic_repo.lock(&txn, &topic.id).await?;

        let removed = self
            .favorite_repo
            .delete_by_user_and_topic(&txn, user_id, &topic.id)
            .await?;
        if removed == 0 {
            return Err(AppError::NotFound("Favorite not found".to_string()));
        }

        self.topic_repo
            .decrement_favorite_count(&txn, &topic.id)
            .await?;
        commit(txn).await?;

        debug!(topic_id = %topic.id, user_id = %user_id, "Removed favorite");
        Ok(())
    }

    /// The user's favorite topics, most recently favorited first.
    pub async fn list(&self, user_id: &str) -> AppResult<Vec<TopicSummary>> {
        let favorites = self.favorite_repo.list_by_user(user_id).await?;
        let topic_ids: Vec<String> = favorites.iter().map(|f| f.topic_id.clone()).collect();

        let mut topics = self.topic_repo.find_by_ids(&topic_ids).await?;
        topics.sort_by_key(|t| topic_ids.iter().position(|id| *id == t.id));

        summarize(&self.user_repo, topics).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::test_support::{Fixture, TopicOptions};

    #[tokio::test]
    async fn test_add_twice_conflicts() {
        let fx = Fixture::new().await;
        let alice = fx.user("alice").await;
        let bob = fx.user("bob").await;
        let topic = fx.topic(&alice, TopicOptions::public()).await;

        fx.favorites.add(&topic.share_code, &bob.id).await.unwrap();
        let second = fx.favorites.add(&topic.share_code, &bob.id).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));

        assert_eq!(fx.reload(&topic).await.favorite_count, 2);
    }

    #[tokio::test]
    async fn test_creator_favorite_conflicts() {
        let fx = Fixture::new().await;
        let alice = fx.user("alice").await;
        let topic = fx.topic(&alice, TopicOptions::public()).await;

        let result = fx.favorites.add(&topic.share_code, &alice.id).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(fx.reload(&topic).await.favorite_count, 1);
    }

    #[tokio::test]
    async fn test_remove() {
        let fx = Fixture::new().await;
        let alice = fx.user("alice").await;
        let bob = fx.user("bob").await;
        let topic = fx.topic(&alice, TopicOptions::public()).await;

        let missing = fx.favorites.remove(&topic.share_code, &bob.id).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        fx.favorites.remove(&topic.share_code, &alice.id).await.unwrap();
        assert_eq!(fx.reload(&topic).await.favorite_count, 0);
    }

    #[tokio::test]
    async fn test_private_topic_can_be_favorited_without_access() {
        let fx = Fixture::new().await;
        let alice = fx.user("alice").await;
        let bob = fx.user("bob").await;
        let topic = fx.topic(&alice, TopicOptions::private()).await;

        fx.favorites.add(&topic.share_code, &bob.id).await.unwrap();
        assert!(!fx.access.can_view(&bob.id, &topic).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let fx = Fixture::new().await;
        let alice = fx.user("alice").await;
        let bob = fx.user("bob").await;
        let first = fx.topic(&alice, TopicOptions::public().title("First")).await;
        let second = fx.topic(&alice, TopicOptions::public().title("Second")).await;

        fx.favorites.add(&first.share_code, &bob.id).await.unwrap();
        fx.favorites.add(&second.share_code, &bob.id).await.unwrap();

        let list = fx.favorites.list(&bob.id).await.unwrap();
        let titles: Vec<&str> = list.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Second", "First"]);
        assert_eq!(list[0].creator_username, "alice");

        assert!(matches!(
            fx.favorites.add("ZZZZZZZZ", &bob.id).await,
            Err(AppError::TopicNotFound(_))
        ));
    }
}
