//! Topic favorite (bookmark) repository.

use std::sync::Arc;

use crate::entities::{TopicFavorite, topic_favorite};
use democrasite_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder,
};

/// Topic favorite repository for database operations.
#[derive(Clone)]
pub struct TopicFavoriteRepository {
    db: Arc<DatabaseConnection>,
}

impl TopicFavoriteRepository {
    /// Create a new topic favorite repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a favorite by user and topic.
    pub async fn find_by_user_and_topic<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
        topic_id: &str,
    ) -> AppResult<Option<topic_favorite::Model>> {
        TopicFavorite::find()
            .filter(topic_favorite::Column::UserId.eq(user_id))
            .filter(topic_favorite::Column::TopicId.eq(topic_id))
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check if a topic is favorited by user.
    pub async fn is_favorited(&self, user_id: &str, topic_id: &str) -> AppResult<bool> {
        Ok(self
            .find_by_user_and_topic(self.db.as_ref(), user_id, topic_id)
            .await?
            .is_some())
    }

    /// Create a new favorite.
    pub async fn create<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: topic_favorite::ActiveModel,
    ) -> AppResult<topic_favorite::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a favorite by user and topic. Returns the number of rows removed.
    pub async fn delete_by_user_and_topic<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
        topic_id: &str,
    ) -> AppResult<u64> {
        let result = TopicFavorite::delete_many()
            .filter(topic_favorite::Column::UserId.eq(user_id))
            .filter(topic_favorite::Column::TopicId.eq(topic_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    /// Get favorites by user, newest first.
    pub async fn find_by_user<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
    ) -> AppResult<Vec<topic_favorite::Model>> {
        TopicFavorite::find()
            .filter(topic_favorite::Column::UserId.eq(user_id))
            .order_by_desc(topic_favorite::Column::CreatedAt)
            .order_by_desc(topic_favorite::Column::Id)
            .all(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get favorites by user outside of any transaction.
    pub async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<topic_favorite::Model>> {
        self.find_by_user(self.db.as_ref(), user_id).await
    }

    /// Count favorites for a user.
    pub async fn count_by_user(&self, user_id: &str) -> AppResult<u64> {
        TopicFavorite::find()
            .filter(topic_favorite::Column::UserId.eq(user_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Remove every favorite referencing a topic.
    pub async fn delete_by_topic<C: ConnectionTrait>(
        &self,
        conn: &C,
        topic_id: &str,
    ) -> AppResult<u64> {
        let result = TopicFavorite::delete_many()
            .filter(topic_favorite::Column::TopicId.eq(topic_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    /// Remove every favorite held by a user.
    pub async fn delete_by_user<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
    ) -> AppResult<u64> {
        let result = TopicFavorite::delete_many()
            .filter(topic_favorite::Column::UserId.eq(user_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }
}
