//! Vote repository.

use std::sync::Arc;

use crate::entities::{Vote, vote};
use chrono::Utc;
use democrasite_common::{AppError, AppResult, IdGenerator};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

/// Vote repository for database operations.
#[derive(Clone)]
pub struct VoteRepository {
    db: Arc<DatabaseConnection>,
    id_gen: IdGenerator,
}

impl VoteRepository {
    /// Create a new vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            id_gen: IdGenerator::new(),
        }
    }

    /// All votes on a topic.
    pub async fn find_by_topic(&self, topic_id: &str) -> AppResult<Vec<vote::Model>> {
        Vote::find()
            .filter(vote::Column::TopicId.eq(topic_id))
            .order_by_asc(vote::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// A user's votes on a topic, in submission order.
    pub async fn find_by_topic_and_user(
        &self,
        topic_id: &str,
        user_id: &str,
    ) -> AppResult<Vec<vote::Model>> {
        Vote::find()
            .filter(vote::Column::TopicId.eq(topic_id))
            .filter(vote::Column::UserId.eq(user_id))
            .order_by_asc(vote::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count a user's vote rows on a topic.
    pub async fn count_by_topic_and_user<C: ConnectionTrait>(
        &self,
        conn: &C,
        topic_id: &str,
        user_id: &str,
    ) -> AppResult<u64> {
        Vote::find()
            .filter(vote::Column::TopicId.eq(topic_id))
            .filter(vote::Column::UserId.eq(user_id))
            .count(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Remove a user's votes on a topic. Returns the number of rows removed.
    pub async fn delete_by_topic_and_user<C: ConnectionTrait>(
        &self,
        conn: &C,
        topic_id: &str,
        user_id: &str,
    ) -> AppResult<u64> {
        let result = Vote::delete_many()
            .filter(vote::Column::TopicId.eq(topic_id))
            .filter(vote::Column::UserId.eq(user_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    /// Insert one vote row per choice.
    pub async fn insert_choices<C: ConnectionTrait>(
        &self,
        conn: &C,
        topic_id: &str,
        user_id: &str,
        choices: &[String],
    ) -> AppResult<()> {
        if choices.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let models = choices.iter().map(|choice| vote::ActiveModel {
            id: Set(self.id_gen.generate()),
            topic_id: Set(topic_id.to_string()),
            user_id: Set(user_id.to_string()),
            choice: Set(choice.clone()),
            created_at: Set(now.into()),
        });

        Vote::insert_many(models)
            .exec_without_returning(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Remove every vote on a topic.
    pub async fn delete_by_topic<C: ConnectionTrait>(
        &self,
        conn: &C,
        topic_id: &str,
    ) -> AppResult<u64> {
        let result = Vote::delete_many()
            .filter(vote::Column::TopicId.eq(topic_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    /// A user's votes across all topics.
    pub async fn find_by_user<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
    ) -> AppResult<Vec<vote::Model>> {
        Vote::find()
            .filter(vote::Column::UserId.eq(user_id))
            .order_by_asc(vote::Column::Id)
            .all(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Remove every vote cast by a user.
    pub async fn delete_by_user<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
    ) -> AppResult<u64> {
        let result = Vote::delete_many()
            .filter(vote::Column::UserId.eq(user_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    /// Count vote rows cast by a user.
    pub async fn count_by_user(&self, user_id: &str) -> AppResult<u64> {
        Vote::find()
            .filter(vote::Column::UserId.eq(user_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
