//! Topic access grant repository.

use std::sync::Arc;

use crate::entities::{TopicAccess, topic_access};
use chrono::Utc;
use democrasite_common::{AppError, AppResult, IdGenerator};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait, sea_query::OnConflict,
};

/// Access grant repository for database operations.
#[derive(Clone)]
pub struct TopicAccessRepository {
    db: Arc<DatabaseConnection>,
    id_gen: IdGenerator,
}

impl TopicAccessRepository {
    /// Create a new access grant repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            id_gen: IdGenerator::new(),
        }
    }

    /// Start a transaction on the underlying connection.
    pub async fn begin(&self) -> AppResult<DatabaseTransaction> {
        self.db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check whether a user holds an explicit grant on a topic.
    pub async fn exists<C: ConnectionTrait>(
        &self,
        conn: &C,
        topic_id: &str,
        user_id: &str,
    ) -> AppResult<bool> {
        let count = TopicAccess::find()
            .filter(topic_access::Column::TopicId.eq(topic_id))
            .filter(topic_access::Column::UserId.eq(user_id))
            .count(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    /// Check whether a user holds an explicit grant, outside of any transaction.
    pub async fn has_access(&self, topic_id: &str, user_id: &str) -> AppResult<bool> {
        self.exists(self.db.as_ref(), topic_id, user_id).await
    }

    /// Insert a grant unless one already exists.
    ///
    /// Returns `true` when a new grant was written.
    pub async fn grant<C: ConnectionTrait>(
        &self,
        conn: &C,
        topic_id: &str,
        user_id: &str,
    ) -> AppResult<bool> {
        let model = topic_access::ActiveModel {
            id: Set(self.id_gen.generate()),
            topic_id: Set(topic_id.to_string()),
            user_id: Set(user_id.to_string()),
            created_at: Set(Utc::now().into()),
        };

        let inserted = TopicAccess::insert(model)
            .on_conflict(
                OnConflict::columns([topic_access::Column::TopicId, topic_access::Column::UserId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(inserted > 0)
    }

    /// Remove a grant. Returns the number of rows removed.
    pub async fn revoke<C: ConnectionTrait>(
        &self,
        conn: &C,
        topic_id: &str,
        user_id: &str,
    ) -> AppResult<u64> {
        let result = TopicAccess::delete_many()
            .filter(topic_access::Column::TopicId.eq(topic_id))
            .filter(topic_access::Column::UserId.eq(user_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    /// Grants on a topic, oldest first.
    pub async fn find_by_topic(&self, topic_id: &str) -> AppResult<Vec<topic_access::Model>> {
        TopicAccess::find()
            .filter(topic_access::Column::TopicId.eq(topic_id))
            .order_by_asc(topic_access::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Remove every grant on a topic.
    pub async fn delete_by_topic<C: ConnectionTrait>(
        &self,
        conn: &C,
        topic_id: &str,
    ) -> AppResult<u64> {
        let result = TopicAccess::delete_many()
            .filter(topic_access::Column::TopicId.eq(topic_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    /// Remove every grant held by a user.
    pub async fn delete_by_user<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
    ) -> AppResult<u64> {
        let result = TopicAccess::delete_many()
            .filter(topic_access::Column::UserId.eq(user_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }
}
