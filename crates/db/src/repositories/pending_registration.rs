//! Pending registration repository.

use std::sync::Arc;

use crate::entities::{PendingRegistration, pending_registration};
use chrono::{DateTime, FixedOffset};
use democrasite_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter,
};

/// Pending registration repository for database operations.
#[derive(Clone)]
pub struct PendingRegistrationRepository {
    db: Arc<DatabaseConnection>,
}

impl PendingRegistrationRepository {
    /// Create a new pending registration repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a pending registration by verification token.
    pub async fn find_by_token(
        &self,
        token: &str,
    ) -> AppResult<Option<pending_registration::Model>> {
        PendingRegistration::find()
            .filter(pending_registration::Column::Token.eq(token))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a pending registration by email address.
    pub async fn find_by_email(
        &self,
        email: &str,
    ) -> AppResult<Option<pending_registration::Model>> {
        PendingRegistration::find()
            .filter(pending_registration::Column::Email.eq(email))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new pending registration.
    pub async fn create(
        &self,
        model: pending_registration::ActiveModel,
    ) -> AppResult<pending_registration::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a pending registration.
    pub async fn update(
        &self,
        model: pending_registration::ActiveModel,
    ) -> AppResult<pending_registration::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a pending registration by ID.
    pub async fn delete<C: ConnectionTrait>(&self, conn: &C, id: &str) -> AppResult<()> {
        PendingRegistration::delete_by_id(id)
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a pending registration by ID outside of any transaction.
    pub async fn delete_by_id(&self, id: &str) -> AppResult<()> {
        self.delete(self.db.as_ref(), id).await
    }

    /// Delete every pending registration holding `username` or `email`.
    pub async fn delete_by_username_or_email(&self, username: &str, email: &str) -> AppResult<u64> {
        let result = PendingRegistration::delete_many()
            .filter(
                Condition::any()
                    .add(pending_registration::Column::Username.eq(username))
                    .add(pending_registration::Column::Email.eq(email)),
            )
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    /// Delete every pending registration that expired at or before `now`.
    pub async fn delete_expired(&self, now: DateTime<FixedOffset>) -> AppResult<u64> {
        let result = PendingRegistration::delete_many()
            .filter(pending_registration::Column::ExpiresAt.lte(now))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }
}
