//! Pending registration entity.
//!
//! Holds a sign-up until its email address is verified.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "pending_registration")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub username: String,

    pub email: String,

    pub password_hash: String,

    /// Verification token sent by email
    #[sea_orm(unique)]
    pub token: String,

    pub expires_at: DateTimeWithTimeZone,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether the verification window has passed.
    #[must_use]
    pub fn is_expired(&self, now: DateTimeWithTimeZone) -> bool {
        self.expires_at <= now
    }
}
