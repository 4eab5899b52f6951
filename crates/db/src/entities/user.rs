//! User entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Always stored lowercase.
    #[sea_orm(unique)]
    pub username: String,

    #[sea_orm(unique)]
    pub email: String,

    /// Argon2 PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::topic::Entity")]
    Topic,

    #[sea_orm(has_many = "super::vote::Entity")]
    Vote,

    #[sea_orm(has_many = "super::topic_access::Entity")]
    TopicAccess,

    #[sea_orm(has_many = "super::topic_favorite::Entity")]
    TopicFavorite,
}

impl Related<super::topic::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Topic.def()
    }
}

impl Related<super::vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vote.def()
    }
}

impl Related<super::topic_access::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TopicAccess.def()
    }
}

impl Related<super::topic_favorite::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TopicFavorite.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
