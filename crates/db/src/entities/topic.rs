//! Topic entity (a poll with its answer list and denormalized counters).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "topic")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Public 8-character identifier
    #[sea_orm(unique)]
    pub share_code: String,

    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    #[sea_orm(indexed)]
    pub creator_id: String,

    /// Answer options (JSON array of strings, insertion ordered)
    #[sea_orm(column_type = "Json")]
    pub answers: JsonValue,

    pub is_public: bool,

    pub is_editable: bool,

    pub allow_multi_select: bool,

    /// Normalized tags (JSON array of uppercase strings)
    #[sea_orm(column_type = "Json")]
    pub tags: JsonValue,

    /// Tags joined by newlines, for substring matching
    #[sea_orm(column_type = "Text")]
    pub search_tags: String,

    /// Distinct voting users (denormalized)
    #[sea_orm(default_value = 0)]
    pub vote_count: i64,

    /// Favorites (denormalized)
    #[sea_orm(default_value = 0)]
    pub favorite_count: i64,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CreatorId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Creator,

    #[sea_orm(has_many = "super::vote::Entity")]
    Vote,

    #[sea_orm(has_many = "super::topic_access::Entity")]
    TopicAccess,

    #[sea_orm(has_many = "super::topic_favorite::Entity")]
    TopicFavorite,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Creator.def()
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

impl Model {
    /// Answer options in display order.
    #[must_use]
    pub fn answer_list(&self) -> Vec<String> {
        json_strings(&self.answers)
    }

    /// Stored tags in display order.
    #[must_use]
    pub fn tag_list(&self) -> Vec<String> {
        json_strings(&self.tags)
    }

    /// Whether `user_id` created this topic.
    #[must_use]
    pub fn is_creator(&self, user_id: &str) -> bool {
        self.creator_id == user_id
    }
}

/// Join tags into the `search_tags` column format.
#[must_use]
pub fn search_tags_value(tags: &[String]) -> String {
    tags.join("\n")
}

fn json_strings(value: &JsonValue) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(ToString::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn test_answer_and_tag_lists() {
        let model = Model {
            id: "t1".to_string(),
            share_code: "ABCD1234".to_string(),
            title: "Lunch".to_string(),
            description: None,
            creator_id: "u1".to_string(),
            answers: json!(["Pizza", "Sushi"]),
            is_public: true,
            is_editable: false,
            allow_multi_select: false,
            tags: json!(["FOOD"]),
            search_tags: "FOOD".to_string(),
            vote_count: 0,
            favorite_count: 1,
            created_at: Utc::now().into(),
        };

        assert_eq!(model.answer_list(), vec!["Pizza", "Sushi"]);
        assert_eq!(model.tag_list(), vec!["FOOD"]);
        assert!(model.is_creator("u1"));
        assert!(!model.is_creator("u2"));
    }

    #[test]
    fn test_malformed_json_yields_empty_list() {
        assert!(json_strings(&json!({"a": 1})).is_empty());
        assert_eq!(search_tags_value(&["A".into(), "B".into()]), "A\nB");
    }
}
