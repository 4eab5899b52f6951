//! Database integration tests.
//!
//! These run against an in-memory `SQLite` database migrated with the
//! production migrator.

#![allow(clippy::unwrap_used)]

use chrono::Utc;
use democrasite_db::{
    entities::{topic, user},
    repositories::{
        TopicAccessRepository, TopicRepository, TopicSearchQuery, TopicSort, UserRepository,
        VoteRepository,
    },
    test_utils::TestDatabase,
};
use sea_orm::{Set, TransactionTrait};
use serde_json::json;

async fn insert_user(db: &TestDatabase, id: &str, username: &str) -> user::Model {
    let repo = UserRepository::new(db.shared());
    repo.create(
        db.connection(),
        user::ActiveModel {
            id: Set(id.to_string()),
            username: Set(username.to_string()),
            email: Set(format!("{username}@example.com")),
            password_hash: Set("hash".to_string()),
            created_at: Set(Utc::now().into()),
        },
    )
    .await
    .unwrap()
}

async fn insert_topic(
    db: &TestDatabase,
    id: &str,
    share_code: &str,
    title: &str,
    creator_id: &str,
    is_public: bool,
    tags: &[&str],
) -> topic::Model {
    let repo = TopicRepository::new(db.shared());
    let tags: Vec<String> = tags.iter().map(ToString::to_string).collect();
    repo.create(
        db.connection(),
        topic::ActiveModel {
            id: Set(id.to_string()),
            share_code: Set(share_code.to_string()),
            title: Set(title.to_string()),
            description: Set(None),
            creator_id: Set(creator_id.to_string()),
            answers: Set(json!(["Yes", "No"])),
            is_public: Set(is_public),
            is_editable: Set(false),
            allow_multi_select: Set(false),
            tags: Set(json!(tags)),
            search_tags: Set(topic::search_tags_value(&tags)),
            vote_count: Set(0),
            favorite_count: Set(0),
            created_at: Set(Utc::now().into()),
        },
    )
    .await
    .unwrap()
}

fn query(viewer: &str) -> TopicSearchQuery {
    TopicSearchQuery {
        viewer_id: viewer.to_string(),
        title: None,
        tags: vec![],
        sort: TopicSort::Popular,
        offset: 0,
        limit: 20,
    }
}

#[tokio::test]
async fn test_migrations_apply() {
    let db = TestDatabase::new().await.unwrap();
    let repo = UserRepository::new(db.shared());
    assert!(repo.find_by_username("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn test_search_visibility() {
    let db = TestDatabase::new().await.unwrap();
    insert_user(&db, "u1", "alice").await;
    insert_user(&db, "u2", "bob").await;
    insert_user(&db, "u3", "carol").await;

    insert_topic(&db, "t1", "PUBLIC01", "Public", "u1", true, &[]).await;
    insert_topic(&db, "t2", "PRIVAT01", "Alice only", "u1", false, &[]).await;
    insert_topic(&db, "t3", "PRIVAT02", "Shared with bob", "u1", false, &[]).await;

    let access = TopicAccessRepository::new(db.shared());
    assert!(access.grant(db.connection(), "t3", "u2").await.unwrap());
    assert!(!access.grant(db.connection(), "t3", "u2").await.unwrap());

    let repo = TopicRepository::new(db.shared());

    let (_, total) = repo.search(&query("u1")).await.unwrap();
    assert_eq!(total, 3);

    let (topics, total) = repo.search(&query("u2")).await.unwrap();
    assert_eq!(total, 2);
    assert!(topics.iter().all(|t| t.id != "t2"));

    let (topics, total) = repo.search(&query("u3")).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(topics[0].id, "t1");
}

#[tokio::test]
async fn test_search_filters() {
    let db = TestDatabase::new().await.unwrap();
    insert_user(&db, "u1", "alice").await;

    insert_topic(&db, "t1", "AAAA0001", "Best team", "u1", true, &["SPORTS"]).await;
    insert_topic(&db, "t2", "AAAA0002", "Best album", "u1", true, &["MUSIC", "ROCK"]).await;
    insert_topic(&db, "t3", "AAAA0003", "Best pizza", "u1", true, &["FOOD"]).await;

    let repo = TopicRepository::new(db.shared());

    let mut q = query("u1");
    q.tags = vec!["sports".to_string(), "music".to_string()];
    let (topics, total) = repo.search(&q).await.unwrap();
    assert_eq!(total, 2);
    assert!(topics.iter().all(|t| t.id != "t3"));

    let mut q = query("u1");
    q.title = Some("PIZZA".to_string());
    let (topics, _) = repo.search(&q).await.unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0].id, "t3");

    // Title filter also matches share code and tags
    let mut q = query("u1");
    q.title = Some("aaaa0002".to_string());
    assert_eq!(repo.search(&q).await.unwrap().1, 1);

    let mut q = query("u1");
    q.title = Some("roc".to_string());
    assert_eq!(repo.search(&q).await.unwrap().1, 1);

    // Wildcards are literal
    let mut q = query("u1");
    q.title = Some("%".to_string());
    assert_eq!(repo.search(&q).await.unwrap().1, 0);
}

#[tokio::test]
async fn test_search_alphabetical_and_ties() {
    let db = TestDatabase::new().await.unwrap();
    insert_user(&db, "u1", "alice").await;

    insert_topic(&db, "t1", "AAAA0001", "banana", "u1", true, &[]).await;
    insert_topic(&db, "t2", "AAAA0002", "Apple", "u1", true, &[]).await;
    insert_topic(&db, "t3", "AAAA0003", "cherry", "u1", true, &[]).await;

    let repo = TopicRepository::new(db.shared());

    let mut q = query("u1");
    q.sort = TopicSort::Alphabetical;
    let (topics, _) = repo.search(&q).await.unwrap();
    let titles: Vec<&str> = topics.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Apple", "banana", "cherry"]);

    // Equal vote counts fall back to id order
    let (topics, _) = repo.search(&query("u1")).await.unwrap();
    let ids: Vec<&str> = topics.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["t1", "t2", "t3"]);

    let mut q = query("u1");
    q.offset = 2;
    q.limit = 2;
    let (topics, total) = repo.search(&q).await.unwrap();
    assert_eq!(total, 3);
    assert_eq!(topics.len(), 1);
}

#[tokio::test]
async fn test_search_offset_past_end_is_empty() {
    let db = TestDatabase::new().await.unwrap();
    insert_user(&db, "u1", "alice").await;
    insert_topic(&db, "t1", "AAAA0001", "banana", "u1", true, &[]).await;

    let repo = TopicRepository::new(db.shared());

    let mut q = query("u1");
    q.offset = u64::MAX;
    let (topics, total) = repo.search(&q).await.unwrap();
    assert_eq!(total, 1);
    assert!(topics.is_empty());
}

#[tokio::test]
async fn test_counter_decrement_clamps_at_zero() {
    let db = TestDatabase::new().await.unwrap();
    insert_user(&db, "u1", "alice").await;
    insert_topic(&db, "t1", "AAAA0001", "Counter", "u1", true, &[]).await;

    let repo = TopicRepository::new(db.shared());

    let txn = repo.begin().await.unwrap();
    repo.increment_vote_count(&txn, "t1").await.unwrap();
    repo.decrement_vote_count(&txn, "t1").await.unwrap();
    repo.decrement_vote_count(&txn, "t1").await.unwrap();
    repo.decrement_favorite_count(&txn, "t1").await.unwrap();
    txn.commit().await.unwrap();

    let topic = repo.get_by_share_code("AAAA0001").await.unwrap();
    assert_eq!(topic.vote_count, 0);
    assert_eq!(topic.favorite_count, 0);
}

#[tokio::test]
async fn test_rolled_back_votes_are_not_visible() {
    let db = TestDatabase::new().await.unwrap();
    insert_user(&db, "u1", "alice").await;
    insert_topic(&db, "t1", "AAAA0001", "Rollback", "u1", true, &[]).await;

    let votes = VoteRepository::new(db.shared());

    let txn = db.connection().begin().await.unwrap();
    votes
        .insert_choices(&txn, "t1", "u1", &["Yes".to_string()])
        .await
        .unwrap();
    txn.rollback().await.unwrap();

    assert!(votes.find_by_topic("t1").await.unwrap().is_empty());
}
