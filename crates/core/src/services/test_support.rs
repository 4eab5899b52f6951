//! Shared fixtures for service tests.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use democrasite_common::{IdGenerator, config::{AuthConfig, RegistrationConfig}};
use democrasite_db::{
    entities::{topic, user},
    repositories::{
        PendingRegistrationRepository, TopicAccessRepository, TopicFavoriteRepository,
        TopicRepository, UserRepository, VoteRepository,
    },
    test_utils::TestDatabase,
};
use sea_orm::Set;

use super::{
    AccessControl, CreateTopicInput, FavoriteService, RegistrationService, SearchService,
    TokenService, TopicAccessService, TopicService, UserService, VoteService,
    email::VerificationMailer, user::hash_password,
};

/// Builder for topics created through `TopicService`.
#[derive(Debug, Clone)]
pub struct TopicOptions {
    input: CreateTopicInput,
}

impl TopicOptions {
    pub fn public() -> Self {
        Self {
            input: CreateTopicInput {
                title: "Should we?".to_string(),
                description: None,
                answers: vec!["Yes".to_string(), "No".to_string()],
                is_public: true,
                is_editable: false,
                allow_multi_select: false,
                allowed_users: vec![],
                tags: vec![],
            },
        }
    }

    pub fn private() -> Self {
        let mut options = Self::public();
        options.input.is_public = false;
        options
    }

    pub fn title(mut self, title: &str) -> Self {
        self.input.title = title.to_string();
        self
    }

    pub fn answers(mut self, answers: &[&str]) -> Self {
        self.input.answers = answers.iter().map(ToString::to_string).collect();
        self
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.input.tags = tags.iter().map(ToString::to_string).collect();
        self
    }

    pub fn allowed(mut self, usernames: &[&str]) -> Self {
        self.input.allowed_users = usernames.iter().map(ToString::to_string).collect();
        self
    }

    pub fn editable(mut self) -> Self {
        self.input.is_editable = true;
        self
    }

    pub fn multi_select(mut self) -> Self {
        self.input.allow_multi_select = true;
        self
    }

    pub fn input(self) -> CreateTopicInput {
        self.input
    }
}

/// Mailer that records `(recipient, token)` pairs.
#[derive(Clone)]
pub struct RecordingMailer {
    succeed: bool,
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingMailer {
    pub fn new(succeed: bool) -> Self {
        Self {
            succeed,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl VerificationMailer for RecordingMailer {
    async fn send_verification_email(&self, to: &str, _username: &str, token: &str) -> bool {
        if self.succeed {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), token.to_string()));
        }
        self.succeed
    }
}

/// A migrated in-memory database with every service wired to it.
pub struct Fixture {
    pub db: TestDatabase,
    pub user_repo: UserRepository,
    pub pending_repo: PendingRegistrationRepository,
    pub topic_repo: TopicRepository,
    pub access_repo: TopicAccessRepository,
    pub vote_repo: VoteRepository,
    pub favorite_repo: TopicFavoriteRepository,
    pub access: AccessControl,
    pub topics: TopicService,
    pub votes: VoteService,
    pub access_lists: TopicAccessService,
    pub favorites: FavoriteService,
    pub search: SearchService,
    pub users: UserService,
}

impl Fixture {
    pub async fn new() -> Self {
        let db = TestDatabase::new().await.unwrap();
        let conn = db.shared();

        let user_repo = UserRepository::new(conn.clone());
        let pending_repo = PendingRegistrationRepository::new(conn.clone());
        let topic_repo = TopicRepository::new(conn.clone());
        let access_repo = TopicAccessRepository::new(conn.clone());
        let vote_repo = VoteRepository::new(conn.clone());
        let favorite_repo = TopicFavoriteRepository::new(conn);

        let tokens = TokenService::new(&AuthConfig {
            jwt_secret: "test-secret".to_string(),
            token_ttl_minutes: 30,
        });

        Self {
            access: AccessControl::new(access_repo.clone()),
            topics: TopicService::new(
                topic_repo.clone(),
                user_repo.clone(),
                access_repo.clone(),
                vote_repo.clone(),
                favorite_repo.clone(),
            ),
            votes: VoteService::new(topic_repo.clone(), vote_repo.clone(), access_repo.clone()),
            access_lists: TopicAccessService::new(
                topic_repo.clone(),
                user_repo.clone(),
                access_repo.clone(),
                vote_repo.clone(),
            ),
            favorites: FavoriteService::new(
                favorite_repo.clone(),
                topic_repo.clone(),
                user_repo.clone(),
            ),
            search: SearchService::new(topic_repo.clone(), user_repo.clone()),
            users: UserService::new(
                user_repo.clone(),
                topic_repo.clone(),
                vote_repo.clone(),
                favorite_repo.clone(),
                access_repo.clone(),
                tokens,
            ),
            db,
            user_repo,
            pending_repo,
            topic_repo,
            access_repo,
            vote_repo,
            favorite_repo,
        }
    }

    pub fn registration(
        &self,
        config: RegistrationConfig,
        mailer: RecordingMailer,
    ) -> RegistrationService {
        RegistrationService::new(
            self.user_repo.clone(),
            self.pending_repo.clone(),
            Arc::new(mailer),
            config,
        )
    }

    async fn insert_user(&self, username: &str, password_hash: String) -> user::Model {
        self.user_repo
            .create(
                self.db.connection(),
                user::ActiveModel {
                    id: Set(IdGenerator::new().generate()),
                    username: Set(username.to_string()),
                    email: Set(format!("{username}@example.com")),
                    password_hash: Set(password_hash),
                    created_at: Set(Utc::now().into()),
                },
            )
            .await
            .unwrap()
    }

    /// Insert a user whose password is never checked.
    pub async fn user(&self, username: &str) -> user::Model {
        self.insert_user(username, "unused".to_string()).await
    }

    pub async fn user_with_password(&self, username: &str, password: &str) -> user::Model {
        self.insert_user(username, hash_password(password).unwrap())
            .await
    }

    pub async fn topic(&self, creator: &user::Model, options: TopicOptions) -> topic::Model {
        self.topics.create(creator, options.input()).await.unwrap()
    }

    /// Re-read a topic's stored row.
    pub async fn reload(&self, topic: &topic::Model) -> topic::Model {
        self.topic_repo
            .get_by_share_code(&topic.share_code)
            .await
            .unwrap()
    }
}
