//! Identity service: credentials, sessions, profile stats and account removal.

use std::collections::{BTreeSet, HashSet};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, FixedOffset};
use democrasite_common::{AppError, AppResult};
use democrasite_db::{
    entities::user,
    repositories::{
        TopicAccessRepository, TopicFavoriteRepository, TopicRepository, UserRepository,
        VoteRepository,
    },
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    commit,
    token::TokenService,
    topic::TopicCascade,
};

/// Login credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

/// Issued access token.
#[derive(Debug, Clone, Serialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: &'static str,
}

/// Public profile of the current user.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub username: String,
    pub email: String,
    pub created_at: DateTime<FixedOffset>,
}

impl From<user::Model> for UserProfile {
    fn from(user: user::Model) -> Self {
        Self {
            username: user.username,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

/// Activity counters for a user.
#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub username: String,
    pub created_at: DateTime<FixedOffset>,
    pub topics_created: u64,
    pub votes_cast: u64,
    pub favorite_topics: u64,
}

/// Outcome of deleting an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccountDeletionResult {
    pub topics_deleted: u64,
    pub votes_deleted: u64,
}

/// User service.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    topic_repo: TopicRepository,
    vote_repo: VoteRepository,
    favorite_repo: TopicFavoriteRepository,
    access_repo: TopicAccessRepository,
    cascade: TopicCascade,
    tokens: TokenService,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub fn new(
        user_repo: UserRepository,
        topic_repo: TopicRepository,
        vote_repo: VoteRepository,
        favorite_repo: TopicFavoriteRepository,
        access_repo: TopicAccessRepository,
        tokens: TokenService,
    ) -> Self {
        Self {
            cascade: TopicCascade::new(
                topic_repo.clone(),
                vote_repo.clone(),
                access_repo.clone(),
                favorite_repo.clone(),
            ),
            user_repo,
            topic_repo,
            vote_repo,
            favorite_repo,
            access_repo,
            tokens,
        }
    }

    /// Check credentials. Unknown users and wrong passwords are indistinguishable.
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<user::Model> {
        let Some(user) = self.user_repo.find_by_username(username.trim()).await? else {
            return Err(AppError::Unauthorized);
        };

        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::Unauthorized);
        }

        Ok(user)
    }

    /// Authenticate and issue an access token.
    pub async fn login(&self, input: &LoginInput) -> AppResult<AccessToken> {
        let user = self.authenticate(&input.username, &input.password).await?;
        let access_token = self.tokens.issue(&user.username)?;

        debug!(user_id = %user.id, "Issued access token");
        Ok(AccessToken {
            access_token,
            token_type: "bearer",
        })
    }

    /// Resolve a bearer token to its user.
    pub async fn resolve_token(&self, token: &str) -> AppResult<user::Model> {
        let username = self.tokens.verify(token)?;
        self.user_repo
            .find_by_username(&username)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    /// Activity counters for a user.
    pub async fn stats(&self, user: &user::Model) -> AppResult<UserStats> {
        Ok(UserStats {
            username: user.username.clone(),
            created_at: user.created_at,
            topics_created: self.topic_repo.count_by_creator(&user.id).await?,
            votes_cast: self.vote_repo.count_by_user(&user.id).await?,
            favorite_topics: self.favorite_repo.count_by_user(&user.id).await?,
        })
    }

    /// Delete an account and everything it owns, in one transaction.
    ///
    /// Counters on other users' topics are decremented for the removed votes
    /// and favorites.
    pub async fn delete_account(&self, user_id: &str) -> AppResult<AccountDeletionResult> {
        let txn = self.topic_repo.begin().await?;

        let own_topics = self.topic_repo.find_by_creator(&txn, user_id).await?;
        let own_ids: HashSet<&str> = own_topics.iter().map(|t| t.id.as_str()).collect();

        let votes = self.vote_repo.find_by_user(&txn, user_id).await?;
        let favorites = self.favorite_repo.find_by_user(&txn, user_id).await?;

        // Lock every touched topic in id order so concurrent deletions agree.
        let touched: BTreeSet<&str> = own_ids
            .iter()
            .copied()
            .chain(votes.iter().map(|v| v.topic_id.as_str()))
            .chain(favorites.iter().map(|f| f.topic_id.as_str()))
            .collect();
        for topic_id in &touched {
            match self.topic_repo.lock(&txn, topic_id).await {
                // Deleted by a concurrent cascade; its rows are already gone.
                Ok(_) | Err(AppError::TopicNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        let voted_topics: BTreeSet<&str> = votes
            .iter()
            .map(|v| v.topic_id.as_str())
            .filter(|id| !own_ids.contains(id))
            .collect();
        for topic_id in &voted_topics {
            self.topic_repo.decrement_vote_count(&txn, topic_id).await?;
        }
        let votes_deleted = self.vote_repo.delete_by_user(&txn, user_id).await?;

        for favorite in favorites
            .iter()
            .filter(|f| !own_ids.contains(f.topic_id.as_str()))
        {
            self.topic_repo
                .decrement_favorite_count(&txn, &favorite.topic_id)
                .await?;
        }
        self.favorite_repo.delete_by_user(&txn, user_id).await?;

        for topic in &own_topics {
            self.cascade.delete(&txn, &topic.id).await?;
        }

        self.access_repo.delete_by_user(&txn, user_id).await?;
        self.user_repo.delete(&txn, user_id).await?;

        commit(txn).await?;

        let result = AccountDeletionResult {
            topics_deleted: own_topics.len() as u64,
            votes_deleted,
        };
        info!(
            user_id = %user_id,
            topics_deleted = result.topics_deleted,
            votes_deleted = result.votes_deleted,
            "Deleted account"
        );
        Ok(result)
    }
}

/// Hash a password using Argon2.
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::test_support::{Fixture, TopicOptions};

    #[test]
    fn test_hash_password() {
        let hash = hash_password("test_password_123").unwrap();
        assert!(hash.starts_with("$argon2"));
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("test_password_123").unwrap();
        assert!(verify_password("test_password_123", &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        assert!(matches!(
            verify_password("password", "not-a-hash"),
            Err(AppError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn test_login_and_resolve() {
        let fx = Fixture::new().await;
        fx.user_with_password("alice", "correct horse").await;

        let token = fx
            .users
            .login(&LoginInput {
                username: "Alice".to_string(),
                password: "correct horse".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(token.token_type, "bearer");

        let user = fx.users.resolve_token(&token.access_token).await.unwrap();
        assert_eq!(user.username, "alice");

        let wrong = fx
            .users
            .login(&LoginInput {
                username: "alice".to_string(),
                password: "battery staple".to_string(),
            })
            .await;
        assert!(matches!(wrong, Err(AppError::Unauthorized)));

        let unknown = fx
            .users
            .login(&LoginInput {
                username: "ghost".to_string(),
                password: "correct horse".to_string(),
            })
            .await;
        assert!(matches!(unknown, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_stats() {
        let fx = Fixture::new().await;
        let alice = fx.user("alice").await;
        let topic = fx
            .topic(&alice, TopicOptions::public().multi_select())
            .await;
        fx.votes
            .submit_vote(
                &topic.share_code,
                &alice.id,
                &["Yes".to_string(), "No".to_string()],
            )
            .await
            .unwrap();

        let stats = fx.users.stats(&alice).await.unwrap();
        assert_eq!(stats.topics_created, 1);
        assert_eq!(stats.votes_cast, 2);
        assert_eq!(stats.favorite_topics, 1);
    }

    #[tokio::test]
    async fn test_delete_account_adjusts_other_topics() {
        let fx = Fixture::new().await;
        let alice = fx.user("alice").await;
        let bob = fx.user("bob").await;
        let alices = fx.topic(&alice, TopicOptions::public()).await;
        let bobs = fx.topic(&bob, TopicOptions::public()).await;

        fx.votes
            .submit_vote(&alices.share_code, &bob.id, &["Yes".to_string()])
            .await
            .unwrap();
        fx.votes
            .submit_vote(&bobs.share_code, &bob.id, &["No".to_string()])
            .await
            .unwrap();
        fx.votes
            .submit_vote(&bobs.share_code, &alice.id, &["Yes".to_string()])
            .await
            .unwrap();
        fx.favorites.add(&bobs.share_code, &alice.id).await.unwrap();

        let result = fx.users.delete_account(&alice.id).await.unwrap();
        assert_eq!(
            result,
            AccountDeletionResult {
                topics_deleted: 1,
                votes_deleted: 1,
            }
        );

        let bobs = fx.reload(&bobs).await;
        assert_eq!(bobs.vote_count, 1);
        assert_eq!(bobs.favorite_count, 1);
        assert!(fx.topic_repo.find_by_share_code(&alices.share_code).await.unwrap().is_none());
        assert!(fx.user_repo.find_by_username("alice").await.unwrap().is_none());
        assert_eq!(fx.vote_repo.count_by_user(&bob.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_account_deletions_with_crossed_votes() {
        let fx = Fixture::new().await;
        let alice = fx.user("alice").await;
        let bob = fx.user("bob").await;
        let carol = fx.user("carol").await;
        let alices = fx.topic(&alice, TopicOptions::public()).await;
        let bobs = fx.topic(&bob, TopicOptions::public()).await;
        let mut carols = Vec::new();
        for _ in 0..3 {
            carols.push(fx.topic(&carol, TopicOptions::public()).await);
        }
        let yes = ["Yes".to_string()];

        for topic in carols.iter().chain([&alices, &bobs]) {
            fx.votes.submit_vote(&topic.share_code, &alice.id, &yes).await.unwrap();
            fx.votes.submit_vote(&topic.share_code, &bob.id, &yes).await.unwrap();
        }
        fx.votes
            .submit_vote(&carols[0].share_code, &carol.id, &yes)
            .await
            .unwrap();
        for topic in &carols {
            fx.favorites.add(&topic.share_code, &alice.id).await.unwrap();
        }

        let (a, b) = tokio::join!(
            fx.users.delete_account(&alice.id),
            fx.users.delete_account(&bob.id),
        );
        a.unwrap();
        b.unwrap();

        let mut counts = Vec::new();
        for topic in &carols {
            let stored = fx.reload(topic).await;
            counts.push((stored.vote_count, stored.favorite_count));
        }
        assert_eq!(counts, vec![(1, 1), (0, 1), (0, 1)]);
        assert_eq!(fx.vote_repo.count_by_user(&carol.id).await.unwrap(), 1);
    }
}
