//! Account registration and email verification.
//!
//! With verification disabled, accounts are created on the spot. Otherwise a
//! sign-up is parked in `pending_registration` until the emailed token comes
//! back; only then does a user row exist.

use std::sync::Arc;

use chrono::{Duration, Utc};
use democrasite_common::{AppError, AppResult, IdGenerator, config::RegistrationConfig};
use democrasite_db::{
    entities::{pending_registration, user},
    repositories::{PendingRegistrationRepository, UserRepository},
};
use sea_orm::{ConnectionTrait, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use super::{commit, email::VerificationMailer, user::hash_password};

fn check_available(existing: Option<&user::Model>, username: &str) -> AppResult<()> {
    match existing {
        Some(user) if user.username == username => Err(AppError::Conflict(
            "Username already registered".to_string(),
        )),
        Some(_) => Err(AppError::Conflict("Email already registered".to_string())),
        None => Ok(()),
    }
}

/// Sign-up request.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Outcome of a sign-up.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationOutcome {
    pub message: String,
    pub email_sent: bool,
    pub username: String,
    pub requires_verification: bool,
}

/// Generic acknowledgement.
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Registration service.
#[derive(Clone)]
pub struct RegistrationService {
    user_repo: UserRepository,
    pending_repo: PendingRegistrationRepository,
    mailer: Arc<dyn VerificationMailer>,
    config: RegistrationConfig,
    id_gen: IdGenerator,
}

impl RegistrationService {
    /// Create a new registration service.
    #[must_use]
    pub fn new(
        user_repo: UserRepository,
        pending_repo: PendingRegistrationRepository,
        mailer: Arc<dyn VerificationMailer>,
        config: RegistrationConfig,
    ) -> Self {
        Self {
            user_repo,
            pending_repo,
            mailer,
            config,
            id_gen: IdGenerator::new(),
        }
    }

    /// Fail with `Conflict` if an active user already holds the username or email.
    async fn ensure_available<C: ConnectionTrait>(
        &self,
        conn: &C,
        username: &str,
        email: &str,
    ) -> AppResult<()> {
        let existing = self
            .user_repo
            .find_by_username_or_email(conn, username, email)
            .await?;
        check_available(existing.as_ref(), username)
    }

    fn new_user(&self, username: String, email: String, password_hash: String) -> user::ActiveModel {
        user::ActiveModel {
            id: Set(self.id_gen.generate()),
            username: Set(username),
            email: Set(email),
            password_hash: Set(password_hash),
            created_at: Set(Utc::now().into()),
        }
    }

    fn token_expiry(&self) -> chrono::DateTime<Utc> {
        Utc::now() + Duration::hours(self.config.verification_token_ttl_hours)
    }

    /// Register a new account.
    pub async fn register(&self, input: RegisterInput) -> AppResult<RegistrationOutcome> {
        input.validate()?;

        let username = input.username.trim().to_lowercase();
        let email = input.email.trim().to_string();
        check_available(
            self.user_repo.find_registered(&username, &email).await?.as_ref(),
            &username,
        )?;

        let password_hash = hash_password(&input.password)?;

        if !self.config.require_email_verification {
            let txn = self.user_repo.begin().await?;
            self.ensure_available(&txn, &username, &email).await?;
            let user = self
                .user_repo
                .create(&txn, self.new_user(username, email, password_hash))
                .await?;
            commit(txn).await?;
            info!(user_id = %user.id, username = %user.username, "Registered user");

            return Ok(RegistrationOutcome {
                message: "Registration successful! You can now log in.".to_string(),
                email_sent: false,
                username: user.username,
                requires_verification: false,
            });
        }

        self.cleanup_expired_pending_registrations().await?;
        self.pending_repo
            .delete_by_username_or_email(&username, &email)
            .await?;

        let token = self.id_gen.generate_token();
        let pending = self
            .pending_repo
            .create(pending_registration::ActiveModel {
                id: Set(self.id_gen.generate()),
                username: Set(username.clone()),
                email: Set(email.clone()),
                password_hash: Set(password_hash),
                token: Set(token.clone()),
                expires_at: Set(self.token_expiry().into()),
                created_at: Set(Utc::now().into()),
            })
            .await?;

        if !self
            .mailer
            .send_verification_email(&email, &username, &token)
            .await
        {
            warn!(username = %username, "Verification email failed; discarding pending registration");
            self.pending_repo.delete_by_id(&pending.id).await?;
            return Err(AppError::ExternalService(
                "Failed to send verification email. Please try again.".to_string(),
            ));
        }

        info!(username = %username, "Created pending registration");
        Ok(RegistrationOutcome {
            message: "Registration successful! Please check your email to verify your account before logging in.".to_string(),
            email_sent: true,
            username,
            requires_verification: true,
        })
    }

    /// Turn a pending registration into a user.
    pub async fn verify_email(&self, token: &str) -> AppResult<user::Model> {
        if !self.config.require_email_verification {
            return Err(AppError::InvalidOperation(
                "Email verification is not enabled".to_string(),
            ));
        }

        let Some(pending) = self.pending_repo.find_by_token(token).await? else {
            return Err(AppError::Validation(
                "Invalid or expired verification token".to_string(),
            ));
        };

        if pending.is_expired(Utc::now().into()) {
            self.pending_repo.delete_by_id(&pending.id).await?;
            return Err(AppError::Validation(
                "Verification token has expired".to_string(),
            ));
        }

        let txn = self.user_repo.begin().await?;

        if let Err(e) = self
            .ensure_available(&txn, &pending.username, &pending.email)
            .await
        {
            self.pending_repo.delete(&txn, &pending.id).await?;
            commit(txn).await?;
            return Err(e);
        }

        let user = self
            .user_repo
            .create(
                &txn,
                self.new_user(
                    pending.username.clone(),
                    pending.email.clone(),
                    pending.password_hash.clone(),
                ),
            )
            .await?;
        self.pending_repo.delete(&txn, &pending.id).await?;
        commit(txn).await?;

        info!(user_id = %user.id, username = %user.username, "Verified email and created user");
        Ok(user)
    }

    /// Issue a fresh token for a pending registration and email it again.
    ///
    /// Unknown addresses get the same answer as known ones.
    pub async fn resend_verification(&self, email: &str) -> AppResult<MessageResponse> {
        const GENERIC: &str =
            "If a pending registration exists for this email, a new verification link has been sent.";

        if !self.config.require_email_verification {
            return Err(AppError::InvalidOperation(
                "Email verification is not enabled".to_string(),
            ));
        }

        let Some(pending) = self.pending_repo.find_by_email(email.trim()).await? else {
            return Ok(MessageResponse::new(GENERIC));
        };

        let token = self.id_gen.generate_token();
        let username = pending.username.clone();
        let address = pending.email.clone();

        let mut active: pending_registration::ActiveModel = pending.into();
        active.token = Set(token.clone());
        active.expires_at = Set(self.token_expiry().into());
        self.pending_repo.update(active).await?;

        if !self
            .mailer
            .send_verification_email(&address, &username, &token)
            .await
        {
            return Err(AppError::ExternalService(
                "Failed to send verification email. Please try again.".to_string(),
            ));
        }

        info!(username = %username, "Resent verification email");
        Ok(MessageResponse::new(GENERIC))
    }

    /// Delete pending registrations whose token has expired.
    pub async fn cleanup_expired_pending_registrations(&self) -> AppResult<u64> {
        let removed = self.pending_repo.delete_expired(Utc::now().into()).await?;
        if removed > 0 {
            info!(removed, "Removed expired pending registrations");
        }
        Ok(removed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::test_support::{Fixture, RecordingMailer};

    fn input(username: &str, email: &str) -> RegisterInput {
        RegisterInput {
            username: username.to_string(),
            email: email.to_string(),
            password: "password123".to_string(),
        }
    }

    fn config(require_email_verification: bool) -> RegistrationConfig {
        RegistrationConfig {
            require_email_verification,
            ..RegistrationConfig::default()
        }
    }

    #[tokio::test]
    async fn test_register_without_verification() {
        let fx = Fixture::new().await;
        let mailer = RecordingMailer::new(true);
        let service = fx.registration(config(false), mailer.clone());

        let outcome = service
            .register(input("Alice", "alice@example.com"))
            .await
            .unwrap();
        assert_eq!(outcome.username, "alice");
        assert!(!outcome.requires_verification);
        assert!(!outcome.email_sent);
        assert!(mailer.sent().is_empty());
        assert!(fx.user_repo.find_by_username("alice").await.unwrap().is_some());

        let duplicate = service.register(input("ALICE", "other@example.com")).await;
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));

        let duplicate = service.register(input("other", "alice@example.com")).await;
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let fx = Fixture::new().await;
        let service = fx.registration(config(false), RecordingMailer::new(true));

        for bad in [
            input("al", "alice@example.com"),
            input("alice", "not-an-email"),
            RegisterInput {
                password: "short".to_string(),
                ..input("alice", "alice@example.com")
            },
        ] {
            assert!(matches!(
                service.register(bad).await,
                Err(AppError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_verification_flow() {
        let fx = Fixture::new().await;
        let mailer = RecordingMailer::new(true);
        let service = fx.registration(config(true), mailer.clone());

        let outcome = service
            .register(input("alice", "alice@example.com"))
            .await
            .unwrap();
        assert!(outcome.requires_verification);
        assert!(outcome.email_sent);
        assert!(fx.user_repo.find_by_username("alice").await.unwrap().is_none());

        let token = mailer.sent()[0].1.clone();
        let user = service.verify_email(&token).await.unwrap();
        assert_eq!(user.username, "alice");
        assert!(fx.pending_repo.find_by_token(&token).await.unwrap().is_none());

        let reused = service.verify_email(&token).await;
        assert!(matches!(reused, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_failed_email_discards_pending_row() {
        let fx = Fixture::new().await;
        let service = fx.registration(config(true), RecordingMailer::new(false));

        let result = service.register(input("alice", "alice@example.com")).await;
        assert!(matches!(result, Err(AppError::ExternalService(_))));
        assert!(
            fx.pending_repo
                .find_by_email("alice@example.com")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_reregistering_replaces_pending_row() {
        let fx = Fixture::new().await;
        let mailer = RecordingMailer::new(true);
        let service = fx.registration(config(true), mailer.clone());

        service
            .register(input("alice", "alice@example.com"))
            .await
            .unwrap();
        service
            .register(input("alice", "alice@example.com"))
            .await
            .unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert!(fx.pending_repo.find_by_token(&sent[0].1).await.unwrap().is_none());
        assert!(fx.pending_repo.find_by_token(&sent[1].1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expired_token_is_removed() {
        let fx = Fixture::new().await;
        let mailer = RecordingMailer::new(true);
        let service = fx.registration(
            RegistrationConfig {
                verification_token_ttl_hours: -1,
                ..config(true)
            },
            mailer.clone(),
        );

        service
            .register(input("alice", "alice@example.com"))
            .await
            .unwrap();
        let token = mailer.sent()[0].1.clone();

        let result = service.verify_email(&token).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(fx.pending_repo.find_by_token(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let fx = Fixture::new().await;
        let mailer = RecordingMailer::new(true);
        let expired = fx.registration(
            RegistrationConfig {
                verification_token_ttl_hours: -1,
                ..config(true)
            },
            mailer.clone(),
        );

        expired
            .register(input("alice", "alice@example.com"))
            .await
            .unwrap();
        expired
            .register(input("bob", "bob@example.com"))
            .await
            .unwrap();

        // Each registration sweeps earlier expired rows, so one remains.
        assert_eq!(expired.cleanup_expired_pending_registrations().await.unwrap(), 1);
        assert_eq!(expired.cleanup_expired_pending_registrations().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_verify_conflict_discards_pending_row() {
        let fx = Fixture::new().await;
        let mailer = RecordingMailer::new(true);
        let service = fx.registration(config(true), mailer.clone());

        service
            .register(input("alice", "alice@example.com"))
            .await
            .unwrap();
        let token = mailer.sent()[0].1.clone();

        fx.user("alice").await;

        let result = service.verify_email(&token).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert!(fx.pending_repo.find_by_token(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resend_verification() {
        let fx = Fixture::new().await;
        let mailer = RecordingMailer::new(true);
        let service = fx.registration(config(true), mailer.clone());

        service
            .register(input("alice", "alice@example.com"))
            .await
            .unwrap();
        let unknown = service.resend_verification("ghost@example.com").await.unwrap();
        let known = service.resend_verification("alice@example.com").await.unwrap();
        assert_eq!(unknown.message, known.message);

        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_ne!(sent[0].1, sent[1].1);
        assert!(service.verify_email(&sent[0].1).await.is_err());
        service.verify_email(&sent[1].1).await.unwrap();
    }

    #[tokio::test]
    async fn test_verify_disabled() {
        let fx = Fixture::new().await;
        let service = fx.registration(config(false), RecordingMailer::new(true));
        assert!(matches!(
            service.verify_email("token").await,
            Err(AppError::InvalidOperation(_))
        ));
    }
}
