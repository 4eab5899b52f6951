//! Business logic services.

#![allow(missing_docs)]

pub mod access;
pub mod email;
pub mod favorite;
pub mod registration;
pub mod search;
pub mod token;
pub mod topic;
pub mod topic_access;
pub mod user;
pub mod vote;

#[cfg(test)]
pub(crate) mod test_support;

pub use access::AccessControl;
pub use email::{NoOpMailer, SmtpMailer, VerificationMailer};
pub use favorite::FavoriteService;
pub use registration::{MessageResponse, RegisterInput, RegistrationOutcome, RegistrationService};
pub use search::{SearchPage, SearchParams, SearchService, TopicSummary};
pub use token::{Claims, TokenService};
pub use topic::{
    AddOptionResult, CreateTopicInput, DeleteTopicResult, TopicCascade, TopicService, TopicView,
};
pub use topic_access::{AccessList, GrantResult, LeaveResult, RevokeResult, TopicAccessService};
pub use user::{
    AccessToken, AccountDeletionResult, LoginInput, UserProfile, UserService, UserStats,
};
pub use vote::VoteService;

use democrasite_common::{AppError, AppResult};
use sea_orm::DatabaseTransaction;

/// Commit a transaction, mapping the driver error.
pub(crate) async fn commit(txn: DatabaseTransaction) -> AppResult<()> {
    txn.commit()
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}
