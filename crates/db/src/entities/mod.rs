//! Database entities.

#![allow(missing_docs)]

pub mod pending_registration;
pub mod topic;
pub mod topic_access;
pub mod topic_favorite;
pub mod user;
pub mod vote;

pub use pending_registration::Entity as PendingRegistration;
pub use topic::Entity as Topic;
pub use topic_access::Entity as TopicAccess;
pub use topic_favorite::Entity as TopicFavorite;
pub use user::Entity as User;
pub use vote::Entity as Vote;
