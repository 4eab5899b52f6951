//! Database repositories.

pub mod pending_registration;
pub mod topic;
pub mod topic_access;
pub mod topic_favorite;
pub mod user;
pub mod vote;

pub use pending_registration::PendingRegistrationRepository;
pub use topic::{TopicRepository, TopicSearchQuery, TopicSort};
pub use topic_access::TopicAccessRepository;
pub use topic_favorite::TopicFavoriteRepository;
pub use user::UserRepository;
pub use vote::VoteRepository;
