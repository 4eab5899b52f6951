//! HTTP API layer for democrasite.
//!
//! This crate exposes the voting services as a JSON REST API:
//!
//! - **Endpoints**: authentication, profile, topics, votes, access lists and favorites
//! - **Extractors**: the authenticated user resolved from a bearer token
//! - **Middleware**: bearer token authentication
//!
//! Built on Axum 0.8. Every route is relative; the server mounts the router
//! under `/api`.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::{AppState, auth_middleware};
