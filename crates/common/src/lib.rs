//! Common utilities and shared types for democrasite.
//!
//! This crate provides foundational components used across all democrasite crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based internal identifiers, topic share codes and
//!   verification tokens via [`IdGenerator`]
//!
//! # Example
//!
//! ```no_run
//! use democrasite_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let code = id_gen.generate_share_code();
//!     println!("Share code for {}: {}", config.server.url, code);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
