//! Core business logic for democrasite.
//!
//! Services here own the rules of the system: who may see, vote on and
//! modify a topic, and how the denormalized vote and favorite counters stay
//! in step with the rows they summarize. Every multi-row mutation runs in a
//! single database transaction.

pub mod services;

pub use services::*;
