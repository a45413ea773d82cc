//! Repository layer
//!
//! Narrow interfaces over the user and session tables. These are the only
//! shared mutable resources; every mutation goes through one of these
//! adapter operations, each atomic at single-record or single-filtered-update
//! granularity.

pub mod session;
pub mod user;

pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
