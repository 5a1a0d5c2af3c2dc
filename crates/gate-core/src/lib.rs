//! # gate-core
//!
//! Domain layer containing entities, value objects, and repository traits for the
//! authentication core. This crate has zero dependencies on infrastructure
//! (database, web framework, etc.).

pub mod entities;
pub mod error;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{JtiStatus, MagicLink, Session, SessionState, User};
pub use error::DomainError;
pub use traits::{
    MagicLinkConsumeOutcome, MagicLinkRepository, RepoResult, SessionRepository, UserRepository,
};
pub use value_objects::{device_hash, ip_cidr};
