//! Repository implementations
//!
//! PostgreSQL implementations of the repository traits defined in gate-core.

mod error;
mod magic_link;
mod session;
mod user;

pub use magic_link::PgMagicLinkRepository;
pub use session::PgSessionRepository;
pub use user::PgUserRepository;
