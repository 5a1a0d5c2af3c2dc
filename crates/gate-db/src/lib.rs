//! # gate-db
//!
//! Database layer implementing the repository traits with PostgreSQL via SQLx.
//!
//! ## Overview
//!
//! - Connection pool management
//! - Database models with SQLx `FromRow` derives
//! - Entity ↔ model mappers
//! - Repository implementations
//!
//! Every mutating session/link operation is a single guarded statement
//! (`UPDATE ... WHERE ... `, transactional `SELECT ... FOR UPDATE`), so two
//! concurrent callers can never interleave a read-then-write race. Storage
//! errors on these paths propagate and reject (fail closed).

pub mod mappers;
pub mod models;
pub mod pool;
pub mod repositories;

// Re-export commonly used types
pub use pool::{create_pool, DatabaseConfig, PgPool};
pub use repositories::{PgMagicLinkRepository, PgSessionRepository, PgUserRepository};
