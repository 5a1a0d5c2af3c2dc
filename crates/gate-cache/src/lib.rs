//! # gate-cache
//!
//! Cache layer backed by Redis: connection pooling and the abuse-control
//! store. All abuse counters use atomic increment/expire primitives so that
//! concurrent failures may overcount (stricter lockout) but never undercount.

pub mod abuse;
pub mod pool;

pub use abuse::{AbuseState, AbuseStore};
pub use pool::{RedisPool, RedisPoolConfig, RedisPoolError, RedisResult};
