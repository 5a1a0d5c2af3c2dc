//! Abuse-control store

mod abuse_store;

pub use abuse_store::{AbuseState, AbuseStore};
