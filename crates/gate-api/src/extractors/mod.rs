//! Request extractors

mod auth;
mod client;
mod validated;

pub use auth::AuthUser;
pub use client::Client;
pub use validated::ValidatedJson;
