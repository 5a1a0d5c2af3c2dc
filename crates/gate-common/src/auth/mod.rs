//! Authentication primitives: tokens, CSRF, passwords

mod csrf;
mod password;
mod token;

pub use csrf::{constant_time_eq, CsrfManager};
pub use password::{hash_password, validate_password_strength, verify_password};
pub use token::{AccessClaims, MintedToken, RefreshClaims, TokenManager};
