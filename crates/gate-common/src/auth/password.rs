//! Password hashing and verification
//!
//! Uses Argon2id for password hashing (OWASP recommended).

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::AppError;

/// Hash a password using Argon2id
///
/// # Errors
/// Returns an error if hashing fails
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Password hashing failed: {e}")))
}

/// Verify a password against a stored hash
///
/// # Errors
/// Returns an error if the stored hash cannot be parsed
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid password hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Minimum accepted password length
const MIN_PASSWORD_LEN: usize = 8;

/// Validate password strength: length plus upper/lower/digit character classes
///
/// # Errors
/// Returns a validation error naming the first failed requirement
pub fn validate_password_strength(password: &str) -> Result<(), AppError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }

    let mut has_upper = false;
    let mut has_lower = false;
    let mut has_digit = false;
    for c in password.chars() {
        has_upper |= c.is_uppercase();
        has_lower |= c.is_lowercase();
        has_digit |= c.is_ascii_digit();
    }

    if !has_upper {
        return Err(AppError::Validation(
            "Password must contain at least one uppercase letter".to_string(),
        ));
    }
    if !has_lower {
        return Err(AppError::Validation(
            "Password must contain at least one lowercase letter".to_string(),
        ));
    }
    if !has_digit {
        return Err(AppError::Validation(
            "Password must contain at least one digit".to_string(),
        ));
    }

    Ok(())
}
