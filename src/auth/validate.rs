use lazy_static::lazy_static;
use regex::Regex;

use crate::auth::error::AuthError;

/// Normalize an email for lookup and uniqueness checks.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn validate_name(name: &str) -> Result<(), AuthError> {
    if name.trim().chars().count() < 2 {
        return Err(AuthError::Validation(
            "Name must be at least 2 characters".into(),
        ));
    }
    Ok(())
}

/// Password rules: 8-128 characters, at least one letter and one digit.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if len < 8 {
        return Err(AuthError::Validation(
            "Password must be at least 8 characters".into(),
        ));
    }
    if len > 128 {
        return Err(AuthError::Validation(
            "Password must be at most 128 characters".into(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err(AuthError::Validation(
            "Password must contain a letter".into(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AuthError::Validation("Password must contain a digit".into()));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), AuthError> {
    if !is_valid_email(email) {
        return Err(AuthError::Validation("Invalid email".into()));
    }
    Ok(())
}
