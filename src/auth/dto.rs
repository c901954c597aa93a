use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::repo_types::User;

/// Request body for registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Body for forgot-password and resend-verification.
#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    #[serde(default)]
    pub email: String,
}

/// Request body for password reset.
#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub password: String,
}

/// Query string for the verification link.
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: String,
}

/// Public part of the user returned to clients. Never carries hashes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

/// Response to a successful registration. `verify_url` is only populated
/// outside production when no mail transport delivered the link.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    #[serde(rename = "requiresVerification")]
    pub requires_verification: bool,
    pub message: String,
    #[serde(rename = "verifyUrl", skip_serializing_if = "Option::is_none")]
    pub verify_url: Option<String>,
}

/// Generic message-only response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(rename = "resetUrl", skip_serializing_if = "Option::is_none")]
    pub reset_url: Option<String>,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            reset_url: None,
        }
    }
}

/// Response carrying the user projection (login, refresh, me).
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: PublicUser,
}

/// Response to a successful email verification.
#[derive(Debug, Serialize)]
pub struct VerifiedResponse {
    pub message: String,
    pub user: PublicUser,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_user_has_no_secret_fields() {
        let user = PublicUser {
            id: Uuid::new_v4(),
            email: "test@example.com".into(),
            name: "Test".into(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(!json.contains("password"));
        assert!(!json.contains("hash"));
    }

    #[test]
    fn register_response_omits_absent_verify_url() {
        let response = RegisterResponse {
            requires_verification: true,
            message: "ok".into(),
            verify_url: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("requiresVerification"));
        assert!(!json.contains("verifyUrl"));
    }
}
