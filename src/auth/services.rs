use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use axum::extract::FromRef;

use crate::{
    auth::{
        dto::{MessageResponse, PublicUser, RegisterRequest, RegisterResponse},
        error::AuthError,
        password::{hash_password, verify_password},
        repo::is_unique_violation,
        repo_types::User,
        tokens::{generate_token, hash_token, JwtKeys},
        validate::{normalize_email, validate_email, validate_name, validate_password},
    },
    config::Environment,
    db::AppState,
    mail::Mailer,
};

const VERIFY_TOKEN_TTL_HOURS: i64 = 24;
const RESET_TOKEN_TTL_HOURS: i64 = 1;

const GENERIC_RESEND_MESSAGE: &str =
    "If that email is registered and unverified, a verification email has been sent";
const GENERIC_FORGOT_MESSAGE: &str =
    "If that email is registered, a password reset email has been sent";

/// A freshly issued token pair, ready for the session transport.
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

pub fn build_verify_url(base_url: &str, token: &str) -> String {
    format!("{}/verify-email?token={token}", base_url.trim_end_matches('/'))
}

pub fn build_reset_url(base_url: &str, token: &str) -> String {
    format!("{}/reset-password?token={token}", base_url.trim_end_matches('/'))
}

/// Try to deliver a link by email. Returns the link itself when it should
/// be exposed in the response instead: no transport configured or delivery
/// failed, and we are not in production. Delivery problems never bubble up
/// to the caller.
async fn deliver_link(
    mailer: Option<&dyn Mailer>,
    env: Environment,
    to: &str,
    subject: &str,
    link: &str,
) -> Option<String> {
    if let Some(mailer) = mailer {
        match mailer.send(to, subject, link).await {
            Ok(()) => return None,
            Err(err) => {
                warn!(error = %err, to = %to, "mail delivery failed, using fallback");
            }
        }
    }
    if env.is_production() {
        None
    } else {
        Some(link.to_string())
    }
}

/// Sign a fresh access token and rotate the stored refresh secret. Every
/// login/verify/refresh lands here, so the previous refresh token dies the
/// moment this commits.
pub async fn issue_session(state: &AppState, user_id: Uuid) -> Result<SessionTokens, AuthError> {
    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign_access(user_id)?;
    let refresh_token = generate_token();
    let expires = OffsetDateTime::now_utc() + Duration::days(state.config.refresh_ttl_days);
    User::set_refresh_token(&state.db, user_id, &hash_token(&refresh_token), expires).await?;
    Ok(SessionTokens {
        access_token,
        refresh_token,
    })
}

pub async fn register(
    state: &AppState,
    mut payload: RegisterRequest,
) -> Result<RegisterResponse, AuthError> {
    payload.email = normalize_email(&payload.email);
    validate_email(&payload.email)?;
    validate_name(&payload.name)?;
    validate_password(&payload.password)?;

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        return Err(AuthError::Conflict);
    }

    let password_hash = hash_password(&payload.password)?;
    let verify_token = generate_token();
    let expires = OffsetDateTime::now_utc() + Duration::hours(VERIFY_TOKEN_TTL_HOURS);

    let user = User::create(
        &state.db,
        &payload.email,
        payload.name.trim(),
        &password_hash,
        &hash_token(&verify_token),
        expires,
    )
    .await
    .map_err(|e| {
        // Concurrent registration can slip past the lookup; the unique
        // index is the arbiter.
        if is_unique_violation(&e) {
            AuthError::Conflict
        } else {
            e.into()
        }
    })?;

    info!(user_id = %user.id, "user registered, verification pending");

    let link = build_verify_url(&state.config.app_base_url, &verify_token);
    let verify_url = deliver_link(
        state.mailer.as_deref(),
        state.config.environment,
        &user.email,
        "Verify your DevBoard email",
        &link,
    )
    .await;

    Ok(RegisterResponse {
        requires_verification: true,
        message: "Registration successful. Check your email to verify your account".into(),
        verify_url,
    })
}

pub async fn login(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<(PublicUser, SessionTokens), AuthError> {
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        return Err(AuthError::Validation("Missing fields".into()));
    }
    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    // The verification gate comes first: an unverified account is steered
    // to the verify flow no matter what password was sent, and the answer
    // must not reveal whether that password was right.
    if !user.is_email_verified {
        return Err(AuthError::VerificationRequired);
    }

    if !verify_password(password, &user.password_hash).unwrap_or(false) {
        warn!(user_id = %user.id, "login with invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    let tokens = issue_session(state, user.id).await?;
    info!(user_id = %user.id, "user logged in");
    Ok((PublicUser::from(&user), tokens))
}

pub async fn resend_verification(
    state: &AppState,
    email: &str,
) -> Result<MessageResponse, AuthError> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(AuthError::Validation("Missing email".into()));
    }
    // Unknown email and already-verified account both get the same
    // response; enumeration must not be possible here.
    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        return Ok(MessageResponse::new(GENERIC_RESEND_MESSAGE));
    };
    if user.is_email_verified {
        return Ok(MessageResponse::new(GENERIC_RESEND_MESSAGE));
    }

    let verify_token = generate_token();
    let expires = OffsetDateTime::now_utc() + Duration::hours(VERIFY_TOKEN_TTL_HOURS);
    User::set_verify_token(&state.db, user.id, &hash_token(&verify_token), expires).await?;

    let link = build_verify_url(&state.config.app_base_url, &verify_token);
    deliver_link(
        state.mailer.as_deref(),
        state.config.environment,
        &user.email,
        "Verify your DevBoard email",
        &link,
    )
    .await;

    Ok(MessageResponse::new(GENERIC_RESEND_MESSAGE))
}

/// Consume the verification token and establish a session: verifying the
/// email doubles as login.
pub async fn verify_email(
    state: &AppState,
    token: &str,
) -> Result<(PublicUser, SessionTokens), AuthError> {
    if token.trim().is_empty() {
        return Err(AuthError::Validation("Missing token".into()));
    }
    let user = User::consume_verify_token(&state.db, &hash_token(token.trim()))
        .await?
        .ok_or(AuthError::InvalidOrExpiredToken)?;

    let tokens = issue_session(state, user.id).await?;
    info!(user_id = %user.id, "email verified");
    Ok((PublicUser::from(&user), tokens))
}

pub async fn forgot_password(state: &AppState, email: &str) -> Result<MessageResponse, AuthError> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(AuthError::Validation("Missing email".into()));
    }
    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        return Ok(MessageResponse::new(GENERIC_FORGOT_MESSAGE));
    };

    let reset_token = generate_token();
    let expires = OffsetDateTime::now_utc() + Duration::hours(RESET_TOKEN_TTL_HOURS);
    User::set_reset_token(&state.db, user.id, &hash_token(&reset_token), expires).await?;

    let link = build_reset_url(&state.config.app_base_url, &reset_token);
    let reset_url = deliver_link(
        state.mailer.as_deref(),
        state.config.environment,
        &user.email,
        "Reset your DevBoard password",
        &link,
    )
    .await;

    let mut response = MessageResponse::new(GENERIC_FORGOT_MESSAGE);
    response.reset_url = reset_url;
    Ok(response)
}

/// Replace the password via a valid reset token. Does not establish a
/// session; the user logs in with the new password.
pub async fn reset_password(
    state: &AppState,
    token: &str,
    password: &str,
) -> Result<MessageResponse, AuthError> {
    validate_password(password)?;
    if token.trim().is_empty() {
        return Err(AuthError::Validation("Missing token".into()));
    }

    let password_hash = hash_password(password)?;
    let user = User::consume_reset_token(&state.db, &hash_token(token.trim()), &password_hash)
        .await?
        .ok_or(AuthError::InvalidOrExpiredToken)?;

    info!(user_id = %user.id, "password reset");
    Ok(MessageResponse::new(
        "Password has been reset. You can now log in",
    ))
}

/// Rotate the session: the presented refresh token is retired and a brand
/// new pair is issued.
pub async fn refresh_session(
    state: &AppState,
    refresh_cookie: Option<String>,
) -> Result<(PublicUser, SessionTokens), AuthError> {
    let token = refresh_cookie.ok_or(AuthError::Unauthorized)?;
    let user = User::find_by_refresh_hash(&state.db, &hash_token(&token))
        .await?
        .ok_or(AuthError::Unauthorized)?;

    if !user.is_email_verified {
        return Err(AuthError::VerificationRequired);
    }

    let tokens = issue_session(state, user.id).await?;
    Ok((PublicUser::from(&user), tokens))
}

/// Best-effort session teardown. A missing or unknown cookie is not an
/// error; the transport clears cookies regardless.
pub async fn logout(state: &AppState, refresh_cookie: Option<String>) {
    if let Some(token) = refresh_cookie {
        if let Err(err) = User::clear_refresh_by_hash(&state.db, &hash_token(&token)).await {
            warn!(error = %err, "logout could not clear refresh token");
        }
    }
}

pub async fn me(state: &AppState, user_id: Uuid) -> Result<PublicUser, AuthError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(AuthError::NotFound)?;
    Ok(PublicUser::from(&user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::testing::FakeMailer;

    #[test]
    fn verify_and_reset_urls() {
        assert_eq!(
            build_verify_url("http://localhost:5173/", "tok"),
            "http://localhost:5173/verify-email?token=tok"
        );
        assert_eq!(
            build_reset_url("https://devboard.app", "tok"),
            "https://devboard.app/reset-password?token=tok"
        );
    }

    #[tokio::test]
    async fn fallback_returns_link_in_development_without_mailer() {
        let link = deliver_link(None, Environment::Development, "a@b.co", "s", "http://l").await;
        assert_eq!(link.as_deref(), Some("http://l"));
    }

    #[tokio::test]
    async fn fallback_hides_link_in_production() {
        let link = deliver_link(None, Environment::Production, "a@b.co", "s", "http://l").await;
        assert_eq!(link, None);
    }

    #[tokio::test]
    async fn delivery_success_hides_link_everywhere() {
        let mailer = FakeMailer::default();
        let link =
            deliver_link(Some(&mailer as &dyn Mailer), Environment::Development, "a@b.co", "s", "http://l").await;
        assert_eq!(link, None);
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delivery_failure_degrades_to_dev_link() {
        let mailer = FakeMailer {
            fail: true,
            ..Default::default()
        };
        let link =
            deliver_link(Some(&mailer as &dyn Mailer), Environment::Development, "a@b.co", "s", "http://l").await;
        assert_eq!(link.as_deref(), Some("http://l"));
    }

    #[tokio::test]
    async fn delivery_failure_stays_generic_in_production() {
        let mailer = FakeMailer {
            fail: true,
            ..Default::default()
        };
        let link =
            deliver_link(Some(&mailer as &dyn Mailer), Environment::Production, "a@b.co", "s", "http://l").await;
        assert_eq!(link, None);
    }

    #[test]
    fn anti_enumeration_messages_are_identical() {
        // The "not found" and "found but ineligible" paths must produce
        // byte-identical bodies.
        let a = MessageResponse::new(GENERIC_FORGOT_MESSAGE);
        let b = MessageResponse::new(GENERIC_FORGOT_MESSAGE);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
