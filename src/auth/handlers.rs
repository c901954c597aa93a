use axum::{
    extract::{FromRef, Query, State},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        cookies::{clear_session_cookies, cookie_value, session_cookies, REFRESH_COOKIE},
        dto::{
            EmailRequest, LoginRequest, MessageResponse, RegisterRequest, ResetRequest,
            UserResponse, VerifiedResponse, VerifyQuery,
        },
        error::AuthError,
        extractors::AuthUser,
        services::{self, SessionTokens},
        tokens::JwtKeys,
    },
    db::AppState,
    rate_limit::{extract_client_ip, LimitAction, LimitDecision},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/resend-verification", post(resend_verification))
        .route("/auth/verify-email", get(verify_email))
        .route("/auth/forgot", post(forgot_password))
        .route("/auth/reset", post(reset_password))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

/// Rejects the request before any business logic when the client IP has
/// exhausted its budget for this flow.
fn check_rate_limit(
    state: &AppState,
    headers: &HeaderMap,
    action: LimitAction,
) -> Result<(), AuthError> {
    let ip = extract_client_ip(headers);
    if state.limiter.check(ip.as_deref(), action) == LimitDecision::Limited {
        return Err(AuthError::RateLimited);
    }
    Ok(())
}

/// Attach the session cookie pair to a response.
fn set_session_cookies(
    state: &AppState,
    tokens: &SessionTokens,
    mut response: Response,
) -> Result<Response, AuthError> {
    let keys = JwtKeys::from_ref(state);
    let [access, refresh] = session_cookies(
        &tokens.access_token,
        &tokens.refresh_token,
        keys.access_ttl.as_secs() as i64,
        state.config.refresh_ttl_days * 24 * 60 * 60,
        state.config.environment,
    )
    .map_err(|e| AuthError::Internal(e.into()))?;
    response.headers_mut().append(SET_COOKIE, access);
    response.headers_mut().append(SET_COOKIE, refresh);
    Ok(response)
}

/// Attach expired session cookies to any response, success or error.
fn unset_session_cookies(state: &AppState, mut response: Response) -> Response {
    if let Ok([access, refresh]) = clear_session_cookies(state.config.environment) {
        response.headers_mut().append(SET_COOKIE, access);
        response.headers_mut().append(SET_COOKIE, refresh);
    }
    response
}

#[instrument(skip(state, payload, headers))]
async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response, AuthError> {
    check_rate_limit(&state, &headers, LimitAction::Auth)?;
    let body = services::register(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

#[instrument(skip(state, payload, headers))]
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, AuthError> {
    check_rate_limit(&state, &headers, LimitAction::Auth)?;
    let (user, tokens) = services::login(&state, &payload.email, &payload.password).await?;
    let response = Json(UserResponse { user }).into_response();
    set_session_cookies(&state, &tokens, response)
}

#[instrument(skip(state, payload))]
async fn resend_verification(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let body = services::resend_verification(&state, &payload.email).await?;
    Ok(Json(body))
}

#[instrument(skip(state, query))]
async fn verify_email(
    State(state): State<AppState>,
    query: Option<Query<VerifyQuery>>,
) -> Result<Response, AuthError> {
    let token = query.map(|Query(q)| q.token).unwrap_or_default();
    let (user, tokens) = services::verify_email(&state, &token).await?;
    let response = Json(VerifiedResponse {
        message: "Email verified".into(),
        user,
    })
    .into_response();
    set_session_cookies(&state, &tokens, response)
}

#[instrument(skip(state, payload, headers))]
async fn forgot_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<EmailRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    check_rate_limit(&state, &headers, LimitAction::Forgot)?;
    let body = services::forgot_password(&state, &payload.email).await?;
    Ok(Json(body))
}

#[instrument(skip(state, payload))]
async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let body = services::reset_password(&state, &payload.token, &payload.password).await?;
    Ok(Json(body))
}

#[instrument(skip(state, headers))]
async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let refresh_cookie = cookie_value(&headers, REFRESH_COOKIE);
    match services::refresh_session(&state, refresh_cookie).await {
        Ok((user, tokens)) => {
            let response = Json(UserResponse { user }).into_response();
            set_session_cookies(&state, &tokens, response)
                .unwrap_or_else(|e| e.into_response())
        }
        // A dead refresh token also tears down the cookies so the client
        // stops replaying it.
        Err(err @ AuthError::Unauthorized) => {
            unset_session_cookies(&state, err.into_response())
        }
        Err(err) => err.into_response(),
    }
}

#[instrument(skip(state, headers))]
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let refresh_cookie = cookie_value(&headers, REFRESH_COOKIE);
    services::logout(&state, refresh_cookie).await;
    let response = Json(MessageResponse::new("Logged out")).into_response();
    unset_session_cookies(&state, response)
}

#[instrument(skip(state))]
async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserResponse>, AuthError> {
    let user = services::me(&state, user_id).await?;
    Ok(Json(UserResponse { user }))
}
