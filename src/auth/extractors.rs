use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use crate::auth::{cookies::extract_access_token, error::AuthError, tokens::JwtKeys};

/// Auth guard: validates the access token and yields the authenticated
/// user id. Stateless; never touches the database.
#[derive(Debug)]
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let token = extract_access_token(&parts.headers).ok_or(AuthError::Unauthorized)?;

        let claims = keys.verify(&token).map_err(|_| {
            warn!("invalid or expired access token");
            AuthError::Unauthorized
        })?;

        Ok(AuthUser(claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::AppState;
    use axum::http::{
        header::{AUTHORIZATION, COOKIE},
        Request,
    };

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn accepts_valid_bearer_token() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let user_id = Uuid::new_v4();
        let token = keys.sign_access(user_id).unwrap();

        let mut parts = parts(
            Request::builder()
                .uri("/api/auth/me")
                .header(AUTHORIZATION, format!("Bearer {token}")),
        );
        let AuthUser(id) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("guard should accept");
        assert_eq!(id, user_id);
    }

    #[tokio::test]
    async fn accepts_access_cookie() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let user_id = Uuid::new_v4();
        let token = keys.sign_access(user_id).unwrap();

        let mut parts = parts(
            Request::builder()
                .uri("/api/auth/me")
                .header(COOKIE, format!("accessToken={token}")),
        );
        let AuthUser(id) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("guard should accept");
        assert_eq!(id, user_id);
    }

    #[tokio::test]
    async fn rejects_missing_token() {
        let state = AppState::fake();
        let mut parts = parts(Request::builder().uri("/api/auth/me"));
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));
    }

    #[tokio::test]
    async fn rejects_garbage_token() {
        let state = AppState::fake();
        let mut parts = parts(
            Request::builder()
                .uri("/api/auth/me")
                .header(AUTHORIZATION, "Bearer not-a-jwt"),
        );
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));
    }
}
