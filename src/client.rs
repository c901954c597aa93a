//! Client-side session manager: the counterpart of the auth API used by
//! non-browser callers and integration tooling. Keeps a local user
//! snapshot, validates it against `/api/auth/me` on boot, and retries a
//! 401 exactly once after a silent refresh.

use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::auth::dto::PublicUser;

/// Where the session stands from the client's point of view. `AuthError`
/// is distinct from `Unauthenticated`: the former had a session that went
/// stale (offer re-login), the latter never had one.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Loading,
    Authenticated(PublicUser),
    Unauthenticated,
    AuthError,
}

/// Parsed outcome of an API call.
#[derive(Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }
}

/// Thin wrapper over reqwest with the session cookie store and the
/// single-shot silent-refresh retry.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> reqwest::Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await
    }

    /// Perform a call. On a 401 the client attempts one silent refresh
    /// and, if that succeeds, retries the original request once; the
    /// `allow_retry` flag caps the recursion at a single level.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> anyhow::Result<ApiResponse> {
        self.call_inner(method, path, body, true).await
    }

    async fn call_inner(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        allow_retry: bool,
    ) -> anyhow::Result<ApiResponse> {
        let response = self.send(method.clone(), path, body.as_ref()).await?;

        if response.status() == StatusCode::UNAUTHORIZED && allow_retry {
            debug!(path = %path, "401 received, attempting silent refresh");
            let refreshed = self
                .send(Method::POST, "/api/auth/refresh", None)
                .await
                .map(|r| r.status().is_success())
                .unwrap_or(false);
            if refreshed {
                return Box::pin(self.call_inner(method, path, body, false)).await;
            }
            // Refresh failed: surface the original 401.
        }

        let status = response.status();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        Ok(ApiResponse { status, body })
    }
}

/// Outcome of a `/me` probe, decoupled from transport for testability.
#[derive(Debug)]
pub enum MeOutcome {
    User(PublicUser),
    Unauthorized,
    Failed,
}

pub struct SessionManager {
    client: ApiClient,
    cached_user: Option<PublicUser>,
    state: SessionState,
}

impl SessionManager {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            cached_user: None,
            state: SessionState::Loading,
        }
    }

    /// Resume with a persisted user snapshot; boot still revalidates it.
    pub fn with_cached_user(client: ApiClient, cached_user: Option<PublicUser>) -> Self {
        Self {
            client,
            cached_user,
            state: SessionState::Loading,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn user(&self) -> Option<&PublicUser> {
        match &self.state {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    /// Validate the session on startup. Protected UI stays in `Loading`
    /// until this settles.
    pub async fn boot(&mut self) {
        let outcome = match self
            .client
            .call(Method::GET, "/api/auth/me", None)
            .await
        {
            Ok(response) if response.is_ok() => {
                match serde_json::from_value::<PublicUser>(
                    response.body.get("user").cloned().unwrap_or(Value::Null),
                ) {
                    Ok(user) => MeOutcome::User(user),
                    Err(_) => MeOutcome::Failed,
                }
            }
            Ok(response) if response.status == StatusCode::UNAUTHORIZED => MeOutcome::Unauthorized,
            _ => MeOutcome::Failed,
        };
        self.settle(outcome);
    }

    /// Apply a `/me` outcome to the session state. A failed probe clears
    /// the cached snapshot; whether that surfaces as `AuthError` or
    /// `Unauthenticated` depends on whether a session existed before.
    fn settle(&mut self, outcome: MeOutcome) {
        self.state = match outcome {
            MeOutcome::User(user) => {
                self.cached_user = Some(user.clone());
                SessionState::Authenticated(user)
            }
            MeOutcome::Unauthorized | MeOutcome::Failed => {
                let had_session = self.cached_user.take().is_some();
                if had_session {
                    SessionState::AuthError
                } else {
                    SessionState::Unauthenticated
                }
            }
        };
    }

    pub async fn login(&mut self, email: &str, password: &str) -> anyhow::Result<ApiResponse> {
        let response = self
            .client
            .call(
                Method::POST,
                "/api/auth/login",
                Some(serde_json::json!({ "email": email, "password": password })),
            )
            .await?;
        if response.is_ok() {
            if let Ok(user) = serde_json::from_value::<PublicUser>(
                response.body.get("user").cloned().unwrap_or(Value::Null),
            ) {
                self.cached_user = Some(user.clone());
                self.state = SessionState::Authenticated(user);
            }
        }
        Ok(response)
    }

    pub async fn logout(&mut self) -> anyhow::Result<()> {
        let _ = self
            .client
            .call(Method::POST, "/api/auth/logout", None)
            .await?;
        self.cached_user = None;
        self.state = SessionState::Unauthenticated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn some_user() -> PublicUser {
        PublicUser {
            id: Uuid::new_v4(),
            email: "alice@example.com".into(),
            name: "Alice".into(),
        }
    }

    fn manager_with_cache(cached: Option<PublicUser>) -> SessionManager {
        let client = ApiClient::new("http://localhost:8080").unwrap();
        SessionManager::with_cached_user(client, cached)
    }

    #[test]
    fn starts_loading() {
        let manager = manager_with_cache(None);
        assert_eq!(*manager.state(), SessionState::Loading);
        assert!(manager.user().is_none());
    }

    #[test]
    fn me_success_authenticates() {
        let mut manager = manager_with_cache(None);
        let user = some_user();
        manager.settle(MeOutcome::User(user.clone()));
        assert_eq!(*manager.state(), SessionState::Authenticated(user));
        assert!(manager.user().is_some());
    }

    #[test]
    fn me_failure_without_prior_session_is_unauthenticated() {
        let mut manager = manager_with_cache(None);
        manager.settle(MeOutcome::Unauthorized);
        assert_eq!(*manager.state(), SessionState::Unauthenticated);
    }

    #[test]
    fn me_failure_with_cached_session_is_auth_error() {
        let mut manager = manager_with_cache(Some(some_user()));
        manager.settle(MeOutcome::Unauthorized);
        // Stale session is distinct from never-logged-in.
        assert_eq!(*manager.state(), SessionState::AuthError);
        assert!(manager.user().is_none());
    }

    #[test]
    fn auth_error_clears_the_snapshot() {
        let mut manager = manager_with_cache(Some(some_user()));
        manager.settle(MeOutcome::Failed);
        assert_eq!(*manager.state(), SessionState::AuthError);
        // A second failure now lands in Unauthenticated: nothing cached.
        manager.settle(MeOutcome::Failed);
        assert_eq!(*manager.state(), SessionState::Unauthenticated);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://localhost:8080/").unwrap();
        assert_eq!(client.base_url, "http://localhost:8080");
    }
}
