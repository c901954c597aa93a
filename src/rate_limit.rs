use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Which auth flow is being limited. Registration/login share one budget,
/// password-reset requests get a tighter one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitAction {
    Auth,
    Forgot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitDecision {
    Allowed,
    Limited,
}

/// Per-IP request limiter, injected into the app state so tests can use a
/// no-op. Checked before any business logic runs.
pub trait RateLimiter: Send + Sync {
    fn check(&self, ip: Option<&str>, action: LimitAction) -> LimitDecision;
}

pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check(&self, _ip: Option<&str>, _action: LimitAction) -> LimitDecision {
        LimitDecision::Allowed
    }
}

struct Budget {
    max: usize,
    window: Duration,
}

/// In-memory sliding window over request timestamps. Entries outside the
/// window are pruned on every check, so memory stays bounded by traffic
/// within one window.
pub struct SlidingWindowLimiter {
    auth: Budget,
    forgot: Budget,
    hits: Mutex<HashMap<(String, LimitAction), Vec<Instant>>>,
}

impl Default for SlidingWindowLimiter {
    fn default() -> Self {
        Self::new(20, 10, Duration::from_secs(15 * 60))
    }
}

impl SlidingWindowLimiter {
    pub fn new(auth_max: usize, forgot_max: usize, window: Duration) -> Self {
        Self {
            auth: Budget {
                max: auth_max,
                window,
            },
            forgot: Budget {
                max: forgot_max,
                window,
            },
            hits: Mutex::new(HashMap::new()),
        }
    }

    fn budget(&self, action: LimitAction) -> &Budget {
        match action {
            LimitAction::Auth => &self.auth,
            LimitAction::Forgot => &self.forgot,
        }
    }
}

impl RateLimiter for SlidingWindowLimiter {
    fn check(&self, ip: Option<&str>, action: LimitAction) -> LimitDecision {
        // Requests with no resolvable client IP are not limited; behind a
        // proxy the forwarding headers are always present.
        let Some(ip) = ip else {
            return LimitDecision::Allowed;
        };
        let budget = self.budget(action);
        let now = Instant::now();
        let mut hits = self.hits.lock().unwrap();
        let window = hits.entry((ip.to_string(), action)).or_default();
        window.retain(|t| now.duration_since(*t) < budget.window);
        if window.len() >= budget.max {
            return LimitDecision::Limited;
        }
        window.push(now);
        LimitDecision::Allowed
    }
}

/// Extract a client IP for rate limiting from common proxy headers.
pub fn extract_client_ip(headers: &axum::http::HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
