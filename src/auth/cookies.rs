use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};

use crate::config::Environment;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Build one `Set-Cookie` value: httpOnly, lax, path-wide, secure only in
/// production so local HTTP development keeps working.
fn build_cookie(
    name: &str,
    value: &str,
    max_age_secs: i64,
    env: Environment,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}");
    if env.is_production() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// `Set-Cookie` pair carrying a fresh session: access + refresh, each with
/// a max-age matching its token TTL.
pub fn session_cookies(
    access_token: &str,
    refresh_token: &str,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
    env: Environment,
) -> Result<[HeaderValue; 2], InvalidHeaderValue> {
    Ok([
        build_cookie(ACCESS_COOKIE, access_token, access_ttl_secs, env)?,
        build_cookie(REFRESH_COOKIE, refresh_token, refresh_ttl_secs, env)?,
    ])
}

/// `Set-Cookie` pair that expires both session cookies immediately.
pub fn clear_session_cookies(env: Environment) -> Result<[HeaderValue; 2], InvalidHeaderValue> {
    Ok([
        build_cookie(ACCESS_COOKIE, "", 0, env)?,
        build_cookie(REFRESH_COOKIE, "", 0, env)?,
    ])
}

/// Read a named cookie from the request `Cookie` header.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        // Segments without '=' (drive-by flags, trailing separators) are
        // skipped rather than ending the scan.
        let Some((key, val)) = pair.trim().split_once('=') else {
            continue;
        };
        let val = val.trim();
        if key.trim() == name && !val.is_empty() {
            return Some(val.to_string());
        }
    }
    None
}

/// Extract the access token: bearer header first, cookie second. Refresh
/// tokens are cookie-only and never read from headers.
pub fn extract_access_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    cookie_value(headers, ACCESS_COOKIE)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_attributes() {
        let [access, refresh] =
            session_cookies("acc", "ref", 900, 604800, Environment::Development).unwrap();
        let access = access.to_str().unwrap();
        let refresh = refresh.to_str().unwrap();
        assert!(access.starts_with("accessToken=acc;"));
        assert!(access.contains("HttpOnly"));
        assert!(access.contains("SameSite=Lax"));
        assert!(access.contains("Max-Age=900"));
        assert!(!access.contains("Secure"));
        assert!(refresh.starts_with("refreshToken=ref;"));
        assert!(refresh.contains("Max-Age=604800"));
    }

    #[test]
    fn production_cookies_are_secure() {
        let [access, _] = session_cookies("a", "r", 1, 1, Environment::Production).unwrap();
        assert!(access.to_str().unwrap().ends_with("; Secure"));
    }

    #[test]
    fn cleared_cookies_expire_immediately() {
        let [access, refresh] = clear_session_cookies(Environment::Development).unwrap();
        assert!(access.to_str().unwrap().contains("Max-Age=0"));
        assert!(refresh.to_str().unwrap().starts_with("refreshToken=;"));
    }

    #[test]
    fn reads_named_cookie_among_many() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; refreshToken=tok123; other=x"),
        );
        assert_eq!(
            cookie_value(&headers, REFRESH_COOKIE),
            Some("tok123".to_string())
        );
        assert_eq!(cookie_value(&headers, ACCESS_COOKIE), None);
    }

    #[test]
    fn malformed_segments_do_not_hide_later_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("flag; refreshToken=tok123; ;broken"),
        );
        assert_eq!(
            cookie_value(&headers, REFRESH_COOKIE),
            Some("tok123".to_string())
        );
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        headers.insert(
            COOKIE,
            HeaderValue::from_static("accessToken=from-cookie"),
        );
        assert_eq!(
            extract_access_token(&headers),
            Some("from-header".to_string())
        );
    }

    #[test]
    fn falls_back_to_access_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("accessToken=from-cookie"));
        assert_eq!(
            extract_access_token(&headers),
            Some("from-cookie".to_string())
        );
    }

    #[test]
    fn empty_bearer_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_access_token(&headers), None);
    }
}
