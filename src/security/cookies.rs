// src/security/cookies.rs — Auth cookie helpers

use axum::http::HeaderMap;

pub const AUTH_COOKIE: &str = "zabot_token";

/// One hour.
pub const AUTH_COOKIE_MAX_AGE: u64 = 3600;

/// `Set-Cookie` value carrying the operator token.
pub fn auth_cookie(token: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{AUTH_COOKIE}={token}; Max-Age={AUTH_COOKIE_MAX_AGE}; Path=/; HttpOnly; SameSite=Strict"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that expires the auth cookie.
pub fn clear_auth_cookie(secure: bool) -> String {
    let mut cookie = format!("{AUTH_COOKIE}=; Max-Age=0; Path=/; HttpOnly; SameSite=Strict");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Value of cookie `name` from any `Cookie` header.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all("cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim().to_string())
}
