// src/api/auth.rs — Dashboard authentication middleware

use axum::extract::{Request, State};
use axum::http::header::{ACCEPT, LOCATION, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::api::{types::ErrorResponse, ApiState};
use crate::security::auth::current_user;

pub const LOGIN_PATH: &str = "/admin/login";

/// Let the request through only with a valid operator token. The resolved
/// `Identity` is stored in the request extensions for handlers.
pub async fn require_auth(
    State(state): State<ApiState>,
    mut req: Request,
    next: Next,
) -> Response {
    match current_user(state.verifier.as_ref(), req.headers()).await {
        Some(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        None => unauthenticated(req.headers()),
    }
}

/// Browsers are sent to the login page; API clients get a 401.
pub fn unauthenticated(headers: &HeaderMap) -> Response {
    let wants_html = headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/html"));

    if wants_html {
        (
            StatusCode::TEMPORARY_REDIRECT,
            [(LOCATION, HeaderValue::from_static(LOGIN_PATH))],
        )
            .into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            [(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"))],
            Json(ErrorResponse::new("Authentication required")),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_is_redirected() {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/html,application/xhtml+xml"));
        let resp = unauthenticated(&headers);
        assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(resp.headers()[LOCATION], LOGIN_PATH);
    }

    #[test]
    fn test_api_client_gets_401() {
        let resp = unauthenticated(&HeaderMap::new());
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(resp.headers()[WWW_AUTHENTICATE], "Bearer");
    }
}
