// src/api/handlers.rs

use axum::body::Bytes;
use axum::extract::{ConnectInfo, FromRequest, Path, Query, Request, State};
use axum::http::header::{CONTENT_TYPE, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::{Extension, Form, Json};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::net::SocketAddr;

use crate::api::{types::*, ApiState};
use crate::dashboard::TabRequest;
use crate::infra::errors::BotError;
use crate::security::auth::Identity;
use crate::security::cookies;
use crate::slack::signature::{self, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::slack::ChatEvent;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse::new(message)))
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// POST /slack/events: Events API webhook.
pub async fn slack_events(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    if let Some(secret) = state.ctx.config.slack.signing_secret.as_deref() {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        signature::verify_signature(
            secret,
            header(TIMESTAMP_HEADER),
            header(SIGNATURE_HEADER),
            &body,
            chrono::Utc::now().timestamp(),
        )
        .map_err(|e| {
            tracing::warn!("Rejected Slack request: {}", e);
            api_error(StatusCode::UNAUTHORIZED, "Invalid request signature")
        })?;
    }

    let envelope: SlackEnvelope = serde_json::from_slice(&body)
        .map_err(|_| api_error(StatusCode::BAD_REQUEST, "Invalid JSON body"))?;

    match envelope.kind.as_str() {
        "url_verification" => {
            let challenge = envelope.challenge.unwrap_or_default();
            Ok(Json(json!({ "challenge": challenge })).into_response())
        }
        "event_callback" => {
            match envelope.event {
                Some(event) => state.ctx.chat.spawn_delivery(ChatEvent::new(event)),
                None => tracing::warn!("event_callback without an event"),
            }
            Ok(StatusCode::OK.into_response())
        }
        other => {
            tracing::debug!("Ignoring Slack request of type {}", other);
            Ok(StatusCode::OK.into_response())
        }
    }
}

/// GET /admin/login
pub async fn login_page(State(state): State<ApiState>) -> Result<Html<String>, ApiError> {
    render_login(&state, None).map(Html)
}

fn render_login(state: &ApiState, error: Option<&str>) -> Result<String, ApiError> {
    state
        .ctx
        .dashboard
        .renderer()
        .render("admin/login.html", json!({ "error": error }))
        .map_err(dashboard_error)
}

/// POST /admin/auth/set-token: exchange an operator token for a session cookie.
pub async fn set_token(State(state): State<ApiState>, req: Request) -> Response {
    let client = client_id(&req);
    let is_form = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"));

    let limiter = &state.ctx.rate_limiter;
    if let Some(remaining) = limiter.lockout_remaining(&client) {
        tracing::warn!(client = %client, remaining, "Rate limit exceeded");
        return login_failure(
            &state,
            is_form,
            StatusCode::TOO_MANY_REQUESTS,
            &format!("Too many login attempts. Try again in {remaining} seconds."),
        );
    }

    let body = if is_form {
        Form::<TokenRequest>::from_request(req, &())
            .await
            .map(|Form(body)| body)
            .map_err(|e| e.to_string())
    } else {
        Json::<TokenRequest>::from_request(req, &())
            .await
            .map(|Json(body)| body)
            .map_err(|e| e.to_string())
    };
    let body = match body {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(client = %client, "Invalid login body: {}", e);
            let message = if is_form { "Invalid form body" } else { "Invalid JSON body" };
            return login_failure(&state, is_form, StatusCode::BAD_REQUEST, message);
        }
    };

    let Some(token) = body.token.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) else {
        return login_failure(&state, is_form, StatusCode::BAD_REQUEST, "Token required");
    };

    let Some(identity) = state.verifier.verify(&token).await else {
        limiter.record_failure(&client);
        tracing::warn!(client = %client, "Failed login attempt with invalid token");
        return login_failure(
            &state,
            is_form,
            StatusCode::UNAUTHORIZED,
            "Invalid authentication token",
        );
    };

    if !state.verifier.identity_exists(&identity.uid).await {
        limiter.record_failure(&client);
        tracing::warn!(client = %client, uid = %identity.uid, "Login refused: user not registered");
        return login_failure(&state, is_form, StatusCode::FORBIDDEN, "Access denied");
    }

    limiter.reset(&client);
    tracing::info!(user = identity.display(), uid = %identity.uid, client = %client, "Login successful");

    let cookie = cookies::auth_cookie(&token, state.ctx.config.is_production());
    if is_form {
        (
            StatusCode::SEE_OTHER,
            [(LOCATION, "/admin".to_string()), (SET_COOKIE, cookie)],
        )
            .into_response()
    } else {
        (
            [(SET_COOKIE, cookie)],
            Json(LoginResponse {
                status: "ok".into(),
                user: identity.email,
            }),
        )
            .into_response()
    }
}

/// Forms get the login page back with the message; API clients get JSON.
fn login_failure(state: &ApiState, is_form: bool, status: StatusCode, message: &str) -> Response {
    if !is_form {
        return api_error(status, message).into_response();
    }
    match render_login(state, Some(message)) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => e.into_response(),
    }
}

fn client_id(req: &Request) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".into())
}

/// POST /admin/logout
pub async fn logout(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
) -> Response {
    tracing::info!(user = identity.display(), uid = %identity.uid, "User logged out");
    let cookie = cookies::clear_auth_cookie(state.ctx.config.is_production());
    (
        StatusCode::SEE_OTHER,
        [(LOCATION, "/admin/login".to_string()), (SET_COOKIE, cookie)],
    )
        .into_response()
}

/// GET /admin
pub async fn admin_index(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
    uri: Uri,
    Query(query): Query<BTreeMap<String, String>>,
) -> Result<Html<String>, ApiError> {
    let request = tab_request(&uri, query, identity);
    state
        .ctx
        .dashboard
        .render_index(request)
        .await
        .map(Html)
        .map_err(dashboard_error)
}

/// GET /admin/tabs/{slug}
pub async fn admin_tab(
    State(state): State<ApiState>,
    Path(slug): Path<String>,
    Extension(identity): Extension<Identity>,
    uri: Uri,
    Query(query): Query<BTreeMap<String, String>>,
) -> Result<Html<String>, ApiError> {
    let request = tab_request(&uri, query, identity);
    state
        .ctx
        .dashboard
        .render_tab(&slug, request)
        .await
        .map(Html)
        .map_err(dashboard_error)
}

fn tab_request(uri: &Uri, query: BTreeMap<String, String>, identity: Identity) -> TabRequest {
    TabRequest {
        path: uri.path().to_string(),
        query,
        user: Some(identity),
    }
}

fn dashboard_error(e: BotError) -> ApiError {
    match e {
        BotError::TabNotFound { .. } => api_error(StatusCode::NOT_FOUND, "Tab not found"),
        other => {
            tracing::error!(error = %format!("{other:#}"), "Dashboard render failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to render dashboard")
        }
    }
}
