// src/api/mod.rs — HTTP surface: Slack webhook, admin dashboard and plugin routes

pub mod auth;
pub mod handlers;
pub mod routes;
pub mod types;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::core::context::PluginContext;
use crate::security::auth::CredentialVerifier;
use crate::security::csp;

pub use routes::{RouteEntry, WebRouter};

/// Shared state for host handlers.
#[derive(Clone)]
pub struct ApiState {
    pub ctx: Arc<PluginContext>,
    pub verifier: Arc<dyn CredentialVerifier>,
}

impl ApiState {
    pub fn new(ctx: Arc<PluginContext>, verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self { ctx, verifier }
    }
}

/// Build the full router. Call after every plugin has registered its routes.
pub fn build_router(state: ApiState) -> Router {
    let protected = Router::new()
        .route("/admin", get(handlers::admin_index))
        .route("/admin/tabs/{slug}", get(handlers::admin_tab))
        .route("/admin/logout", post(handlers::logout))
        .with_state(state.clone())
        .merge(state.ctx.routes.admin_router())
        .route_layer(from_fn_with_state(state.clone(), auth::require_auth));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/slack/events", post(handlers::slack_events))
        .route(auth::LOGIN_PATH, get(handlers::login_page))
        .route("/admin/auth/set-token", post(handlers::set_token))
        .with_state(state.clone())
        .merge(state.ctx.routes.public_router())
        .merge(protected)
        .layer(from_fn(csp::apply_csp))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::config::{AdminUser, Config};
    use crate::security::auth::{token_digest, CredentialVerifier, StaticCredentialVerifier};
    use crate::slack::NullTransport;
    use crate::storage::InMemoryStorage;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use tower::ServiceExt;

    async fn test_state() -> ApiState {
        let ctx = PluginContext::new(
            Config::default(),
            Arc::new(NullTransport),
            Arc::new(InMemoryStorage::new()),
        );
        let verifier = StaticCredentialVerifier::new(vec![AdminUser {
            uid: "op-1".into(),
            email: Some("ops@example.com".into()),
            token_sha256: token_digest("secret-token"),
            disabled: false,
        }]);
        verifier.initialize().await.unwrap();
        ApiState::new(ctx, Arc::new(verifier))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = build_router(test_state().await);
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get(header::CONTENT_SECURITY_POLICY).is_none());
    }

    #[tokio::test]
    async fn test_plugin_admin_route_requires_auth() {
        let state = test_state().await;
        state
            .ctx
            .routes
            .register_route("demo", Method::GET, "/admin/tabs/demo/data", || async { "data" })
            .unwrap();
        let app = build_router(state);

        let req = Request::builder()
            .uri("/admin/tabs/demo/data")
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = Request::builder()
            .uri("/admin/tabs/demo/data")
            .header(header::AUTHORIZATION, "Bearer secret-token")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get(header::CONTENT_SECURITY_POLICY).is_some());
    }
}
