// src/security/csp.rs — Content-Security-Policy for dashboard pages

use axum::extract::Request;
use axum::http::header::CONTENT_SECURITY_POLICY;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;

pub const CSP_POLICY: &str = "default-src 'self'; \
    script-src 'self'; \
    style-src 'self' 'unsafe-inline'; \
    connect-src 'self'; \
    img-src 'self' data:; \
    frame-ancestors 'none'; \
    base-uri 'self'; \
    form-action 'self';";

pub fn is_admin_path(path: &str) -> bool {
    path == "/admin" || path.starts_with("/admin/")
}

/// Middleware adding the policy to `/admin` and `/admin/*` responses only.
pub async fn apply_csp(req: Request, next: Next) -> Response {
    let admin = is_admin_path(req.uri().path());
    let mut response = next.run(req).await;
    if admin {
        response
            .headers_mut()
            .insert(CONTENT_SECURITY_POLICY, HeaderValue::from_static(CSP_POLICY));
    }
    response
}
