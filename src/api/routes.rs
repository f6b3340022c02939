// src/api/routes.rs — Route registry plugins write their HTTP endpoints into
//
// Plugins register during boot; the host turns the collected routes into
// axum routers once registration is over. Anything under `/admin` ends up
// behind the dashboard auth layer.

use axum::handler::Handler;
use axum::http::Method;
use axum::routing::{on, MethodFilter, MethodRouter};
use axum::Router;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::infra::errors::BotError;
use crate::security::csp::is_admin_path;

/// Endpoints the host serves itself; plugins may not claim them.
pub const HOST_ROUTES: &[(&str, &str)] = &[
    ("GET", "/health"),
    ("POST", "/slack/events"),
    ("GET", "/admin"),
    ("GET", "/admin/login"),
    ("POST", "/admin/auth/set-token"),
    ("POST", "/admin/logout"),
    ("GET", "/admin/tabs/{slug}"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    pub owner: String,
    pub method: String,
    pub path: String,
}

#[derive(Default)]
struct Routes {
    by_path: BTreeMap<String, MethodRouter>,
    entries: Vec<RouteEntry>,
}

pub struct WebRouter {
    routes: Mutex<Routes>,
}

impl WebRouter {
    pub fn new() -> Self {
        let entries = HOST_ROUTES
            .iter()
            .map(|(method, path)| RouteEntry {
                owner: "host".into(),
                method: method.to_string(),
                path: path.to_string(),
            })
            .collect();
        Self {
            routes: Mutex::new(Routes {
                by_path: BTreeMap::new(),
                entries,
            }),
        }
    }

    /// Register `handler` for `method path` on behalf of `owner`.
    pub fn register_route<H, T>(
        &self,
        owner: &str,
        method: Method,
        path: &str,
        handler: H,
    ) -> Result<(), BotError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        let filter = MethodFilter::try_from(method.clone()).map_err(|_| {
            BotError::UnsupportedMethod {
                method: method.to_string(),
            }
        })?;
        if !path.starts_with('/') {
            return Err(BotError::Config(format!(
                "route path '{path}' must start with '/'"
            )));
        }

        let mut routes = self.routes.lock().unwrap_or_else(|p| p.into_inner());
        if routes
            .entries
            .iter()
            .any(|e| e.method == method.as_str() && e.path == path)
        {
            return Err(BotError::DuplicateRoute {
                method: method.to_string(),
                path: path.to_string(),
            });
        }

        let method_router = match routes.by_path.remove(path) {
            Some(existing) => existing.on(filter, handler),
            None => on(filter, handler),
        };
        routes.by_path.insert(path.to_string(), method_router);
        routes.entries.push(RouteEntry {
            owner: owner.to_string(),
            method: method.to_string(),
            path: path.to_string(),
        });
        tracing::debug!(plugin = owner, %method, path, "Registered route");
        Ok(())
    }

    /// Every known route, host routes first.
    pub fn entries(&self) -> Vec<RouteEntry> {
        self.routes
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .entries
            .clone()
    }

    /// Plugin routes outside `/admin`.
    pub fn public_router(&self) -> Router {
        self.build(|path| !is_admin_path(path))
    }

    /// Plugin routes under `/admin`; the caller adds the auth layer.
    pub fn admin_router(&self) -> Router {
        self.build(is_admin_path)
    }

    fn build(&self, include: impl Fn(&str) -> bool) -> Router {
        let routes = self.routes.lock().unwrap_or_else(|p| p.into_inner());
        routes
            .by_path
            .iter()
            .filter(|(path, _)| include(path))
            .fold(Router::new(), |router, (path, method_router)| {
                router.route(path, method_router.clone())
            })
    }
}

impl Default for WebRouter {
    fn default() -> Self {
        Self::new()
    }
}
