// src/app.rs — Process wiring: bootstrap, start, serve, stop
//
// Boot order: context, operator template dirs, discovery, register phase,
// overview tab, router. The router is built last so it sees every plugin
// route.

use anyhow::Context;
use axum::Router;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::api::{build_router, ApiState};
use crate::core::discovery::{discover, DiscoveryOptions, PluginCatalog};
use crate::core::manager::{LifecycleReport, PluginManager};
use crate::core::PluginContext;
use crate::dashboard::AdminTab;
use crate::infra::config::Config;
use crate::infra::errors::BotError;
use crate::security::auth::{CredentialVerifier, StaticCredentialVerifier};
use crate::slack::{ChatTransport, NullTransport, SlackClient};
use crate::storage::{open_storage, Storage};

/// How long the server gets to finish in-flight requests.
pub const SERVER_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
/// How long queued chat deliveries get before they are aborted.
pub const DELIVERY_DRAIN_GRACE: Duration = Duration::from_secs(5);

pub const OVERVIEW_SLUG: &str = "overview";

pub struct App {
    pub ctx: Arc<PluginContext>,
    pub manager: Arc<PluginManager>,
    verifier: Arc<dyn CredentialVerifier>,
    router: Router,
    stopped: AtomicBool,
}

impl App {
    /// Build the application from configuration with the real transport,
    /// storage and operator list.
    pub fn bootstrap(config: Config, catalog: &PluginCatalog) -> anyhow::Result<Self> {
        let transport: Arc<dyn ChatTransport> = match config.slack.bot_token.as_deref() {
            Some(token) if !token.is_empty() => Arc::new(SlackClient::new(token)),
            _ => {
                warn!("No Slack bot token configured; outbound messages are discarded");
                Arc::new(NullTransport)
            }
        };
        let storage = open_storage(config.storage.database_url.as_deref())?;
        let verifier = Arc::new(StaticCredentialVerifier::new(config.admin.users.clone()));
        Ok(Self::assemble(config, transport, storage, verifier, catalog)?)
    }

    /// Build the application from explicit collaborators.
    pub fn assemble(
        config: Config,
        transport: Arc<dyn ChatTransport>,
        storage: Arc<dyn Storage>,
        verifier: Arc<dyn CredentialVerifier>,
        catalog: &PluginCatalog,
    ) -> Result<Self, BotError> {
        let options = DiscoveryOptions::from_config(&config.plugins);
        let template_dirs = config.dashboard.template_dirs.clone();
        let ctx = PluginContext::new(config, transport, storage);

        // operator overrides must claim their namespaces before plugins do
        for (namespace, path) in &template_dirs {
            ctx.dashboard.add_template_dir(namespace, path)?;
        }

        let plugins = discover(catalog, &options)?;
        info!(count = plugins.len(), "Plugin discovery complete");

        let manager = Arc::new(PluginManager::new(plugins));
        manager.register_all(&ctx)?;
        ctx.dashboard.register_tab(overview_tab(manager.clone()))?;

        let router = build_router(ApiState::new(ctx.clone(), verifier.clone()));
        Ok(Self {
            ctx,
            manager,
            verifier,
            router,
            stopped: AtomicBool::new(false),
        })
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Bring collaborators up and start plugins. Only a verifier or storage
    /// failure is fatal; plugin startup failures are reported.
    pub async fn start(&self) -> anyhow::Result<LifecycleReport> {
        self.verifier
            .initialize()
            .await
            .context("credential verifier initialization failed")?;
        self.ctx
            .storage
            .init()
            .await
            .context("storage initialization failed")?;

        match self.ctx.transport.identify().await {
            Ok(bot_user_id) => {
                info!(transport = self.ctx.transport.name(), bot_user_id = ?bot_user_id, "Chat transport identified");
                self.ctx.chat.set_bot_user_id(bot_user_id);
            }
            Err(e) => warn!("Could not determine bot user id: {:#}", e),
        }

        let report = self.manager.startup(&self.ctx).await;
        if !report.is_clean() {
            warn!(failed = ?report.failed, "Some plugins failed to start");
        }
        Ok(report)
    }

    /// Shut plugins down, drain chat deliveries, close storage. Runs once;
    /// later calls return immediately.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Stopping");
        let report = self.manager.shutdown(&self.ctx).await;
        if !report.is_clean() {
            warn!(failed = ?report.failed, "Some plugins failed to shut down cleanly");
        }
        let aborted = self.ctx.chat.drain(DELIVERY_DRAIN_GRACE).await;
        if aborted > 0 {
            warn!(aborted, "Chat deliveries aborted at shutdown");
        }
        if let Err(e) = self.ctx.storage.close().await {
            error!("Failed to close storage: {:#}", e);
        }
        info!("Stopped");
    }
}

/// Host-provided first tab: workspace, transport and plugin status.
fn overview_tab(manager: Arc<PluginManager>) -> AdminTab {
    AdminTab::new(OVERVIEW_SLUG, "Overview", "admin/overview.html")
        .with_description("Workspace and plugin status.")
        .with_order(0)
        .with_provider(move |_request, ctx| {
            let manager = manager.clone();
            async move {
                let workspace = ctx
                    .config
                    .slack
                    .team_name
                    .clone()
                    .unwrap_or_else(|| "Unknown workspace".into());
                let transport_status = match ctx.chat.bot_user_id() {
                    Some(id) => format!("connected as {id}"),
                    None => "not connected".to_string(),
                };
                Ok(json!({
                    "workspace": workspace,
                    "transport": ctx.transport.name(),
                    "transport_status": transport_status,
                    "storage_backend": ctx.storage.backend(),
                    "plugins": manager.summaries(),
                }))
            }
        })
}

/// Serve HTTP until Ctrl-C or SIGTERM, then shut down in order: stop
/// accepting requests, let the server finish (bounded), stop the app.
pub async fn serve(app: App) -> anyhow::Result<()> {
    let config = app.ctx.config.clone();
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    app.start().await?;
    info!("Listening on http://{}", addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let service = app
        .router()
        .into_make_service_with_connect_info::<SocketAddr>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, service)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received, starting graceful shutdown...");
        }
        result = &mut server => {
            error!("HTTP server exited unexpectedly");
            app.stop().await;
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(anyhow::Error::new(e).context("HTTP server failed")),
                Err(e) => Err(anyhow::Error::new(e).context("HTTP server task panicked")),
            };
        }
    }

    let _ = shutdown_tx.send(());
    match tokio::time::timeout(SERVER_SHUTDOWN_GRACE, &mut server).await {
        Ok(Ok(Ok(()))) => info!("HTTP server stopped"),
        Ok(Ok(Err(e))) => warn!("HTTP server stopped with error: {}", e),
        Ok(Err(e)) => warn!("HTTP server task failed: {}", e),
        Err(_) => {
            warn!(
                grace_secs = SERVER_SHUTDOWN_GRACE.as_secs(),
                "HTTP server did not stop in time; aborting"
            );
            server.abort();
            // the JoinError is the expected cancellation
            let _ = server.await;
        }
    }

    app.stop().await;
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::config::AdminUser;
    use crate::plugins;
    use crate::security::auth::token_digest;
    use crate::storage::InMemoryStorage;

    fn config() -> Config {
        let mut config = Config::default();
        config.admin.users.push(AdminUser {
            uid: "op".into(),
            email: Some("op@example.com".into()),
            token_sha256: token_digest("tok"),
            disabled: false,
        });
        config
    }

    fn assemble(config: Config) -> Result<App, BotError> {
        let verifier = Arc::new(StaticCredentialVerifier::new(config.admin.users.clone()));
        App::assemble(
            config,
            Arc::new(NullTransport),
            Arc::new(InMemoryStorage::new()),
            verifier,
            &plugins::catalog(),
        )
    }

    #[tokio::test]
    async fn test_bootstrap_registers_builtins_and_overview() {
        let app = assemble(config()).unwrap();
        assert_eq!(app.manager.keys(), vec!["hello", "modlog"]);
        let slugs: Vec<_> = app.ctx.dashboard.tabs().into_iter().map(|t| t.slug).collect();
        assert_eq!(slugs, vec!["overview", "hello", "modlog"]);

        let report = app.start().await.unwrap();
        assert!(report.is_clean());
        app.stop().await;
        app.stop().await;
        assert_eq!(
            app.manager.state_of("hello"),
            Some(crate::core::PluginState::Stopped)
        );
    }

    #[tokio::test]
    async fn test_start_fails_without_operators() {
        let app = assemble(Config::default()).unwrap();
        assert!(app.start().await.is_err());
    }

    #[test]
    fn test_missing_template_dir_is_fatal() {
        let mut config = config();
        config
            .dashboard
            .template_dirs
            .insert("hello".into(), "/no/such/dir".into());
        assert!(matches!(
            assemble(config),
            Err(BotError::TemplateDirMissing { .. })
        ));
    }
}
