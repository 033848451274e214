//! Reusable OCPP Central System server runtime.
//!
//! Provides [`ServerHandle`] that encapsulates the full server lifecycle:
//! database init, migrations, handler registration, the OCPP WebSocket
//! server, the deferred-operation sync loops, metrics and graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::handlers::register_all;
use crate::application::sync::{DiagnosticsDispatcher, LogDispatcher};
use crate::application::{
    DeferredDispatcher, DiagnosticsService, Dispatcher, HandlerRegistry, ResultCorrelator,
    SyncEngine,
};
use crate::config::{AppConfig, SyncLoopConfig};
use crate::domain::{OcppVersion, PendingOperationStore};
use crate::infrastructure::{
    init_database, InMemoryChargeStationStatusStore, InMemoryDiagnosticsStatusStore,
    SeaOrmPendingOperationStore, SessionRegistry,
};
use crate::interfaces::ws::{FrameRouter, OcppServer, ProtocolNegotiator};
use crate::shared::shutdown::{ShutdownCoordinator, ShutdownSignal};

type StartResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

// ── Options ────────────────────────────────────────────────────────

/// Options for starting the OCPP Central System.
pub struct ServerOptions {
    /// Application configuration.
    pub config: AppConfig,
    /// Run database migrations on startup (default: true).
    pub auto_migrate: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            auto_migrate: true,
        }
    }
}

// ── ServerHandle ───────────────────────────────────────────────────

/// Handle to a running OCPP Central System.
///
/// ```rust,no_run
/// use ocpp_csms::server::{ServerHandle, ServerOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
///     let handle = ServerHandle::start(ServerOptions::default()).await?;
///     handle.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct ServerHandle {
    /// Active WebSocket session registry.
    pub sessions: Arc<SessionRegistry>,
    /// Outbound calls awaiting a result.
    pub correlator: Arc<ResultCorrelator>,
    /// Entry point for queuing diagnostics and log uploads.
    pub diagnostics: Arc<DiagnosticsService>,
    /// The configuration the server was started with.
    pub config: AppConfig,
    /// Address the WebSocket server is bound to.
    pub ws_addr: SocketAddr,

    db: DatabaseConnection,
    shutdown: ShutdownCoordinator,
    ws_task: JoinHandle<()>,
    sync_tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Start the OCPP Central System with the given options.
    ///
    /// This will:
    /// 1. Install the Prometheus exporter (if enabled)
    /// 2. Connect to the database and run migrations
    /// 3. Register the call and result handlers
    /// 4. Start the OCPP WebSocket server (all supported protocol versions)
    /// 5. Start one sync loop per enabled deferred-operation domain
    pub async fn start(opts: ServerOptions) -> StartResult<Self> {
        let app_cfg = opts.config;

        info!("Starting OCPP CSMS...");

        if app_cfg.metrics.enabled {
            install_metrics_exporter(&app_cfg.metrics.listen)?;
        }

        // ── Database ───────────────────────────────────────────
        let db = init_database(&app_cfg.database.to_database_config(), opts.auto_migrate).await?;

        // ── Stores ─────────────────────────────────────────────
        let operations: Arc<dyn PendingOperationStore> =
            Arc::new(SeaOrmPendingOperationStore::new(db.clone()));
        let status_store = Arc::new(InMemoryChargeStationStatusStore::new());
        let diagnostics_store = Arc::new(InMemoryDiagnosticsStatusStore::new());

        // ── Handlers & dispatch core ───────────────────────────
        let mut builder = HandlerRegistry::builder();
        register_all(&mut builder, status_store, diagnostics_store.clone())?;
        let registry = Arc::new(builder.build());

        let sessions = SessionRegistry::shared();
        let dispatcher = Arc::new(Dispatcher::new(registry.clone()));
        let correlator = Arc::new(ResultCorrelator::new(registry, sessions.clone()));
        let router = Arc::new(FrameRouter::new(dispatcher, correlator.clone()));
        let diagnostics = Arc::new(DiagnosticsService::new(
            operations.clone(),
            diagnostics_store,
        ));

        // ── Shutdown coordinator ───────────────────────────────
        let shutdown = ShutdownCoordinator::new(app_cfg.server.shutdown_timeout);
        let shutdown_signal = shutdown.signal();

        // ── Sync loops ─────────────────────────────────────────
        let loops: [(&SyncLoopConfig, Arc<dyn DeferredDispatcher>); 2] = [
            (
                &app_cfg.sync.diagnostics,
                Arc::new(DiagnosticsDispatcher::new(correlator.clone())),
            ),
            (
                &app_cfg.sync.logs,
                Arc::new(LogDispatcher::new(correlator.clone())),
            ),
        ];
        let mut sync_tasks = Vec::new();
        for (loop_cfg, deferred) in loops {
            if !loop_cfg.enabled {
                info!(kind = %deferred.kind(), "Sync loop disabled");
                continue;
            }
            let engine = Arc::new(SyncEngine::new(
                operations.clone(),
                sessions.clone(),
                deferred,
                app_cfg.sync.engine_config(loop_cfg),
            ));
            sync_tasks.push(engine.start(shutdown_signal.clone()));
        }

        // ── OCPP WebSocket server ──────────────────────────────
        let listener = OcppServer::bind(&app_cfg.server.address()).await?;
        let ws_addr = listener.local_addr()?;
        let server = OcppServer::new(
            sessions.clone(),
            router,
            ProtocolNegotiator::new(OcppVersion::ALL.to_vec(), OcppVersion::V16),
            shutdown_signal,
        );
        let ws_task = tokio::spawn(async move {
            if let Err(e) = server.run(listener).await {
                error!("WebSocket server error: {}", e);
            }
        });

        info!("🚀 All servers started.");

        Ok(Self {
            sessions,
            correlator,
            diagnostics,
            config: app_cfg,
            ws_addr,
            db,
            shutdown,
            ws_task,
            sync_tasks,
        })
    }

    /// Get a cloneable shutdown signal.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    /// Trigger graceful shutdown (non-blocking).
    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait for the server to fully stop after shutdown has been triggered.
    pub async fn wait(self) {
        let Self {
            db,
            shutdown,
            ws_task,
            sync_tasks,
            ..
        } = self;

        let completed = shutdown
            .shutdown_with_cleanup(async move {
                match ws_task.await {
                    Ok(()) => info!("WebSocket server stopped"),
                    Err(e) => error!("WebSocket server task panicked: {}", e),
                }
                for task in sync_tasks {
                    if let Err(e) = task.await {
                        error!("Sync loop task panicked: {}", e);
                    }
                }
            })
            .await;
        if !completed {
            warn!("Some server tasks were still running at shutdown");
        }

        if let Err(e) = db.close().await {
            warn!("Error closing database connection: {}", e);
        } else {
            info!("✅ Database connection closed");
        }

        info!("👋 OCPP CSMS shutdown complete");
    }

    /// Trigger shutdown and wait for completion.
    pub async fn shutdown(self) {
        info!("🛑 Shutting down OCPP Central System...");
        self.trigger_shutdown();
        self.wait().await;
    }

    /// Check if the server is still running.
    pub fn is_running(&self) -> bool {
        !self.ws_task.is_finished()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Install the Prometheus recorder with its scrape listener.
///
/// The global recorder can only be installed once per process; a second
/// start within the same process keeps the first exporter.
fn install_metrics_exporter(listen: &str) -> StartResult<()> {
    use std::sync::OnceLock;
    static INSTALLED: OnceLock<SocketAddr> = OnceLock::new();

    if let Some(addr) = INSTALLED.get() {
        info!("📊 Prometheus exporter already running on {}", addr);
        return Ok(());
    }

    let addr: SocketAddr = listen.parse()?;
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    let _ = INSTALLED.set(addr);
    info!("📊 Prometheus exporter listening on http://{}/metrics", addr);
    Ok(())
}

/// Initialize tracing (logging) from the application config.
///
/// Call this once at process startup (before [`ServerHandle::start`]).
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    match config.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OperationKind, OperationPayload};

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.server.host = "127.0.0.1".into();
        config.server.port = 0;
        config.server.shutdown_timeout = 5;
        config.database.url = "sqlite::memory:".into();
        config.database.max_connections = 1;
        config
    }

    #[tokio::test]
    async fn starts_and_shuts_down() {
        let handle = ServerHandle::start(ServerOptions {
            config: test_config(),
            auto_migrate: true,
        })
        .await
        .unwrap();

        assert!(handle.is_running());
        assert_ne!(handle.ws_addr.port(), 0);
        assert_eq!(handle.sessions.count(), 0);

        let op = handle
            .diagnostics
            .request_log("CS1", OperationPayload::default())
            .await
            .unwrap();
        assert_eq!(op.kind, OperationKind::LogRetrieval);

        tokio::time::timeout(std::time::Duration::from_secs(5), handle.shutdown())
            .await
            .unwrap();
    }
}
