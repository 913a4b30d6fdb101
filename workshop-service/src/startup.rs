//! Application startup and lifecycle management.

use crate::config::{StoreBackend, WorkshopConfig};
use crate::handlers;
use crate::services::{init_metrics, BackingStore, Database, InvoiceReconciler, MemoryStore};
use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::{request_id_middleware, REQUEST_ID_HEADER};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub reconciler: InvoiceReconciler,
}

impl AppState {
    pub fn new(store: Arc<dyn BackingStore>) -> Self {
        Self {
            reconciler: InvoiceReconciler::new(store),
        }
    }
}

/// Connect the configured backing store. Postgres stores are migrated first.
pub async fn connect_store(backend: &StoreBackend) -> Result<Arc<dyn BackingStore>, AppError> {
    match backend {
        StoreBackend::Postgres(db) => {
            let database = Database::new(&db.url, db.max_connections, db.min_connections)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to connect to PostgreSQL");
                    e
                })?;
            database.run_migrations().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to run migrations");
                e
            })?;
            Ok(Arc::new(database))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory backing store - data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Build the HTTP router over `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/metrics", get(handlers::health::metrics_handler))
        .route(
            "/invoices",
            post(handlers::invoices::create_invoice).get(handlers::invoices::list_invoices),
        )
        .route(
            "/invoices/:id",
            get(handlers::invoices::get_invoice)
                .patch(handlers::invoices::update_invoice)
                .delete(handlers::invoices::remove_invoice),
        )
        .route("/parts", post(handlers::inventory::create_part))
        .route("/parts/:id", get(handlers::inventory::get_part))
        .route("/tasks", post(handlers::inventory::create_task))
        .route("/tasks/:id", get(handlers::inventory::get_task))
        .route_layer(from_fn(metrics_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    org_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: WorkshopConfig) -> Result<Self, AppError> {
        let store = connect_store(&config.store).await?;
        Self::build_with_store(config, store).await
    }

    /// Build the application over an already connected store. The store
    /// selection in `config` is ignored.
    pub async fn build_with_store(
        config: WorkshopConfig,
        store: Arc<dyn BackingStore>,
    ) -> Result<Self, AppError> {
        init_metrics();

        let router = router(AppState::new(store));

        let addr: SocketAddr = format!("{}:{}", config.common.host, config.common.port)
            .parse()
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!(
                    "Invalid listen address {}:{}: {}",
                    config.common.host,
                    config.common.port,
                    e
                ))
            })?;
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Workshop service listener bound");

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        tracing::info!(
            service = "workshop-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, self.router).await.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}
