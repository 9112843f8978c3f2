//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with all handlers
//! - Wire up middleware (tracing, request ID, timeout, body limit)
//! - Bind to a listener and serve until shutdown

use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::health::alarm::FallbackHandler;
use crate::http::handlers;
use crate::registry::ProviderRegistry;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ProviderRegistry>,
    pub alarms: Arc<FallbackHandler>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(registry: Arc<ProviderRegistry>, alarms: Arc<FallbackHandler>) -> Self {
        Self {
            registry,
            alarms,
            started_at: Instant::now(),
        }
    }
}

/// HTTP server exposing the gateways and alarm ingestion.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &ServerConfig, state: AppState) -> Self {
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        Router::new()
            .route("/rpc/{chain_id}", post(handlers::rpc))
            .route("/alarms", post(handlers::post_alarm))
            .route("/status", get(handlers::get_status))
            .route("/status/providers", get(handlers::get_providers))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
                    // Innermost: needs the router's `Default` response body.
                    .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs))),
            )
    }

    /// Serve on `listener` until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
