//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize logging and the metrics exporter
//! - Open the health store, build every network gateway, wire alarm ingestion
//! - Bind the listener and serve until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - The listener binds last (traffic only when ready)

use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{ConfigError, GatewayConfig, ObservabilityConfig};
use crate::health::alarm::FallbackHandler;
use crate::health::repository::{build_repository, HealthStateRepository, StoreError};
use crate::http::{AppState, HttpServer};
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::{logging, metrics};
use crate::registry::{alloy_transport_factory, ProviderRegistry, TransportFactory};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("health store: {0}")]
    Store(#[from] StoreError),

    #[error("logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    #[error("metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Install the log subscriber and, when enabled, the Prometheus exporter.
pub fn init_observability(config: &ObservabilityConfig) -> Result<(), StartupError> {
    logging::init_logging(config)?;
    if config.metrics_enabled {
        let addr = config
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }
    Ok(())
}

/// Everything a running gateway process holds.
pub struct Runtime {
    pub config: GatewayConfig,
    pub repository: Arc<dyn HealthStateRepository>,
    pub registry: Arc<ProviderRegistry>,
    pub alarms: Arc<FallbackHandler>,
}

impl Runtime {
    pub async fn initialize(config: GatewayConfig) -> Result<Self, StartupError> {
        Self::initialize_with(config, alloy_transport_factory()).await
    }

    /// Like [`Runtime::initialize`] with a custom transport factory.
    pub async fn initialize_with(config: GatewayConfig, transports: TransportFactory) -> Result<Self, StartupError> {
        let repository = build_repository(&config.health_store).await?;
        tracing::info!(backend = ?config.health_store.backend, "Health store ready");

        let registry = Arc::new(ProviderRegistry::with_transport_factory(
            config.clone(),
            Some(repository.clone()),
            transports,
        ));
        registry.bootstrap()?;

        let alarms = Arc::new(FallbackHandler::new(repository.clone()));

        Ok(Self {
            config,
            repository,
            registry,
            alarms,
        })
    }

    pub fn http_server(&self) -> HttpServer {
        HttpServer::new(
            &self.config.server,
            AppState::new(self.registry.clone(), self.alarms.clone()),
        )
    }

    /// Bind the configured address and serve until `shutdown` fires.
    pub async fn serve(self, shutdown: &Shutdown) -> Result<(), StartupError> {
        let listener = TcpListener::bind(&self.config.server.bind_address).await?;
        self.http_server().run(listener, shutdown.wait()).await?;
        Ok(())
    }
}
