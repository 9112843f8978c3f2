//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Configure log level from config, overridable via RUST_LOG
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Endpoint URLs are never logged, only hosts and provider ids

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Filter used when RUST_LOG is unset.
pub fn default_filter(config: &ObservabilityConfig) -> String {
    format!(
        "rpc_gateway={level},gateway_cli={level},tower_http={level}",
        level = config.log_level
    )
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(config).into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_uses_configured_level() {
        let config = ObservabilityConfig {
            log_level: "debug".into(),
            ..ObservabilityConfig::default()
        };
        assert_eq!(
            default_filter(&config),
            "rpc_gateway=debug,gateway_cli=debug,tower_http=debug"
        );
    }
}
