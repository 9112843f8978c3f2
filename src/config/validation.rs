//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (penalties, thresholds, probabilities)
//! - Check per-network consistency (ranking/weights line up with providers)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;

use crate::blockchain::provider::template_needs_credential;
use crate::config::schema::{GatewayConfig, HealthStoreBackend, NetworkConfig};

/// Weight of an endpoint that must never be selected.
pub const WEIGHT_NEVER: i64 = 0;

/// Weight of an endpoint only selected when no positively weighted endpoint is Healthy.
pub const WEIGHT_AS_FALLBACK: i64 = -1;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let endpoint = &config.endpoint;
    if endpoint.error_penalty > 0.0 {
        errors.push(ValidationError::new("endpoint.error_penalty", "must be <= 0"));
    }
    if endpoint.high_latency_penalty > 0.0 {
        errors.push(ValidationError::new("endpoint.high_latency_penalty", "must be <= 0"));
    }
    if endpoint.health_score_recover_threshold <= endpoint.health_score_fallback_threshold {
        errors.push(ValidationError::new(
            "endpoint.health_score_recover_threshold",
            "must be greater than health_score_fallback_threshold",
        ));
    }
    if endpoint.health_score_recover_threshold > 0.0 {
        errors.push(ValidationError::new(
            "endpoint.health_score_recover_threshold",
            "must be <= 0, scores never exceed 0",
        ));
    }
    if endpoint.recover_score_per_ms < 0.0 {
        errors.push(ValidationError::new("endpoint.recover_score_per_ms", "must be >= 0"));
    }
    if endpoint.recover_evaluation_wait_period_ms == 0 {
        errors.push(ValidationError::new("endpoint.recover_evaluation_wait_period_ms", "must be > 0"));
    }
    if endpoint.latency_evaluation_wait_period_ms == 0 {
        errors.push(ValidationError::new("endpoint.latency_evaluation_wait_period_ms", "must be > 0"));
    }
    if endpoint.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("endpoint.rpc_timeout_secs", "must be > 0"));
    }
    check_probability(&mut errors, "endpoint.db_sync_sample_prob", endpoint.db_sync_sample_prob);
    check_probability(
        &mut errors,
        "gateway.latency_evaluation_sample_prob",
        config.gateway.latency_evaluation_sample_prob,
    );
    check_probability(
        &mut errors,
        "gateway.health_check_sample_prob",
        config.gateway.health_check_sample_prob,
    );
    if config.gateway.session_cache_capacity == 0 {
        errors.push(ValidationError::new("gateway.session_cache_capacity", "must be > 0"));
    }

    if config.health_store.backend == HealthStoreBackend::File && config.health_store.path.is_none() {
        errors.push(ValidationError::new("health_store.path", "required for the file backend"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError::new("observability.metrics_address", "not a socket address"));
    }

    let mut seen_chains = HashSet::new();
    for network in &config.networks {
        if !seen_chains.insert(network.chain_id) {
            errors.push(ValidationError::new(
                format!("networks[{}]", network.chain_id),
                "duplicate chain_id",
            ));
        }
        validate_network(network, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_network(network: &NetworkConfig, errors: &mut Vec<ValidationError>) {
    let prefix = format!("networks[{}]", network.chain_id);

    if network.providers.is_empty() {
        errors.push(ValidationError::new(format!("{prefix}.providers"), "at least one provider is required"));
    }

    for (i, provider) in network.providers.iter().enumerate() {
        match (&provider.url, &provider.template) {
            (Some(_), Some(_)) => errors.push(ValidationError::new(
                format!("{prefix}.providers[{i}]"),
                "set either url or template, not both",
            )),
            (None, None) => errors.push(ValidationError::new(
                format!("{prefix}.providers[{i}]"),
                "one of url or template is required",
            )),
            (None, Some(template))
                if template_needs_credential(template)
                    && provider.credential.is_none()
                    && provider.credential_env.is_none() =>
            {
                errors.push(ValidationError::new(
                    format!("{prefix}.providers[{i}]"),
                    "template requires credential or credential_env",
                ))
            }
            _ => {}
        }
    }

    if let Some(ranking) = &network.ranking {
        if ranking.len() != network.providers.len() {
            errors.push(ValidationError::new(
                format!("{prefix}.ranking"),
                "must have one entry per provider",
            ));
        }
        let unique: HashSet<_> = ranking.iter().collect();
        if unique.len() != ranking.len() {
            errors.push(ValidationError::new(format!("{prefix}.ranking"), "ranks must be unique"));
        }
    }

    if let Some(weights) = &network.weights {
        if weights.len() != network.providers.len() {
            errors.push(ValidationError::new(
                format!("{prefix}.weights"),
                "must have one entry per provider",
            ));
        }
        if weights.iter().any(|w| *w < WEIGHT_AS_FALLBACK) {
            errors.push(ValidationError::new(
                format!("{prefix}.weights"),
                "weights must be positive, 0 (never) or -1 (fallback only)",
            ));
        }
    }

    check_probability(errors, &format!("{prefix}.rollout_probability"), network.rollout_probability);
}

fn check_probability(errors: &mut Vec<ValidationError>, field: &str, value: f64) {
    if !(0.0..=1.0).contains(&value) {
        errors.push(ValidationError::new(field, "must be within [0, 1]"));
    }
}
