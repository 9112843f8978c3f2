//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the RPC gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP server settings.
    pub server: ServerConfig,

    /// Scoring thresholds shared by every endpoint.
    pub endpoint: EndpointConfig,

    /// Multi-endpoint selection settings.
    pub gateway: UniProviderConfig,

    /// Distributed health store backend.
    pub health_store: HealthStoreConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// One entry per blockchain network.
    pub networks: Vec<NetworkConfig>,
}

impl GatewayConfig {
    /// Find the configuration of a network by chain id.
    pub fn network(&self, chain_id: u64) -> Option<&NetworkConfig> {
        self.networks.iter().find(|n| n.chain_id == chain_id)
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Whole-request timeout for inbound HTTP requests.
    pub request_timeout_secs: u64,

    /// Maximum accepted request body size.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Health scoring thresholds for a single endpoint.
///
/// Scores are non-positive: 0 is a perfect score and every failure pushes
/// the score further below zero. Idle time heals the score back toward 0.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Score added on a failed call (negative).
    pub error_penalty: f64,

    /// Score added on a successful but slow call (negative).
    pub high_latency_penalty: f64,

    /// A Healthy endpoint at or below this score becomes Unhealthy.
    pub health_score_fallback_threshold: f64,

    /// An Unhealthy endpoint at or above this score recovers during a recovery probe.
    pub health_score_recover_threshold: f64,

    /// Calls slower than this are penalized.
    pub max_latency_allowed_ms: u64,

    /// Score regained per millisecond of idle time.
    pub recover_score_per_ms: f64,

    /// Upper bound on idle time credited by a single decay step.
    pub recover_max_wait_time_to_acknowledge_ms: u64,

    /// Minimum idle time before an Unhealthy endpoint is probed for recovery.
    pub recover_evaluation_wait_period_ms: u64,

    /// Minimum idle time before a Healthy endpoint gets a latency probe.
    pub latency_evaluation_wait_period_ms: u64,

    /// Age after which latency samples are evicted.
    pub latency_stat_history_window_secs: u64,

    /// Pull healthiness from the distributed health store.
    pub enable_db_sync: bool,

    /// Minimum interval between two store reads of one endpoint.
    pub db_sync_interval_secs: u64,

    /// Probability that an eligible call triggers a store read.
    pub db_sync_sample_prob: f64,

    /// Transport-level timeout of the HTTP transport.
    pub rpc_timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            error_penalty: -50.0,
            high_latency_penalty: -20.0,
            health_score_fallback_threshold: -300.0,
            health_score_recover_threshold: -100.0,
            max_latency_allowed_ms: 4_000,
            recover_score_per_ms: 0.01,
            recover_max_wait_time_to_acknowledge_ms: 60_000,
            recover_evaluation_wait_period_ms: 60_000,
            latency_evaluation_wait_period_ms: 60_000,
            latency_stat_history_window_secs: 180,
            enable_db_sync: true,
            db_sync_interval_secs: 60,
            db_sync_sample_prob: 1.0,
            rpc_timeout_secs: 10,
        }
    }
}

impl EndpointConfig {
    pub fn max_latency_allowed(&self) -> Duration {
        Duration::from_millis(self.max_latency_allowed_ms)
    }

    pub fn recover_max_wait(&self) -> Duration {
        Duration::from_millis(self.recover_max_wait_time_to_acknowledge_ms)
    }

    pub fn recover_evaluation_wait_period(&self) -> Duration {
        Duration::from_millis(self.recover_evaluation_wait_period_ms)
    }

    pub fn latency_evaluation_wait_period(&self) -> Duration {
        Duration::from_millis(self.latency_evaluation_wait_period_ms)
    }

    pub fn latency_history_window(&self) -> Duration {
        Duration::from_secs(self.latency_stat_history_window_secs)
    }

    pub fn db_sync_interval(&self) -> Duration {
        Duration::from_secs(self.db_sync_interval_secs)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}

/// Multi-endpoint gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UniProviderConfig {
    /// Probe other Healthy endpoints to keep their latency window fresh.
    pub enable_shadow_latency_evaluation: bool,

    /// Probability that a call triggers latency probes.
    pub latency_evaluation_sample_prob: f64,

    /// Probability that a call triggers the recovery sweep.
    pub health_check_sample_prob: f64,

    /// Maximum number of remembered sessions (LRU eviction).
    pub session_cache_capacity: usize,
}

impl Default for UniProviderConfig {
    fn default() -> Self {
        Self {
            enable_shadow_latency_evaluation: true,
            latency_evaluation_sample_prob: 0.1,
            health_check_sample_prob: 1.0,
            session_cache_capacity: 1_000,
        }
    }
}

/// Backend of the distributed health store.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthStoreBackend {
    #[default]
    Memory,
    File,
}

/// Distributed health store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthStoreConfig {
    pub backend: HealthStoreBackend,

    /// Directory holding one document per provider (file backend only).
    pub path: Option<String>,
}

impl Default for HealthStoreConfig {
    fn default() -> Self {
        Self {
            backend: HealthStoreBackend::Memory,
            path: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log level when RUST_LOG is unset.
    pub log_level: String,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Prometheus listener address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Per-network endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// EVM chain id.
    pub chain_id: u64,

    /// Ordered endpoint definitions.
    #[serde(default)]
    pub providers: Vec<ProviderUrlConfig>,

    /// Precedence rank per provider (0 = most preferred). Defaults to list order.
    #[serde(default)]
    pub ranking: Option<Vec<u32>>,

    /// Selection weight per provider. Positive weights are drawn proportionally,
    /// `0` is never selected and `-1` is only selected when nothing else can be.
    #[serde(default)]
    pub weights: Option<Vec<i64>>,

    /// Probability that this process enables multi-endpoint behavior.
    #[serde(default = "default_rollout_probability")]
    pub rollout_probability: f64,

    /// Let a session move to another endpoint when its pinned one is Unhealthy.
    #[serde(default = "default_true")]
    pub session_allow_provider_fallback_when_unhealthy: bool,
}

fn default_rollout_probability() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

/// One endpoint: either a literal URL or a template key plus credential.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProviderUrlConfig {
    /// Literal endpoint URL.
    pub url: Option<String>,

    /// Template key such as `INFURA_1` or `QUIKNODE_56`.
    pub template: Option<String>,

    /// Inline credential substituted into the template.
    pub credential: Option<String>,

    /// Environment variable holding the credential.
    pub credential_env: Option<String>,
}

impl ProviderUrlConfig {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn from_template(template: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            template: Some(template.into()),
            credential: Some(credential.into()),
            ..Self::default()
        }
    }
}
