//! Multi-endpoint gateway for one network.
//!
//! # Responsibilities
//! - Pick the endpoint serving each call (override, session, health, precedence, weights)
//! - Forward the call to exactly that endpoint; no retries, no hedging
//! - After each call, start recovery probes for idle Unhealthy endpoints and
//!   latency probes for idle Healthy ones, without waiting for them
//!
//! # Selection
//! ```text
//! fallback disabled        → most preferred endpoint, whatever its health
//! session bound, Healthy   → same endpoint
//! session bound, Unhealthy → error unless auto-switch is allowed
//! Healthy set empty        → "No healthy provider available"
//! no weights               → most preferred Healthy endpoint
//! weights                  → weighted draw over the Healthy endpoints
//! ```

use arc_swap::ArcSwapOption;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::Instant;

use crate::blockchain::types::ChainId;
use crate::config::validation::ValidationError;
use crate::config::{ConfigError, UniProviderConfig};
use crate::error::{GatewayError, GatewayResult};
use crate::load_balancer::endpoint::{EndpointSnapshot, SingleEndpointProvider, RECOVERY_PROBE_METHOD};
use crate::load_balancer::preference::PreferenceOrder;
use crate::load_balancer::session::SessionCache;
use crate::load_balancer::weighted::WeightedRandom;
use crate::load_balancer::SelectionStrategy;
use crate::observability::metrics;

/// Methods cheap enough to replay as latency probes.
const LATENCY_PROBE_METHODS: &[&str] = &[
    "eth_blockNumber",
    "eth_chainId",
    "eth_gasPrice",
    "eth_getBlockByNumber",
    "eth_call",
];

/// Per-network selection settings.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Rank per endpoint, 0 = most preferred. Defaults to list order.
    pub ranking: Option<Vec<u32>>,
    /// Weight per endpoint. `None` selects by precedence only.
    pub weights: Option<Vec<i64>>,
    /// Let a session leave its endpoint once that endpoint is Unhealthy.
    pub auto_switch_allowed: bool,
    /// Route everything to the most preferred endpoint.
    pub fallback_disabled: bool,
    pub uni: UniProviderConfig,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            ranking: None,
            weights: None,
            auto_switch_allowed: true,
            fallback_disabled: false,
            uni: UniProviderConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GatewaySnapshot {
    pub chain_id: ChainId,
    pub network: &'static str,
    pub fallback_disabled: bool,
    pub sessions: usize,
    pub last_used: Option<String>,
    pub endpoints: Vec<EndpointSnapshot>,
}

/// Gateway over the endpoints of one network.
#[derive(Debug)]
pub struct UniProvider {
    chain_id: ChainId,
    endpoints: Vec<Arc<SingleEndpointProvider>>,
    precedence: Vec<u32>,
    strategy: Box<dyn SelectionStrategy>,
    sessions: SessionCache,
    last_used: ArcSwapOption<SingleEndpointProvider>,
    auto_switch_allowed: bool,
    fallback_disabled: AtomicBool,
    config: UniProviderConfig,
}

impl UniProvider {
    pub fn new(
        chain_id: ChainId,
        endpoints: Vec<Arc<SingleEndpointProvider>>,
        settings: GatewaySettings,
    ) -> Result<Self, ConfigError> {
        if endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints(chain_id.0));
        }

        let field = |name: &str| format!("networks[{}].{}", chain_id, name);
        let mut errors = Vec::new();
        let precedence = settings
            .ranking
            .unwrap_or_else(|| (0..endpoints.len() as u32).collect());
        if precedence.len() != endpoints.len() {
            errors.push(ValidationError::new(field("ranking"), "must have one entry per provider"));
        }
        let strategy: Box<dyn SelectionStrategy> = match settings.weights {
            Some(weights) => {
                if weights.len() != endpoints.len() {
                    errors.push(ValidationError::new(field("weights"), "must have one entry per provider"));
                }
                Box::new(WeightedRandom::new(weights))
            }
            None => Box::new(PreferenceOrder::new()),
        };
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }

        tracing::info!(
            chain_id = %chain_id,
            network = chain_id.network_name(),
            endpoints = endpoints.len(),
            providers = ?endpoints.iter().map(|e| e.provider_id()).collect::<Vec<_>>(),
            strategy = ?strategy,
            "Gateway initialized"
        );

        Ok(Self {
            chain_id,
            endpoints,
            precedence,
            strategy,
            sessions: SessionCache::new(settings.uni.session_cache_capacity),
            last_used: ArcSwapOption::empty(),
            auto_switch_allowed: settings.auto_switch_allowed,
            fallback_disabled: AtomicBool::new(settings.fallback_disabled),
            config: settings.uni,
        })
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn endpoints(&self) -> &[Arc<SingleEndpointProvider>] {
        &self.endpoints
    }

    pub fn last_used_endpoint(&self) -> Option<Arc<SingleEndpointProvider>> {
        self.last_used.load_full()
    }

    pub fn is_fallback_disabled(&self) -> bool {
        self.fallback_disabled.load(Ordering::Relaxed)
    }

    /// Emergency override: send everything to the most preferred endpoint.
    pub fn set_fallback_disabled(&self, disabled: bool) {
        self.fallback_disabled.store(disabled, Ordering::Relaxed);
        tracing::warn!(chain_id = %self.chain_id, disabled, "Fallback override changed");
    }

    fn most_preferred(&self) -> usize {
        (0..self.endpoints.len())
            .min_by_key(|&i| self.precedence[i])
            .unwrap_or(0)
    }

    /// Choose the endpoint for the next call.
    pub fn select_endpoint(&self, session_id: Option<&str>) -> GatewayResult<Arc<SingleEndpointProvider>> {
        let index = self.select_index(session_id)?;
        let endpoint = Arc::clone(&self.endpoints[index]);
        self.last_used.store(Some(Arc::clone(&endpoint)));
        Ok(endpoint)
    }

    fn select_index(&self, session_id: Option<&str>) -> GatewayResult<usize> {
        if self.is_fallback_disabled() {
            return Ok(self.most_preferred());
        }

        if let Some(session_id) = session_id {
            if let Some(index) = self.sessions.get(session_id) {
                let endpoint = &self.endpoints[index];
                if endpoint.is_healthy() {
                    return Ok(index);
                }
                if !self.auto_switch_allowed {
                    return Err(GatewayError::SessionProviderUnhealthy {
                        provider_name: endpoint.provider_name().to_string(),
                    });
                }
                tracing::info!(
                    chain_id = %self.chain_id,
                    session_id = session_id,
                    provider_id = %endpoint.provider_id(),
                    "Session endpoint unhealthy, switching"
                );
            }
        }

        let mut healthy: Vec<usize> = (0..self.endpoints.len())
            .filter(|&i| self.endpoints[i].is_healthy())
            .collect();
        healthy.sort_by_key(|&i| self.precedence[i]);

        let index = self
            .strategy
            .select(&healthy)
            .ok_or(GatewayError::NoHealthyProvider)?;

        if let Some(session_id) = session_id {
            self.sessions.bind(session_id, index);
        }
        Ok(index)
    }

    /// Invoke `method` on the selected endpoint. The result or the upstream
    /// error is returned as is; probes started afterwards never affect it.
    pub async fn request(&self, method: &str, params: Value, session_id: Option<&str>) -> GatewayResult<Value> {
        let endpoint = match self.select_endpoint(session_id) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                metrics::record_selection_error(self.chain_id.0, e.reason());
                tracing::warn!(chain_id = %self.chain_id, method, error = %e, "Endpoint selection failed");
                // Nothing was served, but Unhealthy endpoints still need probing
                // or the network never comes back.
                if rand::random::<f64>() < self.config.health_check_sample_prob {
                    self.check_unhealthy_endpoints(None, Instant::now());
                }
                return Err(e);
            }
        };
        metrics::record_provider_selected(endpoint.provider_id());

        let replay = (self.config.enable_shadow_latency_evaluation
            && rand::random::<f64>() < self.config.latency_evaluation_sample_prob)
            .then(|| params.clone());

        let result = endpoint.request(method, params).await;

        self.after_call(&endpoint, method, replay);
        result.map_err(GatewayError::from)
    }

    fn after_call(&self, served: &Arc<SingleEndpointProvider>, method: &str, replay: Option<Value>) {
        let now = Instant::now();
        if rand::random::<f64>() < self.config.health_check_sample_prob {
            self.check_unhealthy_endpoints(Some(served), now);
        }
        if let Some(params) = replay {
            self.check_other_healthy_endpoints(served, method, params, now);
        }
    }

    /// Start a recovery probe on every Unhealthy endpoint idle long enough,
    /// skipping the one that just `served` the call.
    pub fn check_unhealthy_endpoints(&self, served: Option<&Arc<SingleEndpointProvider>>, now: Instant) {
        for endpoint in &self.endpoints {
            if served.is_some_and(|served| Arc::ptr_eq(endpoint, served)) || !endpoint.recovery_due(now) {
                continue;
            }
            let Some(guard) = endpoint.try_begin_health_evaluation() else {
                continue;
            };
            tracing::debug!(
                chain_id = %self.chain_id,
                provider_id = %endpoint.provider_id(),
                score = endpoint.health_score(),
                "Starting recovery probe"
            );
            tokio::spawn(Arc::clone(endpoint).evaluate_for_recovery(guard));
        }
    }

    /// Start a latency probe on every other Healthy endpoint idle long enough.
    fn check_other_healthy_endpoints(
        &self,
        served: &Arc<SingleEndpointProvider>,
        method: &str,
        params: Value,
        now: Instant,
    ) {
        let (probe_method, probe_params) = if LATENCY_PROBE_METHODS.contains(&method) {
            (method, params)
        } else {
            (RECOVERY_PROBE_METHOD, Value::Array(vec![]))
        };

        for endpoint in &self.endpoints {
            if Arc::ptr_eq(endpoint, served) || !endpoint.latency_evaluation_due(now) {
                continue;
            }
            let Some(guard) = endpoint.try_begin_latency_evaluation() else {
                continue;
            };
            tokio::spawn(Arc::clone(endpoint).evaluate_latency(
                guard,
                probe_method.to_string(),
                probe_params.clone(),
            ));
        }
    }

    pub fn snapshot(&self) -> GatewaySnapshot {
        GatewaySnapshot {
            chain_id: self.chain_id,
            network: self.chain_id.network_name(),
            fallback_disabled: self.is_fallback_disabled(),
            sessions: self.sessions.len(),
            last_used: self.last_used.load().as_ref().map(|e| e.provider_id().to_string()),
            endpoints: self.endpoints.iter().map(|e| e.snapshot()).collect(),
        }
    }
}
