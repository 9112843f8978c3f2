//! Per-process registry of network gateways.
//!
//! # Responsibilities
//! - Resolve endpoint URLs (literal, or template + credential)
//! - Decide per network whether multi-endpoint behavior is rolled out
//! - Build each gateway at most once and hand out shared references
//!
//! # Design Decisions
//! - Owned by the caller and passed by reference; no global state
//! - `get_or_build` holds the map shard lock while building, so concurrent
//!   first use of one network yields a single gateway
//! - `bootstrap` builds every configured network up front so configuration
//!   errors stop the process at startup

use dashmap::DashMap;
use std::sync::Arc;
use url::Url;

use crate::blockchain::provider::{generate_provider_url, template_needs_credential};
use crate::blockchain::transport::{AlloyTransport, RpcTransport};
use crate::blockchain::types::ChainId;
use crate::config::{ConfigError, EndpointConfig, GatewayConfig, NetworkConfig, ProviderUrlConfig};
use crate::health::repository::HealthStateRepository;
use crate::load_balancer::endpoint::SingleEndpointProvider;
use crate::load_balancer::gateway::{GatewaySettings, GatewaySnapshot, UniProvider};

/// Builds the transport for one resolved endpoint URL.
pub type TransportFactory = Arc<dyn Fn(&Url, &EndpointConfig) -> Arc<dyn RpcTransport> + Send + Sync>;

/// Factory producing alloy HTTP transports.
pub fn alloy_transport_factory() -> TransportFactory {
    Arc::new(|url: &Url, config: &EndpointConfig| {
        Arc::new(AlloyTransport::new(url.clone(), config.rpc_timeout())) as Arc<dyn RpcTransport>
    })
}

/// Resolve the `index`-th provider entry of a network into an endpoint URL.
pub fn resolve_provider_url(
    chain_id: ChainId,
    index: usize,
    provider: &ProviderUrlConfig,
) -> Result<Url, ConfigError> {
    let raw = match (&provider.url, &provider.template) {
        (Some(url), _) => url.clone(),
        (None, Some(template)) => {
            let credential = match (&provider.credential, &provider.credential_env) {
                _ if !template_needs_credential(template) => String::new(),
                (Some(credential), _) => credential.clone(),
                (None, Some(var)) => std::env::var(var).map_err(|_| ConfigError::MissingEnv(var.clone()))?,
                (None, None) => String::new(),
            };
            generate_provider_url(template, &credential)?
        }
        (None, None) => {
            return Err(ConfigError::MissingProviderUrl {
                chain_id: chain_id.0,
                index,
            })
        }
    };

    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl {
        url: redact_url(&raw),
        reason: e.to_string(),
    })
}

/// Scheme and authority only; paths and queries may carry API keys.
fn redact_url(raw: &str) -> String {
    match raw.split_once("://") {
        Some((scheme, rest)) => format!("{}://{}", scheme, rest.split('/').next().unwrap_or_default()),
        None => "<redacted>".to_string(),
    }
}

pub struct ProviderRegistry {
    config: GatewayConfig,
    repository: Option<Arc<dyn HealthStateRepository>>,
    transports: TransportFactory,
    gateways: DashMap<ChainId, Arc<UniProvider>>,
}

impl ProviderRegistry {
    /// Registry using real HTTP transports.
    pub fn new(config: GatewayConfig, repository: Option<Arc<dyn HealthStateRepository>>) -> Self {
        Self::with_transport_factory(config, repository, alloy_transport_factory())
    }

    pub fn with_transport_factory(
        config: GatewayConfig,
        repository: Option<Arc<dyn HealthStateRepository>>,
        transports: TransportFactory,
    ) -> Self {
        Self {
            config,
            repository,
            transports,
            gateways: DashMap::new(),
        }
    }

    /// Build every configured network. Any configuration error is returned.
    pub fn bootstrap(&self) -> Result<(), ConfigError> {
        for network in &self.config.networks {
            self.get_or_build(ChainId(network.chain_id))?;
        }
        tracing::info!(networks = self.gateways.len(), "Provider registry bootstrapped");
        Ok(())
    }

    /// The gateway of `chain_id`, built on first use.
    pub fn get_or_build(&self, chain_id: ChainId) -> Result<Arc<UniProvider>, ConfigError> {
        if let Some(gateway) = self.gateways.get(&chain_id) {
            return Ok(Arc::clone(gateway.value()));
        }
        let entry = self
            .gateways
            .entry(chain_id)
            .or_try_insert_with(|| self.build(chain_id).map(Arc::new))?;
        Ok(Arc::clone(entry.value()))
    }

    /// An already built gateway.
    pub fn get(&self, chain_id: ChainId) -> Option<Arc<UniProvider>> {
        self.gateways.get(&chain_id).map(|g| Arc::clone(g.value()))
    }

    pub fn chain_ids(&self) -> Vec<ChainId> {
        let mut ids: Vec<ChainId> = self.gateways.iter().map(|g| *g.key()).collect();
        ids.sort();
        ids
    }

    pub fn snapshot(&self) -> Vec<GatewaySnapshot> {
        let mut snapshots: Vec<GatewaySnapshot> = self.gateways.iter().map(|g| g.value().snapshot()).collect();
        snapshots.sort_by_key(|s| s.chain_id);
        snapshots
    }

    fn build(&self, chain_id: ChainId) -> Result<UniProvider, ConfigError> {
        let network = self
            .config
            .network(chain_id.0)
            .ok_or(ConfigError::UnknownNetwork(chain_id.0))?;

        let urls = network
            .providers
            .iter()
            .enumerate()
            .map(|(index, provider)| resolve_provider_url(chain_id, index, provider))
            .collect::<Result<Vec<_>, _>>()?;
        if urls.is_empty() {
            return Err(ConfigError::NoEndpoints(chain_id.0));
        }

        let multi_endpoint = network.rollout_probability >= 1.0
            || rand::random::<f64>() < network.rollout_probability;

        let gateway = if multi_endpoint {
            let endpoints = urls.iter().map(|url| self.endpoint(chain_id, url)).collect();
            UniProvider::new(chain_id, endpoints, self.settings(network))?
        } else {
            let index = preferred_index(network);
            let endpoint = self.endpoint(chain_id, &urls[index]);
            let settings = GatewaySettings {
                fallback_disabled: true,
                uni: self.config.gateway.clone(),
                ..GatewaySettings::default()
            };
            UniProvider::new(chain_id, vec![endpoint], settings)?
        };

        tracing::info!(
            chain_id = %chain_id,
            network = chain_id.network_name(),
            multi_endpoint,
            endpoints = gateway.endpoints().len(),
            "Gateway built"
        );
        Ok(gateway)
    }

    fn endpoint(&self, chain_id: ChainId, url: &Url) -> Arc<SingleEndpointProvider> {
        let config = self.config.endpoint.clone();
        let transport = (self.transports)(url, &config);
        Arc::new(SingleEndpointProvider::new(
            chain_id,
            url,
            transport,
            config,
            self.repository.clone(),
        ))
    }

    fn settings(&self, network: &NetworkConfig) -> GatewaySettings {
        GatewaySettings {
            ranking: network.ranking.clone(),
            weights: network.weights.clone(),
            auto_switch_allowed: network.session_allow_provider_fallback_when_unhealthy,
            fallback_disabled: false,
            uni: self.config.gateway.clone(),
        }
    }
}

/// Index of the rank-0 provider, or the first one without a ranking.
fn preferred_index(network: &NetworkConfig) -> usize {
    network
        .ranking
        .as_ref()
        .and_then(|ranking| {
            ranking
                .iter()
                .enumerate()
                .min_by_key(|(_, rank)| **rank)
                .map(|(i, _)| i)
        })
        .filter(|&i| i < network.providers.len())
        .unwrap_or(0)
}
