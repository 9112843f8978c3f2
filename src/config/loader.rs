//! Configuration loading from disk.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::config::schema::{GatewayConfig, NetworkConfig, ProviderUrlConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading and bootstrap-time resolution.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    ParseJson(serde_json::Error),
    Validation(Vec<ValidationError>),
    /// A template key with no known URL pattern.
    UnknownTemplate(String),
    /// A template needs a credential and none was supplied.
    MissingCredential(String),
    /// A provider entry has neither a literal URL nor a template.
    MissingProviderUrl { chain_id: u64, index: usize },
    /// The named environment variable is not set.
    MissingEnv(String),
    /// A resolved endpoint URL does not parse.
    InvalidUrl { url: String, reason: String },
    /// A network is enabled but has no usable endpoint.
    NoEndpoints(u64),
    /// A network was requested that is not configured.
    UnknownNetwork(u64),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::ParseJson(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
            ConfigError::UnknownTemplate(key) => write!(f, "No URL template for provider key {}", key),
            ConfigError::MissingCredential(key) => write!(f, "Missing credential for provider key {}", key),
            ConfigError::MissingProviderUrl { chain_id, index } => {
                write!(f, "Network {} provider #{} has neither a url nor a template", chain_id, index)
            }
            ConfigError::MissingEnv(var) => write!(f, "Environment variable {} is not set", var),
            ConfigError::InvalidUrl { url, reason } => write!(f, "Invalid endpoint URL '{}': {}", url, reason),
            ConfigError::NoEndpoints(chain) => write!(f, "Network {} is enabled but has no endpoints", chain),
            ConfigError::UnknownNetwork(chain) => write!(f, "Network {} is not configured", chain),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = toml::from_str(content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// One network entry of the JSON deployment config.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProdNetworkEntry {
    chain_id: u64,
    use_multi_provider: bool,
    #[serde(default)]
    session_allow_provider_fallback_when_unhealthy: Option<bool>,
    #[serde(default)]
    provider_initial_weights: Option<Vec<i64>>,
    #[serde(default)]
    provider_urls: Option<Vec<String>>,
}

impl From<ProdNetworkEntry> for NetworkConfig {
    fn from(entry: ProdNetworkEntry) -> Self {
        // Each provider key doubles as the environment variable holding its credential.
        let providers = entry
            .provider_urls
            .unwrap_or_default()
            .into_iter()
            .map(|key| ProviderUrlConfig {
                credential_env: Some(key.clone()),
                template: Some(key),
                ..ProviderUrlConfig::default()
            })
            .collect();

        NetworkConfig {
            chain_id: entry.chain_id,
            providers,
            ranking: None,
            weights: entry.provider_initial_weights,
            rollout_probability: if entry.use_multi_provider { 1.0 } else { 0.0 },
            session_allow_provider_fallback_when_unhealthy: entry
                .session_allow_provider_fallback_when_unhealthy
                .unwrap_or(true),
        }
    }
}

/// Parse the JSON deployment config (an array of per-network entries).
///
/// Returns the network list only; thresholds keep their defaults unless
/// merged into a [`GatewayConfig`] by the caller.
pub fn parse_prod_config(content: &str) -> Result<Vec<NetworkConfig>, ConfigError> {
    let entries: Vec<ProdNetworkEntry> = serde_json::from_str(content).map_err(ConfigError::ParseJson)?;
    Ok(entries.into_iter().map(NetworkConfig::from).collect())
}

/// Load the JSON deployment config and merge it into `base`, replacing its networks.
pub fn load_prod_config(path: &Path, base: GatewayConfig) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config = GatewayConfig {
        networks: parse_prod_config(&content)?,
        ..base
    };

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_rejects_invalid_values() {
        let result = parse_config(
            r#"
            [endpoint]
            error_penalty = 5.0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_parse_config_reports_syntax_errors() {
        assert!(matches!(parse_config("[endpoint"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(
            r#"
            [endpoint]
            error_penalty = -40.0
            health_score_fallback_threshold = -70.0
            health_score_recover_threshold = -10.0

            [health_store]
            backend = "file"
            path = "/var/lib/rpc-gateway"

            [[networks]]
            chain_id = 56
            weights = [3, 1]
            session_allow_provider_fallback_when_unhealthy = false
            providers = [
                { template = "QUIKNODE_56", credential_env = "QUIKNODE_56" },
                { url = "https://bsc-dataseed.binance.org" },
            ]
            "#,
        )
        .unwrap();

        assert_eq!(config.endpoint.error_penalty, -40.0);
        let network = config.network(56).unwrap();
        assert_eq!(network.providers.len(), 2);
        assert_eq!(network.weights, Some(vec![3, 1]));
        assert!(!network.session_allow_provider_fallback_when_unhealthy);
    }

    #[test]
    fn test_prod_config_maps_onto_networks() {
        let networks = parse_prod_config(
            r#"[
                {"chainId": 1, "useMultiProvider": true, "providerInitialWeights": [2, 1],
                 "providerUrls": ["INFURA_1", "QUIKNODE_1"]},
                {"chainId": 10, "useMultiProvider": false,
                 "sessionAllowProviderFallbackWhenUnhealthy": false}
            ]"#,
        )
        .unwrap();

        assert_eq!(networks.len(), 2);
        assert_eq!(networks[0].rollout_probability, 1.0);
        assert_eq!(networks[0].providers[1].template.as_deref(), Some("QUIKNODE_1"));
        assert_eq!(networks[0].providers[1].credential_env.as_deref(), Some("QUIKNODE_1"));
        assert_eq!(networks[1].rollout_probability, 0.0);
        assert!(networks[1].providers.is_empty());
        assert!(!networks[1].session_allow_provider_fallback_when_unhealthy);
    }
}
