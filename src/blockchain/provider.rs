//! Provider identity and endpoint URL templates.
//!
//! # Responsibilities
//! - Derive a stable provider name from an endpoint URL
//! - Build the `{chain}_{NAME}` provider id used as the health store key
//! - Expand `{PROVIDER}_{chain}` template keys plus credentials into URLs
//!
//! # Design Decisions
//! - Name tokens are an explicit ordered list; the first match wins
//! - Matching is a case-insensitive substring test on the whole URL
//! - The QuikNode family is refined into a variant by a host sub-token

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::blockchain::types::ChainId;
use crate::config::ConfigError;

/// Known upstream RPC providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderName {
    Infura,
    Quiknode,
    QuiknodeGeth,
    QuiknodeReth,
    Alchemy,
    Forno,
    Nirvana,
    Unknown,
}

impl ProviderName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::Infura => "INFURA",
            ProviderName::Quiknode => "QUIKNODE",
            ProviderName::QuiknodeGeth => "QUIKNODE_GETH",
            ProviderName::QuiknodeReth => "QUIKNODE_RETH",
            ProviderName::Alchemy => "ALCHEMY",
            ProviderName::Forno => "FORNO",
            ProviderName::Nirvana => "NIRVANA",
            ProviderName::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tokens checked in order against the upper-cased URL.
const PROVIDER_TOKENS: &[(&str, ProviderName)] = &[
    ("INFURA", ProviderName::Infura),
    ("QUIKNODE", ProviderName::Quiknode),
    ("QUICKNODE", ProviderName::Quiknode),
    ("ALCHEMY", ProviderName::Alchemy),
    ("FORNO", ProviderName::Forno),
    ("NIRVANA", ProviderName::Nirvana),
];

/// Host sub-tokens distinguishing QuikNode deployments.
const QUIKNODE_VARIANTS: &[(&str, ProviderName)] = &[
    ("solitary", ProviderName::QuiknodeGeth),
    ("ultra", ProviderName::QuiknodeReth),
];

/// Derive the provider name of an endpoint URL.
pub fn derive_provider_name(url: &str) -> ProviderName {
    let upper = url.to_uppercase();
    let Some(name) = PROVIDER_TOKENS
        .iter()
        .find(|(token, _)| upper.contains(token))
        .map(|(_, name)| *name)
    else {
        return ProviderName::Unknown;
    };

    if name != ProviderName::Quiknode {
        return name;
    }

    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_else(|| url.to_lowercase());
    QUIKNODE_VARIANTS
        .iter()
        .find(|(token, _)| host.contains(token))
        .map(|(_, variant)| *variant)
        .unwrap_or(name)
}

/// Stable identity of a provider on a network, e.g. `56_QUIKNODE`.
pub fn provider_id(chain_id: ChainId, name: ProviderName) -> String {
    format!("{}_{}", chain_id, name)
}

/// Host part of an endpoint URL, safe to log (path and query may carry API keys).
pub fn display_host(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        _ => "<no-host>".to_string(),
    }
}

/// Whether `generate_provider_url` needs a credential for `key`.
pub fn template_needs_credential(key: &str) -> bool {
    key != "FORNO_42220"
}

/// Expand a template key (`{PROVIDER}_{chain}`) and its credential into a URL.
///
/// The credential is a comma separated token list; QuikNode templates expect
/// `subdomain,token`, Forno needs none, all others a single API key.
pub fn generate_provider_url(key: &str, credential: &str) -> Result<String, ConfigError> {
    if !template_needs_credential(key) {
        return Ok("https://forno.celo.org".to_string());
    }

    let tokens: Vec<&str> = credential.split(',').map(str::trim).collect();
    let first = tokens
        .first()
        .copied()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ConfigError::MissingCredential(key.to_string()))?;

    let url = match key {
        "INFURA_1" => format!("https://mainnet.infura.io/v3/{first}"),
        "INFURA_10" => format!("https://optimism-mainnet.infura.io/v3/{first}"),
        "INFURA_137" => format!("https://polygon-mainnet.infura.io/v3/{first}"),
        "INFURA_8453" => format!("https://base-mainnet.infura.io/v3/{first}"),
        "INFURA_42161" => format!("https://arbitrum-mainnet.infura.io/v3/{first}"),
        "INFURA_43114" => format!("https://avalanche-mainnet.infura.io/v3/{first}"),
        "INFURA_11155111" => format!("https://sepolia.infura.io/v3/{first}"),
        "ALCHEMY_1" => format!("https://eth-mainnet-fast.g.alchemy.com/v2/{first}"),
        "ALCHEMY_10" => format!("https://opt-mainnet-fast.g.alchemy.com/v2/{first}"),
        "ALCHEMY_137" => format!("https://polygon-mainnet-fast.g.alchemy.com/v2/{first}"),
        "ALCHEMY_8453" => format!("https://base-mainnet-fast.g.alchemy.com/v2/{first}"),
        "ALCHEMY_42161" => format!("https://arb-mainnet-fast.g.alchemy.com/v2/{first}"),
        "ALCHEMY_11155111" => format!("https://eth-sepolia-fast.g.alchemy.com/v2/{first}"),
        _ if key.starts_with("QUIKNODE_") => {
            let token = tokens
                .get(1)
                .copied()
                .filter(|t| !t.is_empty())
                .ok_or_else(|| ConfigError::MissingCredential(key.to_string()))?;
            let network = match key {
                "QUIKNODE_1" => "",
                "QUIKNODE_10" => ".optimism",
                "QUIKNODE_56" => ".bsc",
                "QUIKNODE_137" => ".matic",
                "QUIKNODE_8453" => ".base-mainnet",
                "QUIKNODE_42161" => ".arbitrum-mainnet",
                "QUIKNODE_43114" => ".avalanche-mainnet",
                "QUIKNODE_11155111" => ".ethereum-sepolia",
                _ => return Err(ConfigError::UnknownTemplate(key.to_string())),
            };
            format!("https://{first}{network}.quiknode.pro/{token}")
        }
        _ => return Err(ConfigError::UnknownTemplate(key.to_string())),
    };

    Ok(url)
}
