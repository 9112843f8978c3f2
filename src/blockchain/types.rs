//! Chain-specific types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Re-exported so callers can match on transport failures without importing alloy.
pub use alloy::transports::{TransportError, TransportErrorKind};

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl ChainId {
    pub const MAINNET: ChainId = ChainId(1);
    pub const OPTIMISM: ChainId = ChainId(10);
    pub const BNB: ChainId = ChainId(56);
    pub const POLYGON: ChainId = ChainId(137);
    pub const BASE: ChainId = ChainId(8453);
    pub const ARBITRUM: ChainId = ChainId(42161);
    pub const CELO: ChainId = ChainId(42220);
    pub const AVALANCHE: ChainId = ChainId(43114);
    pub const SEPOLIA: ChainId = ChainId(11155111);

    /// Human readable network name, used in logs and URL templates.
    pub fn network_name(&self) -> &'static str {
        match self.0 {
            1 => "mainnet",
            10 => "optimism",
            56 => "bnb",
            137 => "polygon",
            8453 => "base",
            42161 => "arbitrum",
            42220 => "celo",
            43114 => "avalanche",
            11155111 => "sepolia",
            _ => "unknown",
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_names() {
        assert_eq!(ChainId::MAINNET.network_name(), "mainnet");
        assert_eq!(ChainId(42161).network_name(), "arbitrum");
        assert_eq!(ChainId(999_999).network_name(), "unknown");
    }

    #[test]
    fn test_serializes_as_number() {
        assert_eq!(serde_json::to_string(&ChainId(56)).unwrap(), "56");
    }
}
