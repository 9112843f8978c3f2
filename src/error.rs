//! Caller-facing gateway errors.

use thiserror::Error;

use crate::blockchain::types::TransportError;

/// Everything a gateway call can fail with.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The upstream call itself failed; passed through untouched.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Every endpoint of the network is Unhealthy (or never selectable).
    #[error("No healthy provider available")]
    NoHealthyProvider,

    /// The session is pinned to an Unhealthy endpoint and may not switch.
    #[error("Forced to use the same provider during the session but the provider ({provider_name}) is unhealthy")]
    SessionProviderUnhealthy { provider_name: String },

    /// The upstream answered, but not with the expected shape.
    #[error("Failed to decode {method} response: {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },
}

impl GatewayError {
    /// Stable reason label for metrics and JSON-RPC error mapping.
    pub fn reason(&self) -> &'static str {
        match self {
            GatewayError::Transport(_) => "transport",
            GatewayError::NoHealthyProvider => "no_healthy_provider",
            GatewayError::SessionProviderUnhealthy { .. } => "session_provider_unhealthy",
            GatewayError::Decode { .. } => "decode",
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::types::TransportErrorKind;

    #[test]
    fn test_messages() {
        assert_eq!(GatewayError::NoHealthyProvider.to_string(), "No healthy provider available");
        assert_eq!(
            GatewayError::SessionProviderUnhealthy { provider_name: "UNKNOWN".into() }.to_string(),
            "Forced to use the same provider during the session but the provider (UNKNOWN) is unhealthy"
        );
    }

    #[test]
    fn test_transport_error_is_transparent() {
        let inner = TransportErrorKind::custom_str("boom");
        let expected = inner.to_string();
        let err = GatewayError::from(inner);
        assert_eq!(err.to_string(), expected);
        assert_eq!(err.reason(), "transport");
    }
}
