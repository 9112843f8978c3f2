//! JSON-RPC transport with timeout handling.
//!
//! # Responsibilities
//! - Send an arbitrary JSON-RPC method to one endpoint
//! - Enforce the transport-level request timeout
//! - Surface failures as alloy transport errors, untouched

use alloy::providers::{Provider, RootProvider};
use async_trait::async_trait;
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

use crate::blockchain::provider::display_host;
use crate::blockchain::types::{TransportError, TransportErrorKind};

/// A JSON-RPC transport bound to one upstream endpoint.
#[async_trait]
pub trait RpcTransport: Send + Sync + fmt::Debug {
    /// Send `method` with `params` and return the raw `result` value.
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError>;
}

/// HTTP transport backed by an alloy root provider.
#[derive(Clone)]
pub struct AlloyTransport {
    provider: RootProvider,
    host: String,
    timeout_duration: Duration,
}

impl AlloyTransport {
    /// Create a transport for `url`. No connection is made until the first request.
    pub fn new(url: Url, timeout_duration: Duration) -> Self {
        let host = display_host(&url);
        Self {
            provider: RootProvider::new_http(url),
            host,
            timeout_duration,
        }
    }
}

impl fmt::Debug for AlloyTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlloyTransport")
            .field("host", &self.host)
            .field("timeout", &self.timeout_duration)
            .finish()
    }
}

#[async_trait]
impl RpcTransport for AlloyTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let call = self
            .provider
            .raw_request::<Value, Value>(Cow::Owned(method.to_string()), params);

        match timeout(self.timeout_duration, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(
                    host = %self.host,
                    method = method,
                    timeout_ms = self.timeout_duration.as_millis() as u64,
                    "RPC request timed out"
                );
                Err(TransportErrorKind::custom_str(&format!(
                    "request timed out after {}ms",
                    self.timeout_duration.as_millis()
                )))
            }
        }
    }
}
