//! JSON-RPC 2.0 envelopes for the serving surface.
//!
//! Upstream results are forwarded as raw JSON; only the envelope is typed.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::GatewayError;

/// Upstream transport failure, message passed through verbatim.
pub const TRANSPORT_ERROR: i64 = -32000;
/// Every endpoint of the network is Unhealthy.
pub const NO_HEALTHY_PROVIDER: i64 = -32001;
/// The session is pinned to an Unhealthy endpoint.
pub const SESSION_PROVIDER_UNHEALTHY: i64 = -32002;
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JsonRpcRequest {
    #[serde(default = "version")]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default = "empty_params")]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: version(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: version(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }

    pub fn from_gateway_error(id: Value, err: &GatewayError) -> Self {
        Self::failure(id, error_code(err), err.to_string())
    }
}

/// JSON-RPC error code of a gateway failure.
pub fn error_code(err: &GatewayError) -> i64 {
    match err {
        GatewayError::Transport(_) => TRANSPORT_ERROR,
        GatewayError::NoHealthyProvider => NO_HEALTHY_PROVIDER,
        GatewayError::SessionProviderUnhealthy { .. } => SESSION_PROVIDER_UNHEALTHY,
        GatewayError::Decode { .. } => INTERNAL_ERROR,
    }
}

fn version() -> String {
    "2.0".to_string()
}

fn empty_params() -> Value {
    json!([])
}
