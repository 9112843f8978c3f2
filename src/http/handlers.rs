use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::blockchain::types::ChainId;
use crate::config::ConfigError;
use crate::health::alarm::AlarmError;
use crate::http::jsonrpc::{JsonRpcRequest, JsonRpcResponse, INVALID_REQUEST, PARSE_ERROR};
use crate::http::server::AppState;
use crate::load_balancer::gateway::GatewaySnapshot;

/// Header carrying the caller's session id.
pub const SESSION_ID_HEADER: &str = "x-session-id";

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub networks: usize,
    pub uptime_secs: u64,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        networks: state.registry.chain_ids().len(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

pub async fn get_providers(State(state): State<AppState>) -> Json<Vec<GatewaySnapshot>> {
    Json(state.registry.snapshot())
}

/// One JSON-RPC call routed through the network's gateway.
pub async fn rpc(
    State(state): State<AppState>,
    Path(chain_id): Path<u64>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let gateway = match state.registry.get_or_build(ChainId(chain_id)) {
        Ok(gateway) => gateway,
        Err(ConfigError::UnknownNetwork(_)) => {
            return (StatusCode::NOT_FOUND, format!("No gateway configured for chain {}", chain_id))
                .into_response();
        }
        Err(e) => {
            tracing::error!(chain_id, error = %e, "Gateway could not be built");
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            let response = JsonRpcResponse::failure(Value::Null, PARSE_ERROR, e.to_string());
            return (StatusCode::BAD_REQUEST, Json(response)).into_response();
        }
    };
    let request: JsonRpcRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(e) => {
            let response = JsonRpcResponse::failure(Value::Null, INVALID_REQUEST, e.to_string());
            return (StatusCode::BAD_REQUEST, Json(response)).into_response();
        }
    };

    let session_id = headers.get(SESSION_ID_HEADER).and_then(|v| v.to_str().ok());

    tracing::debug!(
        chain_id,
        method = %request.method,
        session = session_id.is_some(),
        "Forwarding JSON-RPC call"
    );

    let response = match gateway.request(&request.method, request.params, session_id).await {
        Ok(result) => JsonRpcResponse::success(request.id, result),
        Err(e) => JsonRpcResponse::from_gateway_error(request.id, &e),
    };
    Json(response).into_response()
}

/// Alarm Ingestion: an alarm event rewrites the provider's stored state.
pub async fn post_alarm(State(state): State<AppState>, body: Bytes) -> Response {
    match state.alarms.handle_json(&body).await {
        Ok(outcome) => {
            tracing::debug!(old = ?outcome.old, new = ?outcome.new, "Alarm handled");
            StatusCode::OK.into_response()
        }
        Err(e @ (AlarmError::MalformedPayload(_) | AlarmError::UnrecognizedAlarmName(_))) => {
            tracing::warn!(error = %e, "Rejected alarm event");
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
        Err(e @ AlarmError::Store(_)) => {
            tracing::error!(error = %e, "Alarm event could not be stored");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
