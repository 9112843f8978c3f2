//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (call outcomes, latency, health, selection)
//! - Expose Prometheus-compatible metrics endpoint
//! - Track per-endpoint and per-method metrics
//!
//! # Metrics
//! - `rpc_gateway_calls_total` (counter): calls by chain, provider, method, call type, status
//! - `rpc_gateway_call_latency_seconds` (histogram): upstream latency
//! - `rpc_gateway_health_score` (gauge): current score per provider
//! - `rpc_gateway_endpoint_healthy` (gauge): 1=healthy, 0=unhealthy
//! - `rpc_gateway_health_transitions_total` (counter): transitions by target state
//! - `rpc_gateway_provider_selected_total` (counter): selections per provider
//! - `rpc_gateway_selection_errors_total` (counter): selection failures by reason
//! - `rpc_gateway_shadow_evaluations_total` (counter): probes by kind and status
//! - `rpc_gateway_db_sync_total` (counter): store reads by result
//! - `rpc_gateway_alarm_events_total` (counter): ingested alarms by state
//!
//! # Design Decisions
//! - Every method goes through one instrumented call path, so metric names
//!   are identical across methods and only the `method` label differs
//! - Without an installed recorder all calls are no-ops

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

/// Record one finished upstream call.
pub fn record_call(
    chain_id: u64,
    provider: &str,
    method: &str,
    call_type: &'static str,
    status: &'static str,
    latency: Duration,
) {
    let chain = chain_id.to_string();
    ::metrics::counter!(
        "rpc_gateway_calls_total",
        "chain_id" => chain.clone(),
        "provider" => provider.to_string(),
        "method" => method.to_string(),
        "call_type" => call_type,
        "status" => status
    )
    .increment(1);
    ::metrics::histogram!(
        "rpc_gateway_call_latency_seconds",
        "chain_id" => chain,
        "provider" => provider.to_string(),
        "method" => method.to_string()
    )
    .record(latency.as_secs_f64());
}

pub fn record_health(provider_id: &str, score: f64, healthy: bool) {
    ::metrics::gauge!("rpc_gateway_health_score", "provider_id" => provider_id.to_string()).set(score);
    ::metrics::gauge!("rpc_gateway_endpoint_healthy", "provider_id" => provider_id.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_health_transition(provider_id: &str, to: &'static str) {
    ::metrics::counter!(
        "rpc_gateway_health_transitions_total",
        "provider_id" => provider_id.to_string(),
        "to" => to
    )
    .increment(1);
}

pub fn record_provider_selected(provider_id: &str) {
    ::metrics::counter!("rpc_gateway_provider_selected_total", "provider_id" => provider_id.to_string())
        .increment(1);
}

pub fn record_selection_error(chain_id: u64, reason: &'static str) {
    ::metrics::counter!(
        "rpc_gateway_selection_errors_total",
        "chain_id" => chain_id.to_string(),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_shadow_evaluation(provider_id: &str, kind: &'static str, status: &'static str) {
    ::metrics::counter!(
        "rpc_gateway_shadow_evaluations_total",
        "provider_id" => provider_id.to_string(),
        "kind" => kind,
        "status" => status
    )
    .increment(1);
}

pub fn record_db_sync(provider_id: &str, status: &'static str) {
    ::metrics::counter!(
        "rpc_gateway_db_sync_total",
        "provider_id" => provider_id.to_string(),
        "status" => status
    )
    .increment(1);
}

pub fn record_alarm_event(state: &'static str) {
    ::metrics::counter!("rpc_gateway_alarm_events_total", "state" => state).increment(1);
}
