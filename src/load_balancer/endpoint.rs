//! Single-endpoint health engine.
//!
//! # Responsibilities
//! - Own one upstream URL and its transport
//! - Wrap every call: measure latency, apply the scoring algorithm, emit metrics
//! - Run recovery and latency probes, one of each kind at a time
//! - Pull externally forced healthiness from the distributed store
//!
//! # Design Decisions
//! - All mutable state sits behind one mutex; a score update is a single
//!   critical section so concurrent outcomes never drop a penalty
//! - The lock is never held across an await
//! - Probe guards are RAII, released when the probe task finishes

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

use crate::blockchain::provider::{derive_provider_name, display_host, provider_id, ProviderName};
use crate::blockchain::transport::RpcTransport;
use crate::blockchain::types::{ChainId, TransportError};
use crate::config::EndpointConfig;
use crate::health::latency::{LatencyStats, LatencyWindow};
use crate::health::repository::HealthStateRepository;
use crate::health::scoring::{CallOutcome, HealthScore};
use crate::health::state::Healthiness;
use crate::health::sync::HealthStateSyncer;
use crate::observability::metrics;

/// Method used by recovery probes.
pub const RECOVERY_PROBE_METHOD: &str = "eth_blockNumber";

/// Why a call was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    Normal,
    HealthShadowCheck,
    LatencyShadowCheck,
}

impl CallType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallType::Normal => "normal",
            CallType::HealthShadowCheck => "health_shadow_check",
            CallType::LatencyShadowCheck => "latency_shadow_check",
        }
    }
}

/// Outcome of one wrapped call, consumed immediately by the scoring step.
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub call_type: CallType,
    pub method: String,
    pub succeeded: bool,
    pub latency: Duration,
    pub started_at: Instant,
}

#[derive(Debug)]
struct EndpointState {
    score: HealthScore,
    last_call: Instant,
    last_health_eval: Option<Instant>,
    last_latency_eval: Option<Instant>,
    latency: LatencyWindow,
}

/// Point-in-time view of an endpoint, for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointSnapshot {
    pub provider_id: String,
    pub provider_name: ProviderName,
    pub host: String,
    pub healthiness: Healthiness,
    pub health_score: f64,
    pub pinned_by_store: bool,
    pub evaluating_health: bool,
    pub evaluating_latency: bool,
    pub idle_ms: u64,
    pub latency: LatencyStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EvaluationKind {
    Health,
    Latency,
}

impl EvaluationKind {
    fn as_str(&self) -> &'static str {
        match self {
            EvaluationKind::Health => "health",
            EvaluationKind::Latency => "latency",
        }
    }
}

/// Marks a probe of one kind as running; dropping it clears the flag.
#[derive(Debug)]
pub struct EvaluationGuard {
    endpoint: Arc<SingleEndpointProvider>,
    kind: EvaluationKind,
}

impl Drop for EvaluationGuard {
    fn drop(&mut self) {
        self.endpoint.flag(self.kind).store(false, Ordering::Release);
    }
}

/// One upstream endpoint with its health score.
#[derive(Debug)]
pub struct SingleEndpointProvider {
    chain_id: ChainId,
    provider_name: ProviderName,
    provider_id: String,
    host: String,
    transport: Arc<dyn RpcTransport>,
    config: EndpointConfig,
    state: Mutex<EndpointState>,
    evaluating_health: AtomicBool,
    evaluating_latency: AtomicBool,
    syncer: Option<HealthStateSyncer>,
}

impl SingleEndpointProvider {
    /// Create an endpoint for `url`. The store is only consulted when
    /// `config.enable_db_sync` is set.
    pub fn new(
        chain_id: ChainId,
        url: &Url,
        transport: Arc<dyn RpcTransport>,
        config: EndpointConfig,
        repository: Option<Arc<dyn HealthStateRepository>>,
    ) -> Self {
        let provider_name = derive_provider_name(url.as_str());
        let provider_id = provider_id(chain_id, provider_name);
        let syncer = repository.filter(|_| config.enable_db_sync).map(|repo| {
            HealthStateSyncer::new(
                repo,
                provider_id.clone(),
                config.db_sync_interval(),
                config.db_sync_sample_prob,
            )
        });

        Self {
            chain_id,
            provider_name,
            provider_id,
            host: display_host(url),
            transport,
            state: Mutex::new(EndpointState {
                score: HealthScore::new(),
                last_call: Instant::now(),
                last_health_eval: None,
                last_latency_eval: None,
                latency: LatencyWindow::new(config.latency_history_window()),
            }),
            config,
            evaluating_health: AtomicBool::new(false),
            evaluating_latency: AtomicBool::new(false),
            syncer,
        }
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn provider_name(&self) -> ProviderName {
        self.provider_name
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn healthiness(&self) -> Healthiness {
        self.state.lock().score.healthiness()
    }

    pub fn is_healthy(&self) -> bool {
        self.healthiness().is_healthy()
    }

    pub fn health_score(&self) -> f64 {
        self.state.lock().score.score()
    }

    pub fn last_call(&self) -> Instant {
        self.state.lock().last_call
    }

    pub fn last_health_evaluation(&self) -> Option<Instant> {
        self.state.lock().last_health_eval
    }

    pub fn last_latency_evaluation(&self) -> Option<Instant> {
        self.state.lock().last_latency_eval
    }

    pub fn latency_stats(&self) -> LatencyStats {
        self.state.lock().latency.stats(Instant::now())
    }

    pub fn is_evaluating_health(&self) -> bool {
        self.evaluating_health.load(Ordering::Acquire)
    }

    pub fn is_evaluating_latency(&self) -> bool {
        self.evaluating_latency.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> EndpointSnapshot {
        let now = Instant::now();
        let mut state = self.state.lock();
        EndpointSnapshot {
            provider_id: self.provider_id.clone(),
            provider_name: self.provider_name,
            host: self.host.clone(),
            healthiness: state.score.healthiness(),
            health_score: state.score.score(),
            pinned_by_store: state.score.is_pinned_by_store(),
            evaluating_health: self.is_evaluating_health(),
            evaluating_latency: self.is_evaluating_latency(),
            idle_ms: now.saturating_duration_since(state.last_call).as_millis() as u64,
            latency: state.latency.stats(now),
        }
    }

    /// Forward an ordinary call. Failures are scored and returned unchanged.
    pub async fn request(self: &Arc<Self>, method: &str, params: Value) -> Result<Value, TransportError> {
        self.instrumented(CallType::Normal, method, params).await
    }

    async fn instrumented(
        self: &Arc<Self>,
        call_type: CallType,
        method: &str,
        params: Value,
    ) -> Result<Value, TransportError> {
        let started_at = Instant::now();
        let result = self.transport.request(method, params).await;
        let record = CallRecord {
            call_type,
            method: method.to_string(),
            succeeded: result.is_ok(),
            latency: started_at.elapsed(),
            started_at,
        };

        self.record_call(&record);
        self.maybe_sync();
        result
    }

    /// Apply a finished call to the endpoint state.
    pub fn record_call(&self, record: &CallRecord) {
        let outcome = CallOutcome::classify(record.succeeded, record.latency, &self.config);

        let (transition, score, healthiness) = {
            let mut state = self.state.lock();
            if record.succeeded {
                state.latency.record(record.started_at, record.latency);
            }

            if record.call_type == CallType::LatencyShadowCheck {
                state.last_latency_eval = Some(record.started_at);
                (None, state.score.score(), state.score.healthiness())
            } else {
                let idle = record.started_at.saturating_duration_since(state.last_call);
                let recovery_probe = record.call_type == CallType::HealthShadowCheck;
                let transition = state.score.record(idle, outcome, recovery_probe, &self.config);
                state.last_call = state.last_call.max(record.started_at);
                if recovery_probe {
                    state.last_health_eval = Some(record.started_at);
                }
                (transition, state.score.score(), state.score.healthiness())
            }
        };

        metrics::record_call(
            self.chain_id.0,
            self.provider_name.as_str(),
            &record.method,
            record.call_type.as_str(),
            outcome.as_str(),
            record.latency,
        );
        metrics::record_health(&self.provider_id, score, healthiness.is_healthy());

        tracing::trace!(
            provider_id = %self.provider_id,
            method = %record.method,
            call_type = record.call_type.as_str(),
            status = outcome.as_str(),
            latency_ms = record.latency.as_millis() as u64,
            score,
            "Call recorded"
        );

        if let Some(to) = transition {
            self.log_transition(to, score, "score");
        }
    }

    fn log_transition(&self, to: Healthiness, score: f64, cause: &'static str) {
        metrics::record_health_transition(&self.provider_id, to.as_str());
        match to {
            Healthiness::Unhealthy => tracing::warn!(
                provider_id = %self.provider_id,
                host = %self.host,
                score,
                cause,
                "Endpoint marked unhealthy"
            ),
            Healthiness::Healthy => tracing::info!(
                provider_id = %self.provider_id,
                host = %self.host,
                score,
                cause,
                "Endpoint recovered"
            ),
        }
    }

    fn maybe_sync(self: &Arc<Self>) {
        let Some(syncer) = &self.syncer else {
            return;
        };
        if !syncer.try_claim(Instant::now()) {
            return;
        }

        let endpoint = Arc::clone(self);
        tokio::spawn(async move {
            let stored = match &endpoint.syncer {
                Some(syncer) => syncer.fetch().await,
                None => None,
            };
            if let Some(healthiness) = stored {
                endpoint.adopt_stored(healthiness);
            }
        });
    }

    /// Take over the healthiness found in the distributed store. The local
    /// score is left untouched.
    pub fn adopt_stored(&self, stored: Healthiness) {
        let (transition, score) = {
            let mut state = self.state.lock();
            (state.score.adopt_stored(stored), state.score.score())
        };
        tracing::debug!(provider_id = %self.provider_id, stored = %stored, "Adopted stored healthiness");
        if let Some(to) = transition {
            metrics::record_health(&self.provider_id, score, to.is_healthy());
            self.log_transition(to, score, "store");
        }
    }

    fn flag(&self, kind: EvaluationKind) -> &AtomicBool {
        match kind {
            EvaluationKind::Health => &self.evaluating_health,
            EvaluationKind::Latency => &self.evaluating_latency,
        }
    }

    fn try_begin(self: &Arc<Self>, kind: EvaluationKind) -> Option<EvaluationGuard> {
        self.flag(kind)
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(EvaluationGuard {
            endpoint: Arc::clone(self),
            kind,
        })
    }

    /// Claim the recovery probe slot; `None` while another one runs.
    pub fn try_begin_health_evaluation(self: &Arc<Self>) -> Option<EvaluationGuard> {
        self.try_begin(EvaluationKind::Health)
    }

    /// Claim the latency probe slot; `None` while another one runs.
    pub fn try_begin_latency_evaluation(self: &Arc<Self>) -> Option<EvaluationGuard> {
        self.try_begin(EvaluationKind::Latency)
    }

    /// Unhealthy and idle for at least the recovery wait period.
    pub fn recovery_due(&self, now: Instant) -> bool {
        let state = self.state.lock();
        !state.score.healthiness().is_healthy()
            && now.saturating_duration_since(state.last_call) >= self.config.recover_evaluation_wait_period()
    }

    /// Healthy and neither called nor latency-probed within the latency wait period.
    pub fn latency_evaluation_due(&self, now: Instant) -> bool {
        let state = self.state.lock();
        let last_activity = state
            .last_latency_eval
            .map_or(state.last_call, |eval| eval.max(state.last_call));
        state.score.healthiness().is_healthy()
            && now.saturating_duration_since(last_activity) >= self.config.latency_evaluation_wait_period()
    }

    /// Recovery probe. The only path from Unhealthy back to Healthy.
    /// Errors are logged and dropped.
    pub async fn evaluate_for_recovery(self: Arc<Self>, guard: EvaluationGuard) {
        debug_assert_eq!(guard.kind, EvaluationKind::Health);
        let result = self
            .instrumented(CallType::HealthShadowCheck, RECOVERY_PROBE_METHOD, Value::Array(vec![]))
            .await;
        self.finish_evaluation(guard, result.err());
    }

    /// Latency probe. Refreshes the latency window only.
    pub async fn evaluate_latency(self: Arc<Self>, guard: EvaluationGuard, method: String, params: Value) {
        debug_assert_eq!(guard.kind, EvaluationKind::Latency);
        let result = self.instrumented(CallType::LatencyShadowCheck, &method, params).await;
        self.finish_evaluation(guard, result.err());
    }

    fn finish_evaluation(&self, guard: EvaluationGuard, error: Option<TransportError>) {
        let kind = guard.kind.as_str();
        drop(guard);
        match error {
            None => {
                metrics::record_shadow_evaluation(&self.provider_id, kind, "success");
                tracing::debug!(provider_id = %self.provider_id, kind, "Shadow evaluation finished");
            }
            Some(e) => {
                metrics::record_shadow_evaluation(&self.provider_id, kind, "failed");
                tracing::warn!(
                    provider_id = %self.provider_id,
                    kind,
                    error = %e,
                    "Shadow evaluation failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::types::TransportErrorKind;
    use crate::health::repository::InMemoryHealthStateRepository;
    use crate::health::state::HealthState;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Transport failing while `fail` is set.
    #[derive(Debug, Default)]
    struct FlakyTransport {
        fail: AtomicBool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RpcTransport for FlakyTransport {
        async fn request(&self, _method: &str, _params: Value) -> Result<Value, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                Err(TransportErrorKind::custom_str("upstream down"))
            } else {
                Ok(Value::from("0x10"))
            }
        }
    }

    fn test_config() -> EndpointConfig {
        EndpointConfig {
            error_penalty: -50.0,
            high_latency_penalty: -50.0,
            health_score_fallback_threshold: -70.0,
            health_score_recover_threshold: -10.0,
            max_latency_allowed_ms: 500,
            recover_score_per_ms: 0.005,
            recover_max_wait_time_to_acknowledge_ms: 20_000,
            recover_evaluation_wait_period_ms: 5_000,
            latency_evaluation_wait_period_ms: 15_000,
            enable_db_sync: false,
            ..EndpointConfig::default()
        }
    }

    fn endpoint(
        transport: Arc<FlakyTransport>,
        config: EndpointConfig,
        repo: Option<Arc<dyn HealthStateRepository>>,
    ) -> Arc<SingleEndpointProvider> {
        let url = Url::parse("https://abc.bsc.quiknode.pro/secret").unwrap();
        Arc::new(SingleEndpointProvider::new(ChainId(56), &url, transport, config, repo))
    }

    #[tokio::test(start_paused = true)]
    async fn test_identity_is_derived_from_url() {
        let ep = endpoint(Arc::new(FlakyTransport::default()), test_config(), None);
        assert_eq!(ep.provider_id(), "56_QUIKNODE");
        assert_eq!(ep.host(), "abc.bsc.quiknode.pro");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_returned_verbatim_and_scored() {
        let transport = Arc::new(FlakyTransport::default());
        transport.fail.store(true, Ordering::SeqCst);
        let ep = endpoint(transport, test_config(), None);

        let err = ep.request("eth_blockNumber", Value::Array(vec![])).await.unwrap_err();
        assert_eq!(err.to_string(), TransportErrorKind::custom_str("upstream down").to_string());
        assert_eq!(ep.health_score(), -50.0);
        assert!(ep.is_healthy());

        ep.request("eth_blockNumber", Value::Array(vec![])).await.unwrap_err();
        assert_eq!(ep.health_score(), -100.0);
        assert!(!ep.is_healthy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_requires_probe() {
        let transport = Arc::new(FlakyTransport::default());
        transport.fail.store(true, Ordering::SeqCst);
        let ep = endpoint(transport.clone(), test_config(), None);
        ep.request("eth_call", Value::Null).await.unwrap_err();
        ep.request("eth_call", Value::Null).await.unwrap_err();
        transport.fail.store(false, Ordering::SeqCst);

        assert!(!ep.recovery_due(Instant::now()));
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(ep.recovery_due(Instant::now()));

        // -100 + 10s * 0.005 = -50: probe succeeds but the score is too low.
        let guard = ep.try_begin_health_evaluation().unwrap();
        ep.clone().evaluate_for_recovery(guard).await;
        assert_eq!(ep.health_score(), -50.0);
        assert!(!ep.is_healthy());
        assert!(ep.last_health_evaluation().is_some());

        tokio::time::advance(Duration::from_secs(10)).await;
        let guard = ep.try_begin_health_evaluation().unwrap();
        ep.clone().evaluate_for_recovery(guard).await;
        assert_eq!(ep.health_score(), 0.0);
        assert!(ep.is_healthy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_evaluation_guard_prevents_overlap() {
        let ep = endpoint(Arc::new(FlakyTransport::default()), test_config(), None);

        let guard = ep.try_begin_health_evaluation().unwrap();
        assert!(ep.is_evaluating_health());
        assert!(ep.try_begin_health_evaluation().is_none());
        // Kinds are independent.
        let latency_guard = ep.try_begin_latency_evaluation().unwrap();
        assert!(ep.try_begin_latency_evaluation().is_none());

        drop(guard);
        assert!(!ep.is_evaluating_health());
        assert!(ep.try_begin_health_evaluation().is_some());
        drop(latency_guard);
        assert!(!ep.is_evaluating_latency());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_probe_does_not_touch_score() {
        let transport = Arc::new(FlakyTransport::default());
        transport.fail.store(true, Ordering::SeqCst);
        let ep = endpoint(transport, test_config(), None);
        ep.request("eth_call", Value::Null).await.unwrap_err();
        let last_call = ep.last_call();

        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(ep.latency_evaluation_due(Instant::now()));
        let guard = ep.try_begin_latency_evaluation().unwrap();
        ep.clone()
            .evaluate_latency(guard, "eth_blockNumber".into(), Value::Array(vec![]))
            .await;

        assert_eq!(ep.health_score(), -50.0);
        assert_eq!(ep.last_call(), last_call);
        assert!(ep.last_latency_evaluation().is_some());
        assert!(!ep.latency_evaluation_due(Instant::now()));
        assert!(!ep.is_evaluating_latency());
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_calls_fill_latency_window() {
        let ep = endpoint(Arc::new(FlakyTransport::default()), test_config(), None);
        ep.request("eth_blockNumber", Value::Array(vec![])).await.unwrap();
        ep.request("eth_blockNumber", Value::Array(vec![])).await.unwrap();
        assert_eq!(ep.latency_stats().samples, 2);

        tokio::time::advance(Duration::from_secs(181)).await;
        assert_eq!(ep.latency_stats().samples, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_failures_are_all_counted() {
        let transport = Arc::new(FlakyTransport::default());
        transport.fail.store(true, Ordering::SeqCst);
        let config = EndpointConfig {
            health_score_fallback_threshold: -10_000.0,
            ..test_config()
        };
        let ep = endpoint(transport, config, None);

        let mut handles = Vec::new();
        for _ in 0..20 {
            let ep = ep.clone();
            handles.push(tokio::spawn(async move {
                let _ = ep.request("eth_call", Value::Null).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(ep.health_score(), -1_000.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_adopts_stored_unhealthy() {
        let repo = Arc::new(InMemoryHealthStateRepository::new());
        repo.write("56_QUIKNODE", &HealthState::new(Healthiness::Unhealthy, vec!["a".into()], 1))
            .await
            .unwrap();
        let config = EndpointConfig {
            enable_db_sync: true,
            db_sync_sample_prob: 1.0,
            ..test_config()
        };
        let ep = endpoint(Arc::new(FlakyTransport::default()), config, Some(repo));

        ep.request("eth_blockNumber", Value::Array(vec![])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(!ep.is_healthy());
        assert_eq!(ep.health_score(), 0.0);
        assert!(ep.snapshot().pinned_by_store);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_disabled_never_reads() {
        let repo = Arc::new(InMemoryHealthStateRepository::new());
        repo.write("56_QUIKNODE", &HealthState::new(Healthiness::Unhealthy, vec![], 1))
            .await
            .unwrap();
        let ep = endpoint(Arc::new(FlakyTransport::default()), test_config(), Some(repo));

        ep.request("eth_blockNumber", Value::Array(vec![])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(ep.is_healthy());
    }
}
