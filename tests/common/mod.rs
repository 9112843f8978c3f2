//! Shared utilities for integration testing.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{routing::post, Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

use rpc_gateway::blockchain::{ChainId, RpcTransport, TransportError, TransportErrorKind};
use rpc_gateway::config::{EndpointConfig, UniProviderConfig};
use rpc_gateway::health::{HealthState, HealthStateRepository, InMemoryHealthStateRepository, StoreError};
use rpc_gateway::registry::TransportFactory;
use rpc_gateway::SingleEndpointProvider;

/// What a scripted transport answers with.
#[derive(Debug, Clone)]
pub enum Reply {
    Ok(Value),
    Fail(String),
    /// Answer after a delay (virtual under paused time).
    Slow(Duration, Value),
}

/// Transport answering from a script, then from a default reply.
#[derive(Debug)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Reply>>,
    default: Mutex<Reply>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(default: Reply) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            default: Mutex::new(default),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn ok() -> Arc<Self> {
        Self::new(Reply::Ok(json!("0x1")))
    }

    pub fn push(&self, reply: Reply) {
        self.script.lock().push_back(reply);
    }

    pub fn set_default(&self, reply: Reply) {
        *self.default.lock() = reply;
    }

    /// Methods received so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl RpcTransport for ScriptedTransport {
    async fn request(&self, method: &str, _params: Value) -> Result<Value, TransportError> {
        self.calls.lock().push(method.to_string());
        let reply = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.default.lock().clone());
        match reply {
            Reply::Ok(value) => Ok(value),
            Reply::Fail(message) => Err(TransportErrorKind::custom_str(&message)),
            Reply::Slow(delay, value) => {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
        }
    }
}

/// Factory handing out a fixed transport per URL host.
pub fn transport_factory(transports: HashMap<String, Arc<ScriptedTransport>>) -> TransportFactory {
    Arc::new(move |url: &Url, _config: &EndpointConfig| {
        let host = url.host_str().unwrap_or_default();
        match transports.get(host) {
            Some(transport) => transport.clone() as Arc<dyn RpcTransport>,
            None => ScriptedTransport::new(Reply::Fail(format!("no transport for {host}"))) as Arc<dyn RpcTransport>,
        }
    })
}

/// In-memory store counting every operation.
#[derive(Debug, Default)]
pub struct CountingRepository {
    inner: InMemoryHealthStateRepository,
    reads: AtomicUsize,
    writes: AtomicUsize,
    updates: AtomicUsize,
}

impl CountingRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthStateRepository for CountingRepository {
    async fn read(&self, provider_id: &str) -> Result<Option<HealthState>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(provider_id).await
    }

    async fn write(&self, provider_id: &str, state: &HealthState) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(provider_id, state).await
    }

    async fn update(&self, provider_id: &str, state: &HealthState) -> Result<(), StoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update(provider_id, state).await
    }
}

/// Thresholds small enough that two failures flip an endpoint.
pub fn strict_endpoint_config() -> EndpointConfig {
    EndpointConfig {
        error_penalty: -50.0,
        high_latency_penalty: -20.0,
        health_score_fallback_threshold: -90.0,
        health_score_recover_threshold: -20.0,
        enable_db_sync: false,
        ..EndpointConfig::default()
    }
}

/// Gateway options without background latency probes.
pub fn quiet_gateway_config() -> UniProviderConfig {
    UniProviderConfig {
        enable_shadow_latency_evaluation: false,
        ..UniProviderConfig::default()
    }
}

pub fn endpoint(
    chain_id: u64,
    url: &str,
    transport: Arc<ScriptedTransport>,
    config: EndpointConfig,
    repository: Option<Arc<dyn HealthStateRepository>>,
) -> Arc<SingleEndpointProvider> {
    let url = Url::parse(url).unwrap();
    Arc::new(SingleEndpointProvider::new(
        ChainId(chain_id),
        &url,
        transport,
        config,
        repository,
    ))
}

/// Let spawned background tasks run to completion.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Start a mock JSON-RPC backend. `answer` maps (method, params) to a result
/// or a JSON-RPC error (code, message).
pub async fn start_mock_rpc_backend<F>(answer: F) -> SocketAddr
where
    F: Fn(&str, &Value) -> Result<Value, (i64, String)> + Send + Sync + 'static,
{
    let answer = Arc::new(answer);
    let app = Router::new().route(
        "/",
        post(move |Json(request): Json<Value>| {
            let answer = answer.clone();
            async move {
                let id = request.get("id").cloned().unwrap_or(Value::Null);
                let method = request.get("method").and_then(Value::as_str).unwrap_or_default();
                let params = request.get("params").cloned().unwrap_or(Value::Null);
                let body = match answer(method, &params) {
                    Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
                    Err((code, message)) => {
                        json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}})
                    }
                };
                Json(body)
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}
