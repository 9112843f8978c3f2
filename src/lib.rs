//! Multi-provider JSON-RPC gateway library.
//!
//! One [`UniProvider`] per network fans calls out over several upstream
//! endpoints, scores each endpoint from live traffic, routes around the
//! unhealthy ones and converges health state with other gateway processes
//! through a shared store.

// Core subsystems
pub mod blockchain;
pub mod config;
pub mod error;
pub mod http;
pub mod registry;

// Traffic management
pub mod health;
pub mod load_balancer;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use blockchain::{ChainId, RpcTransport};
pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use http::HttpServer;
pub use lifecycle::{Runtime, Shutdown};
pub use load_balancer::{create_session_id, SingleEndpointProvider, UniProvider};
pub use registry::ProviderRegistry;
