//! Endpoint selection subsystem.
//!
//! # Data Flow
//! ```text
//! Caller (method, params, session id?)
//!     → gateway.rs (override / session / Healthy set sorted by precedence)
//!     → Apply selection strategy:
//!         - preference.rs (most preferred Healthy endpoint)
//!         - weighted.rs (weighted draw over Healthy endpoints)
//!     → endpoint.rs (instrumented call, score update, probes)
//!     → Return upstream result or error unchanged
//! ```
//!
//! # Design Decisions
//! - Strategies are stateless; endpoints own all health state
//! - Strategy selection per network (weights configured or not)
//! - Unhealthy endpoints excluded from selection, only probed
//! - Session affinity is a bounded LRU, O(1) on the hot path

pub mod endpoint;
pub mod gateway;
pub mod methods;
pub mod preference;
pub mod session;
pub mod weighted;

use std::fmt::Debug;

pub use endpoint::{CallRecord, CallType, EndpointSnapshot, EvaluationGuard, SingleEndpointProvider};
pub use gateway::{GatewaySettings, GatewaySnapshot, UniProvider};
pub use session::{create_session_id, SessionCache};

/// Trait for endpoint selection strategies.
pub trait SelectionStrategy: Send + Sync + Debug {
    /// Pick one of `healthy` (endpoint indices, most preferred first).
    fn select(&self, healthy: &[usize]) -> Option<usize>;
}
