//! Health tracking subsystem.
//!
//! # Data Flow
//! ```text
//! Local scoring (scoring.rs):
//!     Every call outcome
//!     → decay + penalty
//!     → Healthy → Unhealthy at the fallback threshold
//!     → Unhealthy → Healthy only inside a recovery probe
//!
//! Latency (latency.rs):
//!     Successful calls → time-bounded sample window
//!
//! Distributed state (repository.rs, sync.rs, alarm.rs):
//!     alarm.rs   : alarm events → repository writes (authoritative override)
//!     sync.rs    : endpoints periodically read the repository
//!     state.rs   : Healthiness / HealthState shared by both sides
//! ```
//!
//! # Design Decisions
//! - Scoring is pure and owned by the endpoint, which serializes updates
//! - Store access is best-effort from the traffic path and never blocks it
//! - Alarm ingestion does not talk to gateways; they converge via sync

pub mod alarm;
pub mod latency;
pub mod repository;
pub mod scoring;
pub mod state;
pub mod sync;

pub use alarm::{AlarmError, AlarmEvent, AlarmOutcome, FallbackHandler};
pub use latency::{LatencyStats, LatencyWindow};
pub use repository::{
    build_repository, FileHealthStateRepository, HealthStateRepository, InMemoryHealthStateRepository,
    StoreError,
};
pub use scoring::{CallOutcome, HealthScore};
pub use state::{HealthState, Healthiness};
pub use sync::HealthStateSyncer;
