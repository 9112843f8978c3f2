//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Endpoints, gateways, sync and alarm ingestion produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields, never formatted payloads
//! - Request ID flows through the HTTP layer
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
