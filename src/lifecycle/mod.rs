//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Observability → Health store → Gateways → Listener
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Stop accepting → Drain in-flight requests → Exit
//!
//! Signals (signals.rs):
//!     SIGINT (Ctrl+C) → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Background probes are detached tasks and die with the runtime

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{init_observability, Runtime, StartupError};
