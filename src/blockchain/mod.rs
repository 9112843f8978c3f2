//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Config (URL or template key + credential from environment)
//!     → provider.rs (URL expansion, provider name, provider id)
//!     → transport.rs (JSON-RPC over HTTP with timeouts)
//! ```
//!
//! # Security Constraints
//! - Credentials come from config or environment variables
//! - Never log endpoint URLs; they embed API keys. Log hosts or provider ids
//! - All RPC calls have configurable timeouts

pub mod provider;
pub mod transport;
pub mod types;

pub use provider::{derive_provider_name, generate_provider_url, provider_id, ProviderName};
pub use transport::{AlloyTransport, RpcTransport};
pub use types::{ChainId, TransportError, TransportErrorKind};
