//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) or deployment file (JSON network list)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → registry resolves provider URLs and builds one gateway per network
//! ```
//!
//! # Design Decisions
//! - Config is read once at bootstrap; there is no hot reload because
//!   built gateways live for the whole process
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Credential resolution errors surface at bootstrap, never at first use

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_prod_config, parse_config, ConfigError};
pub use schema::{
    EndpointConfig, GatewayConfig, HealthStoreBackend, HealthStoreConfig, NetworkConfig,
    ObservabilityConfig, ProviderUrlConfig, ServerConfig, UniProviderConfig,
};
