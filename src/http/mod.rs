//! HTTP serving subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, timeout, body limit)
//!     → handlers.rs
//!         - POST /rpc/{chain_id}  → registry → gateway → JSON-RPC response
//!         - POST /alarms          → alarm ingestion → health store
//!         - GET  /status[/providers]
//!     → jsonrpc.rs (envelope, error codes)
//! ```

pub mod handlers;
pub mod jsonrpc;
pub mod server;

pub use handlers::SESSION_ID_HEADER;
pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use server::{AppState, HttpServer};
