//! # RPC Core - Cross-Realm Remote Procedure Calls
//!
//! Turns an asynchronous, untyped, possibly-lossy message bus into named
//! async function calls between isolated realms: call a function
//! registered in one realm from any other realm and get back a future
//! that settles exactly once.
//!
//! ## Components
//!
//! - [`correlator::PendingCalls`] - matches responses to in-flight calls
//!   by correlation id.
//! - [`registry::FunctionRegistry`] - the per-realm table of remotely
//!   callable handlers.
//! - [`router`] - picks the transport primitive from the caller-supplied
//!   address.
//! - [`connection::RpcConnection`] - realm bootstrap wiring all of the
//!   above onto a [`rpc_transport::Transport`].
//! - [`fakes`] - transport-free test doubles sharing the call convention.
//!
//! ## Example
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use rpc_core::{setup_rpc_connection, RpcConfig, RpcRole};
//! use rpc_transport::MemoryHub;
//! use serde_json::json;
//!
//! let hub = MemoryHub::new();
//!
//! // === background realm ===
//! let background = setup_rpc_connection(
//!     Arc::new(hub.attach_background()),
//!     RpcConfig::new("background", RpcRole::Background),
//! )?;
//! background.registry().register_fn("double", |args, _sender| async move {
//!     let x = args[0].as_i64().unwrap_or_default();
//!     Ok(json!(x * 2))
//! });
//!
//! // === content-script realm ===
//! let content = setup_rpc_connection(
//!     Arc::new(hub.attach_tab(rpc_types::TabId(1))),
//!     RpcConfig::new("content-script-global", RpcRole::Content),
//! )?;
//! let result: i64 = content.remote_function("double").call((21,)).await?;
//! assert_eq!(result, 42);
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod correlator;
pub mod fakes;
pub mod registry;
pub mod router;

pub use connection::{
    setup_rpc_connection, RemoteFunction, RemoteInterface, RpcConfig, RpcConnection, RpcRole,
    CONFIRM_BACKGROUND_LOADED, DEFAULT_PROXY_TTL,
};
pub use correlator::PendingCalls;
pub use fakes::{fake_remote_functions, FakeRemoteFunction, FakeRemoteFunctions};
pub use registry::{handler, FunctionRegistry, Handler, HandlerFuture};
pub use router::resolve_target;
