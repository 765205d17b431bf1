//! # Error Types
//!
//! The caller-facing error taxonomy. Foreign or malformed payloads and
//! responses with unknown call ids are deliberately *not* represented here:
//! those are expected channel noise and are dropped where they are decoded.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced to RPC callers.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The named function was never registered in the target realm.
    ///
    /// Commonly a startup race (the target realm has not initialized its
    /// registry yet); recoverable by caller-side retry.
    #[error("no such function registered for RPC: {function}")]
    NoSuchFunction { function: String },

    /// The remote handler failed; its message crossed the boundary, its
    /// stack did not.
    #[error("remote function '{function}' failed: {message}")]
    Remote { function: String, message: String },

    /// Caller-supplied arguments were not JSON-serializable. Nothing was
    /// sent.
    #[error("cannot serialize arguments for '{function}': {source}")]
    Serialize {
        function: String,
        #[source]
        source: serde_json::Error,
    },

    /// The remote value did not match the caller's expected return type.
    #[error("cannot deserialize return value of '{function}': {source}")]
    Deserialize {
        function: String,
        #[source]
        source: serde_json::Error,
    },

    /// The caller-imposed deadline elapsed before a response arrived. Only
    /// raised when the caller opted into a timeout; the base contract waits
    /// indefinitely.
    #[error("call to '{function}' timed out after {after:?}")]
    DeadlineExceeded { function: String, after: Duration },

    /// The local connection was torn down while the call was in flight.
    #[error("rpc connection closed before '{function}' was answered")]
    ConnectionClosed { function: String },
}
