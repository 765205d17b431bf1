//! # Call & Response Envelopes
//!
//! The structured payloads carried over the message bus: a discriminator so
//! unrelated traffic can be ignored, a correlation id so concurrent calls
//! settle independently, and either a call request or a call outcome.
//!
//! Envelopes are transient: created and consumed within a single call. Only
//! the pending-call table and the function registry outlive a message, and
//! both are scoped to their owning realm.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::RpcError;
use crate::realm::TabId;

/// Current protocol version carried by every envelope.
///
/// Decoders reject envelopes from other versions.
pub const PROTOCOL_VERSION: u16 = 1;

/// Discriminator token marking a payload as an RPC request.
pub const RPC_REQUEST: &str = "RPC_REQUEST";

/// Discriminator token marking a payload as an RPC response.
pub const RPC_RESPONSE: &str = "RPC_RESPONSE";

/// JSON field holding the discriminator token.
pub const DISCRIMINATOR_FIELD: &str = "discriminator";

/// Correlation id for one in-flight call.
///
/// Fresh ids are uuid-v4; they are never reused within a realm's lifetime,
/// which is what allows unlimited concurrent in-flight calls to settle
/// without cross-talk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(Uuid);

impl CallId {
    /// Generate a fresh, unique call id.
    #[must_use]
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A call request envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEnvelope {
    /// Protocol version, checked before processing.
    pub version: u16,
    /// Correlation id; the response echoes it.
    pub call_id: CallId,
    /// Name of the function as registered on the remote side.
    pub function: String,
    /// Ordered, JSON-serializable call arguments.
    pub args: Vec<Value>,
    /// When set, the background realm relays this request to the given tab
    /// instead of fulfilling it itself. Only the background holds a route to
    /// every tab, so popup→tab traffic travels this way.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_tab: Option<TabId>,
}

impl CallEnvelope {
    /// Build a request with a fresh call id.
    #[must_use]
    pub fn new(function: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            call_id: CallId::fresh(),
            function: function.into(),
            args,
            proxy_tab: None,
        }
    }

    /// Mark the request for relay through the background to `tab`.
    #[must_use]
    pub fn proxied_to(mut self, tab: TabId) -> Self {
        self.proxy_tab = Some(tab);
        self
    }
}

/// A call response envelope; `call_id` echoes the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Protocol version, checked before processing.
    pub version: u16,
    /// Correlation id copied from the request.
    pub call_id: CallId,
    /// Function name copied from the request, for diagnostics.
    pub function: String,
    /// What the remote realm did with the call.
    pub outcome: Outcome,
}

impl ResponseEnvelope {
    /// Success response echoing `request`'s correlation id.
    #[must_use]
    pub fn success(request: &CallEnvelope, value: Value) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            call_id: request.call_id,
            function: request.function.clone(),
            outcome: Outcome::Success { value },
        }
    }

    /// Failure response echoing `request`'s correlation id.
    #[must_use]
    pub fn failure(request: &CallEnvelope, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            call_id: request.call_id,
            function: request.function.clone(),
            outcome: Outcome::Failure {
                message: message.into(),
                kind,
            },
        }
    }
}

/// Outcome of executing a call in the remote realm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The handler ran and returned a value.
    Success {
        /// The handler's JSON-serialized return value.
        value: Value,
    },
    /// The call could not be fulfilled; only the message crosses the
    /// boundary, stack traces do not.
    Failure {
        /// Human-readable description of the failure.
        message: String,
        /// Machine-readable failure class.
        kind: FailureKind,
    },
}

impl Outcome {
    /// Convert into the caller-side result, rehydrating failures into local
    /// errors.
    pub fn into_result(self, function: &str) -> Result<Value, RpcError> {
        match self {
            Outcome::Success { value } => Ok(value),
            Outcome::Failure {
                kind: FailureKind::NoSuchFunction,
                ..
            } => Err(RpcError::NoSuchFunction {
                function: function.to_owned(),
            }),
            Outcome::Failure {
                message,
                kind: FailureKind::HandlerFailed,
            } => Err(RpcError::Remote {
                function: function.to_owned(),
                message,
            }),
        }
    }
}

/// Machine-readable failure class carried in a failure outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The named function was never registered in the target realm. A
    /// normal outcome during startup races, recoverable by retry.
    NoSuchFunction,
    /// The handler itself failed (returned an error or rejected).
    HandlerFailed,
}
