//! # RPC Types Crate
//!
//! Message shapes and the wire codec for cross-realm RPC.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every envelope, address, and error type
//!   crossing a realm boundary is defined here.
//! - **Discriminator First**: the host bus delivers unrelated traffic on the
//!   same channel; decoders check the discriminator token before touching any
//!   other field and treat foreign payloads as channel noise.
//! - **JSON Values Only**: everything on the wire is a `serde_json::Value`.
//!   Anything that cannot be represented as one fails fast at the encode
//!   step, locally, before a message is sent.

pub mod codec;
pub mod envelope;
pub mod errors;
pub mod realm;

pub use envelope::{
    CallEnvelope, CallId, FailureKind, Outcome, ResponseEnvelope, PROTOCOL_VERSION,
};
pub use errors::RpcError;
pub use realm::{EndpointId, SenderInfo, TabId, Target};
