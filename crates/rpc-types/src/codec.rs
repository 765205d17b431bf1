//! # Wire Codec
//!
//! Encodes envelopes to `serde_json::Value` payloads and decodes payloads
//! that carry our discriminator. The host bus may deliver unrelated
//! messages (other extensions, other features) on the same listener, so
//! the discriminator is checked before any other field is touched; a
//! payload without it is simply not ours and decodes to `None`.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::envelope::{
    CallEnvelope, ResponseEnvelope, DISCRIMINATOR_FIELD, PROTOCOL_VERSION, RPC_REQUEST,
    RPC_RESPONSE,
};
use crate::errors::RpcError;

/// Encode a call request for the wire.
pub fn encode_request(envelope: &CallEnvelope) -> Result<Value, RpcError> {
    tag(envelope, RPC_REQUEST, &envelope.function)
}

/// Encode a call response for the wire.
pub fn encode_response(envelope: &ResponseEnvelope) -> Result<Value, RpcError> {
    tag(envelope, RPC_RESPONSE, &envelope.function)
}

/// Decode a payload as a call request, if it is one.
///
/// Returns `None` for foreign payloads (wrong or missing discriminator),
/// for unsupported protocol versions, and for payloads that carry our
/// discriminator but do not parse (logged; the sender is broken, not us).
#[must_use]
pub fn decode_request(payload: &Value) -> Option<CallEnvelope> {
    if !has_discriminator(payload, RPC_REQUEST) {
        return None;
    }
    match serde_json::from_value::<CallEnvelope>(payload.clone()) {
        Ok(envelope) if envelope.version == PROTOCOL_VERSION => Some(envelope),
        Ok(envelope) => {
            warn!(
                version = envelope.version,
                supported = PROTOCOL_VERSION,
                "RPC request with unsupported protocol version dropped"
            );
            None
        }
        Err(error) => {
            warn!(%error, "malformed RPC request payload dropped");
            None
        }
    }
}

/// Decode a payload as a call response, if it is one.
///
/// Same noise policy as [`decode_request`].
#[must_use]
pub fn decode_response(payload: &Value) -> Option<ResponseEnvelope> {
    if !has_discriminator(payload, RPC_RESPONSE) {
        return None;
    }
    match serde_json::from_value::<ResponseEnvelope>(payload.clone()) {
        Ok(envelope) if envelope.version == PROTOCOL_VERSION => Some(envelope),
        Ok(envelope) => {
            warn!(
                version = envelope.version,
                supported = PROTOCOL_VERSION,
                "RPC response with unsupported protocol version dropped"
            );
            None
        }
        Err(error) => {
            warn!(%error, "malformed RPC response payload dropped");
            None
        }
    }
}

/// Serialize a caller-supplied argument pack into the wire args array.
///
/// Tuples and slices become the args array, `()` becomes no arguments, and
/// a single bare value becomes a one-element array. A value that is not
/// JSON-serializable fails here, before any message is sent.
pub fn to_args<A: Serialize>(function: &str, args: &A) -> Result<Vec<Value>, RpcError> {
    let value = serde_json::to_value(args).map_err(|source| RpcError::Serialize {
        function: function.to_owned(),
        source,
    })?;
    Ok(match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    })
}

fn tag<T: Serialize>(envelope: &T, discriminator: &str, function: &str) -> Result<Value, RpcError> {
    let mut value = serde_json::to_value(envelope).map_err(|source| RpcError::Serialize {
        function: function.to_owned(),
        source,
    })?;
    if let Value::Object(fields) = &mut value {
        fields.insert(
            DISCRIMINATOR_FIELD.to_owned(),
            Value::String(discriminator.to_owned()),
        );
    }
    Ok(value)
}

fn has_discriminator(payload: &Value, expected: &str) -> bool {
    payload
        .get(DISCRIMINATOR_FIELD)
        .and_then(Value::as_str)
        .is_some_and(|token| token == expected)
}
