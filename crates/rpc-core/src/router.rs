//! # Endpoint Router
//!
//! Decides which transport primitive a payload travels over. The rule is
//! deliberately small: a caller-supplied tab id routes to that tab,
//! absence of one routes to the background. "Whichever tab is currently
//! active" is resolved one level up, by the caller supplying a concrete
//! tab id it already knows.

use rpc_transport::{Transport, TransportError};
use rpc_types::{SenderInfo, TabId, Target};
use serde_json::Value;

/// Resolve a caller-supplied address into a concrete target.
#[must_use]
pub fn resolve_target(tab: Option<TabId>) -> Target {
    match tab {
        Some(tab) => Target::Tab(tab),
        None => Target::Background,
    }
}

/// Pick the send primitive for `target` and dispatch the payload.
pub async fn dispatch(
    transport: &dyn Transport,
    target: Target,
    payload: Value,
) -> Result<(), TransportError> {
    match target {
        Target::Background => transport.send_to_background(payload).await,
        Target::Tab(tab) => transport.send_to_tab(tab, payload).await,
    }
}

/// Route a response back toward the stamped sender of a request.
pub async fn dispatch_reply(
    transport: &dyn Transport,
    sender: &SenderInfo,
    payload: Value,
) -> Result<(), TransportError> {
    transport.send_to_sender(sender, payload).await
}
