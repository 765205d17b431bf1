//! # Transport Trait
//!
//! The host-agnostic contract for moving payloads between realms.

use async_trait::async_trait;
use rpc_types::{SenderInfo, TabId};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from transport operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The realm's inbox was already handed out; a realm wires its
    /// incoming-message listener exactly once.
    #[error("this realm's message listener is already wired")]
    AlreadySubscribed,

    /// The underlying bus is gone.
    #[error("message bus closed")]
    Closed,
}

/// A payload delivered to this realm, stamped with sender details.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// The raw payload; may be RPC traffic or foreign channel noise.
    pub payload: Value,
    /// Who sent it, as stamped by the transport.
    pub sender: SenderInfo,
}

/// One realm's handle onto the host message bus.
///
/// The two send primitives plus the identity of the attached realm are
/// enough to express background→tab, tab→background, and popup→background
/// traffic. Sends are fire-and-forget: a destination realm that does not
/// exist (tab closed, background not yet loaded) makes the send a no-op,
/// and the correlator must rely on its own deadline policy rather than on
/// delivery.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a payload to the background realm.
    async fn send_to_background(&self, payload: Value) -> Result<(), TransportError>;

    /// Send a payload to the given tab's content-script realm.
    async fn send_to_tab(&self, tab: TabId, payload: Value) -> Result<(), TransportError>;

    /// Send a payload back toward the realm that `sender` was stamped for.
    ///
    /// The default routes by the coarse address: a stamped tab goes via
    /// [`Transport::send_to_tab`], anything else via
    /// [`Transport::send_to_background`]. Transports with a finer return
    /// address (see [`rpc_types::EndpointId`]) override this so tab-less
    /// realms like the popup can receive replies.
    async fn send_to_sender(
        &self,
        sender: &SenderInfo,
        payload: Value,
    ) -> Result<(), TransportError> {
        match sender.tab {
            Some(tab) => self.send_to_tab(tab, payload).await,
            None => self.send_to_background(payload).await,
        }
    }

    /// Take this realm's incoming-message stream.
    fn subscribe(&self) -> Result<Inbox, TransportError>;
}

/// The receiving end of a realm's message stream.
pub struct Inbox {
    receiver: mpsc::Receiver<IncomingMessage>,
}

impl Inbox {
    pub(crate) fn new(receiver: mpsc::Receiver<IncomingMessage>) -> Self {
        Self { receiver }
    }

    /// Receive the next message; `None` when the bus side is gone.
    pub async fn recv(&mut self) -> Option<IncomingMessage> {
        self.receiver.recv().await
    }

    /// Try to receive without blocking.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(message))` - A message was waiting
    /// - `Ok(None)` - Nothing waiting (would block)
    /// - `Err(TransportError::Closed)` - The bus side is gone
    pub fn try_recv(&mut self) -> Result<Option<IncomingMessage>, TransportError> {
        match self.receiver.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(TransportError::Closed),
        }
    }
}
