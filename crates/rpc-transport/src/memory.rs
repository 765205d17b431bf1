//! # In-Memory Hub
//!
//! An in-process message bus connecting one background realm, any number of
//! tab realms, and auxiliary realms (popup, options page). Stands in for
//! the host bus in tests and in-process embeddings.
//!
//! The hub models the host's hub-and-spoke port topology: only the
//! background realm holds a route to every tab, so a non-background realm
//! sending directly to a tab is dropped (callers relay through the
//! background instead). Every attachment gets a bus-scoped
//! [`EndpointId`] that the hub stamps onto incoming messages; replies
//! prefer it, which is how tab-less realms get their responses back.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rpc_types::{EndpointId, SenderInfo, TabId};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::transport::{Inbox, IncomingMessage, Transport, TransportError};
use crate::DEFAULT_INBOX_CAPACITY;

/// What kind of realm an attachment is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RealmKind {
    Background,
    Tab(TabId),
    Auxiliary,
}

struct Registration {
    sender: mpsc::Sender<IncomingMessage>,
    side_name: String,
}

#[derive(Default)]
struct HubState {
    endpoints: HashMap<EndpointId, Registration>,
    background: Option<EndpointId>,
    tabs: HashMap<TabId, EndpointId>,
    next_endpoint: u64,
}

/// An in-process message bus connecting realms.
///
/// Cheap to clone; all clones share the same attachment table.
#[derive(Clone, Default)]
pub struct MemoryHub {
    state: Arc<RwLock<HubState>>,
}

impl MemoryHub {
    /// Create an empty hub with no realms attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the background realm, returning its transport handle.
    ///
    /// Re-attaching replaces the previous background (extension reload);
    /// messages queued toward the old one are dropped.
    #[must_use]
    pub fn attach_background(&self) -> MemoryTransport {
        self.attach(RealmKind::Background, "background")
    }

    /// Attach a tab's content-script realm.
    #[must_use]
    pub fn attach_tab(&self, tab: TabId) -> MemoryTransport {
        self.attach(RealmKind::Tab(tab), &format!("content-script|{tab}"))
    }

    /// Attach a realm that can call out but is not addressable by name
    /// (popup, options page). Replies still reach it via its endpoint.
    #[must_use]
    pub fn attach_auxiliary(&self, side_name: &str) -> MemoryTransport {
        self.attach(RealmKind::Auxiliary, side_name)
    }

    fn attach(&self, kind: RealmKind, side_name: &str) -> MemoryTransport {
        let (sender, receiver) = mpsc::channel(DEFAULT_INBOX_CAPACITY);
        let mut state = self.state.write();
        let endpoint = EndpointId(state.next_endpoint);
        state.next_endpoint += 1;
        state.endpoints.insert(
            endpoint,
            Registration {
                sender,
                side_name: side_name.to_owned(),
            },
        );
        match kind {
            RealmKind::Background => {
                if let Some(old) = state.background.replace(endpoint) {
                    state.endpoints.remove(&old);
                    warn!("background realm re-attached, replacing the previous one");
                }
            }
            RealmKind::Tab(tab) => {
                if let Some(old) = state.tabs.insert(tab, endpoint) {
                    state.endpoints.remove(&old);
                    warn!(%tab, "tab realm re-attached, replacing the previous one");
                }
            }
            RealmKind::Auxiliary => {}
        }
        debug!(side = side_name, %endpoint, "realm attached to hub");
        MemoryTransport {
            state: self.state.clone(),
            endpoint,
            kind,
            inbox: Mutex::new(Some(Inbox::new(receiver))),
        }
    }

    /// Detach a tab realm (tab closed). Further sends to it are no-ops.
    pub fn detach_tab(&self, tab: TabId) -> bool {
        let mut state = self.state.write();
        match state.tabs.remove(&tab) {
            Some(endpoint) => {
                state.endpoints.remove(&endpoint);
                debug!(%tab, "tab realm detached from hub");
                true
            }
            None => false,
        }
    }

    /// Detach the background realm (worker torn down).
    pub fn detach_background(&self) -> bool {
        let mut state = self.state.write();
        match state.background.take() {
            Some(endpoint) => {
                state.endpoints.remove(&endpoint);
                debug!("background realm detached from hub");
                true
            }
            None => false,
        }
    }

    /// Number of currently attached realms.
    #[must_use]
    pub fn realm_count(&self) -> usize {
        self.state.read().endpoints.len()
    }
}

/// One realm's handle onto a [`MemoryHub`].
pub struct MemoryTransport {
    state: Arc<RwLock<HubState>>,
    endpoint: EndpointId,
    kind: RealmKind,
    inbox: Mutex<Option<Inbox>>,
}

impl MemoryTransport {
    fn sender_info(&self) -> SenderInfo {
        SenderInfo {
            tab: match self.kind {
                RealmKind::Tab(tab) => Some(tab),
                _ => None,
            },
            endpoint: Some(self.endpoint),
        }
    }

    /// Deliver `payload` to `target`, treating a missing destination as a
    /// no-op per the fire-and-forget contract.
    async fn deliver(
        &self,
        target: Option<EndpointId>,
        destination: &str,
        payload: Value,
    ) -> Result<(), TransportError> {
        let Some(endpoint) = target else {
            warn!(destination, "dropping message: destination realm not attached");
            return Ok(());
        };
        // Clone the channel out so the lock is not held across the send.
        let channel = {
            let state = self.state.read();
            state
                .endpoints
                .get(&endpoint)
                .map(|registration| (registration.sender.clone(), registration.side_name.clone()))
        };
        let Some((channel, side_name)) = channel else {
            warn!(destination, %endpoint, "dropping message: destination endpoint gone");
            return Ok(());
        };
        let message = IncomingMessage {
            payload,
            sender: self.sender_info(),
        };
        if channel.send(message).await.is_err() {
            warn!(
                destination,
                side = %side_name,
                "dropping message: destination realm's inbox is gone"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send_to_background(&self, payload: Value) -> Result<(), TransportError> {
        let target = self.state.read().background;
        self.deliver(target, "background", payload).await
    }

    async fn send_to_tab(&self, tab: TabId, payload: Value) -> Result<(), TransportError> {
        // Hub-and-spoke: only the background holds routes to tab realms.
        // Other realms relay through the background via a proxied call.
        if self.kind != RealmKind::Background {
            warn!(
                %tab,
                "dropping message: only the background realm can message tabs directly"
            );
            return Ok(());
        }
        let target = self.state.read().tabs.get(&tab).copied();
        self.deliver(target, "tab", payload).await
    }

    async fn send_to_sender(
        &self,
        sender: &SenderInfo,
        payload: Value,
    ) -> Result<(), TransportError> {
        if let Some(endpoint) = sender.endpoint {
            return self.deliver(Some(endpoint), "sender", payload).await;
        }
        match sender.tab {
            Some(tab) => self.send_to_tab(tab, payload).await,
            None => self.send_to_background(payload).await,
        }
    }

    fn subscribe(&self) -> Result<Inbox, TransportError> {
        self.inbox
            .lock()
            .take()
            .ok_or(TransportError::AlreadySubscribed)
    }
}
