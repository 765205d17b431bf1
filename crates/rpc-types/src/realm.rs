//! # Realm Addressing
//!
//! A realm is an isolated execution context (background worker, one content
//! script per tab, popup document) with its own event loop and no shared
//! memory with other realms. These types describe where a message goes and
//! where it came from.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a tab realm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub u32);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab:{}", self.0)
    }
}

/// Opaque, bus-scoped return address for one attached realm.
///
/// Stamped by the transport on incoming messages; reply routing prefers it
/// over the coarse tab/background mapping so that realms without a tab id
/// (popup, options page) can still receive responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointId(pub u64);

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ep:{}", self.0)
    }
}

/// Where a call (or a reply) is routed.
///
/// A caller-supplied tab id routes to that tab's content script; absence of
/// one routes to the background realm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// The background/service-worker realm.
    Background,
    /// A specific tab's content-script realm.
    Tab(TabId),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Background => write!(f, "background"),
            Target::Tab(tab) => write!(f, "{tab}"),
        }
    }
}

/// Sender details stamped onto an incoming message by the transport.
///
/// The transport is the sole authority for these fields; payloads never
/// carry identity claims of their own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderInfo {
    /// The sending tab, when the sender is a content-script realm.
    pub tab: Option<TabId>,
    /// Bus-scoped return address of the sending realm, when known.
    pub endpoint: Option<EndpointId>,
}

impl SenderInfo {
    /// Sender details for a tab realm.
    #[must_use]
    pub fn from_tab(tab: TabId) -> Self {
        Self {
            tab: Some(tab),
            endpoint: None,
        }
    }
}
