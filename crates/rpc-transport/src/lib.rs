//! # RPC Transport - The Seam Between Realms
//!
//! Wraps the host's raw asynchronous message-passing primitives behind a
//! uniform [`Transport`] trait so the rest of the RPC layer is
//! host-API-agnostic. Every component takes its transport as an explicit
//! argument; nothing reaches for ambient globals, which keeps the whole
//! layer portable to any message-passing substrate.
//!
//! ## Topology
//!
//! ```text
//! ┌────────────┐  send_to_background  ┌────────────┐
//! │  tab realm │ ───────────────────→ │ background │
//! │            │ ←─────────────────── │   realm    │
//! └────────────┘     send_to_tab      └────────────┘
//!                                           ↑
//!                        send_to_background │ (replies via sender's
//! ┌────────────┐ ───────────────────────────┘  return address)
//! │   popup    │
//! └────────────┘
//! ```
//!
//! Delivery is best-effort: sending toward a realm that is not attached is
//! a no-op from the sender's perspective, and callers never assume delivery.

pub mod memory;
pub mod transport;

pub use memory::{MemoryHub, MemoryTransport};
pub use transport::{Inbox, IncomingMessage, Transport, TransportError};

/// Buffered messages per realm inbox before senders back off.
pub const DEFAULT_INBOX_CAPACITY: usize = 1024;
