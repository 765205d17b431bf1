//! # Call Correlator
//!
//! Matches asynchronous responses back to the future that originated the
//! corresponding request. The table is the only caller-side state that
//! outlives a single message; it is owned by one realm and dies with it.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;
use rpc_types::{CallId, Outcome};
use tokio::sync::oneshot;
use tracing::debug;

/// One in-flight call, owned by the table until first settlement.
struct PendingEntry {
    function: String,
    created_at: Instant,
    tx: oneshot::Sender<Outcome>,
}

/// Table of in-flight calls keyed by correlation id.
///
/// Invariant: at most one entry per id, and ids are never reused within a
/// realm's lifetime. Per-id keying is what allows unlimited concurrent
/// in-flight calls without head-of-line blocking.
#[derive(Default)]
pub struct PendingCalls {
    entries: Mutex<HashMap<CallId, PendingEntry>>,
}

impl PendingCalls {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry for a freshly assigned id and hand back the
    /// receiving half the caller awaits.
    pub fn begin(&self, call_id: CallId, function: &str) -> oneshot::Receiver<Outcome> {
        let (tx, rx) = oneshot::channel();
        let replaced = self.entries.lock().insert(
            call_id,
            PendingEntry {
                function: function.to_owned(),
                created_at: Instant::now(),
                tx,
            },
        );
        debug_assert!(replaced.is_none(), "call ids must be unique");
        rx
    }

    /// Settle the matching call, if any.
    ///
    /// A response for an unknown id (duplicate delivery, an entry already
    /// settled, or a call the caller abandoned) is silently discarded.
    /// Returns whether a waiting caller was woken.
    pub fn settle(&self, call_id: CallId, outcome: Outcome) -> bool {
        let Some(entry) = self.entries.lock().remove(&call_id) else {
            debug!(%call_id, "response for unknown call id dropped");
            return false;
        };
        debug!(
            function = %entry.function,
            %call_id,
            elapsed = ?entry.created_at.elapsed(),
            "call settled"
        );
        // The caller may have stopped waiting in the meantime; fine.
        entry.tx.send(outcome).is_ok()
    }

    /// Drop an entry whose caller gave up (deadline elapsed), so the table
    /// cannot grow without bound under sustained one-way failures.
    pub fn abandon(&self, call_id: CallId) -> bool {
        let removed = self.entries.lock().remove(&call_id);
        if let Some(entry) = removed {
            debug!(
                function = %entry.function,
                %call_id,
                waited = ?entry.created_at.elapsed(),
                "call abandoned by caller"
            );
            true
        } else {
            false
        }
    }

    /// Number of in-flight calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no calls are in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
