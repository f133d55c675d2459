//! The pending-id map shared by every flavor of [`crate::session::Session`]:
//! broker-hosted (one per connected client) and direct-call (one per
//! in-process caller). Factored out because both need the exact same
//! invariant (spec §8): "for every internal command id i registered in the
//! pending-id map, the reader delivers at most one response and the map
//! entry is removed before the handler returns."

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{oneshot, Mutex};
use vibium_types::{BidiResponse, CallId, CLIENT_ID_CEILING};

use crate::error::{Result, VibiumError};

pub struct Correlator {
    pending: Mutex<HashMap<CallId, oneshot::Sender<BidiResponse>>>,
    next_internal_id: AtomicU64,
    closed: AtomicBool,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            next_internal_id: AtomicU64::new(CLIENT_ID_CEILING),
            closed: AtomicBool::new(false),
        }
    }

    /// Allocates a fresh internal id. Ids are strictly monotonically
    /// increasing per session and never collide with client ids (spec §8).
    pub fn alloc_internal_id(&self) -> CallId {
        let id = self.next_internal_id.fetch_add(1, Ordering::SeqCst);
        CallId::new(id)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Registers a one-shot waiter for `id`. Fails immediately if the
    /// session is already closed.
    pub async fn register(&self, id: CallId) -> Result<oneshot::Receiver<BidiResponse>> {
        if self.is_closed() {
            return Err(VibiumError::SessionClosed);
        }
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);
        Ok(rx)
    }

    /// Removes the pending slot for `id` without delivering to it —
    /// used when a timeout fires so a late response is dropped rather
    /// than forwarded (spec §4.1, §8).
    pub async fn deregister(&self, id: CallId) {
        self.pending.lock().await.remove(&id);
    }

    /// Delivers a response to its waiter, if one is still registered.
    /// Returns `true` if a waiter was found — callers use this to decide
    /// whether a frame was an internal-command reply (consume it) or
    /// should fall through to event handling.
    pub async fn resolve(&self, response: BidiResponse) -> bool {
        if let Some(tx) = self.pending.lock().await.remove(&response.id) {
            let _ = tx.send(response);
            true
        } else {
            false
        }
    }

    /// Marks the session closed and fails every still-pending waiter
    /// immediately, rather than letting them wait out their timeout (spec
    /// §8: "every subsequent `sendInternalCommand` returns a session-closed
    /// error ... not waiting out the timeout").
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let mut pending = self.pending.lock().await;
        // Dropping the senders completes the matching receivers with
        // `RecvError`, which callers map to `VibiumError::SessionClosed`.
        pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vibium_types::BidiOutcome;

    #[tokio::test]
    async fn internal_ids_start_above_client_ceiling_and_increase() {
        let c = Correlator::new();
        let a = c.alloc_internal_id();
        let b = c.alloc_internal_id();
        assert!(a.is_internal());
        assert!(b.value() > a.value());
    }

    #[tokio::test]
    async fn late_response_after_deregister_is_not_delivered() {
        let c = Correlator::new();
        let id = c.alloc_internal_id();
        let rx = c.register(id).await.unwrap();
        c.deregister(id).await;
        let delivered = c
            .resolve(BidiResponse {
                id,
                outcome: BidiOutcome::Success(serde_json::json!(null)),
            })
            .await;
        assert!(!delivered);
        // the receiver is now orphaned; awaiting it yields a Canceled error
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn close_fails_pending_waiters_immediately() {
        let c = Correlator::new();
        let id = c.alloc_internal_id();
        let rx = c.register(id).await.unwrap();
        c.close().await;
        assert!(rx.await.is_err());
        assert!(matches!(
            c.register(c.alloc_internal_id()).await,
            Err(VibiumError::SessionClosed)
        ));
    }
}
