//! Pending-call registry.
//!
//! Tracks every in-flight RPC call by its request id and hands the matching
//! response (or a timeout) back to exactly one waiting caller. The map is
//! the only shared mutable state in the client; the lock is taken for map
//! mutation only and never held across an await.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use mailbridge_core::protocol::Response;
use mailbridge_core::{BridgeError, BridgeResult};
use tokio::sync::oneshot;
use tokio::time::timeout;

/// Default per-call deadline. Long enough for a human-driven file picker or
/// share-dialog interaction on the host side.
pub const DEFAULT_TIMEOUT_MS: u64 = 300_000;

type Settlement = Result<Response, String>;

/// Registry of calls awaiting a correlated response.
#[derive(Default)]
pub struct PendingCalls {
    inner: Mutex<HashMap<String, oneshot::Sender<Settlement>>>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a pending entry for `request_id`. The returned receiver settles
    /// when a matching response arrives or stays forever silent until the
    /// caller's deadline removes the entry.
    pub fn register(&self, request_id: &str) -> oneshot::Receiver<Settlement> {
        let (tx, rx) = oneshot::channel();
        self.inner
            .lock()
            .unwrap()
            .insert(request_id.to_string(), tx);
        rx
    }

    /// Deliver a response to its waiting caller.
    ///
    /// Idempotent under duplicate or late delivery: an id with no entry
    /// (already settled, timed out, or foreign) is a no-op. Returns whether
    /// a caller was actually settled so the loop can trace drops.
    pub fn settle(&self, response: Response) -> bool {
        let sender = self.inner.lock().unwrap().remove(&response.request_id);
        match sender {
            Some(tx) => {
                let settlement = if response.success {
                    Ok(response)
                } else {
                    Err(response
                        .error
                        .unwrap_or_else(|| "Unknown error".to_string()))
                };
                // A closed receiver means the caller raced a timeout; the
                // entry is gone either way.
                let _ = tx.send(settlement);
                true
            }
            None => false,
        }
    }

    /// Remove an entry without settling it (send failure, timeout).
    pub fn abandon(&self, request_id: &str) {
        self.inner.lock().unwrap().remove(request_id);
    }

    /// Await a registered call's settlement with a deadline.
    ///
    /// On timeout the entry is removed, so a later response becomes a no-op
    /// in `settle`. Exactly one of settlement and timeout wins.
    pub async fn await_settled(
        &self,
        request_id: &str,
        rx: oneshot::Receiver<Settlement>,
        timeout_ms: u64,
    ) -> BridgeResult<Response> {
        match timeout(Duration::from_millis(timeout_ms), rx).await {
            Err(_elapsed) => {
                self.abandon(request_id);
                Err(BridgeError::Timeout(timeout_ms))
            }
            // Sender dropped without settling: client teardown.
            Ok(Err(_closed)) => Err(BridgeError::ChannelClosed),
            Ok(Ok(Ok(response))) => Ok(response),
            Ok(Ok(Err(message))) => Err(BridgeError::Remote(message)),
        }
    }

    /// Drop every pending entry, failing all waiting callers. Used at
    /// context teardown.
    pub fn reject_all(&self) {
        self.inner.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
