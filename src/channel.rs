//! Message channel abstraction.
//!
//! The real transport is environment-specific (cross-origin messaging in the
//! original deployment); the bridge only needs a fire-and-forget sender for
//! JSON values plus a receiver stream for inbound traffic. `channel_pair`
//! wires two in-process endpoints together for tests and embedding.

use std::sync::Arc;

use mailbridge_core::{BridgeError, BridgeResult};
use tokio::sync::{mpsc, watch};

/// Outbound half of the bridge transport.
pub trait MessageChannel: Send + Sync {
    /// Queue a value for the other context. Fails only when the transport
    /// is gone; delivery itself is best-effort (the RPC layer's timeout is
    /// the delivery guarantee).
    fn send(&self, value: serde_json::Value) -> BridgeResult<()>;
}

struct MpscChannel {
    tx: mpsc::UnboundedSender<serde_json::Value>,
}

impl MessageChannel for MpscChannel {
    fn send(&self, value: serde_json::Value) -> BridgeResult<()> {
        self.tx.send(value).map_err(|_| BridgeError::ChannelClosed)
    }
}

/// One side of an in-process duplex channel.
pub struct Endpoint {
    pub outbound: Arc<dyn MessageChannel>,
    pub inbound: mpsc::UnboundedReceiver<serde_json::Value>,
}

/// Build two linked endpoints: whatever one sends, the other receives.
pub fn channel_pair() -> (Endpoint, Endpoint) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();
    (
        Endpoint {
            outbound: Arc::new(MpscChannel { tx: b_tx }),
            inbound: a_rx,
        },
        Endpoint {
            outbound: Arc::new(MpscChannel { tx: a_tx }),
            inbound: b_rx,
        },
    )
}

/// Environment-side handle that fires once the embedded context is reachable.
///
/// Discovery timing (polling, DOM observation) lives outside this crate; the
/// client only waits for the signal before its first send.
pub struct ReadySignal {
    tx: watch::Sender<bool>,
}

impl ReadySignal {
    pub fn new() -> (ReadySignal, ReadyHandle) {
        let (tx, rx) = watch::channel(false);
        (ReadySignal { tx }, ReadyHandle { rx })
    }

    /// A handle that is already ready, for contexts wired up synchronously.
    pub fn fired() -> ReadyHandle {
        let (signal, handle) = ReadySignal::new();
        signal.fire();
        handle
    }

    pub fn fire(&self) {
        let _ = self.tx.send(true);
    }
}

/// Client-side view of the ready signal.
#[derive(Clone)]
pub struct ReadyHandle {
    rx: watch::Receiver<bool>,
}

impl ReadyHandle {
    /// Wait until the signal has fired. Errors only if the signal owner was
    /// dropped without ever firing.
    pub async fn wait(&self) -> BridgeResult<()> {
        let mut rx = self.rx.clone();
        while !*rx.borrow() {
            rx.changed().await.map_err(|_| BridgeError::ChannelClosed)?;
        }
        Ok(())
    }
}
