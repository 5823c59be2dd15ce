// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The capability handed to the installed [`crate::WorkerHost`]: post/on/off
//! over the RPC channel plus the shared envelope codec, so the host can
//! drive its own traffic over the same socket the control protocol runs on.

use std::sync::Arc;

use ehp_core::EventStream;
use ehp_wire::{Channel, DecodeInput, Envelope, Graph};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use parking_lot::Mutex as SyncMutex;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::WorkerError;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type WsSink = SplitSink<WsStream, Message>;

/// Owns the one true `broadcast::Sender` behind every `WorkerBridge` clone's
/// `on()`/`post()`-forwarding, so `teardown()` can end every live subscriber
/// at once: dropping the sender held here is the *only* sender in play (the
/// runtime's own inbound-forwarding path sends through this same handle
/// rather than keeping a separate clone alive), so every outstanding
/// `EventStream` observes the channel close the instant it runs.
#[derive(Clone)]
pub(crate) struct EventsHandle {
    inner: Arc<SyncMutex<Option<broadcast::Sender<Envelope>>>>,
}

impl EventsHandle {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { inner: Arc::new(SyncMutex::new(Some(tx))) }
    }

    /// Subscribe to forwarded envelopes. After `teardown()`, hands back a
    /// stream that's already ended rather than panicking.
    pub(crate) fn subscribe(&self) -> EventStream<Envelope> {
        match self.inner.lock().as_ref() {
            Some(tx) => EventStream::new(tx.subscribe()),
            None => EventStream::new(broadcast::channel(1).1),
        }
    }

    pub(crate) fn send(&self, envelope: Envelope) {
        if let Some(tx) = self.inner.lock().as_ref() {
            let _ = tx.send(envelope);
        }
    }

    /// Drop the sender. Idempotent: a second call finds `None` already and
    /// is a no-op.
    pub(crate) fn teardown(&self) {
        self.inner.lock().take();
    }
}

#[derive(Clone)]
pub struct WorkerBridge {
    write: Arc<AsyncMutex<WsSink>>,
    events: EventsHandle,
}

impl WorkerBridge {
    pub(crate) fn new(write: Arc<AsyncMutex<WsSink>>, events: EventsHandle) -> Self {
        Self { write, events }
    }

    /// Wrap `payload` into an `rpc`-channel envelope and send it to the pool.
    pub async fn post(&self, payload: Graph) -> Result<(), WorkerError> {
        let text = ehp_wire::encode(Channel::Rpc, payload)?;
        self.write.lock().await.send(Message::Text(text.into())).await.map_err(|e| {
            tracing::warn!(error = %e, "bridge post failed");
            WorkerError::PoolDisconnected
        })
    }

    /// Subscribe to inbound `rpc`-channel envelopes. Dropping (or
    /// `.dispose()`-ing) the returned stream is `off()` for that one
    /// subscriber; `teardown()` is the mass version, ending every live
    /// subscriber at once.
    pub fn on(&self) -> EventStream<Envelope> {
        self.events.subscribe()
    }

    /// Release every subscriber registered via `on()` at once, whether or
    /// not the host kept a handle to its `EventStream` — used when the host
    /// wants to stop. A later `on()` still returns a stream, but one that's
    /// already ended.
    pub fn teardown(&self) {
        self.events.teardown();
    }

    pub fn deserialize(&self, raw: impl Into<DecodeInput>) -> Result<Envelope, WorkerError> {
        Ok(ehp_wire::decode(raw)?)
    }

    pub fn serialize(&self, payload: Graph) -> Result<String, WorkerError> {
        Ok(ehp_wire::encode(Channel::Rpc, payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt as _;
    use tokio::net::TcpListener;

    /// A real loopback client socket, just so `WorkerBridge::new` has a
    /// genuine `WsSink` to hold; this test never writes to it.
    async fn bridge_over_loopback() -> (WorkerBridge, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let _ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            std::future::pending::<()>().await
        });
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}")).await.unwrap();
        let (sink, _source) = ws.split();
        let events = EventsHandle::new(ehp_core::DEFAULT_RING_CAPACITY);
        let bridge = WorkerBridge::new(Arc::new(AsyncMutex::new(sink)), events);
        (bridge, server)
    }

    #[tokio::test]
    async fn teardown_ends_every_live_subscriber_even_without_a_kept_handle() {
        let (bridge, server) = bridge_over_loopback().await;

        let mut kept = bridge.on();
        bridge.on(); // dropped immediately, the way a host that never kept a handle would use it

        bridge.teardown();

        assert!(kept.next().await.is_none(), "teardown must end a subscriber the host still holds");

        let mut after = bridge.on();
        assert!(after.next().await.is_none(), "on() after teardown hands back an already-ended stream");

        server.abort();
    }
}
