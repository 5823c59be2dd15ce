// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The pool-side controller: one [`Worker`] per test session. Owns the
//! transport server, the launched child's handle, and the accepted client
//! socket; forwards RPC-channel traffic verbatim and answers/dispatches
//! control-channel traffic itself.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use ehp_core::{AsyncDisposableStack, EventStream, RequestId, WorkerId};
use ehp_wire::{Channel, ControlAction, ControlRequest, ControlResponse, Envelope};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex as SyncMutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, oneshot, Mutex as AsyncMutex};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::Instrument;

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::launcher::{EditorLauncher, LaunchRequest};

type WsStream = WebSocketStream<TcpStream>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Handshake state machine, pool side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandshakeState {
    Booting,
    AwaitingConnect,
    AwaitingReady,
    Ready,
    Stopped,
}

struct PendingRequest {
    respond_to: oneshot::Sender<Result<ControlResponse, PoolError>>,
}

struct Inner {
    id: WorkerId,
    config: PoolConfig,
    state: SyncMutex<HandshakeState>,
    pending: SyncMutex<HashMap<String, PendingRequest>>,
    write: AsyncMutex<Option<WsSink>>,
    events: broadcast::Sender<Envelope>,
    reader: AsyncMutex<Option<tokio::task::JoinHandle<()>>>,
    disposal: AsyncMutex<AsyncDisposableStack>,
    child_exited: AsyncMutex<Option<oneshot::Receiver<()>>>,
}

/// One pool-side session: launches a child editor, speaks the control
/// protocol to it, and forwards RPC-channel traffic to subscribers.
#[derive(Clone)]
pub struct Worker {
    inner: Arc<Inner>,
}

impl Worker {
    /// Acquire a loopback transport endpoint, launch the child through
    /// `launcher`, and block until the worker has completed its ready
    /// handshake.
    pub async fn start(
        id: WorkerId,
        config: PoolConfig,
        launcher: &dyn EditorLauncher,
    ) -> Result<Self, PoolError> {
        let span = tracing::info_span!("worker.start", worker_id = %id);
        async move {
            let listener = TcpListener::bind(("127.0.0.1", 0))
                .await
                .map_err(PoolError::TransportBindFailed)?;
            let addr = listener.local_addr().map_err(PoolError::TransportBindFailed)?;
            tracing::info!(%addr, "transport bound");

            let mut disposal = AsyncDisposableStack::new();

            let handshake_timeout = config.clamped_handshake_timeout();
            let (events_tx, _) = broadcast::channel(ehp_core::DEFAULT_RING_CAPACITY);

            let inner = Arc::new(Inner {
                id,
                config: config.clone(),
                state: SyncMutex::new(HandshakeState::Booting),
                pending: SyncMutex::new(HashMap::new()),
                write: AsyncMutex::new(None),
                events: events_tx,
                reader: AsyncMutex::new(None),
                disposal: AsyncMutex::new(AsyncDisposableStack::new()),
                child_exited: AsyncMutex::new(None),
            });

            *inner.state.lock() = HandshakeState::AwaitingConnect;

            let launch = launcher
                .launch(LaunchRequest {
                    transport_addr: format!("ws://{addr}"),
                    config: config.clone(),
                    debug: std::env::var("POOL_DEBUG").as_deref() == Ok("1"),
                })
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "editor launch failed");
                    e
                })?;
            *inner.child_exited.lock().await = Some(launch.exited);

            let accept = timeout(handshake_timeout, accept_one(&listener));
            let (socket, peer) = match accept.await {
                Ok(Ok(pair)) => pair,
                Ok(Err(e)) => return Err(PoolError::HandshakeFailed(e.to_string())),
                Err(_) => {
                    return Err(PoolError::HandshakeFailed("timed out awaiting connection".into()))
                }
            };
            tracing::info!(%peer, "worker connected");
            // "At most one client" per session: the listener stays alive and
            // bound for the rest of the session so a second, near-simultaneous
            // connection attempt is accepted at the application layer and
            // logged as the protocol error §4.1 calls for, instead of just
            // being silently refused by the OS once nothing `accept()`s it.
            let reject_handle = tokio::spawn(reject_further_connections(listener));

            *inner.state.lock() = HandshakeState::AwaitingReady;
            let (sink, mut source) = socket.split();
            *inner.write.lock().await = Some(sink);

            let ready = timeout(handshake_timeout, await_ready(&inner, &mut source));
            match ready.await {
                Ok(Ok(request)) => {
                    if let Err(e) = write_response(&inner, ControlResponse::ok(request.id)).await {
                        reject_handle.abort();
                        return Err(e);
                    }
                }
                Ok(Err(e)) => {
                    reject_handle.abort();
                    return Err(PoolError::HandshakeFailed(e.to_string()));
                }
                Err(_) => {
                    reject_handle.abort();
                    return Err(PoolError::HandshakeFailed("timed out awaiting ready".into()));
                }
            }
            *inner.state.lock() = HandshakeState::Ready;
            tracing::info!("handshake complete");

            let reader_inner = Arc::clone(&inner);
            let reader_handle =
                tokio::spawn(reader_loop(reader_inner, source).instrument(tracing::Span::current()));
            *inner.reader.lock().await = Some(reader_handle);

            disposal.push({
                let inner = Arc::clone(&inner);
                move || async move {
                    if let Some(handle) = inner.reader.lock().await.take() {
                        handle.abort();
                    }
                }
            });
            disposal.push(move || async move {
                reject_handle.abort();
            });
            *inner.disposal.lock().await = disposal;

            Ok(Worker { inner })
        }
        .instrument(span)
        .await
    }

    pub fn id(&self) -> WorkerId {
        self.inner.id
    }

    /// Whether the caller may reuse this worker across files rather than
    /// starting a fresh one per file.
    pub fn can_reuse(&self) -> bool {
        self.inner.config.reuse_worker
    }

    fn is_ready(&self) -> bool {
        matches!(*self.inner.state.lock(), HandshakeState::Ready)
    }

    /// Issue a control request and await its matching response, subject to
    /// `control_request_timeout`.
    pub async fn send(&self, action: ControlAction) -> Result<ControlResponse, PoolError> {
        self.send_request(ControlRequest::new(RequestId::generate().to_string(), action)).await
    }

    pub async fn send_request(&self, request: ControlRequest) -> Result<ControlResponse, PoolError> {
        if !self.is_ready() {
            return Err(PoolError::NotReady);
        }
        let action = request.action;
        let id = request.id.clone();
        let (tx, rx) = oneshot::channel();
        if let Some(oldest) = self.inner.pending.lock().insert(id.clone(), PendingRequest { respond_to: tx }) {
            tracing::warn!(%id, "duplicate in-flight request id, failing the oldest waiter");
            let _ = oldest.respond_to.send(Ok(ControlResponse::failed(
                id.clone(),
                "superseded by a duplicate request id",
            )));
        }

        let envelope = request.into_envelope()?;
        if let Err(e) = write_envelope(&self.inner, envelope).await {
            self.inner.pending.lock().remove(&id);
            return Err(e);
        }

        match timeout(self.inner.config.control_request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                // The sender was dropped without sending, which this crate
                // never does deliberately (every removal path sends an
                // explicit `Ok`/`Err` first) — treat it the same as an
                // observed disconnect rather than panicking on a should-never.
                self.inner.pending.lock().remove(&id);
                Err(PoolError::WorkerDisconnected)
            }
            Err(_) => {
                self.inner.pending.lock().remove(&id);
                Err(PoolError::ControlRequestTimeout { action })
            }
        }
    }

    /// Subscribe to raw envelopes observed on the socket (both channels);
    /// the outer runner's RPC layer filters for `Channel::Rpc` itself.
    /// Dropping (or `.dispose()`-ing) the returned stream is `off()`.
    pub fn on(&self) -> EventStream<Envelope> {
        EventStream::new(self.inner.events.subscribe())
    }

    /// Send a raw RPC-channel envelope (the outer runner's own codec
    /// produces the payload; this just frames and forwards it).
    pub async fn post_rpc(&self, payload: ehp_wire::Graph) -> Result<(), PoolError> {
        if !self.is_ready() {
            return Err(PoolError::NotReady);
        }
        write_envelope(&self.inner, Envelope::from_graph(Channel::Rpc, payload)).await
    }

    /// Notify the worker of a cancellation, the way the outer runner's own
    /// `onCancel(reason)` is wired up to this crate. Deliberately routed
    /// through the RPC channel via `post_rpc` rather than a new control
    /// action: the spec is explicit that cancellation is "the outer RPC's
    /// standard runner method", not a lifecycle request, and pending
    /// control requests are left to complete or time out on their own.
    /// The concrete envelope shape (`{"method": "cancel", "reason": ...}`)
    /// is this crate's own choice where the outer runner's format is out of
    /// scope; a real integration replaces it with the outer runner's own
    /// cancel payload.
    pub async fn cancel(&self, reason: impl Into<String>) -> Result<(), PoolError> {
        let payload = ehp_wire::Graph::from_json(serde_json::json!({
            "method": "cancel",
            "reason": reason.into(),
        }));
        self.post_rpc(payload).await
    }

    /// Decode a raw frame through the shared codec.
    pub fn deserialize(&self, raw: impl Into<ehp_wire::DecodeInput>) -> Result<Envelope, PoolError> {
        Ok(ehp_wire::decode(raw)?)
    }

    /// Ordered shutdown: request `Shutdown` (if ready), close the socket,
    /// drop the transport, await child exit, then reject any requests still
    /// pending. Errors from each step are aggregated rather than short
    /// circuiting, so every step still runs even if an earlier one failed.
    pub async fn stop(&self) -> Result<(), PoolError> {
        let span = tracing::info_span!("worker.stop", worker_id = %self.inner.id);
        async move {
            let mut errors = Vec::new();

            if self.is_ready() {
                if let Err(e) = self.send(ControlAction::Shutdown).await {
                    tracing::warn!(error = %e, "shutdown request failed");
                    errors.push(e);
                }
            }
            *self.inner.state.lock() = HandshakeState::Stopped;

            if let Some(mut sink) = self.inner.write.lock().await.take() {
                if let Err(e) = sink.close().await {
                    errors.push(PoolError::HandshakeFailed(e.to_string()));
                }
            }

            self.inner.disposal.lock().await.dispose().await;

            if let Some(exited) = self.inner.child_exited.lock().await.take() {
                let _ = timeout(self.inner.config.launch_timeout, exited).await;
            }

            let stale: Vec<_> = self.inner.pending.lock().drain().collect();
            let any_stale = !stale.is_empty();
            for (_, pending) in stale {
                let _ = pending.respond_to.send(Err(PoolError::WorkerStopped));
            }
            if any_stale {
                errors.push(PoolError::WorkerStopped);
            }

            PoolError::aggregate(errors)
        }
        .instrument(span)
        .await
    }
}

async fn accept_one(listener: &TcpListener) -> Result<(WsStream, SocketAddr), std::io::Error> {
    let (stream, peer) = listener.accept().await?;
    let ws = tokio_tungstenite::accept_async(stream)
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    Ok((ws, peer))
}

/// Accept and immediately drop every further connection on this session's
/// transport, logging each one as the protocol error §4.1 calls for. Runs
/// for the lifetime of the session; aborted by the disposal stack on `stop()`
/// (or directly, on a handshake failure before the stack is assembled).
async fn reject_further_connections(listener: TcpListener) {
    loop {
        match listener.accept().await {
            Ok((_stream, peer)) => {
                tracing::error!(
                    %peer,
                    "protocol error: a second client connected to this worker's transport, dropping it"
                );
            }
            Err(e) => {
                tracing::debug!(error = %e, "transport listener closed");
                break;
            }
        }
    }
}

/// Wait for the `ready` control request, rejecting any other control action
/// that arrives first with a `not_ready` error response rather than failing
/// the handshake outright.
async fn await_ready(inner: &Inner, source: &mut WsSource) -> Result<ControlRequest, PoolError> {
    loop {
        match source.next().await {
            Some(Ok(Message::Text(text))) => {
                let envelope = match ehp_wire::decode(text.to_string()) {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::warn!(error = %e, "malformed envelope during handshake");
                        continue;
                    }
                };
                if envelope.channel == Channel::Control && envelope.is_control_request() {
                    let request = ControlRequest::from_envelope(&envelope)?;
                    if request.action == ControlAction::Ready {
                        return Ok(request);
                    }
                    tracing::warn!(action = ?request.action, "rejecting control request before ready");
                    write_response(inner, ControlResponse::failed(request.id, "not_ready")).await?;
                }
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(PoolError::HandshakeFailed("socket closed before ready".into()))
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(PoolError::HandshakeFailed(e.to_string())),
        }
    }
}

async fn write_envelope(inner: &Inner, envelope: Envelope) -> Result<(), PoolError> {
    let text = ehp_wire::encode(envelope.channel, envelope.payload)?;
    let mut guard = inner.write.lock().await;
    let Some(sink) = guard.as_mut() else {
        return Err(PoolError::WorkerDisconnected);
    };
    sink.send(Message::Text(text.into())).await.map_err(|e| {
        tracing::warn!(error = %e, "write failed");
        PoolError::WorkerDisconnected
    })
}

async fn write_response(inner: &Inner, response: ControlResponse) -> Result<(), PoolError> {
    let envelope = response.into_envelope()?;
    write_envelope(inner, envelope).await
}

/// Background loop: consume inbound frames for the lifetime of the socket,
/// resolving pending control requests and forwarding everything else (plus
/// a copy of control traffic) onto the broadcast channel for `on()`
/// subscribers.
async fn reader_loop(inner: Arc<Inner>, mut source: WsSource) {
    loop {
        match source.next().await {
            Some(Ok(Message::Text(text))) => {
                let envelope = match ehp_wire::decode(text.to_string()) {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping malformed envelope");
                        continue;
                    }
                };
                if envelope.channel == Channel::Control {
                    if envelope.is_control_response() {
                        if let Ok(response) = ControlResponse::from_envelope(&envelope) {
                            let pending = inner.pending.lock().remove(&response.id);
                            match pending {
                                Some(p) => {
                                    let _ = p.respond_to.send(Ok(response));
                                }
                                None => {
                                    tracing::warn!(id = %response.id, "late response, discarding")
                                }
                            }
                        }
                    } else {
                        tracing::warn!("dropping unexpected control message after handshake");
                    }
                    continue;
                }
                // RPC-channel envelopes are forwarded verbatim to every
                // subscriber registered at the moment of arrival.
                let _ = inner.events.send(envelope);
            }
            Some(Ok(Message::Close(_))) | None => {
                tracing::info!("worker socket closed");
                break;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "transport error");
                break;
            }
        }
    }
    let stale: Vec<_> = inner.pending.lock().drain().collect();
    for (_, pending) in stale {
        let _ = pending.respond_to.send(Err(PoolError::WorkerDisconnected));
    }
}
