// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker-side runtime: the single entry point the editor invokes once
//! per spawned child. Connects back to the pool, completes the ready
//! handshake, installs the host, and serves control requests in the order
//! they were received until `Shutdown`.

use std::sync::Arc;

use ehp_core::RequestId;
use ehp_wire::{Channel, ControlAction, ControlRequest, ControlResponse, Envelope};
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tracing::Instrument;

use crate::bridge::{EventsHandle, WsSink, WsStream, WorkerBridge};
use crate::config::WorkerRuntimeConfig;
use crate::error::WorkerError;
use crate::host::{SetupHandle, WorkerHost};

type WsSource = SplitStream<WsStream>;

/// Mirror a lifecycle event to stderr in addition to the normal `tracing`
/// output, when the child was launched with `POOL_DEBUG=1`.
fn mirror_lifecycle(debug: bool, message: &str) {
    if debug {
        eprintln!("[ehp-worker] {message}");
    }
}

/// Connect to the pool, complete the handshake, and serve control requests
/// until `Shutdown` or peer disconnect. Returns once the session is torn
/// down cleanly; any other outcome is an error.
pub async fn run<H: WorkerHost>(config: WorkerRuntimeConfig, host: H) -> Result<(), WorkerError> {
    let span = tracing::info_span!("worker.run");
    async move {
        let endpoint = config.endpoint.clone().ok_or(WorkerError::MissingEndpoint)?;
        tracing::info!(%endpoint, "connecting to pool transport");
        mirror_lifecycle(config.debug, &format!("connecting to {endpoint}"));
        let (ws, _) = tokio_tungstenite::connect_async(&endpoint)
            .await
            .map_err(|e| WorkerError::ConnectFailed(e.to_string()))?;

        // "Acquire three scoped listeners: inbound-message, peer-error,
        // peer-close" maps onto splitting the socket and matching on every
        // `Message`/`Err`/stream-end arm of the single reader loop below.
        let (sink, mut source) = ws.split();
        let write = Arc::new(AsyncMutex::new(sink));
        let events = EventsHandle::new(ehp_core::DEFAULT_RING_CAPACITY);
        let bridge = WorkerBridge::new(Arc::clone(&write), events.clone());

        let ready_id = RequestId::generate().to_string();
        let ready = ControlRequest::new(ready_id.clone(), ControlAction::Ready);
        write_envelope(&write, ready.into_envelope()?).await?;
        mirror_lifecycle(config.debug, "ready sent");

        let ack = timeout(config.clamped_ready_ack_timeout(), await_response(&mut source, &ready_id));
        match ack.await {
            Ok(Ok(_)) => {
                tracing::info!("ready_ack received");
                mirror_lifecycle(config.debug, "ready_ack received");
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(WorkerError::ReadyAckTimeout),
        }

        // The analogous operation to resolving the worker bootstrap
        // module's sibling path: this runtime's own location, never the
        // process's working directory.
        let _module_path = std::env::current_exe().map_err(|_| WorkerError::WorkerModuleUnresolvable)?;

        let setup_handle: AsyncMutex<Option<SetupHandle>> = AsyncMutex::new(None);
        let mut shutdown_requested = false;

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
                    match envelope.channel {
                        Channel::Rpc => {
                            events.send(envelope);
                        }
                        Channel::Control if envelope.is_control_request() => {
                            let request = ControlRequest::from_envelope(&envelope)?;
                            let is_shutdown = request.action == ControlAction::Shutdown;
                            let response = dispatch(&host, &bridge, &setup_handle, request).await;
                            write_envelope(&write, response.into_envelope()?).await?;
                            if is_shutdown {
                                mirror_lifecycle(config.debug, "shutdown acknowledged, closing");
                                shutdown_requested = true;
                                break;
                            }
                        }
                        Channel::Control => {
                            tracing::warn!("dropping unexpected control message");
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "transport error");
                    break;
                }
            }
        }

        if let Some(handle) = setup_handle.lock().await.take() {
            handle.release().await;
        }
        let _ = write.lock().await.close().await;

        if shutdown_requested {
            Ok(())
        } else {
            Err(WorkerError::PoolDisconnected)
        }
    }
    .instrument(span)
    .await
}

/// Dispatch a single control request to completion before the loop reads
/// its next message — the loop body itself is the FIFO command queue.
async fn dispatch<H: WorkerHost>(
    host: &H,
    bridge: &WorkerBridge,
    setup_handle: &AsyncMutex<Option<SetupHandle>>,
    request: ControlRequest,
) -> ControlResponse {
    match request.action {
        ControlAction::Run | ControlAction::Collect => {
            let Some(ctx) = request.ctx else {
                return ControlResponse::failed(request.id, "missing ctx for run/collect");
            };
            if setup_handle.lock().await.is_none() {
                match host.setup(bridge.clone(), ctx.clone()).await {
                    Ok(handle) => *setup_handle.lock().await = Some(handle),
                    Err(e) => return ControlResponse::failed(request.id, e),
                }
            }
            let outcome = match request.action {
                ControlAction::Run => host.run_tests(bridge.clone(), ctx).await,
                ControlAction::Collect => host.collect_tests(bridge.clone(), ctx).await,
                _ => unreachable!(),
            };
            match outcome {
                Ok(()) => ControlResponse::ok(request.id),
                Err(e) => ControlResponse::failed(request.id, e),
            }
        }
        ControlAction::Shutdown => ControlResponse::ok(request.id),
        ControlAction::Ready | ControlAction::ReadyAck => {
            ControlResponse::failed(request.id, "unexpected action after handshake")
        }
    }
}

async fn write_envelope(write: &Arc<AsyncMutex<WsSink>>, envelope: Envelope) -> Result<(), WorkerError> {
    let text = ehp_wire::encode(envelope.channel, envelope.payload)?;
    write.lock().await.send(Message::Text(text.into())).await.map_err(|e| {
        tracing::warn!(error = %e, "write failed");
        WorkerError::PoolDisconnected
    })
}

async fn await_response(source: &mut WsSource, id: &str) -> Result<ControlResponse, WorkerError> {
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
                if envelope.channel == Channel::Control && envelope.is_control_response() {
                    let response = ControlResponse::from_envelope(&envelope)?;
                    if response.id == id {
                        return Ok(response);
                    }
                    tracing::warn!(id = %response.id, "discarding response for unknown request");
                }
            }
            Some(Ok(Message::Close(_))) | None => return Err(WorkerError::PoolDisconnected),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(WorkerError::ConnectFailed(e.to_string())),
        }
    }
}
