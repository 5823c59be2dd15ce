// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A cancellation notification issued pool-side with `Worker::cancel` must
//! be observable on the RPC channel inside the worker, not sent as a
//! control request — the control channel stays free for `Shutdown` while
//! the cancel is still in flight.

use std::time::Duration;

use ehp_core::WorkerId;
use ehp_pool::{PoolConfig, Worker};
use ehp_wire::{Channel, ControlAction, ControlRequest, ControlResponse};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use crate::prelude::{connect_and_say_ready, ScriptedLauncher};

#[tokio::test]
async fn cancel_is_observable_on_the_rpc_channel_not_the_control_channel() {
    let (launcher, mut addr_rx) = ScriptedLauncher::new();
    let start = tokio::spawn(async move {
        Worker::start(WorkerId::FIRST, PoolConfig::default(), &launcher).await
    });

    let addr = tokio::time::timeout(Duration::from_secs(5), addr_rx.recv())
        .await
        .expect("addr sent")
        .expect("addr channel open");
    let (mut sink, mut source) = connect_and_say_ready(&addr).await;

    // Scripted "worker": answer control requests, but record every frame's
    // channel tag so the test can assert the cancel never shows up as one.
    let (channel_tx, mut channel_rx) = tokio::sync::mpsc::unbounded_channel();
    let responder = tokio::spawn(async move {
        while let Some(Ok(Message::Text(text))) = source.next().await {
            let envelope = ehp_wire::decode(text.to_string()).unwrap();
            let _ = channel_tx.send(envelope.channel);
            if envelope.channel == Channel::Control && envelope.is_control_request() {
                let request = ControlRequest::from_envelope(&envelope).unwrap();
                let response = ControlResponse::ok(request.id);
                let out = response.into_envelope().unwrap();
                let text = ehp_wire::encode(out.channel, out.payload).unwrap();
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    let worker = start.await.unwrap().unwrap();
    worker.cancel("user requested stop").await.expect("cancel posts over rpc");

    let observed = tokio::time::timeout(Duration::from_secs(5), channel_rx.recv())
        .await
        .expect("cancel frame arrives within the bound")
        .expect("channel open");
    assert_eq!(observed, Channel::Rpc, "cancellation must not be framed as a control request");

    worker.stop().await.ok();
    responder.abort();
}
