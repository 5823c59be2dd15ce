// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Collect` dispatches through the control channel and RPC-channel
//! traffic posted during the run is forwarded to `on()` subscribers.

use std::time::Duration;

use ehp_core::WorkerId;
use ehp_pool::{PoolConfig, Worker};
use ehp_wire::{Channel, ControlAction, ControlRequest, ControlResponse, Graph};
use futures_util::{SinkExt, StreamExt};
use tokio_stream::StreamExt as _;
use tokio_tungstenite::tungstenite::Message;

use crate::prelude::{connect_and_say_ready, sample_session, ScriptedLauncher};

#[tokio::test]
async fn collect_dispatches_and_forwards_rpc_traffic() {
    let (launcher, mut addr_rx) = ScriptedLauncher::new();
    let start = tokio::spawn(async move {
        Worker::start(WorkerId::FIRST, PoolConfig::default(), &launcher).await
    });

    let addr = tokio::time::timeout(Duration::from_secs(5), addr_rx.recv())
        .await
        .expect("addr sent")
        .expect("addr channel open");
    let (mut sink, mut source) = connect_and_say_ready(&addr).await;

    let responder = tokio::spawn(async move {
        while let Some(Ok(Message::Text(text))) = source.next().await {
            let envelope = ehp_wire::decode(text.to_string()).unwrap();
            if envelope.channel == Channel::Control && envelope.is_control_request() {
                let request = ControlRequest::from_envelope(&envelope).unwrap();
                if request.action == ControlAction::Collect {
                    let task_update = Graph::from_json(serde_json::json!({
                        "type": "file-finished",
                        "filepath": "a.test.ts",
                    }));
                    let rpc = ehp_wire::encode(Channel::Rpc, task_update).unwrap();
                    sink.send(Message::Text(rpc.into())).await.unwrap();
                }
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
    let mut events = worker.on();

    let request = ControlRequest::new("collect-1", ControlAction::Collect).with_context(sample_session());
    let response = worker.send_request(request).await.expect("collect succeeds");
    assert!(response.success);

    let forwarded = tokio::time::timeout(Duration::from_secs(5), events.next())
        .await
        .expect("rpc event arrives")
        .expect("stream open")
        .expect("event decodes");
    assert_eq!(forwarded.channel, Channel::Rpc);
    let payload = forwarded.payload.to_json().unwrap();
    assert_eq!(payload["type"], "file-finished");

    worker.stop().await.ok();
    responder.abort();
}
