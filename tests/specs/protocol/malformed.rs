// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A malformed frame on the socket is logged and dropped rather than
//! breaking the session — the next well-formed exchange still completes.

use std::time::Duration;

use ehp_core::WorkerId;
use ehp_pool::{PoolConfig, Worker};
use ehp_wire::{Channel, ControlAction, ControlRequest, ControlResponse};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use crate::prelude::{connect_and_say_ready, sample_session, ScriptedLauncher};

#[tokio::test]
async fn malformed_frame_is_ignored_and_session_continues() {
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
            // Not a valid envelope at all; the reader loop must drop this
            // and keep serving the socket.
            sink.send(Message::Text("not an envelope".into())).await.unwrap();

            let envelope = ehp_wire::decode(text.to_string()).unwrap();
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
    let request = ControlRequest::new("collect-1", ControlAction::Collect).with_context(sample_session());
    let response = tokio::time::timeout(Duration::from_secs(5), worker.send_request(request))
        .await
        .expect("response arrives despite the garbage frame")
        .expect("collect succeeds");
    assert!(response.success);

    worker.stop().await.ok();
    responder.abort();
}
