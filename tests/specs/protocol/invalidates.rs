// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Run` carries `invalidates` through the envelope codec intact, so the
//! worker-side runtime sees exactly the file list the pool built.

use std::time::Duration;

use ehp_core::WorkerId;
use ehp_pool::{PoolConfig, Worker};
use ehp_wire::{Channel, ControlAction, ControlRequest, ControlResponse};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use crate::prelude::{connect_and_say_ready, sample_session, ScriptedLauncher};

#[tokio::test]
async fn run_preserves_invalidates_through_the_wire() {
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
                if request.action == ControlAction::Run {
                    let ctx = request.ctx.as_ref().expect("run carries ctx");
                    assert_eq!(ctx.invalidates.as_deref(), Some(&["a.ts".to_owned()][..]));
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
    let session = sample_session().with_invalidates(vec!["a.ts".to_owned()]);
    let request = ControlRequest::new("run-1", ControlAction::Run).with_context(session);
    let response = worker.send_request(request).await.expect("run succeeds");
    assert!(response.success);

    worker.stop().await.ok();
    responder.abort();
}
