// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke test with two real OS processes: the pool launches the
//! compiled `ehp-host` binary exactly as a real editor launcher would, and
//! the two sides complete the whole handshake/collect/shutdown lifecycle
//! over a real loopback socket.

use std::time::Duration;

use ehp_core::WorkerId;
use ehp_pool::{PoolConfig, ProcessEditorLauncher, Worker};
use ehp_wire::{Channel, ControlAction, ControlRequest};
use tokio_stream::StreamExt as _;

#[tokio::test]
async fn real_child_process_completes_collect_and_shuts_down() {
    let executable = env!("CARGO_BIN_EXE_ehp-host");
    let config = PoolConfig::default().editor_executable_path(executable);
    let launcher = ProcessEditorLauncher::new();

    let worker = Worker::start(WorkerId::FIRST, config, &launcher)
        .await
        .expect("real child completes the ready handshake");

    let mut events = worker.on();

    let session = ehp_wire::SerializedSession::new(
        worker.id().get(),
        "demo",
        serde_json::json!({}),
    )
    .with_files(vec![ehp_wire::SpecFile::whole_file("a.test.ts")]);
    let request = ControlRequest::new("collect-1", ControlAction::Collect).with_context(session);
    let response = worker.send_request(request).await.expect("collect succeeds");
    assert!(response.success);

    // `setup()` posts its own `environment-ready` event ahead of the
    // batch's `file-started`/`file-finished` pair, so scan forward to the
    // one we actually care about rather than assuming it's first.
    let payload = loop {
        let envelope = tokio::time::timeout(Duration::from_secs(10), events.next())
            .await
            .expect("rpc event arrives")
            .expect("stream open")
            .expect("event decodes");
        assert_eq!(envelope.channel, Channel::Rpc);
        let payload = envelope.payload.to_json().unwrap();
        if payload["type"] == "file-started" {
            break payload;
        }
    };
    assert_eq!(payload["filepath"], "a.test.ts");

    worker.stop().await.expect("clean shutdown");
}
