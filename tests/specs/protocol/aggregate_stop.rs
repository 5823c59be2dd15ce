// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `stop()` aggregates every teardown failure into one `PoolError::Stop`
//! instead of returning only the first.

use std::time::Duration;

use ehp_core::WorkerId;
use ehp_pool::{PoolConfig, PoolError, Worker};
use ehp_wire::ControlAction;

use crate::prelude::{connect_and_say_ready, ScriptedLauncher};

#[tokio::test]
async fn stop_reports_a_timed_out_shutdown_as_an_aggregate_error() {
    let (launcher, mut addr_rx) = ScriptedLauncher::new();
    let config = PoolConfig::default().control_request_timeout(Duration::from_millis(150));
    let start =
        tokio::spawn(async move { Worker::start(WorkerId::FIRST, config, &launcher).await });

    let addr = tokio::time::timeout(Duration::from_secs(5), addr_rx.recv())
        .await
        .expect("addr sent")
        .expect("addr channel open");
    // Complete the handshake but never answer anything the pool sends
    // afterward, so the Shutdown request stop() issues times out.
    let (_sink, _source) = connect_and_say_ready(&addr).await;

    let worker = start.await.unwrap().unwrap();

    let err = worker.stop().await.unwrap_err();
    match err {
        PoolError::Stop(errors) => {
            assert!(!errors.is_empty());
            assert!(errors
                .iter()
                .any(|e| matches!(e, PoolError::ControlRequestTimeout { action } if *action == ControlAction::Shutdown)));
        }
        other => panic!("expected an aggregate Stop error, got {other:?}"),
    }
}
