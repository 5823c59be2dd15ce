// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared scaffolding for the protocol scenario tests: a launcher that
//! connects a scripted client socket back to the pool instead of spawning a
//! real child, plus the handshake boilerplate every scenario starts from.

use async_trait::async_trait;
use ehp_pool::{EditorLauncher, LaunchHandle, LaunchRequest, PoolError};
use ehp_wire::{Channel, ControlAction, ControlRequest, ControlResponse};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub type ClientSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
pub type ClientSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Launcher that, instead of spawning a real process, hands the pool's
/// transport address back to the test over a channel.
pub struct ScriptedLauncher {
    addr_tx: std::sync::Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl ScriptedLauncher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { addr_tx: std::sync::Mutex::new(Some(tx)) }, rx)
    }
}

#[async_trait]
impl EditorLauncher for ScriptedLauncher {
    async fn launch(&self, request: LaunchRequest) -> Result<LaunchHandle, PoolError> {
        if let Some(tx) = self.addr_tx.lock().unwrap().take() {
            let _ = tx.send(request.transport_addr);
        }
        let (_tx, rx) = oneshot::channel();
        Ok(LaunchHandle { exited: rx })
    }
}

/// Connect to `addr`, perform the ready handshake, and return the open
/// socket halves so the scenario can script further exchanges.
pub async fn connect_and_say_ready(addr: &str) -> (ClientSink, ClientSource) {
    let (ws, _) = tokio_tungstenite::connect_async(addr).await.expect("client connect");
    let (mut sink, mut source) = ws.split();

    let request = ControlRequest::new("ready-1", ControlAction::Ready);
    let envelope = request.into_envelope().unwrap();
    let text = ehp_wire::encode(envelope.channel, envelope.payload).unwrap();
    sink.send(Message::Text(text.into())).await.expect("send ready");

    loop {
        match source.next().await.expect("socket closed before ack").expect("ws error") {
            Message::Text(text) => {
                let envelope = ehp_wire::decode(text.to_string()).unwrap();
                if envelope.channel == Channel::Control && envelope.is_control_response() {
                    let response = ControlResponse::from_envelope(&envelope).unwrap();
                    assert_eq!(response.id, "ready-1");
                    assert!(response.success);
                    break;
                }
            }
            _ => continue,
        }
    }

    (sink, source)
}

pub fn sample_session() -> ehp_wire::SerializedSession {
    ehp_wire::SerializedSession {
        pool: ehp_wire::POOL_NAME.to_owned(),
        worker_id: 1,
        config: serde_json::json!({}),
        project_name: "demo".to_owned(),
        files: vec![ehp_wire::SpecFile::whole_file("a.test.ts")],
        environment: ehp_wire::Environment { name: "node".to_owned(), options: None },
        provided_context: serde_json::json!({}),
        invalidates: None,
    }
}
