// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External collaborator contract: something that can start and track a
//! child editor process. The download/resolve-a-build machinery behind a
//! real editor launcher is out of scope ("contract-only" per the
//! purpose/scope section); this crate ships the trait, an in-process fake
//! for the control-protocol tests, and [`ProcessEditorLauncher`] — a real,
//! bounded implementation that spawns an already-resolved executable path.

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::config::PoolConfig;
use crate::error::PoolError;

/// What the launcher needs to start the child.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    /// `ws://127.0.0.1:<port>` — passed to the child as `CHILD_TRANSPORT_ADDR`.
    pub transport_addr: String,
    pub config: PoolConfig,
    /// Mirrors `POOL_DEBUG=1` in the child's environment when true.
    pub debug: bool,
}

/// A handle to a launched child. The launcher is responsible for delivering
/// exactly one signal on `exited` when the child process terminates, for
/// any reason.
pub struct LaunchHandle {
    pub exited: oneshot::Receiver<()>,
}

#[async_trait]
pub trait EditorLauncher: Send + Sync {
    async fn launch(&self, request: LaunchRequest) -> Result<LaunchHandle, PoolError>;
}

/// In-process test double: never spawns a real process. Instead it hands
/// back a [`LaunchHandle`] whose `exited` signal fires when [`FakeEditorLauncher::kill_all`]
/// is called, or immediately never if no kill is requested — callers that
/// want to simulate a crashing child call `kill_all` themselves.
#[derive(Default)]
pub struct FakeEditorLauncher {
    exits: parking_lot::Mutex<Vec<oneshot::Sender<()>>>,
}

impl FakeEditorLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate every launched child exiting right now.
    pub fn kill_all(&self) {
        let mut exits = self.exits.lock();
        for tx in exits.drain(..) {
            let _ = tx.send(());
        }
    }
}

#[async_trait]
impl EditorLauncher for FakeEditorLauncher {
    async fn launch(&self, _request: LaunchRequest) -> Result<LaunchHandle, PoolError> {
        let (tx, rx) = oneshot::channel();
        self.exits.lock().push(tx);
        Ok(LaunchHandle { exited: rx })
    }
}

/// A launcher whose every launch attempt fails, for exercising
/// `ChildLaunchFailed` propagation.
pub struct FailingEditorLauncher {
    pub message: String,
}

#[async_trait]
impl EditorLauncher for FailingEditorLauncher {
    async fn launch(&self, _request: LaunchRequest) -> Result<LaunchHandle, PoolError> {
        Err(PoolError::ChildLaunchFailed(self.message.clone()))
    }
}

/// Spawns `config.editor_executable_path` as a child process, forwarding
/// the transport address and debug flag through the environment and the
/// configured `launch_args` on the command line. Requires
/// `editor_executable_path` to be set — resolving a build from `version`
/// (downloading it if necessary) is the out-of-scope collaborator
/// responsibility this trait exists to abstract over.
pub struct ProcessEditorLauncher;

impl ProcessEditorLauncher {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ProcessEditorLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EditorLauncher for ProcessEditorLauncher {
    async fn launch(&self, request: LaunchRequest) -> Result<LaunchHandle, PoolError> {
        let Some(executable) = request.config.editor_executable_path.clone() else {
            return Err(PoolError::ChildLaunchFailed(
                "editor_executable_path is required by ProcessEditorLauncher".into(),
            ));
        };
        spawn(&executable, &request)
    }
}

fn spawn(executable: &Path, request: &LaunchRequest) -> Result<LaunchHandle, PoolError> {
    let mut command = tokio::process::Command::new(executable);
    command
        .args(request.config.effective_launch_args())
        .env("CHILD_TRANSPORT_ADDR", &request.transport_addr)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());
    if request.debug {
        command.env("POOL_DEBUG", "1");
    }

    let mut child = command
        .spawn()
        .map_err(|e| PoolError::ChildLaunchFailed(format!("failed to spawn {}: {e}", executable.display())))?;

    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => tracing::info!(%status, "editor child exited"),
            Err(e) => tracing::error!(error = %e, "failed to wait on editor child"),
        }
        let _ = tx.send(());
    });

    Ok(LaunchHandle { exited: rx })
}
