// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External collaborator contract: the in-editor test-runner's internals
//! ("runBaseTests", "init"). Out of scope for this crate — the runtime only
//! ever invokes this opaque capability; this crate ships only the
//! in-process [`FakeWorkerHost`] test double.

use async_trait::async_trait;
use ehp_core::AsyncScopedHandle;
use ehp_wire::SerializedSession;

use crate::bridge::WorkerBridge;

/// One-time environment bootstrap result: releasing it runs the host's
/// teardown thunk, at most once.
pub type SetupHandle = AsyncScopedHandle<()>;

#[async_trait]
pub trait WorkerHost: Send + Sync {
    /// One-time environment bootstrap, run lazily before the first `Run` or
    /// `Collect` is dispatched. `bridge` is the runtime's own
    /// post/on/off/serialize/deserialize capability, handed to the host so
    /// it can drive its own RPC traffic over the same socket. `ctx` is the
    /// session that triggered the bootstrap.
    async fn setup(&self, bridge: WorkerBridge, ctx: SerializedSession) -> Result<SetupHandle, String>;

    /// `bridge` is the same worker capability reference handed to `setup`,
    /// attached again here so a host that only keeps bridges scoped to a
    /// single call can still post RPC traffic while running.
    async fn run_tests(&self, bridge: WorkerBridge, ctx: SerializedSession) -> Result<(), String>;

    async fn collect_tests(&self, bridge: WorkerBridge, ctx: SerializedSession) -> Result<(), String>;
}

/// In-process test double recording what it was asked to do.
#[derive(Default)]
pub struct FakeWorkerHost {
    pub fail_run: parking_lot::Mutex<Option<String>>,
    pub fail_collect: parking_lot::Mutex<Option<String>>,
    pub runs: parking_lot::Mutex<Vec<SerializedSession>>,
    pub collects: parking_lot::Mutex<Vec<SerializedSession>>,
}

impl FakeWorkerHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_run(self, message: impl Into<String>) -> Self {
        *self.fail_run.lock() = Some(message.into());
        self
    }

    pub fn failing_collect(self, message: impl Into<String>) -> Self {
        *self.fail_collect.lock() = Some(message.into());
        self
    }
}

#[async_trait]
impl WorkerHost for FakeWorkerHost {
    async fn setup(&self, _bridge: WorkerBridge, _ctx: SerializedSession) -> Result<SetupHandle, String> {
        Ok(AsyncScopedHandle::new((), |_| async {}))
    }

    async fn run_tests(&self, _bridge: WorkerBridge, ctx: SerializedSession) -> Result<(), String> {
        self.runs.lock().push(ctx);
        match self.fail_run.lock().clone() {
            Some(message) => Err(message),
            None => Ok(()),
        }
    }

    async fn collect_tests(&self, _bridge: WorkerBridge, ctx: SerializedSession) -> Result<(), String> {
        self.collects.lock().push(ctx);
        match self.fail_collect.lock().clone() {
            Some(message) => Err(message),
            None => Ok(()),
        }
    }
}
