// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use ehp_wire::ControlAction;
use thiserror::Error;

/// Failures from the pool-side controller.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to bind loopback transport: {0}")]
    TransportBindFailed(#[source] std::io::Error),

    #[error("editor launcher rejected the launch request: {0}")]
    ChildLaunchFailed(String),

    #[error("handshake did not complete before the worker connected: {0}")]
    HandshakeFailed(String),

    #[error("send() called before the worker finished its ready handshake")]
    NotReady,

    #[error("control request timed out waiting for a response to {action:?}")]
    ControlRequestTimeout { action: ControlAction },

    #[error("worker socket disconnected with requests still pending")]
    WorkerDisconnected,

    #[error("worker was stopped while a request was still pending")]
    WorkerStopped,

    #[error("codec error: {0}")]
    Codec(#[from] ehp_wire::CodecError),

    #[error("stop() encountered {} error(s) while tearing down", .0.len())]
    Stop(Vec<PoolError>),
}

impl PoolError {
    /// Fold a list of fallible teardown steps into a single aggregate error,
    /// `Ok(())` if every step succeeded.
    pub fn aggregate(errors: Vec<PoolError>) -> Result<(), PoolError> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PoolError::Stop(errors))
        }
    }
}
