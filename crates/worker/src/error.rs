// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Failures from the worker-side runtime.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("CHILD_TRANSPORT_ADDR is absent or blank")]
    MissingEndpoint,

    #[error("failed to connect to the pool transport: {0}")]
    ConnectFailed(String),

    #[error("no ready_ack received within the bound")]
    ReadyAckTimeout,

    #[error("pool socket disconnected before shutdown was requested")]
    PoolDisconnected,

    #[error("could not resolve this runtime's own module/executable path")]
    WorkerModuleUnresolvable,

    #[error("host capability failed: {0}")]
    Host(String),

    #[error("codec error: {0}")]
    Codec(#[from] ehp_wire::CodecError),
}
