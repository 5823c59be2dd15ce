// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Failures from the envelope codec. Pure data-shape errors: nothing here
/// carries an I/O cause, since the codec itself never touches a socket.
#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    #[error("envelope is not a recognized string, byte buffer, or concatenation of either")]
    InvalidEnvelope,
    #[error("unknown channel {0:?}")]
    UnknownChannel(String),
    #[error("payload graph contains a cycle reachable from its root")]
    CyclicPayload,
}
