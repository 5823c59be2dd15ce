// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Envelope codec: framing, the cycle-tolerant payload graph, and the
//! typed control-channel messages carried on top of it.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod channel;
mod control;
mod envelope;
mod errors;
mod graph;
mod session;

pub use channel::Channel;
pub use control::{ControlAction, ControlRequest, ControlResponse};
pub use envelope::{decode, encode, DecodeInput, Envelope};
pub use errors::CodecError;
pub use graph::{Graph, Node};
pub use session::{Environment, SerializedSession, SpecFile, POOL_NAME};
