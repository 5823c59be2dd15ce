// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

/// Which of the two logical channels multiplexed onto one socket an
/// envelope belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Lifecycle request/response traffic, consumed by the pool/worker
    /// themselves.
    Control,
    /// Opaque pass-through traffic forwarded verbatim to subscribers; the
    /// outer test-runner's own RPC layer owns its shape.
    Rpc,
}
