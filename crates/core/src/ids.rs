// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker and request identifiers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a worker instance, monotonically increasing per pool
/// instance and starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

impl WorkerId {
    /// The first id a [`WorkerIdGen`] ever hands out.
    pub const FIRST: WorkerId = WorkerId(1);

    /// Wrap a raw id. Only meant for deserializing ids that were generated
    /// elsewhere (e.g. received over the wire); prefer [`WorkerIdGen::next`]
    /// when minting fresh ids.
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic, increment-only generator for [`WorkerId`]s.
///
/// One generator per pool instance; the counter is the only state shared
/// across Workers (see the concurrency model: "no shared mutable state
/// between Workers other than the encapsulating pool's counter").
#[derive(Debug, Default)]
pub struct WorkerIdGen {
    next: AtomicU64,
}

impl WorkerIdGen {
    pub const fn new() -> Self {
        Self { next: AtomicU64::new(1) }
    }

    /// Allocate the next id, starting at 1.
    pub fn next(&self) -> WorkerId {
        WorkerId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Non-empty identifier for an in-flight control request.
///
/// Unique per sender per session; generated with `nanoid` the same way the
/// rest of the stack mints short opaque ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RequestId(String);

impl RequestId {
    /// Mint a fresh, non-empty request id.
    pub fn generate() -> Self {
        Self(nanoid::nanoid!(21))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse an id received over the wire, rejecting the empty string per
    /// the protocol invariant ("id: non-empty string").
    pub fn parse(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            None
        } else {
            Some(Self(raw))
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<RequestId> for String {
    fn from(id: RequestId) -> Self {
        id.0
    }
}
