// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ehp-core: shared identifiers and scoped-resource primitives for the
//! extension-host test pool coordination engine.

pub mod macros;

pub mod ids;
pub mod scope;
pub mod stream_adapter;

pub use ids::{RequestId, WorkerId};
pub use scope::{AsyncDisposableStack, AsyncScopedHandle, DisposableStack, ScopedHandle};
pub use stream_adapter::{EventStream, OnceEvent, StreamAdapterError, DEFAULT_RING_CAPACITY};
