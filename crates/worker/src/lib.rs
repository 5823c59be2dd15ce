// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-side runtime: the single entry point the editor invokes once
//! inside the Extension Host process, plus the bridge capability handed to
//! the injected [`WorkerHost`].

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod bridge;
mod config;
mod error;
mod host;
mod runtime;

pub use bridge::WorkerBridge;
pub use config::WorkerRuntimeConfig;
pub use error::WorkerError;
pub use host::{FakeWorkerHost, SetupHandle, WorkerHost};
pub use runtime::run;
