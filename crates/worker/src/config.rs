// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

const READY_ACK_TIMEOUT_MAX: Duration = Duration::from_secs(5);

/// Worker-side runtime configuration. Production code builds this with
/// [`WorkerRuntimeConfig::from_env`]; tests override `endpoint` directly so
/// they don't have to mutate process-global environment state.
#[derive(Debug, Clone)]
pub struct WorkerRuntimeConfig {
    pub endpoint: Option<String>,
    pub ready_ack_timeout: Duration,
    pub debug: bool,
}

impl Default for WorkerRuntimeConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            ready_ack_timeout: READY_ACK_TIMEOUT_MAX,
            debug: false,
        }
    }
}

impl WorkerRuntimeConfig {
    /// Read `CHILD_TRANSPORT_ADDR` (and `POOL_DEBUG`) from the process
    /// environment, the path the real editor-hosted entry point uses.
    pub fn from_env() -> Self {
        let endpoint = std::env::var("CHILD_TRANSPORT_ADDR")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let debug = std::env::var("POOL_DEBUG").as_deref() == Ok("1");
        Self { endpoint, debug, ..Self::default() }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Clamp to the protocol's hard ceiling of 5 seconds.
    pub fn clamped_ready_ack_timeout(&self) -> Duration {
        self.ready_ack_timeout.min(READY_ACK_TIMEOUT_MAX)
    }

    ehp_core::setters! {
        set {
            ready_ack_timeout: Duration,
            debug: bool,
        }
    }
}
