// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Which editor build to launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorVersion {
    Stable,
    Insiders,
    Tag(String),
}

impl Default for EditorVersion {
    fn default() -> Self {
        Self::Stable
    }
}

impl From<&str> for EditorVersion {
    fn from(value: &str) -> Self {
        match value {
            "stable" => Self::Stable,
            "insiders" => Self::Insiders,
            other => Self::Tag(other.to_owned()),
        }
    }
}

const HANDSHAKE_TIMEOUT_MIN: Duration = Duration::from_secs(10);
const HANDSHAKE_TIMEOUT_MAX: Duration = Duration::from_secs(30);
const HANDSHAKE_TIMEOUT_DEFAULT: Duration = Duration::from_secs(15);

/// Pool-side configuration, covering both the external `EditorLauncher`
/// collaborator's inputs and this crate's own handshake/timeout knobs.
///
/// `editor_executable_path`, when set, takes precedence over `version` —
/// the launcher skips resolving/downloading a build entirely. `launch_args`
/// is appended *after* the default `--disable-extensions` argument the
/// launcher always passes.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub version: EditorVersion,
    pub reuse_worker: bool,
    pub editor_executable_path: Option<PathBuf>,
    pub reuse_machine_install: bool,
    pub launch_args: Vec<String>,
    pub platform: Option<String>,
    pub cache_path: Option<PathBuf>,
    /// Forwarded to the `EditorLauncher` collaborator as its own notion of
    /// "how long may the launch itself take".
    pub launch_timeout: Duration,
    /// Bounds `start()`'s handshake wait (connect + `ready`), clamped to
    /// [10s, 30s] regardless of what's requested.
    pub handshake_timeout: Duration,
    /// Per-request timeout for `send()`; defaults to 80% of `test_timeout`.
    pub control_request_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let version = std::env::var("EDITOR_VERSION")
            .ok()
            .map(|v| EditorVersion::from(v.as_str()))
            .unwrap_or_default();
        Self {
            version,
            reuse_worker: false,
            editor_executable_path: None,
            reuse_machine_install: false,
            launch_args: Vec::new(),
            platform: None,
            cache_path: None,
            launch_timeout: Duration::from_secs(60),
            handshake_timeout: HANDSHAKE_TIMEOUT_DEFAULT,
            control_request_timeout: test_timeout_default() * 4 / 5,
        }
    }
}

fn test_timeout_default() -> Duration {
    Duration::from_secs(30)
}

impl PoolConfig {
    /// The effective command-line arguments the launcher should pass: the
    /// mandatory `--disable-extensions` followed by any user-provided args.
    pub fn effective_launch_args(&self) -> Vec<String> {
        let mut args = vec!["--disable-extensions".to_owned()];
        args.extend(self.launch_args.iter().cloned());
        args
    }

    /// Clamp a requested handshake timeout into [10s, 30s].
    pub fn clamped_handshake_timeout(&self) -> Duration {
        self.handshake_timeout.clamp(HANDSHAKE_TIMEOUT_MIN, HANDSHAKE_TIMEOUT_MAX)
    }

    /// Derive a `control_request_timeout` from an outer test timeout (80%
    /// of it), the documented default relationship.
    pub fn with_test_timeout(mut self, test_timeout: Duration) -> Self {
        self.control_request_timeout = test_timeout * 4 / 5;
        self
    }

    ehp_core::setters! {
        set {
            version: EditorVersion,
            reuse_worker: bool,
            reuse_machine_install: bool,
            launch_args: Vec<String>,
            launch_timeout: Duration,
            handshake_timeout: Duration,
            control_request_timeout: Duration,
        }
        option {
            editor_executable_path: PathBuf,
            platform: String,
            cache_path: PathBuf,
        }
    }
}
