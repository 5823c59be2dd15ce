// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Everything the in-editor runtime needs to execute one `Run`/`Collect`
//! batch, attached to `ControlRequest::ctx`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Pool identifier carried on every [`SerializedSession`]; constant because
/// this crate only ever targets the one editor-hosted pool.
pub const POOL_NAME: &str = "vscode";

/// A single test file plus the line numbers (if any) a partial run was
/// scoped to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecFile {
    pub filepath: String,
    #[serde(default)]
    pub test_locations: Vec<u32>,
}

impl SpecFile {
    pub fn whole_file(filepath: impl Into<String>) -> Self {
        Self { filepath: filepath.into(), test_locations: Vec::new() }
    }
}

/// The environment a project declared, or the `"node"` default when none
/// was declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

impl Default for Environment {
    fn default() -> Self {
        Self { name: "node".to_owned(), options: None }
    }
}

/// Everything the in-editor runtime needs to execute one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedSession {
    pub pool: String,
    pub worker_id: u64,
    pub config: Value,
    pub project_name: String,
    pub files: Vec<SpecFile>,
    pub environment: Environment,
    pub provided_context: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalidates: Option<Vec<String>>,
}

impl SerializedSession {
    pub fn new(worker_id: u64, project_name: impl Into<String>, config: Value) -> Self {
        Self {
            pool: POOL_NAME.to_owned(),
            worker_id,
            config,
            project_name: project_name.into(),
            files: Vec::new(),
            environment: Environment::default(),
            provided_context: Value::Object(Default::default()),
            invalidates: None,
        }
    }

    pub fn with_files(mut self, files: Vec<SpecFile>) -> Self {
        self.files = files;
        self
    }

    pub fn with_invalidates(mut self, invalidates: Vec<String>) -> Self {
        self.invalidates = Some(invalidates);
        self
    }
}
