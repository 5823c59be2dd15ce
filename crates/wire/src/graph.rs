// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Flat/indexed tree representation for envelope payloads.
//!
//! `payload` is opaque on the wire and may carry cycles (task-update traffic
//! includes back-referencing task graphs). JSON itself cannot express a
//! cycle, so rather than serializing a `serde_json::Value` tree directly we
//! serialize a node table plus a root index: back-references become plain
//! integers into the same table, and two nodes that pointed at the same
//! object upstream point at the same table index here, which is exactly
//! what "preserve object identity within one message" requires.
//!
//! Concrete control-channel payloads (`ControlRequest`/`ControlResponse`/
//! `SerializedSession`) are never cyclic; for them `Graph::from_json` /
//! `Graph::to_json` give a cheap bridge to/from `serde_json::Value`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::CodecError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Null,
    Bool { value: bool },
    Number { value: Number },
    String { value: String },
    /// Indices of the array's elements in the owning [`Graph`]'s node table.
    Array { items: Vec<usize> },
    /// Key/value pairs where the value is an index into the node table.
    Object { entries: Vec<(String, usize)> },
}

/// A flat, index-addressed value tree. Able to represent cycles (an entry
/// may point at an ancestor's index) even though `serde_json::Value` cannot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub root: usize,
}

impl Graph {
    /// Build a single-node graph.
    pub fn leaf(node: Node) -> Self {
        Self { nodes: vec![node], root: 0 }
    }

    /// Append a node, returning its index. The building block for
    /// constructing graphs with genuine cycles: push a placeholder, record
    /// its index, push the nodes that should reference it, then patch the
    /// placeholder via [`Graph::set_node`].
    pub fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn set_node(&mut self, index: usize, node: Node) {
        self.nodes[index] = node;
    }

    /// Lift an acyclic JSON value into a flat graph.
    pub fn from_json(value: Value) -> Self {
        let mut nodes = Vec::new();
        let root = push_json(&mut nodes, value);
        Self { nodes, root }
    }

    /// Lower the graph back into a JSON value. Fails with
    /// [`CodecError::CyclicPayload`] if the graph actually contains a cycle
    /// reachable from the root — callers that only ever build payloads via
    /// `from_json` (every control-channel type in this crate) never hit
    /// this; it exists so a genuinely cyclic RPC payload fails loudly
    /// instead of silently looping.
    pub fn to_json(&self) -> Result<Value, CodecError> {
        let mut visiting = vec![false; self.nodes.len()];
        node_to_json(&self.nodes, self.root, &mut visiting)
    }

    /// Structural guard: does the root node look like an object carrying
    /// every one of `keys`?
    pub fn object_has_keys(&self, keys: &[&str]) -> bool {
        let Some(Node::Object { entries }) = self.nodes.get(self.root) else {
            return false;
        };
        keys.iter().all(|k| entries.iter().any(|(key, _)| key == k))
    }
}

fn push_json(nodes: &mut Vec<Node>, value: Value) -> usize {
    match value {
        Value::Null => push_leaf(nodes, Node::Null),
        Value::Bool(value) => push_leaf(nodes, Node::Bool { value }),
        Value::Number(value) => push_leaf(nodes, Node::Number { value }),
        Value::String(value) => push_leaf(nodes, Node::String { value }),
        Value::Array(items) => {
            let indices = items.into_iter().map(|v| push_json(nodes, v)).collect();
            push_leaf(nodes, Node::Array { items: indices })
        }
        Value::Object(map) => {
            let entries = map.into_iter().map(|(k, v)| (k, push_json(nodes, v))).collect();
            push_leaf(nodes, Node::Object { entries })
        }
    }
}

fn push_leaf(nodes: &mut Vec<Node>, node: Node) -> usize {
    nodes.push(node);
    nodes.len() - 1
}

fn node_to_json(nodes: &[Node], index: usize, visiting: &mut [bool]) -> Result<Value, CodecError> {
    let Some(node) = nodes.get(index) else {
        return Err(CodecError::InvalidEnvelope);
    };
    if visiting[index] {
        return Err(CodecError::CyclicPayload);
    }
    visiting[index] = true;
    let result = match node {
        Node::Null => Ok(Value::Null),
        Node::Bool { value } => Ok(Value::Bool(*value)),
        Node::Number { value } => Ok(Value::Number(value.clone())),
        Node::String { value } => Ok(Value::String(value.clone())),
        Node::Array { items } => {
            let mut out = Vec::with_capacity(items.len());
            for &i in items {
                out.push(node_to_json(nodes, i, visiting)?);
            }
            Ok(Value::Array(out))
        }
        Node::Object { entries } => {
            let mut map = Map::with_capacity(entries.len());
            for (key, i) in entries {
                map.insert(key.clone(), node_to_json(nodes, *i, visiting)?);
            }
            Ok(Value::Object(map))
        }
    };
    visiting[index] = false;
    result
}
