// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure, side-effect-free framing: one envelope per text frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graph::Graph;
use crate::{Channel, CodecError};

/// The unit carried on the wire: a channel tag plus an opaque, possibly
/// cyclic payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub channel: Channel,
    pub payload: Graph,
}

impl Envelope {
    pub fn new(channel: Channel, payload: Value) -> Self {
        Self { channel, payload: Graph::from_json(payload) }
    }

    /// Build an envelope directly from an already-flattened graph, for
    /// payloads that genuinely contain cycles (task-update traffic).
    pub fn from_graph(channel: Channel, payload: Graph) -> Self {
        Self { channel, payload }
    }

    /// Structural guard: does this look like a `ControlRequest` (has `id`
    /// and `action`)? Does not check the channel tag — callers that care
    /// check `channel == Channel::Control` themselves.
    pub fn is_control_request(&self) -> bool {
        self.payload.object_has_keys(&["id", "action"])
    }

    /// Structural guard: does this look like a `ControlResponse` (has `id`
    /// and `success`)?
    pub fn is_control_response(&self) -> bool {
        self.payload.object_has_keys(&["id", "success"])
    }
}

/// The shapes [`decode`] accepts: a complete string, a whole byte buffer, a
/// byte-buffer slice/view, or an ordered sequence of any of the above
/// concatenated in order.
pub enum DecodeInput {
    Text(String),
    Bytes(Vec<u8>),
    Chunks(Vec<DecodeInput>),
}

impl DecodeInput {
    /// Flatten into the bytes the chunks concatenate to.
    fn into_bytes(self) -> Vec<u8> {
        match self {
            DecodeInput::Text(s) => s.into_bytes(),
            DecodeInput::Bytes(b) => b,
            DecodeInput::Chunks(chunks) => {
                chunks.into_iter().flat_map(DecodeInput::into_bytes).collect()
            }
        }
    }
}

impl From<String> for DecodeInput {
    fn from(value: String) -> Self {
        DecodeInput::Text(value)
    }
}

impl From<&str> for DecodeInput {
    fn from(value: &str) -> Self {
        DecodeInput::Text(value.to_owned())
    }
}

impl From<Vec<u8>> for DecodeInput {
    fn from(value: Vec<u8>) -> Self {
        DecodeInput::Bytes(value)
    }
}

impl From<&[u8]> for DecodeInput {
    fn from(value: &[u8]) -> Self {
        DecodeInput::Bytes(value.to_vec())
    }
}

impl From<Vec<DecodeInput>> for DecodeInput {
    fn from(value: Vec<DecodeInput>) -> Self {
        DecodeInput::Chunks(value)
    }
}

/// Serialize `(channel, payload)` into a single text frame. The payload's
/// flat-tree representation is what survives cycles; `encode`/`decode`
/// round-trip it byte for byte given identical input, since `serde_json`'s
/// map serialization here is over an ordered `Vec<(String, usize)>` rather
/// than a `HashMap`.
pub fn encode(channel: Channel, payload: Graph) -> Result<String, CodecError> {
    let envelope = Envelope::from_graph(channel, payload);
    serde_json::to_string(&envelope).map_err(|_| CodecError::InvalidEnvelope)
}

/// Parse a frame out of any of the four input shapes the transport may
/// hand us (string, buffer, buffer slice, or a concatenated sequence).
pub fn decode(raw: impl Into<DecodeInput>) -> Result<Envelope, CodecError> {
    let bytes = raw.into().into_bytes();
    let text = std::str::from_utf8(&bytes).map_err(|_| CodecError::InvalidEnvelope)?;
    let value: Value = serde_json::from_str(text).map_err(|_| CodecError::InvalidEnvelope)?;

    let Value::Object(mut map) = value else {
        return Err(CodecError::InvalidEnvelope);
    };
    let channel_value = map.remove("channel").ok_or(CodecError::InvalidEnvelope)?;
    let payload_value = map.remove("payload").ok_or(CodecError::InvalidEnvelope)?;

    let channel: Channel = match channel_value {
        Value::String(ref s) => serde_json::from_value(Value::String(s.clone()))
            .map_err(|_| CodecError::UnknownChannel(s.clone()))?,
        other => return Err(CodecError::UnknownChannel(other.to_string())),
    };

    // `payload` may already be flattened (a `{nodes, root}` graph produced
    // by `encode`) or a bare JSON value (e.g. a hand-built test fixture);
    // accept both so `decode` is tolerant of either shape on the wire.
    let graph = match serde_json::from_value::<Graph>(payload_value.clone()) {
        Ok(graph) => graph,
        Err(_) => Graph::from_json(payload_value),
    };

    Ok(Envelope { channel, payload: graph })
}
