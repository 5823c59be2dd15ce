// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed lifecycle messages carried on the control channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope::Envelope;
use crate::graph::Graph;
use crate::session::SerializedSession;
use crate::{Channel, CodecError};

/// The five lifecycle actions a `ControlRequest` can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    Ready,
    ReadyAck,
    Run,
    Collect,
    Shutdown,
}

impl ControlAction {
    /// `Run`/`Collect` require `ctx`; every other action forbids it.
    pub fn requires_context(self) -> bool {
        matches!(self, ControlAction::Run | ControlAction::Collect)
    }
}

/// A lifecycle request on the control channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlRequest {
    pub id: String,
    pub action: ControlAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctx: Option<SerializedSession>,
}

impl ControlRequest {
    pub fn new(id: impl Into<String>, action: ControlAction) -> Self {
        Self { id: id.into(), action, ctx: None }
    }

    pub fn with_context(mut self, ctx: SerializedSession) -> Self {
        self.ctx = Some(ctx);
        self
    }

    /// Enforce "`ctx` required for `Run`/`Collect`, forbidden otherwise".
    pub fn validate(&self) -> Result<(), CodecError> {
        if self.id.is_empty() {
            return Err(CodecError::InvalidEnvelope);
        }
        match (self.action.requires_context(), &self.ctx) {
            (true, Some(_)) | (false, None) => Ok(()),
            _ => Err(CodecError::InvalidEnvelope),
        }
    }

    pub fn into_envelope(self) -> Result<Envelope, CodecError> {
        self.validate()?;
        let value = serde_json::to_value(&self).map_err(|_| CodecError::InvalidEnvelope)?;
        Ok(Envelope::from_graph(Channel::Control, Graph::from_json(value)))
    }

    pub fn from_envelope(envelope: &Envelope) -> Result<Self, CodecError> {
        decode_control_payload(envelope)
    }
}

/// A lifecycle response on the control channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlResponse {
    pub id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlResponse {
    pub fn ok(id: impl Into<String>) -> Self {
        Self { id: id.into(), success: true, error: None }
    }

    pub fn failed(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self { id: id.into(), success: false, error: Some(error.into()) }
    }

    pub fn validate(&self) -> Result<(), CodecError> {
        if self.id.is_empty() {
            return Err(CodecError::InvalidEnvelope);
        }
        if !self.success && self.error.is_none() {
            return Err(CodecError::InvalidEnvelope);
        }
        Ok(())
    }

    pub fn into_envelope(self) -> Result<Envelope, CodecError> {
        self.validate()?;
        let value = serde_json::to_value(&self).map_err(|_| CodecError::InvalidEnvelope)?;
        Ok(Envelope::from_graph(Channel::Control, Graph::from_json(value)))
    }

    pub fn from_envelope(envelope: &Envelope) -> Result<Self, CodecError> {
        decode_control_payload(envelope)
    }
}

fn decode_control_payload<T: for<'de> Deserialize<'de>>(
    envelope: &Envelope,
) -> Result<T, CodecError> {
    let value: Value = envelope.payload.to_json()?;
    serde_json::from_value(value).map_err(|_| CodecError::InvalidEnvelope)
}
