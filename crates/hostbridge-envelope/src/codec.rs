use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

use crate::error::{EnvelopeError, Result};
use crate::message::{InboundRequest, MessageResponse};

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Configuration for the envelope codec.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Maximum encoded payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// Classified inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Carries a `func`: host-initiated action or child request.
    Request(InboundRequest),
    /// Carries a numeric `id`.
    Response(MessageResponse),
    /// An object matching neither shape.
    Unknown,
}

/// Classify a value posted by the parent.
///
/// A numeric `id` marks a response even when a `func` is present. Only
/// id-less messages with a `func` are host-initiated actions.
pub fn classify(value: &Value) -> Result<Inbound> {
    let object = value.as_object().ok_or(EnvelopeError::NotAnObject)?;

    if object.get("id").is_some_and(Value::is_u64) {
        return as_response(value);
    }
    if object.get("func").is_some_and(Value::is_string) {
        return as_request(value);
    }
    Ok(Inbound::Unknown)
}

/// Classify a value posted by a child window.
///
/// Children only send requests, so a `func` string takes precedence over
/// the `id` every child request carries.
pub fn classify_from_child(value: &Value) -> Result<Inbound> {
    let object = value.as_object().ok_or(EnvelopeError::NotAnObject)?;

    if object.get("func").is_some_and(Value::is_string) {
        return as_request(value);
    }
    if object.get("id").is_some_and(Value::is_u64) {
        return as_response(value);
    }
    Ok(Inbound::Unknown)
}

fn as_request(value: &Value) -> Result<Inbound> {
    serde_json::from_value(value.clone())
        .map(Inbound::Request)
        .map_err(|source| EnvelopeError::Malformed {
            kind: "request",
            source,
        })
}

fn as_response(value: &Value) -> Result<Inbound> {
    serde_json::from_value(value.clone())
        .map(Inbound::Response)
        .map_err(|source| EnvelopeError::Malformed {
            kind: "response",
            source,
        })
}

/// Encode a message to JSON bytes.
pub fn encode<T: Serialize>(message: &T, config: &CodecConfig) -> Result<Bytes> {
    let payload = serde_json::to_vec(message)?;
    if payload.len() > config.max_payload_size {
        return Err(EnvelopeError::PayloadTooLarge {
            size: payload.len(),
            max: config.max_payload_size,
        });
    }
    Ok(Bytes::from(payload))
}

/// Decode and classify JSON bytes received from a native bridge.
///
/// The native bridge is the parent, so parent ordering applies.
pub fn decode_inbound(payload: &[u8], config: &CodecConfig) -> Result<Inbound> {
    if payload.len() > config.max_payload_size {
        return Err(EnvelopeError::PayloadTooLarge {
            size: payload.len(),
            max: config.max_payload_size,
        });
    }
    let value: Value = serde_json::from_slice(payload)?;
    classify(&value)
}
