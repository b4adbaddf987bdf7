//! Gateway wire frames — JSON-RPC style over a full-duplex transport
//!
//! Three frame shapes share the wire:
//!
//! Request:  { "type": "req",   "id": "r1", "method": "chat.send", "params": {...} }
//! Response: { "type": "res",   "id": "r1", "ok": true, "payload": {...} }
//!           { "type": "res",   "id": "r1", "ok": false, "error": { "code": "...", "message": "..." } }
//! Event:    { "type": "event", "event": "chat", "payload": {...}, "seq": 42 }
//!
//! Frames with an unrecognized `type` decode to [`Frame::Unknown`] and are
//! dropped by consumers, so newer gateways can add frame kinds without
//! breaking older clients.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// RPC error detail carried in a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorBody {
    pub code: String,
    pub message: String,
}

/// A single frame on the gateway transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    Req {
        id: String,
        method: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        params: Option<Value>,
    },
    Res {
        id: String,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<RpcErrorBody>,
    },
    Event {
        event: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seq: Option<u64>,
    },
    #[serde(other)]
    Unknown,
}

impl Frame {
    /// Request frame with a caller-chosen correlation id.
    pub fn req(id: impl Into<String>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self::Req {
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    /// Successful response frame.
    pub fn res_ok(id: impl Into<String>, payload: Option<Value>) -> Self {
        Self::Res {
            id: id.into(),
            ok: true,
            payload,
            error: None,
        }
    }

    /// Error response frame.
    pub fn res_err(id: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Res {
            id: id.into(),
            ok: false,
            payload: None,
            error: Some(RpcErrorBody {
                code: code.into(),
                message: message.into(),
            }),
        }
    }

    /// Event frame.
    pub fn event(event: impl Into<String>, payload: Option<Value>) -> Self {
        Self::Event {
            event: event.into(),
            payload,
            seq: None,
        }
    }
}

/// Serialize a frame to its wire form.
pub fn encode(frame: &Frame) -> Result<String> {
    Ok(serde_json::to_string(frame)?)
}

/// Parse a wire frame. Malformed JSON is a protocol error; a well-formed
/// frame with an unknown `type` decodes to [`Frame::Unknown`].
pub fn decode(text: &str) -> Result<Frame> {
    serde_json::from_str(text).map_err(|e| Error::Protocol(format!("bad frame: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trip_request() {
        let frame = Frame::req("r1", "chat.send", Some(json!({ "message": "hi" })));
        let decoded = decode(&encode(&frame).unwrap()).unwrap();
        assert_eq!(frame, decoded);
    }

    #[test]
    fn round_trip_response_ok() {
        let frame = Frame::res_ok("r2", Some(json!({ "runId": "run-1" })));
        let decoded = decode(&encode(&frame).unwrap()).unwrap();
        assert_eq!(frame, decoded);
    }

    #[test]
    fn round_trip_response_error() {
        let frame = Frame::res_err("r3", "NOT_FOUND", "no such session");
        let decoded = decode(&encode(&frame).unwrap()).unwrap();
        assert_eq!(frame, decoded);
    }

    #[test]
    fn round_trip_event_with_seq() {
        let frame = Frame::Event {
            event: "chat".into(),
            payload: Some(json!({ "state": "delta" })),
            seq: Some(7),
        };
        let decoded = decode(&encode(&frame).unwrap()).unwrap();
        assert_eq!(frame, decoded);
    }

    #[test]
    fn params_omitted_when_absent() {
        let wire = encode(&Frame::req("r1", "agents.list", None)).unwrap();
        assert!(!wire.contains("params"));
    }

    #[test]
    fn unknown_frame_type_tolerated() {
        let frame = decode(r#"{"type":"telemetry","blob":42}"#).unwrap();
        assert_eq!(frame, Frame::Unknown);
    }

    #[test]
    fn malformed_json_is_protocol_error() {
        assert!(matches!(decode("{nope"), Err(Error::Protocol(_))));
    }
}
