//! Minimal wire types for the WebDriver-BiDi protocol.
//!
//! This crate intentionally knows nothing about Chromium, sessions, or the
//! broker's dispatch logic. It only describes the three shapes that cross a
//! BiDi WebSocket: a command sent by us, a response keyed by id, and an
//! event with no id at all.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier for a BiDi command.
///
/// Client-issued ids are restricted to `< CLIENT_ID_CEILING`; internal ids
/// (issued by the broker on a client's behalf) start at `CLIENT_ID_CEILING`
/// and count up. Keeping the two ranges disjoint lets the reader decide,
/// from the id alone, whether a response belongs to the client or to an
/// in-flight internal command.
pub const CLIENT_ID_CEILING: u64 = 1_000_000;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(u64);

impl CallId {
    pub fn new(id: u64) -> Self {
        CallId(id)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    pub fn is_internal(self) -> bool {
        self.0 >= CLIENT_ID_CEILING
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A command frame, ready to be serialized onto the wire.
///
/// `{"id": <n>, "method": "<ns>:<name>", "params": {...}}`
#[derive(Debug, Clone, Serialize)]
pub struct BidiCommand {
    pub id: CallId,
    pub method: Cow<'static, str>,
    pub params: Value,
}

impl BidiCommand {
    pub fn new(id: CallId, method: impl Into<Cow<'static, str>>, params: Value) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

impl From<u64> for CallId {
    fn from(id: u64) -> Self {
        CallId(id)
    }
}

/// The outcome of a command, as reported by the browser.
#[derive(Debug, Clone, PartialEq)]
pub enum BidiOutcome {
    Success(Value),
    Error { error: String, message: String },
}

/// A response frame keyed by [`CallId`].
///
/// `{"id": <n>, "type": "success", "result": ...}` or
/// `{"id": <n>, "type": "error", "error": "...", "message": "..."}`
#[derive(Debug, Clone, PartialEq)]
pub struct BidiResponse {
    pub id: CallId,
    pub outcome: BidiOutcome,
}

/// A browser-originated event frame. Carries no id.
///
/// `{"method": "...", "params": {...}}`
#[derive(Debug, Clone, Deserialize)]
pub struct BidiEvent {
    pub method: Cow<'static, str>,
    pub params: Value,
}

/// Either a response to a command or an unsolicited event.
#[derive(Debug, Clone)]
pub enum Message {
    Response(BidiResponse),
    Event(BidiEvent),
}

/// Error parsing a raw frame into a [`Message`].
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("malformed BiDi frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("response frame missing 'type' field")]
    MissingType,
    #[error("error response missing 'error' or 'message' field")]
    MissingErrorFields,
}

impl Message {
    /// Parses one line-delimited JSON frame.
    ///
    /// Dispatch is by presence of the top-level `id` field: a frame with an
    /// id is a response to a command, anything else is an event. This
    /// mirrors how the reader task tells internal-command replies apart
    /// from forwarded browser events without needing a schema registry.
    pub fn parse(raw: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, FrameError> {
        if let Some(id) = value.get("id").and_then(Value::as_u64) {
            let ty = value.get("type").and_then(Value::as_str).ok_or(FrameError::MissingType)?;
            let outcome = match ty {
                "success" => BidiOutcome::Success(value.get("result").cloned().unwrap_or(Value::Null)),
                "error" => {
                    let error = value
                        .get("error")
                        .and_then(Value::as_str)
                        .ok_or(FrameError::MissingErrorFields)?
                        .to_string();
                    let message = value
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    BidiOutcome::Error { error, message }
                }
                other => BidiOutcome::Error {
                    error: "unknown".to_string(),
                    message: format!("unrecognized response type {other:?}"),
                },
            };
            Ok(Message::Response(BidiResponse {
                id: CallId::new(id),
                outcome,
            }))
        } else {
            let event: BidiEvent = serde_json::from_value(value)?;
            Ok(Message::Event(event))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_success_response() {
        let msg = Message::parse(r#"{"id":5,"type":"success","result":{"ok":true}}"#).unwrap();
        match msg {
            Message::Response(r) => {
                assert_eq!(r.id, CallId::new(5));
                assert_eq!(r.outcome, BidiOutcome::Success(serde_json::json!({"ok": true})));
            }
            _ => panic!("expected response"),
        }
    }

    #[test]
    fn parses_error_response() {
        let msg = Message::parse(
            r#"{"id":7,"type":"error","error":"no such element","message":"not found"}"#,
        )
        .unwrap();
        match msg {
            Message::Response(r) => {
                assert_eq!(
                    r.outcome,
                    BidiOutcome::Error {
                        error: "no such element".into(),
                        message: "not found".into()
                    }
                );
            }
            _ => panic!("expected response"),
        }
    }

    #[test]
    fn parses_event_without_id() {
        let msg = Message::parse(r#"{"method":"log.entryAdded","params":{"level":"info"}}"#).unwrap();
        match msg {
            Message::Event(ev) => assert_eq!(ev.method, "log.entryAdded"),
            _ => panic!("expected event"),
        }
    }

    #[test]
    fn call_id_internal_threshold() {
        assert!(!CallId::new(999_999).is_internal());
        assert!(CallId::new(1_000_000).is_internal());
    }
}
