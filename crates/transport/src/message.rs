//! Debugger protocol envelopes.
//!
//! Inbound traffic from the debuggee is split into protocol responses and
//! events, and the REPL-style `execute`/`output` packets emitted by the
//! listener script that hosts the user program. Anything else decodes to
//! [`Message::Unknown`] and is ignored by the dispatcher. A well-framed body
//! that does not fit its envelope decodes to [`Message::Malformed`] so one
//! bad packet does not end the stream.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sequence number type for request-response correlation.
pub type Seq = i64;

/// An incoming message from the debuggee.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    Response(Response),
    Event(Event),
    /// Only seen by test debuggees reading client traffic.
    Request(Request),
    Execute(Execute),
    Output(Output),
    OutputError(Output),
    /// Produced by the codec, never deserialized.
    #[serde(skip)]
    Malformed(Malformed),
    #[serde(other)]
    Unknown,
}

impl Message {
    /// Interpret a decoded JSON body.
    pub fn from_value(value: Value) -> Message {
        let request_seq = response_seq(&value);
        serde_json::from_value(value).unwrap_or_else(|e| {
            Message::Malformed(Malformed {
                request_seq,
                error: e.to_string(),
            })
        })
    }
}

/// A packet whose body could not be read as its envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Malformed {
    /// The request this packet answers, if it looks like a response.
    pub request_seq: Option<Seq>,
    pub error: String,
}

fn response_seq(value: &Value) -> Option<Seq> {
    if value.get("type").and_then(Value::as_str) != Some("response") {
        return None;
    }
    value
        .get("request_seq")
        .and_then(Value::as_i64)
        .or_else(|| value.get("seq").and_then(Value::as_i64))
}

/// A response to a request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub seq: Seq,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_seq: Option<Seq>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub success: bool,
    /// Whether the debuggee is running after handling the request.
    #[serde(default)]
    pub running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Value mirrors referenced from `body` by handle.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refs: Vec<Value>,
}

impl Response {
    /// The sequence number of the request this response answers.
    ///
    /// Older agents echo the request's number in `seq` rather than
    /// `request_seq`.
    pub fn correlation_seq(&self) -> Seq {
        self.request_seq.unwrap_or(self.seq)
    }
}

/// An unsolicited event such as `break`, `exception` or `afterCompile`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub seq: Seq,
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// A protocol request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub seq: Seq,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Map<String, Value>>,
}

/// A REPL-style execution packet.
///
/// Sent by the client with `code`; answered by the listener with either
/// `result` or `error`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Execute {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl Execute {
    pub fn code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Default::default()
        }
    }

    /// `Ok` with the result value, `Err` with the error value, or `None` if
    /// the packet carries neither.
    pub fn outcome(&self) -> Option<Result<Value, Value>> {
        match (&self.result, &self.error) {
            (Some(result), _) => Some(Ok(result.clone())),
            (None, Some(error)) => Some(Err(error.clone())),
            (None, None) => None,
        }
    }
}

/// Text written by the debuggee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    #[serde(default)]
    pub output: String,
}

/// An outgoing message.
///
/// Clients send `Request` and `Execute`; the remaining variants are written
/// by test debuggees.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutgoingMessage {
    Request(Request),
    Execute(Execute),
    Response(Response),
    Event(Event),
    Output(Output),
    OutputError(Output),
}
