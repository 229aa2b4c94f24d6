//! Envelopes exchanged with the client.
//!
//! Outbound responses and events have no `seq` of their own. The
//! [`crate::Channel`] stamps one on at send time, producing a
//! [`SequencedMessage`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type Seq = i64;

/// Anything the client sent, tagged by its `type` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    Request(Request),
    /// Answer to a reverse request. The adapter never issues one.
    Response(Response),
    Event(Event),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub seq: Seq,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

impl Request {
    pub fn new(seq: Seq, command: impl Into<String>, arguments: Option<Value>) -> Self {
        Self {
            seq,
            command: command.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub seq: Seq,
    pub request_seq: Seq,
    pub success: bool,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub seq: Seq,
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingResponse {
    pub command: String,
    pub success: bool,
    pub request_seq: Seq,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// `{}` when there is nothing to report.
    pub body: Value,
}

impl OutgoingResponse {
    pub fn success(request: &Request, body: Value) -> Self {
        Self {
            command: request.command.clone(),
            success: true,
            request_seq: request.seq,
            message: None,
            body,
        }
    }

    pub fn failure(request: &Request, message: Option<String>) -> Self {
        Self {
            success: false,
            message,
            ..Self::success(request, Value::Object(Default::default()))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingEvent {
    pub event: String,
    pub body: Value,
}

impl OutgoingEvent {
    pub fn new(event: impl Into<String>, body: Value) -> Self {
        Self {
            event: event.into(),
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutgoingMessage {
    Response(OutgoingResponse),
    Event(OutgoingEvent),
}

impl OutgoingMessage {
    pub fn as_response(&self) -> Option<&OutgoingResponse> {
        match self {
            Self::Response(response) => Some(response),
            Self::Event(_) => None,
        }
    }

    pub fn as_event(&self) -> Option<&OutgoingEvent> {
        match self {
            Self::Event(event) => Some(event),
            Self::Response(_) => None,
        }
    }
}

impl From<OutgoingResponse> for OutgoingMessage {
    fn from(value: OutgoingResponse) -> Self {
        Self::Response(value)
    }
}

impl From<OutgoingEvent> for OutgoingMessage {
    fn from(value: OutgoingEvent) -> Self {
        Self::Event(value)
    }
}

/// An outbound message as it goes on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencedMessage {
    pub seq: Seq,
    #[serde(flatten)]
    pub message: OutgoingMessage,
}
