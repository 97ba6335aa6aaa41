//! Normalized events emitted by the realtime client.
//!
//! Every inbound control-channel message, and the channel's own open/close
//! signals, is reduced to one `Occurrence`. Consumers never see the remote
//! wire vocabulary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Who produced a piece of transcript.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The remote voice agent (the tutor).
    Agent,
    /// The person at the microphone.
    Learner,
}

impl Role {
    /// Label shown next to transcript entries.
    pub fn label(self) -> &'static str {
        match self {
            Role::Agent => "Tutor",
            Role::Learner => "You",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Agent => write!(f, "agent"),
            Role::Learner => write!(f, "learner"),
        }
    }
}

/// A function invocation requested by the remote agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallRequest {
    pub name: String,
    /// JSON-encoded arguments, exactly as received.
    pub arguments: String,
    pub call_id: String,
}

/// An error the remote service reported about itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RemoteReportedError {
    pub message: String,
    pub kind: Option<String>,
    pub code: Option<String>,
}

/// The application-level view of everything that happens on a session.
#[derive(Debug, Clone, PartialEq)]
pub enum Occurrence {
    /// The control channel became writable.
    Connected,
    /// The session ended. Emitted exactly once per session.
    Disconnected,
    /// A partial transcript fragment. Useful for live captions only.
    TranscriptDelta { role: Role, text: String },
    /// The complete utterance for one turn.
    TranscriptDone { role: Role, text: String },
    ToolCall(ToolCallRequest),
    /// The agent finished its turn.
    TurnDone,
    Error(RemoteReportedError),
}

/// The outcome of a tool call, correlated to the originating call id.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallResult {
    pub call_id: String,
    pub success: bool,
    pub payload: Map<String, Value>,
}

impl ToolCallResult {
    pub fn success(call_id: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            call_id: call_id.into(),
            success: true,
            payload,
        }
    }

    pub fn failure(call_id: impl Into<String>, error: impl Into<String>) -> Self {
        let mut payload = Map::new();
        payload.insert("error".to_string(), Value::String(error.into()));
        Self {
            call_id: call_id.into(),
            success: false,
            payload,
        }
    }

    /// The JSON object sent back to the agent: the success tag followed by the payload.
    pub fn output(&self) -> Value {
        let mut object = Map::with_capacity(self.payload.len() + 1);
        object.insert("success".to_string(), Value::Bool(self.success));
        for (key, value) in &self.payload {
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object)
    }

    /// The error string, if this is a failure result.
    pub fn error(&self) -> Option<&str> {
        if self.success {
            return None;
        }
        self.payload.get("error").and_then(Value::as_str)
    }
}
