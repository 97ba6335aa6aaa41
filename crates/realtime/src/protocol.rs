//! Control-channel wire messages exchanged with the realtime voice service.

use serde::{Deserialize, Serialize};

/// Label of the single data channel opened for control messages.
pub const CONTROL_CHANNEL_LABEL: &str = "oai-events";

// =============================================================================
// Server Events (received over the control channel)
// =============================================================================

/// Inbound messages. Kinds this client does not handle decode to `Unknown`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "session.created")]
    SessionCreated {
        #[serde(default)]
        session: SessionInfo,
    },

    #[serde(rename = "session.updated")]
    SessionUpdated {
        #[serde(default)]
        session: SessionInfo,
    },

    /// A fragment of the agent's spoken transcript.
    #[serde(
        rename = "response.audio_transcript.delta",
        alias = "response.output_audio_transcript.delta"
    )]
    AudioTranscriptDelta {
        #[serde(default)]
        delta: String,
    },

    /// The agent's complete transcript for one response.
    #[serde(
        rename = "response.audio_transcript.done",
        alias = "response.output_audio_transcript.done"
    )]
    AudioTranscriptDone {
        #[serde(default)]
        transcript: String,
    },

    /// A fragment of the learner's transcribed speech.
    #[serde(rename = "conversation.item.input_audio_transcription.delta")]
    InputTranscriptionDelta {
        #[serde(default)]
        delta: String,
    },

    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputTranscriptionCompleted {
        #[serde(default)]
        transcript: String,
    },

    #[serde(rename = "response.output_item.done")]
    OutputItemDone { item: OutputItem },

    #[serde(rename = "response.done")]
    ResponseDone,

    #[serde(rename = "error")]
    Error { error: ApiError },

    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// A finished output item. Only function calls matter to this client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum OutputItem {
    #[serde(rename = "function_call")]
    FunctionCall {
        name: String,
        /// JSON-encoded arguments.
        #[serde(default)]
        arguments: String,
        call_id: String,
    },

    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiError {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

// =============================================================================
// Client Events (sent over the control channel)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },

    /// Asks the agent to take its next turn.
    #[serde(rename = "response.create")]
    ResponseCreate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationItem {
    Message {
        role: ItemRole,
        content: Vec<ContentPart>,
    },
    FunctionCallOutput {
        call_id: String,
        /// JSON-encoded result object.
        output: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemRole {
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    InputText { text: String },
}

impl ClientEvent {
    /// A learner text message added to the conversation.
    pub fn user_text(text: impl Into<String>) -> Self {
        ClientEvent::ConversationItemCreate {
            item: ConversationItem::Message {
                role: ItemRole::User,
                content: vec![ContentPart::InputText { text: text.into() }],
            },
        }
    }

    /// A tool-call result keyed by the originating call id.
    pub fn function_call_output(call_id: impl Into<String>, output: &serde_json::Value) -> Self {
        ClientEvent::ConversationItemCreate {
            item: ConversationItem::FunctionCallOutput {
                call_id: call_id.into(),
                output: output.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_function_call_item_decodes() {
        let event: ServerEvent = serde_json::from_value(json!({
            "type": "response.output_item.done",
            "event_id": "evt_1",
            "response_id": "resp_1",
            "output_index": 0,
            "item": {
                "id": "item_1",
                "type": "function_call",
                "status": "completed",
                "name": "highlight_lines",
                "call_id": "c1",
                "arguments": "{\"start_line\":3,\"end_line\":3}"
            }
        }))
        .unwrap();

        match event {
            ServerEvent::OutputItemDone {
                item: OutputItem::FunctionCall { name, arguments, call_id },
            } => {
                assert_eq!(name, "highlight_lines");
                assert_eq!(call_id, "c1");
                assert_eq!(arguments, r#"{"start_line":3,"end_line":3}"#);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_message_items_and_unknown_kinds_are_tolerated() {
        let event: ServerEvent = serde_json::from_value(json!({
            "type": "response.output_item.done",
            "item": { "type": "message", "role": "assistant", "content": [] }
        }))
        .unwrap();
        assert!(matches!(event, ServerEvent::OutputItemDone { item: OutputItem::Other }));

        let event: ServerEvent = serde_json::from_value(json!({
            "type": "rate_limits.updated",
            "rate_limits": []
        }))
        .unwrap();
        assert!(matches!(event, ServerEvent::Unknown));
    }

    #[test]
    fn test_new_transcript_names_are_accepted() {
        let event: ServerEvent = serde_json::from_value(json!({
            "type": "response.output_audio_transcript.done",
            "transcript": "Line three checks the midpoint."
        }))
        .unwrap();
        assert!(matches!(event, ServerEvent::AudioTranscriptDone { .. }));
    }

    #[test]
    fn test_client_events_encode_to_wire_shape() {
        let text = serde_json::to_value(ClientEvent::user_text("Begin.")).unwrap();
        assert_eq!(
            text,
            json!({
                "type": "conversation.item.create",
                "item": {
                    "type": "message",
                    "role": "user",
                    "content": [{ "type": "input_text", "text": "Begin." }]
                }
            })
        );

        let event = ClientEvent::function_call_output("c1", &json!({ "success": true }));
        let output = serde_json::to_value(event).unwrap();
        assert_eq!(
            output,
            json!({
                "type": "conversation.item.create",
                "item": {
                    "type": "function_call_output",
                    "call_id": "c1",
                    "output": "{\"success\":true}"
                }
            })
        );

        let turn = serde_json::to_value(ClientEvent::ResponseCreate).unwrap();
        assert_eq!(turn, json!({ "type": "response.create" }));
    }
}
