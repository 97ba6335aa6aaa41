//! Reduces inbound control-channel payloads to `Occurrence`s.

use crate::{
    error::ProtocolParseError,
    protocol::{OutputItem, ServerEvent},
};
use tracing::debug;
use walkthrough_core::{Occurrence, RemoteReportedError, Role, ToolCallRequest};

const UNKNOWN_REMOTE_ERROR: &str = "Unknown error from realtime service";

/// Parses one payload.
///
/// `Ok(None)` means the message was understood but carries nothing the
/// application acts on (session notices, message items, unknown kinds).
pub fn translate(payload: &str) -> Result<Option<Occurrence>, ProtocolParseError> {
    let event: ServerEvent =
        serde_json::from_str(payload).map_err(|e| ProtocolParseError::new(e, payload))?;
    Ok(occurrence_for(event))
}

fn occurrence_for(event: ServerEvent) -> Option<Occurrence> {
    match event {
        ServerEvent::SessionCreated { session } | ServerEvent::SessionUpdated { session } => {
            debug!(session_id = ?session.id, model = ?session.model, "Session notice");
            None
        }
        ServerEvent::AudioTranscriptDelta { delta } => Some(Occurrence::TranscriptDelta {
            role: Role::Agent,
            text: delta,
        }),
        ServerEvent::AudioTranscriptDone { transcript } => Some(Occurrence::TranscriptDone {
            role: Role::Agent,
            text: transcript,
        }),
        ServerEvent::InputTranscriptionDelta { delta } => Some(Occurrence::TranscriptDelta {
            role: Role::Learner,
            text: delta,
        }),
        ServerEvent::InputTranscriptionCompleted { transcript } => Some(Occurrence::TranscriptDone {
            role: Role::Learner,
            text: transcript,
        }),
        ServerEvent::OutputItemDone {
            item: OutputItem::FunctionCall { name, arguments, call_id },
        } => Some(Occurrence::ToolCall(ToolCallRequest {
            name,
            arguments,
            call_id,
        })),
        ServerEvent::OutputItemDone { item: OutputItem::Other } => None,
        ServerEvent::ResponseDone => Some(Occurrence::TurnDone),
        ServerEvent::Error { error } => Some(Occurrence::Error(RemoteReportedError {
            message: error
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_REMOTE_ERROR.to_string()),
            kind: error.kind,
            code: error.code,
        })),
        ServerEvent::Unknown => {
            debug!("Ignoring unrecognized control message");
            None
        }
    }
}
