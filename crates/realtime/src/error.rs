//! Error types for the realtime session client.

use thiserror::Error;

/// Fallback shown when the credential backend gives no message of its own.
pub const CREDENTIAL_FALLBACK_MESSAGE: &str = "Failed to get session token";

/// The credential backend rejected the request or could not be reached.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// Non-success response. `message` is the backend's own message when it sent one.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Credential backend unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    #[error("Malformed credential response: {0}")]
    MalformedResponse(String),
}

/// The microphone could not be acquired.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaAccessError {
    #[error("Microphone access denied. Please allow mic access and try again.")]
    PermissionDenied,

    #[error("No microphone found. Please connect a microphone.")]
    DeviceNotFound,

    #[error("Microphone unavailable: {0}")]
    Unavailable(String),
}

/// A media or channel collaborator failed an operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed: {message}")]
pub struct TransportError {
    pub operation: &'static str,
    pub message: String,
}

impl TransportError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

/// The offer/answer handshake did not complete.
#[derive(Error, Debug)]
pub enum NegotiationError {
    /// The signaling endpoint answered with a non-success status.
    #[error("SDP exchange with the realtime service failed (status {status})")]
    Rejected { status: u16, body: String },

    #[error("Signaling endpoint unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Any failure that aborts a connect attempt.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Media(#[from] MediaAccessError),

    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    #[error("A session is already active")]
    AlreadyActive,
}

impl ConnectError {
    /// The message shown to the learner in the status indicator.
    pub fn user_message(&self) -> String {
        match self {
            ConnectError::Credential(CredentialError::Rejected { message, .. })
                if message.trim().is_empty() =>
            {
                CREDENTIAL_FALLBACK_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }
}

/// An inbound control-channel payload that could not be parsed.
#[derive(Error, Debug)]
#[error("Malformed control message: {source}")]
pub struct ProtocolParseError {
    #[source]
    pub source: serde_json::Error,
    /// The start of the offending payload, for logs.
    pub excerpt: String,
}

impl ProtocolParseError {
    const EXCERPT_LEN: usize = 120;

    pub fn new(source: serde_json::Error, payload: &str) -> Self {
        let excerpt = payload.chars().take(Self::EXCERPT_LEN).collect();
        Self { source, excerpt }
    }
}

/// An outbound message could not be delivered.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("Control channel is not open")]
    NotOpen,

    #[error("Failed to serialize client event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
