//! Realtime session client for voice-driven walkthroughs.
//!
//! Obtains a credential, negotiates a peer connection with the remote voice
//! agent, and republishes its control-channel traffic as [`Occurrence`]s.

pub mod credential;
pub mod error;
pub mod protocol;
pub mod scripted;
pub mod session;
pub mod signaling;
pub mod translate;
pub mod transport;

pub use credential::{Credential, CredentialSource, HttpCredentialExchange, StaticCredentials};
pub use error::{
    ConnectError, CredentialError, MediaAccessError, NegotiationError, ProtocolParseError,
    SendError, TransportError,
};
pub use protocol::{ClientEvent, ServerEvent};
pub use session::{Negotiator, Session, SessionProgress, SessionResources, SessionState};
pub use signaling::{HttpSignaling, SessionDescription, Signaling};
pub use walkthrough_core::Occurrence;
