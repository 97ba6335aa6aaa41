//! Seams to the media stack: microphone, playback, peer connection and
//! control channel. The session client only talks to these traits.

use crate::{
    error::{MediaAccessError, TransportError},
    signaling::SessionDescription,
};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Microphone processing requested from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTrack {
    pub id: String,
}

/// An acquired microphone stream.
pub trait AudioInput: Send {
    fn tracks(&self) -> Vec<AudioTrack>;

    /// Stops every track of the stream.
    fn stop(&mut self) -> Result<(), TransportError>;
}

/// Where remote audio is played.
pub trait PlaybackSink: Send {
    fn id(&self) -> &str;

    fn detach(&mut self) -> Result<(), TransportError>;
}

#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Prompts for microphone access.
    async fn open_microphone(
        &self,
        constraints: &AudioConstraints,
    ) -> Result<Box<dyn AudioInput>, MediaAccessError>;

    fn playback_sink(&self) -> Result<Box<dyn PlaybackSink>, TransportError>;
}

/// Signals raised by the control channel itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The channel became writable.
    Open,
    Message(String),
    Closed,
}

/// The message-oriented control channel.
pub trait ControlChannel: Send {
    fn label(&self) -> &str;

    fn send(&mut self, text: &str) -> Result<(), TransportError>;

    fn close(&mut self) -> Result<(), TransportError>;
}

/// One real-time peer connection carrying audio and the control channel.
#[async_trait]
pub trait PeerConnection: Send {
    /// Routes inbound remote audio to `sink`.
    fn play_remote_audio(&mut self, sink: &dyn PlaybackSink) -> Result<(), TransportError>;

    fn add_track(&mut self, track: &AudioTrack) -> Result<(), TransportError>;

    /// Opens the outbound control channel. Its signals arrive on the returned receiver.
    fn create_data_channel(
        &mut self,
        label: &str,
    ) -> Result<(Box<dyn ControlChannel>, mpsc::UnboundedReceiver<ChannelEvent>), TransportError>;

    /// Creates the local offer and sets it as the local description.
    async fn create_offer(&mut self) -> Result<SessionDescription, TransportError>;

    async fn apply_answer(&mut self, answer: SessionDescription) -> Result<(), TransportError>;

    fn close(&mut self) -> Result<(), TransportError>;
}

pub trait PeerFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn PeerConnection>, TransportError>;
}
