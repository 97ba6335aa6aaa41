//! An in-process transport that plays back a scripted remote.
//!
//! Used for offline replay and for tests. Every acquisition, release and
//! outbound message is recorded in a shared [`TransportLog`].

use crate::{
    credential::{Credential, CredentialSource},
    error::{MediaAccessError, NegotiationError, TransportError},
    session::Negotiator,
    signaling::{SessionDescription, Signaling},
    transport::{
        AudioConstraints, AudioInput, AudioTrack, ChannelEvent, ControlChannel, MediaDevices,
        PeerConnection, PeerFactory, PlaybackSink,
    },
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;

const RELEASE_EVENTS: [&str; 4] = ["channel.close", "peer.close", "tracks.stop", "sink.detach"];

#[derive(Debug, Default)]
struct LogState {
    events: Vec<&'static str>,
    sent: Vec<String>,
    answer: Option<String>,
    constraints: Option<AudioConstraints>,
    failing_release: Option<&'static str>,
}

/// Shared record of what the scripted transport did.
#[derive(Debug, Default, Clone)]
pub struct TransportLog {
    inner: Arc<Mutex<LogState>>,
}

impl TransportLog {
    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, event: &'static str) {
        self.lock().events.push(event);
    }

    /// Records a release step unless it is the one set up to fail.
    fn release(&self, event: &'static str) -> Result<(), TransportError> {
        let mut state = self.lock();
        if state.failing_release == Some(event) {
            return Err(TransportError::new(event, "scripted release failure"));
        }
        state.events.push(event);
        Ok(())
    }

    /// Every acquisition and release, in order.
    pub fn events(&self) -> Vec<&'static str> {
        self.lock().events.clone()
    }

    /// Only the release steps, in order.
    pub fn releases(&self) -> Vec<&'static str> {
        self.lock()
            .events
            .iter()
            .copied()
            .filter(|e| RELEASE_EVENTS.contains(e))
            .collect()
    }

    /// Outbound control messages, parsed. Unparseable ones are skipped.
    pub fn sent(&self) -> Vec<Value> {
        self.lock()
            .sent
            .iter()
            .filter_map(|raw| serde_json::from_str(raw).ok())
            .collect()
    }

    /// Outbound messages of one `type`.
    pub fn sent_of_type(&self, kind: &str) -> usize {
        self.sent().iter().filter(|m| m["type"] == kind).count()
    }

    pub fn applied_answer(&self) -> Option<String> {
        self.lock().answer.clone()
    }

    /// The processing asked for when the microphone was opened.
    pub fn requested_constraints(&self) -> Option<AudioConstraints> {
        self.lock().constraints
    }

    /// True while a microphone is held.
    pub fn microphone_active(&self) -> bool {
        let events = self.lock();
        let opened = events.events.iter().filter(|e| **e == "mic.open").count();
        let stopped = events.events.iter().filter(|e| **e == "tracks.stop").count();
        opened > stopped
    }
}

/// The remote end of the scripted control channel.
#[derive(Debug, Default, Clone)]
pub struct ScriptedRemote {
    channel: Arc<Mutex<Option<mpsc::UnboundedSender<ChannelEvent>>>>,
}

impl ScriptedRemote {
    fn attach(&self, tx: mpsc::UnboundedSender<ChannelEvent>) {
        *self.channel.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
    }

    fn push(&self, event: ChannelEvent) -> bool {
        self.channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|tx| tx.send(event).is_ok())
    }

    /// Signals that the channel is writable.
    pub fn open(&self) -> bool {
        self.push(ChannelEvent::Open)
    }

    /// Delivers one inbound payload.
    pub fn deliver(&self, payload: impl Into<String>) -> bool {
        self.push(ChannelEvent::Message(payload.into()))
    }

    pub fn close(&self) -> bool {
        self.push(ChannelEvent::Closed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MicrophoneOutcome {
    #[default]
    Grant,
    Deny,
    NoDevice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnswerOutcome {
    #[default]
    Answer,
    /// The signaling endpoint answers with this HTTP status.
    Reject(u16),
    /// Never answers.
    Hang,
}

/// Builder for a complete scripted transport.
#[derive(Debug, Default, Clone)]
pub struct ScriptedTransport {
    log: TransportLog,
    remote: ScriptedRemote,
    microphone: MicrophoneOutcome,
    answer: AnswerOutcome,
    auto_open: bool,
    script: Arc<Vec<String>>,
    hang_up: bool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn microphone(mut self, outcome: MicrophoneOutcome) -> Self {
        self.microphone = outcome;
        self
    }

    pub fn answer(mut self, outcome: AnswerOutcome) -> Self {
        self.answer = outcome;
        self
    }

    /// Signal channel readiness as soon as the answer is applied.
    pub fn auto_open(mut self, auto_open: bool) -> Self {
        self.auto_open = auto_open;
        self
    }

    /// Payloads delivered, in order, right after the channel opens.
    /// Only used together with `auto_open`.
    pub fn script(mut self, messages: Vec<String>) -> Self {
        self.script = Arc::new(messages);
        self
    }

    /// Close the channel once the script has been delivered.
    pub fn hang_up_after_script(mut self, hang_up: bool) -> Self {
        self.hang_up = hang_up;
        self
    }

    /// Make one release step (`"channel.close"`, `"peer.close"`,
    /// `"tracks.stop"` or `"sink.detach"`) report an error.
    pub fn fail_release(self, step: &'static str) -> Self {
        self.log.lock().failing_release = Some(step);
        self
    }

    pub fn log(&self) -> &TransportLog {
        &self.log
    }

    pub fn remote(&self) -> &ScriptedRemote {
        &self.remote
    }

    pub fn media(&self) -> Arc<dyn MediaDevices> {
        Arc::new(ScriptedMedia {
            outcome: self.microphone,
            log: self.log.clone(),
        })
    }

    pub fn peers(&self) -> Arc<dyn PeerFactory> {
        Arc::new(ScriptedPeerFactory {
            log: self.log.clone(),
            remote: self.remote.clone(),
            auto_open: self.auto_open,
            script: Arc::clone(&self.script),
            hang_up: self.hang_up,
        })
    }

    pub fn signaling(&self) -> Arc<dyn Signaling> {
        Arc::new(ScriptedSignaling { outcome: self.answer })
    }

    pub fn negotiator(&self, credentials: Arc<dyn CredentialSource>) -> Negotiator {
        Negotiator::new(credentials, self.media(), self.peers(), self.signaling())
    }
}

struct ScriptedMedia {
    outcome: MicrophoneOutcome,
    log: TransportLog,
}

#[async_trait]
impl MediaDevices for ScriptedMedia {
    async fn open_microphone(
        &self,
        constraints: &AudioConstraints,
    ) -> Result<Box<dyn AudioInput>, MediaAccessError> {
        match self.outcome {
            MicrophoneOutcome::Grant => {
                debug!(?constraints, "Scripted microphone granted");
                self.log.lock().constraints = Some(*constraints);
                self.log.record("mic.open");
                Ok(Box::new(ScriptedInput {
                    log: self.log.clone(),
                    stopped: false,
                }))
            }
            MicrophoneOutcome::Deny => Err(MediaAccessError::PermissionDenied),
            MicrophoneOutcome::NoDevice => Err(MediaAccessError::DeviceNotFound),
        }
    }

    fn playback_sink(&self) -> Result<Box<dyn PlaybackSink>, TransportError> {
        self.log.record("sink.attach");
        Ok(Box::new(ScriptedSink { log: self.log.clone() }))
    }
}

struct ScriptedInput {
    log: TransportLog,
    stopped: bool,
}

impl AudioInput for ScriptedInput {
    fn tracks(&self) -> Vec<AudioTrack> {
        vec![AudioTrack {
            id: "scripted-mic-0".to_string(),
        }]
    }

    fn stop(&mut self) -> Result<(), TransportError> {
        if self.stopped {
            return Err(TransportError::new("stop tracks", "already stopped"));
        }
        self.stopped = true;
        self.log.release("tracks.stop")
    }
}

struct ScriptedSink {
    log: TransportLog,
}

impl PlaybackSink for ScriptedSink {
    fn id(&self) -> &str {
        "scripted-speaker"
    }

    fn detach(&mut self) -> Result<(), TransportError> {
        self.log.release("sink.detach")
    }
}

struct ScriptedPeerFactory {
    log: TransportLog,
    remote: ScriptedRemote,
    auto_open: bool,
    script: Arc<Vec<String>>,
    hang_up: bool,
}

impl PeerFactory for ScriptedPeerFactory {
    fn create(&self) -> Result<Box<dyn PeerConnection>, TransportError> {
        self.log.record("peer.create");
        Ok(Box::new(ScriptedPeer {
            log: self.log.clone(),
            remote: self.remote.clone(),
            auto_open: self.auto_open,
            script: Arc::clone(&self.script),
            hang_up: self.hang_up,
            tracks: Vec::new(),
        }))
    }
}

struct ScriptedPeer {
    log: TransportLog,
    remote: ScriptedRemote,
    auto_open: bool,
    script: Arc<Vec<String>>,
    hang_up: bool,
    tracks: Vec<String>,
}

#[async_trait]
impl PeerConnection for ScriptedPeer {
    fn play_remote_audio(&mut self, sink: &dyn PlaybackSink) -> Result<(), TransportError> {
        debug!(sink = sink.id(), "Scripted remote audio routed");
        Ok(())
    }

    fn add_track(&mut self, track: &AudioTrack) -> Result<(), TransportError> {
        self.tracks.push(track.id.clone());
        self.log.record("peer.add_track");
        Ok(())
    }

    fn create_data_channel(
        &mut self,
        label: &str,
    ) -> Result<(Box<dyn ControlChannel>, mpsc::UnboundedReceiver<ChannelEvent>), TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.remote.attach(tx);
        self.log.record("channel.create");
        let channel = ScriptedChannel {
            label: label.to_string(),
            log: self.log.clone(),
            closed: false,
        };
        Ok((Box::new(channel), rx))
    }

    async fn create_offer(&mut self) -> Result<SessionDescription, TransportError> {
        Ok(SessionDescription::offer(format!(
            "v=0\r\ns=scripted\r\na=tracks:{}\r\n",
            self.tracks.join(",")
        )))
    }

    async fn apply_answer(&mut self, answer: SessionDescription) -> Result<(), TransportError> {
        self.log.lock().answer = Some(answer.sdp);
        if self.auto_open {
            self.remote.open();
            for payload in self.script.iter() {
                self.remote.deliver(payload.clone());
            }
            if self.hang_up {
                self.remote.close();
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.log.release("peer.close")
    }
}

struct ScriptedChannel {
    label: String,
    log: TransportLog,
    closed: bool,
}

impl ControlChannel for ScriptedChannel {
    fn label(&self) -> &str {
        &self.label
    }

    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::new("send", "channel closed"));
        }
        self.log.lock().sent.push(text.to_string());
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        self.log.release("channel.close")
    }
}

struct ScriptedSignaling {
    outcome: AnswerOutcome,
}

#[async_trait]
impl Signaling for ScriptedSignaling {
    async fn exchange(
        &self,
        credential: Credential,
        offer: SessionDescription,
    ) -> Result<SessionDescription, NegotiationError> {
        debug!(
            lesson_id = %credential.lesson_id,
            offer_len = offer.sdp.len(),
            "Scripted signaling"
        );
        match self.outcome {
            AnswerOutcome::Answer => Ok(SessionDescription::answer("v=0\r\ns=scripted-remote\r\n")),
            AnswerOutcome::Reject(status) => Err(NegotiationError::Rejected {
                status,
                body: "scripted rejection".to_string(),
            }),
            AnswerOutcome::Hang => std::future::pending().await,
        }
    }
}
