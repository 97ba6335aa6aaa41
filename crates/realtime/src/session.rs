//! Session lifecycle.
//!
//! A [`Session`] is one connection attempt. [`Session::connect`] starts the
//! negotiation as an owned future; [`Session::progress`] drives it and, once
//! the transport is up, the inbound control channel. Everything acquired
//! during negotiation lives in a single [`SessionResources`] value that is
//! released exactly once, in a fixed order, whether the session ends
//! normally, is cancelled mid-negotiation, or fails.

use crate::{
    credential::{Credential, CredentialSource},
    error::{ConnectError, NegotiationError, SendError},
    protocol::{CONTROL_CHANNEL_LABEL, ClientEvent},
    signaling::Signaling,
    transport::{
        AudioConstraints, AudioInput, AudioTrack, ChannelEvent, ControlChannel, MediaDevices,
        PeerConnection, PeerFactory, PlaybackSink,
    },
    translate::translate,
};
use futures::{FutureExt, future::BoxFuture};
use std::{fmt, sync::Arc};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};
use walkthrough_core::{Occurrence, ToolCallResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AcquiringCredential,
    AcquiringMedia,
    Negotiating,
    Open,
    Closed,
    Failed,
}

impl SessionState {
    /// True between a connect request and teardown.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionState::AcquiringCredential
                | SessionState::AcquiringMedia
                | SessionState::Negotiating
                | SessionState::Open
        )
    }

    pub fn is_finished(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::AcquiringCredential => "acquiring-credential",
            SessionState::AcquiringMedia => "acquiring-media",
            SessionState::Negotiating => "negotiating",
            SessionState::Open => "open",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Everything a session holds on the media stack.
///
/// Filled in as negotiation proceeds. Teardown order is control channel,
/// peer connection, microphone tracks, playback sink. A failing step is
/// logged and the rest still run.
#[derive(Default)]
pub struct SessionResources {
    channel: Option<Box<dyn ControlChannel>>,
    peer: Option<Box<dyn PeerConnection>>,
    input: Option<Box<dyn AudioInput>>,
    sink: Option<Box<dyn PlaybackSink>>,
}

impl SessionResources {
    /// Releases whatever is held. Returns the number of steps that failed.
    pub fn release(&mut self) -> usize {
        let mut failures = 0;
        if let Some(mut channel) = self.channel.take() {
            if let Err(e) = channel.close() {
                warn!(error = %e, "Failed to close control channel");
                failures += 1;
            }
        }
        if let Some(mut peer) = self.peer.take() {
            if let Err(e) = peer.close() {
                warn!(error = %e, "Failed to close peer connection");
                failures += 1;
            }
        }
        if let Some(mut input) = self.input.take() {
            if let Err(e) = input.stop() {
                warn!(error = %e, "Failed to stop microphone tracks");
                failures += 1;
            }
        }
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.detach() {
                warn!(error = %e, "Failed to detach playback sink");
                failures += 1;
            }
        }
        failures
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_none() && self.peer.is_none() && self.input.is_none() && self.sink.is_none()
    }

    fn channel_mut(&mut self) -> Option<&mut Box<dyn ControlChannel>> {
        self.channel.as_mut()
    }
}

impl Drop for SessionResources {
    fn drop(&mut self) {
        if !self.is_empty() {
            debug!("Releasing session resources on drop");
            self.release();
        }
    }
}

impl fmt::Debug for SessionResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionResources")
            .field("channel", &self.channel.as_ref().map(|c| c.label().to_string()))
            .field("peer", &self.peer.is_some())
            .field("input", &self.input.is_some())
            .field("sink", &self.sink.as_ref().map(|s| s.id().to_string()))
            .finish()
    }
}

/// A completed negotiation: the transport plus its control-channel signals.
#[derive(Debug)]
pub struct Negotiated {
    pub resources: SessionResources,
    pub inbound: mpsc::UnboundedReceiver<ChannelEvent>,
}

/// Runs the handshake against the configured collaborators.
pub struct Negotiator {
    credentials: Arc<dyn CredentialSource>,
    media: Arc<dyn MediaDevices>,
    peers: Arc<dyn PeerFactory>,
    signaling: Arc<dyn Signaling>,
    constraints: AudioConstraints,
}

impl Negotiator {
    pub fn new(
        credentials: Arc<dyn CredentialSource>,
        media: Arc<dyn MediaDevices>,
        peers: Arc<dyn PeerFactory>,
        signaling: Arc<dyn Signaling>,
    ) -> Self {
        Self {
            credentials,
            media,
            peers,
            signaling,
            constraints: AudioConstraints::default(),
        }
    }

    pub fn with_constraints(mut self, constraints: AudioConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Credential, then microphone, then offer/answer. Any failure drops
    /// what was acquired so far.
    #[instrument(skip(self, state))]
    pub async fn negotiate(
        &self,
        lesson_id: String,
        state: &watch::Sender<SessionState>,
    ) -> Result<Negotiated, ConnectError> {
        let credential = self.credentials.issue(&lesson_id).await?;
        debug!(expires_at = ?credential.expires_at, "Credential acquired");

        state.send_replace(SessionState::AcquiringMedia);
        let mut resources = SessionResources::default();
        let input = resources
            .input
            .insert(self.media.open_microphone(&self.constraints).await?);
        let tracks = input.tracks();
        info!(tracks = tracks.len(), "Microphone acquired");

        state.send_replace(SessionState::Negotiating);
        let inbound = self.open_transport(&mut resources, &tracks, credential).await?;
        info!("Remote description applied");

        Ok(Negotiated { resources, inbound })
    }

    async fn open_transport(
        &self,
        resources: &mut SessionResources,
        tracks: &[AudioTrack],
        credential: Credential,
    ) -> Result<mpsc::UnboundedReceiver<ChannelEvent>, NegotiationError> {
        let sink = resources.sink.insert(self.media.playback_sink()?);
        let peer = resources.peer.insert(self.peers.create()?);
        peer.play_remote_audio(&**sink)?;
        for track in tracks {
            peer.add_track(track)?;
        }

        let (channel, inbound) = peer.create_data_channel(CONTROL_CHANNEL_LABEL)?;
        resources.channel = Some(channel);

        let offer = peer.create_offer().await?;
        let answer = self.signaling.exchange(credential, offer).await?;
        peer.apply_answer(answer).await?;
        Ok(inbound)
    }
}

/// What one call to [`Session::progress`] accomplished.
#[derive(Debug)]
pub enum SessionProgress {
    /// Negotiation finished. The session opens when the channel reports ready.
    Negotiated,
    /// Negotiation failed and the session is now `Failed`.
    Failed(ConnectError),
    /// One control-channel signal was handled.
    Handled,
    /// The control channel went away and the session is closed.
    Closed,
}

type PendingConnect = BoxFuture<'static, Result<Negotiated, ConnectError>>;

/// One connection lifecycle with the remote voice agent.
pub struct Session {
    lesson_id: String,
    state: Arc<watch::Sender<SessionState>>,
    pending: Option<PendingConnect>,
    resources: Option<SessionResources>,
    inbound: Option<mpsc::UnboundedReceiver<ChannelEvent>>,
    occurrences: mpsc::UnboundedSender<Occurrence>,
    last_error: Option<String>,
}

impl Session {
    /// Occurrences are published on `occurrences` in arrival order.
    pub fn new(
        lesson_id: impl Into<String>,
        occurrences: mpsc::UnboundedSender<Occurrence>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            lesson_id: lesson_id.into(),
            state: Arc::new(state),
            pending: None,
            resources: None,
            inbound: None,
            occurrences,
            last_error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// The message of the error that failed this session, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Starts negotiating. Only valid from `Idle`.
    pub fn connect(&mut self, negotiator: Arc<Negotiator>) -> Result<(), ConnectError> {
        if self.state() != SessionState::Idle {
            return Err(ConnectError::AlreadyActive);
        }
        info!(lesson_id = %self.lesson_id, "Connecting");
        self.state.send_replace(SessionState::AcquiringCredential);

        let state = Arc::clone(&self.state);
        let lesson_id = self.lesson_id.clone();
        self.pending = Some(async move { negotiator.negotiate(lesson_id, &state).await }.boxed());
        Ok(())
    }

    /// Drives negotiation or the inbound control channel by one step.
    ///
    /// Cancel-safe: the negotiation future is owned by the session and only
    /// borrowed here. Pends forever when there is nothing to drive.
    pub async fn progress(&mut self) -> SessionProgress {
        if let Some(pending) = self.pending.as_mut() {
            let outcome = pending.await;
            self.pending = None;
            return match outcome {
                Ok(negotiated) => {
                    self.attach(negotiated);
                    SessionProgress::Negotiated
                }
                Err(e) => {
                    self.fail(&e);
                    SessionProgress::Failed(e)
                }
            };
        }

        let Some(inbound) = self.inbound.as_mut() else {
            return std::future::pending().await;
        };
        match inbound.recv().await {
            Some(event) => {
                self.ingest(event);
                SessionProgress::Handled
            }
            None => {
                warn!("Control channel signals ended");
                self.disconnect();
                SessionProgress::Closed
            }
        }
    }

    fn attach(&mut self, negotiated: Negotiated) {
        let Negotiated { resources, inbound } = negotiated;
        self.resources = Some(resources);
        self.inbound = Some(inbound);
        debug!("Awaiting control channel");
    }

    fn fail(&mut self, error: &ConnectError) {
        warn!(error = %error, "Connect attempt failed");
        self.last_error = Some(error.user_message());
        self.state.send_replace(SessionState::Failed);
    }

    /// Applies one control-channel signal.
    pub fn ingest(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Open => {
                if self.state() == SessionState::Negotiating {
                    self.state.send_replace(SessionState::Open);
                    info!("Control channel open");
                    self.emit(Occurrence::Connected);
                }
            }
            ChannelEvent::Message(payload) => match translate(&payload) {
                Ok(Some(occurrence)) => self.emit(occurrence),
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, excerpt = %e.excerpt, "Dropping malformed control message")
                }
            },
            ChannelEvent::Closed => {
                warn!("Control channel closed");
                self.disconnect();
            }
        }
    }

    /// Sends one client event. Only valid while `Open`.
    pub fn send(&mut self, event: &ClientEvent) -> Result<(), SendError> {
        if self.state() != SessionState::Open {
            return Err(SendError::NotOpen);
        }
        let text = serde_json::to_string(event)?;
        let channel = self
            .resources
            .as_mut()
            .and_then(SessionResources::channel_mut)
            .ok_or(SendError::NotOpen)?;
        channel.send(&text)?;
        Ok(())
    }

    /// Adds a learner text message and asks the agent to respond.
    pub fn send_text_message(&mut self, text: &str) -> Result<(), SendError> {
        self.send(&ClientEvent::user_text(text))?;
        self.send(&ClientEvent::ResponseCreate)
    }

    /// Returns a tool-call result, then asks the agent to continue its turn.
    pub fn send_tool_result(&mut self, result: &ToolCallResult) -> Result<(), SendError> {
        self.send(&ClientEvent::function_call_output(
            result.call_id.clone(),
            &result.output(),
        ))?;
        self.send(&ClientEvent::ResponseCreate)
    }

    /// Tears the session down. Safe from any state; a no-op unless active.
    ///
    /// Emits `Disconnected` exactly once per session.
    pub fn disconnect(&mut self) {
        let state = self.state();
        if !state.is_active() {
            return;
        }

        if self.pending.take().is_some() {
            info!(%state, "Cancelled negotiation");
        }
        self.inbound = None;
        if let Some(mut resources) = self.resources.take() {
            let failures = resources.release();
            if failures > 0 {
                warn!(failures, "Teardown was partial");
            }
        }

        self.state.send_replace(SessionState::Closed);
        info!(lesson_id = %self.lesson_id, "Disconnected");
        self.emit(Occurrence::Disconnected);
    }

    fn emit(&self, occurrence: Occurrence) {
        if self.occurrences.send(occurrence).is_err() {
            debug!("No listener for session occurrences");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("lesson_id", &self.lesson_id)
            .field("state", &self.state())
            .field("negotiating", &self.pending.is_some())
            .field("resources", &self.resources)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        credential::MockCredentialSource,
        error::{CredentialError, MediaAccessError},
        scripted::{AnswerOutcome, MicrophoneOutcome, ScriptedTransport},
        signaling::{MockSignaling, SessionDescription},
    };
    use serde_json::json;

    fn granting_credentials() -> Arc<dyn CredentialSource> {
        let mut credentials = MockCredentialSource::new();
        credentials
            .expect_issue()
            .returning(|lesson_id| Ok(Credential::new("ek_test", None, lesson_id)));
        Arc::new(credentials)
    }

    fn open_session(
        transport: &ScriptedTransport,
    ) -> (Session, mpsc::UnboundedReceiver<Occurrence>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut session = Session::new("binary-search", tx);
        session
            .connect(Arc::new(transport.negotiator(granting_credentials())))
            .unwrap();
        (session, rx)
    }

    #[tokio::test]
    async fn test_channel_ready_signal_opens_session() {
        let transport = ScriptedTransport::new();
        let (mut session, mut occurrences) = open_session(&transport);

        assert!(matches!(session.progress().await, SessionProgress::Negotiated));
        assert_eq!(session.state(), SessionState::Negotiating);
        assert!(occurrences.try_recv().is_err());

        transport.remote().open();
        assert!(matches!(session.progress().await, SessionProgress::Handled));
        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(occurrences.try_recv().unwrap(), Occurrence::Connected);
    }

    #[tokio::test]
    async fn test_credential_rejection_fails_before_media() {
        let mut credentials = MockCredentialSource::new();
        credentials.expect_issue().times(1).returning(|_| {
            Err(CredentialError::Rejected {
                status: 500,
                message: "OPENAI_API_KEY not configured".into(),
            })
        });
        let transport = ScriptedTransport::new();
        let (tx, mut occurrences) = mpsc::unbounded_channel();
        let mut session = Session::new("binary-search", tx);
        session.connect(Arc::new(transport.negotiator(Arc::new(credentials)))).unwrap();

        let SessionProgress::Failed(err) = session.progress().await else {
            panic!("expected failure");
        };
        assert_eq!(err.user_message(), "OPENAI_API_KEY not configured");
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.last_error(), Some("OPENAI_API_KEY not configured"));
        assert!(transport.log().events().is_empty());

        session.disconnect();
        assert!(occurrences.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_missing_device_has_its_own_message() {
        let transport = ScriptedTransport::new().microphone(MicrophoneOutcome::NoDevice);
        let (mut session, _occurrences) = open_session(&transport);

        let SessionProgress::Failed(err) = session.progress().await else {
            panic!("expected failure");
        };
        assert!(matches!(err, ConnectError::Media(MediaAccessError::DeviceNotFound)));
        assert_eq!(err.user_message(), "No microphone found. Please connect a microphone.");
    }

    #[tokio::test]
    async fn test_rejected_answer_releases_in_order() {
        let transport = ScriptedTransport::new().answer(AnswerOutcome::Reject(401));
        let (mut session, mut occurrences) = open_session(&transport);

        let SessionProgress::Failed(err) = session.progress().await else {
            panic!("expected failure");
        };
        assert!(matches!(
            err,
            ConnectError::Negotiation(NegotiationError::Rejected { status: 401, .. })
        ));
        assert_eq!(
            transport.log().releases(),
            vec!["channel.close", "peer.close", "tracks.stop", "sink.detach"]
        );
        assert!(occurrences.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_signaling_receives_offer_and_credential() {
        let mut signaling = MockSignaling::new();
        signaling
            .expect_exchange()
            .withf(|credential, offer| {
                credential.token() == "ek_test" && offer.sdp.starts_with("v=0")
            })
            .times(1)
            .returning(|_, _| Ok(SessionDescription::answer("v=0 remote")));
        let transport = ScriptedTransport::new();
        let negotiator = Negotiator::new(
            granting_credentials(),
            transport.media(),
            transport.peers(),
            Arc::new(signaling),
        );

        let (tx, _rx) = mpsc::unbounded_channel();
        let mut session = Session::new("binary-search", tx);
        session.connect(Arc::new(negotiator)).unwrap();
        assert!(matches!(session.progress().await, SessionProgress::Negotiated));
        assert_eq!(transport.log().applied_answer().as_deref(), Some("v=0 remote"));
    }

    #[tokio::test]
    async fn test_send_requires_open_state() {
        let transport = ScriptedTransport::new();
        let (mut session, _occurrences) = open_session(&transport);
        assert!(matches!(
            session.send(&ClientEvent::ResponseCreate),
            Err(SendError::NotOpen)
        ));

        session.progress().await;
        assert!(matches!(
            session.send(&ClientEvent::ResponseCreate),
            Err(SendError::NotOpen)
        ));
        assert!(transport.log().sent().is_empty());
    }

    #[tokio::test]
    async fn test_tool_result_is_followed_by_response_create() {
        let transport = ScriptedTransport::new().auto_open(true);
        let (mut session, _occurrences) = open_session(&transport);
        session.progress().await;
        session.progress().await;
        assert_eq!(session.state(), SessionState::Open);

        let mut payload = serde_json::Map::new();
        payload.insert("highlighted".into(), json!("3-3"));
        session
            .send_tool_result(&ToolCallResult::success("c1", payload))
            .unwrap();

        let sent = transport.log().sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0]["item"]["call_id"], "c1");
        assert_eq!(sent[0]["item"]["output"], r#"{"success":true,"highlighted":"3-3"}"#);
        assert_eq!(sent[1], json!({ "type": "response.create" }));
    }

    #[tokio::test]
    async fn test_remote_close_disconnects_once() {
        let transport = ScriptedTransport::new().auto_open(true);
        let (mut session, mut occurrences) = open_session(&transport);
        session.progress().await;
        session.progress().await;

        transport.remote().close();
        session.progress().await;
        session.disconnect();

        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(occurrences.try_recv().unwrap(), Occurrence::Connected);
        assert_eq!(occurrences.try_recv().unwrap(), Occurrence::Disconnected);
        assert!(occurrences.try_recv().is_err());
        assert_eq!(transport.log().releases().len(), 4);
    }

    #[tokio::test]
    async fn test_malformed_messages_are_dropped() {
        let transport = ScriptedTransport::new().auto_open(true);
        let (mut session, mut occurrences) = open_session(&transport);
        session.progress().await;
        session.progress().await;
        assert_eq!(occurrences.try_recv().unwrap(), Occurrence::Connected);

        transport.remote().deliver("{ not json");
        transport.remote().deliver(r#"{"type":"response.done"}"#);
        session.progress().await;
        session.progress().await;

        assert_eq!(occurrences.try_recv().unwrap(), Occurrence::TurnDone);
        assert!(occurrences.try_recv().is_err());
        assert_eq!(session.state(), SessionState::Open);
    }

    #[tokio::test]
    async fn test_connect_twice_is_rejected() {
        let transport = ScriptedTransport::new();
        let (mut session, _occurrences) = open_session(&transport);
        let again = session.connect(Arc::new(transport.negotiator(granting_credentials())));
        assert!(matches!(again, Err(ConnectError::AlreadyActive)));
    }
}
