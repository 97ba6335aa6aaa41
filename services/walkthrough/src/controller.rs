//! The Session Controller.
//!
//! Owns the page state, the highlight renderer and at most one session, and
//! runs the event loop that ties them together: user commands, negotiation
//! progress, and the occurrences a session publishes.

use crate::{config::DEFAULT_OPENING_INSTRUCTION, page::PageState};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use walkthrough_core::{
    HighlightRenderer, Occurrence, ToolCallRequest, dispatch,
    highlight::{CodeSurface, LineGeometry},
};
use walkthrough_realtime::{Negotiator, Session, SessionProgress, SessionState};

/// User actions on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Start,
    Stop,
    /// Page unload. Tears down like `Stop` and ends the loop.
    Unload,
}

pub struct SessionController<G, S> {
    lesson_id: String,
    negotiator: Arc<Negotiator>,
    opening_instruction: String,
    renderer: HighlightRenderer<G, S>,
    page: PageState,
    session: Option<Session>,
    occurrences_tx: mpsc::UnboundedSender<Occurrence>,
    occurrences_rx: mpsc::UnboundedReceiver<Occurrence>,
}

impl<G: LineGeometry, S: CodeSurface> SessionController<G, S> {
    pub fn new(
        lesson_id: impl Into<String>,
        negotiator: Arc<Negotiator>,
        renderer: HighlightRenderer<G, S>,
    ) -> Self {
        let (occurrences_tx, occurrences_rx) = mpsc::unbounded_channel();
        Self {
            lesson_id: lesson_id.into(),
            negotiator,
            opening_instruction: DEFAULT_OPENING_INSTRUCTION.to_string(),
            renderer,
            page: PageState::new(),
            session: None,
            occurrences_tx,
            occurrences_rx,
        }
    }

    pub fn with_opening_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.opening_instruction = instruction.into();
        self
    }

    pub fn page(&self) -> &PageState {
        &self.page
    }

    pub fn renderer(&self) -> &HighlightRenderer<G, S> {
        &self.renderer
    }

    pub fn session_state(&self) -> Option<SessionState> {
        self.session.as_ref().map(Session::state)
    }

    /// Runs until the command channel closes with no session left, or until `Unload`.
    #[instrument(name = "controller", skip_all, fields(lesson_id))]
    pub async fn run(mut self, mut commands: mpsc::Receiver<ControlCommand>) -> Self {
        tracing::Span::current().record("lesson_id", self.lesson_id.as_str());
        let mut commands_open = true;
        loop {
            tokio::select! {
                biased;
                Some(occurrence) = self.occurrences_rx.recv() => self.handle_occurrence(occurrence),
                progress = drive(&mut self.session) => self.handle_progress(progress),
                command = commands.recv(), if commands_open => match command {
                    Some(ControlCommand::Start) => self.start(),
                    Some(ControlCommand::Stop) => self.stop(),
                    Some(ControlCommand::Unload) => {
                        self.stop();
                        break;
                    }
                    None => commands_open = false,
                },
            }
            if !commands_open && self.session.is_none() {
                break;
            }
        }
        info!("Controller finished");
        self
    }

    /// Starts a new session unless one is already active.
    pub fn start(&mut self) {
        if self.session.as_ref().is_some_and(|s| s.state().is_active()) {
            debug!("Start ignored: a session is already active");
            return;
        }
        self.session = None;

        self.page.connecting();
        let mut session = Session::new(self.lesson_id.clone(), self.occurrences_tx.clone());
        match session.connect(Arc::clone(&self.negotiator)) {
            Ok(()) => self.session = Some(session),
            Err(e) => self.page.connect_failed(e.user_message()),
        }
    }

    /// Disconnects the current session, if any, and applies its final occurrences.
    pub fn stop(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.disconnect();
        }
        while let Ok(occurrence) = self.occurrences_rx.try_recv() {
            self.handle_occurrence(occurrence);
        }
    }

    fn handle_progress(&mut self, progress: SessionProgress) {
        match progress {
            SessionProgress::Failed(e) => {
                self.page.connect_failed(e.user_message());
                self.session = None;
            }
            SessionProgress::Negotiated | SessionProgress::Handled | SessionProgress::Closed => {}
        }
    }

    fn handle_occurrence(&mut self, occurrence: Occurrence) {
        match occurrence {
            Occurrence::Connected => {
                self.page.connected();
                self.send_opening_instruction();
            }
            Occurrence::Disconnected => {
                self.page.disconnected();
                self.renderer.clear();
                if self.session.as_ref().is_some_and(|s| s.state().is_finished()) {
                    self.session = None;
                }
            }
            Occurrence::TranscriptDelta { role, text } => self.page.caption_delta(role, &text),
            Occurrence::TranscriptDone { role, text } => {
                debug!(%role, %text, "Utterance");
                self.page.utterance(role, &text);
            }
            Occurrence::ToolCall(call) => self.answer_tool_call(&call),
            Occurrence::TurnDone => self.page.turn_done(),
            Occurrence::Error(error) => {
                warn!(
                    message = %error.message,
                    kind = ?error.kind,
                    code = ?error.code,
                    "Realtime service reported an error"
                );
                self.page.remote_error(&error.message);
            }
        }
    }

    fn send_opening_instruction(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Err(e) = session.send_text_message(&self.opening_instruction) {
            warn!(error = %e, "Failed to send opening instruction");
        }
    }

    fn answer_tool_call(&mut self, call: &ToolCallRequest) {
        let result = dispatch(call, &mut self.renderer);
        let Some(session) = self.session.as_mut() else {
            warn!(call_id = %call.call_id, "Tool call arrived without a session");
            return;
        };
        if let Err(e) = session.send_tool_result(&result) {
            warn!(call_id = %call.call_id, error = %e, "Failed to return tool result");
        }
    }
}

async fn drive(session: &mut Option<Session>) -> SessionProgress {
    match session {
        Some(session) => session.progress().await,
        None => std::future::pending().await,
    }
}
