//! Page state outside the code display: status indicator, start/stop
//! controls, transcript panel and live caption.

use walkthrough_core::{Role, transcript::Transcript};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusKind {
    #[default]
    Idle,
    Connecting,
    Connected,
    Error,
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct PageState {
    pub status: StatusKind,
    pub status_text: String,
    pub start_enabled: bool,
    pub stop_enabled: bool,
    pub transcript: Transcript,
    /// Agent speech so far in the current turn.
    pub caption: String,
    pub remote_errors: u32,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            status: StatusKind::Idle,
            status_text: String::new(),
            start_enabled: true,
            stop_enabled: false,
            transcript: Transcript::new(),
            caption: String::new(),
            remote_errors: 0,
        }
    }
}

impl PageState {
    pub fn new() -> Self {
        Self::default()
    }

    fn set_status(&mut self, status: StatusKind, text: impl Into<String>) {
        self.status = status;
        self.status_text = text.into();
    }

    pub fn connecting(&mut self) {
        self.start_enabled = false;
        self.set_status(StatusKind::Connecting, "Connecting...");
    }

    pub fn connected(&mut self) {
        self.set_status(StatusKind::Connected, "Connected - Tutor is speaking");
        self.stop_enabled = true;
    }

    pub fn disconnected(&mut self) {
        self.set_status(StatusKind::Disconnected, "Disconnected");
        self.start_enabled = true;
        self.stop_enabled = false;
        self.caption.clear();
    }

    /// A connect attempt failed before the session opened.
    pub fn connect_failed(&mut self, message: impl Into<String>) {
        self.set_status(StatusKind::Error, message);
        self.start_enabled = true;
        self.stop_enabled = false;
    }

    /// The remote service reported an error. The session stays up.
    pub fn remote_error(&mut self, message: &str) {
        self.remote_errors += 1;
        self.set_status(StatusKind::Error, format!("Error: {message}"));
    }

    pub fn caption_delta(&mut self, role: Role, text: &str) {
        if role == Role::Agent {
            self.caption.push_str(text);
        }
    }

    pub fn utterance(&mut self, role: Role, text: &str) {
        if role == Role::Agent {
            self.caption.clear();
        }
        self.transcript.record(role, text);
    }

    pub fn turn_done(&mut self) {
        self.caption.clear();
    }
}
