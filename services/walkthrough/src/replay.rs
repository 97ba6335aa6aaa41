//! Offline replay of a recorded control-channel session.
//!
//! A script is JSON Lines: one inbound payload per line, blank lines and
//! `#` comments skipped. The full controller runs against the scripted
//! transport and draws highlights to a terminal surface.

use crate::{
    controller::{ControlCommand, SessionController},
    page::PageState,
    terminal::TerminalSurface,
};
use anyhow::{Context, Result};
use serde_json::Value;
use std::{io::Write, path::Path, sync::Arc};
use tokio::sync::mpsc;
use tracing::{info, warn};
use walkthrough_core::{HighlightRenderer, highlight::FixedLineHeight, lesson::Lesson};
use walkthrough_realtime::{StaticCredentials, scripted::ScriptedTransport};

/// Visible code rows in the terminal window.
pub const DEFAULT_ROWS: usize = 16;

#[derive(Debug)]
pub struct ReplayReport {
    pub page: PageState,
    /// Every message the client sent, in order.
    pub sent: Vec<Value>,
    pub tool_results: usize,
    pub turn_requests: usize,
}

pub fn load_script(path: &Path) -> Result<Vec<String>> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script {}", path.display()))?;
    Ok(parse_script(&source))
}

pub fn parse_script(source: &str) -> Vec<String> {
    source
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Replays `script` against `lesson`, drawing frames to `out`.
pub async fn replay<W: Write>(
    lesson: &Lesson,
    script: Vec<String>,
    opening_instruction: &str,
    rows: usize,
    out: W,
) -> Result<ReplayReport> {
    if lesson.code.is_none() {
        warn!(slug = %lesson.slug, "Lesson has no python code block; every highlight will fail");
    }
    info!(slug = %lesson.slug, messages = script.len(), "Starting replay");

    let transport = ScriptedTransport::new()
        .auto_open(true)
        .script(script)
        .hang_up_after_script(true);
    let negotiator = transport.negotiator(Arc::new(StaticCredentials::new("replay")));

    let code = lesson.code_lines().map(str::to_string).collect();
    let surface = TerminalSurface::new(code, rows, out);
    let renderer =
        HighlightRenderer::new(lesson.line_count, FixedLineHeight::new(0.0, 1.0), surface);
    let controller = SessionController::new(lesson.slug.clone(), Arc::new(negotiator), renderer)
        .with_opening_instruction(opening_instruction);

    let (commands, rx) = mpsc::channel(1);
    commands
        .send(ControlCommand::Start)
        .await
        .context("Controller stopped before the replay started")?;
    drop(commands);

    let controller = controller.run(rx).await;

    let log = transport.log();
    Ok(ReplayReport {
        page: controller.page().clone(),
        sent: log.sent(),
        tool_results: log
            .sent()
            .iter()
            .filter(|m| m["item"]["type"] == "function_call_output")
            .count(),
        turn_requests: log.sent_of_type("response.create"),
    })
}
