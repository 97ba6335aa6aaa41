use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use walkthrough_core::{
    HighlightRenderer, Role,
    highlight::{BufferSurface, CodeSurface, FixedLineHeight, SurfaceOp},
};
use walkthrough_realtime::{
    StaticCredentials,
    scripted::{AnswerOutcome, MicrophoneOutcome, ScriptedTransport},
};
use walkthrough_service::{
    controller::{ControlCommand, SessionController},
    page::StatusKind,
};

type Controller = SessionController<FixedLineHeight, BufferSurface>;

fn controller(transport: &ScriptedTransport, line_count: u32) -> Controller {
    let negotiator = transport.negotiator(Arc::new(StaticCredentials::new("ek_test")));
    let renderer = HighlightRenderer::new(
        line_count,
        FixedLineHeight::new(16.0, 20.0),
        BufferSurface::with_viewport(240.0),
    );
    SessionController::new("binary-search", Arc::new(negotiator), renderer)
}

fn tool_call(name: &str, arguments: serde_json::Value, call_id: &str) -> String {
    json!({
        "type": "response.output_item.done",
        "item": {
            "type": "function_call",
            "name": name,
            "call_id": call_id,
            "arguments": arguments.to_string()
        }
    })
    .to_string()
}

async fn run(controller: Controller, commands: &[ControlCommand]) -> Controller {
    let (tx, rx) = mpsc::channel(commands.len().max(1));
    for command in commands {
        tx.send(*command).await.unwrap();
    }
    drop(tx);
    controller.run(rx).await
}

#[tokio::test]
async fn test_highlight_then_clear_over_a_live_session() {
    let transport = ScriptedTransport::new()
        .auto_open(true)
        .script(vec![
            tool_call("highlight_lines", json!({ "start_line": 3, "end_line": 3 }), "c1"),
            json!({ "type": "response.done" }).to_string(),
            tool_call("clear_highlight", json!({}), "c2"),
        ])
        .hang_up_after_script(true);

    let controller = run(controller(&transport, 11), &[ControlCommand::Start]).await;

    let ops = controller.renderer().surface().ops();
    assert!(ops.contains(&SurfaceOp::Status("Discussing line 3".to_string())));
    let inserted: Vec<_> = ops
        .iter()
        .filter_map(|op| match op {
            SurfaceOp::InsertRegion(region) => Some(region.lines),
            _ => None,
        })
        .collect();
    assert_eq!(inserted.len(), 1);
    assert_eq!((inserted[0].start(), inserted[0].end()), (3, 3));
    assert_eq!(controller.renderer().surface().region_count(), 0);
    assert_eq!(controller.renderer().surface().status(), "");

    let sent = transport.log().sent();
    let kinds: Vec<&str> = sent
        .iter()
        .map(|m| m["item"]["type"].as_str().unwrap_or_else(|| m["type"].as_str().unwrap()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            "message",
            "response.create",
            "function_call_output",
            "response.create",
            "function_call_output",
            "response.create",
        ]
    );
    assert_eq!(
        sent[0]["item"]["content"][0]["text"],
        "Please begin the walkthrough of this algorithm from the top."
    );
    assert_eq!(sent[2]["item"]["call_id"], "c1");
    assert_eq!(sent[2]["item"]["output"], r#"{"success":true,"highlighted":"3-3"}"#);
    assert_eq!(sent[4]["item"]["call_id"], "c2");
    assert_eq!(sent[4]["item"]["output"], r#"{"success":true}"#);

    let page = controller.page();
    assert_eq!(page.status, StatusKind::Disconnected);
    assert!(page.start_enabled);
    assert!(!page.stop_enabled);
    assert!(controller.session_state().is_none());
}

#[tokio::test]
async fn test_out_of_range_request_is_clamped() {
    let transport = ScriptedTransport::new().auto_open(true).script(vec![tool_call(
        "highlight_lines",
        json!({ "start_line": 38, "end_line": 45 }),
        "c1",
    )]);

    let controller = run(
        controller(&transport, 40),
        &[ControlCommand::Start, ControlCommand::Unload],
    )
    .await;

    // Inbound traffic is drained before the next command is taken.
    let sent = transport.log().sent();
    let answer = sent.iter().find(|m| m["item"]["call_id"] == "c1").unwrap();
    assert_eq!(answer["item"]["output"], r#"{"success":true,"highlighted":"38-40"}"#);
    assert_eq!(controller.page().status, StatusKind::Disconnected);
}

#[tokio::test]
async fn test_microphone_denied_reenables_start() {
    let transport = ScriptedTransport::new().microphone(MicrophoneOutcome::Deny);

    let controller = run(controller(&transport, 11), &[ControlCommand::Start]).await;

    let page = controller.page();
    assert_eq!(page.status, StatusKind::Error);
    assert_eq!(
        page.status_text,
        "Microphone access denied. Please allow mic access and try again."
    );
    assert!(page.start_enabled);
    assert!(!page.stop_enabled);
    assert!(controller.session_state().is_none());
    assert!(transport.log().events().is_empty());
    assert!(transport.log().sent().is_empty());
}

#[tokio::test]
async fn test_stop_during_negotiation_releases_everything() {
    let transport = ScriptedTransport::new().answer(AnswerOutcome::Hang);

    let controller = run(
        controller(&transport, 11),
        &[ControlCommand::Start, ControlCommand::Stop],
    )
    .await;

    assert_eq!(
        transport.log().releases(),
        vec!["channel.close", "peer.close", "tracks.stop", "sink.detach"]
    );
    assert!(!transport.log().microphone_active());
    assert_eq!(controller.page().status, StatusKind::Disconnected);
    assert_eq!(controller.page().status_text, "Disconnected");
    assert!(controller.page().start_enabled);
}

#[tokio::test]
async fn test_remote_error_is_reported_but_not_fatal() {
    let transport = ScriptedTransport::new()
        .auto_open(true)
        .script(vec![
            json!({
                "type": "error",
                "error": { "type": "server_error", "message": "Upstream hiccup" }
            })
            .to_string(),
            json!({ "type": "response.audio_transcript.delta", "delta": "Line two " }).to_string(),
            json!({
                "type": "response.audio_transcript.done",
                "transcript": "Line two sets the bounds."
            })
            .to_string(),
            json!({
                "type": "conversation.item.input_audio_transcription.completed",
                "transcript": "Why minus one?"
            })
            .to_string(),
            json!({
                "type": "conversation.item.input_audio_transcription.completed",
                "transcript": "   "
            })
            .to_string(),
            tool_call("highlight_lines", json!({ "start_line": 2, "end_line": 2 }), "c9"),
        ])
        .hang_up_after_script(true);

    let controller = run(controller(&transport, 11), &[ControlCommand::Start]).await;

    let page = controller.page();
    assert_eq!(page.remote_errors, 1);
    let entries = page.transcript.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].role, Role::Agent);
    assert_eq!(entries[0].text, "Line two sets the bounds.");
    assert_eq!(entries[1].role, Role::Learner);

    let log = transport.log();
    assert_eq!(
        log.sent()
            .iter()
            .filter(|m| m["item"]["call_id"] == "c9")
            .count(),
        1
    );
    assert_eq!(log.sent_of_type("response.create"), 2);
}
