//! Tool-call dispatch.
//!
//! The remote agent may call exactly two functions, `highlight_lines` and
//! `clear_highlight`. Every call, recognized or not, produces exactly one
//! `ToolCallResult`; argument problems become failure results rather than errors.

use crate::{
    highlight::{CodeSurface, HighlightError, HighlightRenderer, LineGeometry, LineRange},
    occurrence::{ToolCallRequest, ToolCallResult},
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

pub const HIGHLIGHT_LINES: &str = "highlight_lines";
pub const CLEAR_HIGHLIGHT: &str = "clear_highlight";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolArgumentError {
    #[error("Invalid JSON")]
    InvalidJson,
    #[error("Invalid arguments: {0}")]
    Shape(String),
}

/// Arguments of `highlight_lines`.
#[derive(Deserialize, JsonSchema, Debug, Clone, PartialEq, Eq)]
pub struct HighlightLinesArgs {
    /// The first line number to highlight (1-based, inclusive).
    pub start_line: i64,
    /// The last line number to highlight (1-based, inclusive). Equals start_line for one line.
    pub end_line: i64,
}

/// Arguments of `clear_highlight` (none).
#[derive(Deserialize, JsonSchema, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ClearHighlightArgs {}

/// The operations a tool handler may perform on the code view.
pub trait Highlighter {
    fn highlight(&mut self, start: i64, end: i64) -> Result<LineRange, HighlightError>;
    fn clear(&mut self);
}

impl<G: LineGeometry, S: CodeSurface> Highlighter for HighlightRenderer<G, S> {
    fn highlight(&mut self, start: i64, end: i64) -> Result<LineRange, HighlightError> {
        HighlightRenderer::highlight(self, start, end).map(|region| region.lines)
    }

    fn clear(&mut self) {
        HighlightRenderer::clear(self)
    }
}

type Handler = fn(Value, &mut dyn Highlighter) -> Result<Map<String, Value>, String>;

struct ToolEntry {
    name: &'static str,
    description: &'static str,
    handler: Handler,
    schema: fn() -> Value,
}

static TOOLS: &[ToolEntry] = &[
    ToolEntry {
        name: HIGHLIGHT_LINES,
        description: "Highlight specific lines of code in the code viewer. \
            Call this EVERY TIME you begin discussing a new section of code. \
            The highlighted lines will be visually emphasized in the user's code panel. \
            Use 1-based line numbers.",
        handler: highlight_lines,
        schema: highlight_lines_schema,
    },
    ToolEntry {
        name: CLEAR_HIGHLIGHT,
        description: "Remove all line highlights from the code viewer. \
            Call this when you finish discussing the code and are answering a general question, \
            or when transitioning between topics where no specific lines are relevant.",
        handler: clear_highlight,
        schema: clear_highlight_schema,
    },
];

/// Routes a tool call to its handler and returns the result for the agent.
pub fn dispatch(call: &ToolCallRequest, target: &mut dyn Highlighter) -> ToolCallResult {
    let Some(entry) = TOOLS.iter().find(|t| t.name == call.name) else {
        warn!(name = %call.name, call_id = %call.call_id, "Unknown tool requested");
        return ToolCallResult::failure(&call.call_id, format!("Unknown function: {}", call.name));
    };

    let arguments = match parse_arguments(&call.arguments) {
        Ok(value) => value,
        Err(e) => {
            warn!(
                name = %call.name,
                call_id = %call.call_id,
                arguments = %call.arguments,
                "Failed to parse tool arguments"
            );
            return ToolCallResult::failure(&call.call_id, e.to_string());
        }
    };

    info!(name = %call.name, call_id = %call.call_id, %arguments, "Executing tool");
    match (entry.handler)(arguments, target) {
        Ok(payload) => ToolCallResult::success(&call.call_id, payload),
        Err(message) => ToolCallResult::failure(&call.call_id, message),
    }
}

/// Function definitions advertised to the agent when a session is created.
pub fn definitions() -> Vec<Value> {
    TOOLS
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "name": t.name,
                "description": t.description,
                "parameters": (t.schema)(),
            })
        })
        .collect()
}

fn parse_arguments(raw: &str) -> Result<Value, ToolArgumentError> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_str(raw).map_err(|_| ToolArgumentError::InvalidJson)
}

fn highlight_lines(
    arguments: Value,
    target: &mut dyn Highlighter,
) -> Result<Map<String, Value>, String> {
    let args: HighlightLinesArgs = serde_json::from_value(arguments)
        .map_err(|e| ToolArgumentError::Shape(e.to_string()).to_string())?;
    let applied = target
        .highlight(args.start_line, args.end_line)
        .map_err(|e| e.to_string())?;

    let mut payload = Map::new();
    payload.insert("highlighted".to_string(), Value::String(applied.to_string()));
    Ok(payload)
}

fn clear_highlight(
    _arguments: Value,
    target: &mut dyn Highlighter,
) -> Result<Map<String, Value>, String> {
    target.clear();
    Ok(Map::new())
}

fn highlight_lines_schema() -> Value {
    parameters_schema(schemars::schema_for!(HighlightLinesArgs))
}

fn clear_highlight_schema() -> Value {
    parameters_schema(schemars::schema_for!(ClearHighlightArgs))
}

fn parameters_schema(schema: schemars::Schema) -> Value {
    let mut value = schema.to_value();
    if let Some(object) = value.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
        object.insert("additionalProperties".to_string(), Value::Bool(false));
        object
            .entry("properties")
            .or_insert_with(|| Value::Object(Map::new()));
        object
            .entry("required")
            .or_insert_with(|| Value::Array(Vec::new()));
    }
    value
}
