//! Walkthrough Core
//!
//! Runtime-agnostic domain logic for a voice-guided code walkthrough: the
//! normalized events a realtime agent produces, the tool calls it may issue,
//! and the highlight overlay those tool calls drive. Nothing in this crate
//! performs I/O; the realtime client and the page runtime live elsewhere.

pub mod highlight;
pub mod lesson;
pub mod occurrence;
pub mod tools;
pub mod transcript;

pub use highlight::{HighlightError, HighlightRegion, HighlightRenderer, LineRange};
pub use occurrence::{Occurrence, RemoteReportedError, Role, ToolCallRequest, ToolCallResult};
pub use tools::{Highlighter, ToolArgumentError, dispatch};
