//! Walkthrough Service Library Crate
//!
//! The page-side runtime for a voice-driven algorithm walkthrough: the
//! session controller, its page state, a terminal code surface, offline
//! replay, and configuration. The `walkthrough` binary is a thin wrapper
//! around this library.

pub mod config;
pub mod controller;
pub mod page;
pub mod replay;
pub mod terminal;
