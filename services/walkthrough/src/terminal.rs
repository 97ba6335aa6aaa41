//! A code surface drawn as text, one row per line.
//!
//! Pair it with `FixedLineHeight::new(0.0, 1.0)` so pixel offsets are rows.

use std::io::Write;
use tracing::warn;
use walkthrough_core::{
    HighlightRegion, LineRange,
    highlight::{CodeSurface, RegionStyle, ScrollBehavior, Viewport},
};

const MARKER: &str = "▌";

pub struct TerminalSurface<W> {
    lines: Vec<String>,
    highlighted: Option<LineRange>,
    status: String,
    viewport: Viewport,
    /// A frame is owed once the pending scroll lands.
    frame_pending: bool,
    out: W,
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(lines: Vec<String>, rows: usize, out: W) -> Self {
        Self {
            lines,
            highlighted: None,
            status: String::new(),
            viewport: Viewport::new(0.0, rows.max(1) as f64),
            frame_pending: false,
            out,
        }
    }

    /// The visible window with highlight markers.
    pub fn frame(&self) -> String {
        let first = self.viewport.scroll_top.max(0.0) as usize;
        let rows = self.viewport.height as usize;
        let width = self.lines.len().to_string().len();

        let mut frame = if self.status.is_empty() {
            "──\n".to_string()
        } else {
            format!("── {} ──\n", self.status)
        };
        for (index, text) in self.lines.iter().enumerate().skip(first).take(rows) {
            let number = index as u32 + 1;
            let marker = match self.highlighted {
                Some(range) if range.contains(number) => MARKER,
                _ => " ",
            };
            frame.push_str(&format!("{marker} {number:>width$} │ {text}\n"));
        }
        frame
    }

    fn visible(&self) -> bool {
        match self.highlighted {
            Some(range) => {
                let top = f64::from(range.start() - 1);
                let bottom = f64::from(range.end());
                top >= self.viewport.scroll_top && bottom <= self.viewport.bottom()
            }
            None => true,
        }
    }

    fn draw(&mut self) {
        self.frame_pending = false;
        let frame = self.frame();
        if let Err(e) = self.out.write_all(frame.as_bytes()).and_then(|()| self.out.flush()) {
            warn!(error = %e, "Failed to draw code frame");
        }
    }
}

impl<W: Write> CodeSurface for TerminalSurface<W> {
    fn remove_regions(&mut self) {
        self.highlighted = None;
    }

    fn insert_region(&mut self, region: &HighlightRegion, _style: &RegionStyle) {
        self.highlighted = Some(region.lines);
    }

    fn region_count(&self) -> usize {
        usize::from(self.highlighted.is_some())
    }

    fn set_highlight_status(&mut self, text: &str) {
        self.status = text.to_string();
        if self.visible() {
            self.draw();
        } else {
            self.frame_pending = true;
        }
    }

    fn viewport(&self) -> Option<Viewport> {
        Some(self.viewport)
    }

    fn scroll_to(&mut self, top: f64, _behavior: ScrollBehavior) {
        let max_top = (self.lines.len() as f64 - self.viewport.height).max(0.0);
        self.viewport.scroll_top = top.min(max_top).round();
        if self.frame_pending {
            self.draw();
        }
    }
}
