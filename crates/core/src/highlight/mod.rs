//! Line highlighting over a rendered code block.
//!
//! - `geometry`: the single `measure(line) -> PixelSpan` capability, with a
//!   fixed line-height strategy and a per-line marker strategy.
//! - `surface`: what the renderer needs from the page (overlay, status label,
//!   scroll container), plus an in-memory surface.
//! - `renderer`: clamping, region replacement, status text, auto-scroll.

pub mod geometry;
pub mod renderer;
pub mod surface;

pub use geometry::{FixedLineHeight, LineGeometry, LineMarkers, PixelSpan};
pub use renderer::{HighlightRenderer, RegionStyle};
pub use surface::{BufferSurface, CodeSurface, ScrollBehavior, SurfaceOp, Viewport};

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HighlightError {
    #[error("The code block has no lines to highlight")]
    EmptyCode,
}

/// An inclusive, 1-based range of code lines. Always `1 <= start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    start: u32,
    end: u32,
}

impl LineRange {
    /// Pulls a requested range into `[1, line_count]`.
    ///
    /// `start` is clamped first, then `end` is clamped to `[start, line_count]`,
    /// so an inverted request collapses to the single line at `start`.
    pub fn clamped(start: i64, end: i64, line_count: u32) -> Result<Self, HighlightError> {
        if line_count == 0 {
            return Err(HighlightError::EmptyCode);
        }
        let max = i64::from(line_count);
        let start = start.clamp(1, max);
        let end = end.clamp(start, max);
        // Both values are within [1, line_count] here.
        Ok(Self {
            start: start as u32,
            end: end as u32,
        })
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn is_single(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, line: u32) -> bool {
        (self.start..=self.end).contains(&line)
    }

    /// Human-readable status, e.g. "Discussing lines 4–9".
    pub fn status_text(&self) -> String {
        if self.is_single() {
            format!("Discussing line {}", self.start)
        } else {
            format!("Discussing lines {}–{}", self.start, self.end)
        }
    }
}

/// Compact `start-end` form echoed back to the agent.
impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// The overlay currently painted over the code block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HighlightRegion {
    pub lines: LineRange,
    pub span: PixelSpan,
}
