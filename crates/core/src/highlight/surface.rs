//! The page-side surface the highlight renderer paints on.

use super::{HighlightRegion, PixelSpan, RegionStyle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    Smooth,
    Instant,
}

/// The visible window of the scrollable code container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scroll_top: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(scroll_top: f64, height: f64) -> Self {
        Self { scroll_top, height }
    }

    pub fn bottom(&self) -> f64 {
        self.scroll_top + self.height
    }

    /// True when the whole span is visible.
    pub fn contains(&self, span: &PixelSpan) -> bool {
        span.top >= self.scroll_top && span.bottom() <= self.bottom()
    }

    /// Scroll offset that centers `span` in this viewport, never negative.
    pub fn centered_on(&self, span: &PixelSpan) -> f64 {
        (span.top - self.height / 2.0 + span.height / 2.0).max(0.0)
    }
}

/// What the renderer needs from the page: the overlay layer over the code
/// block, the highlight status label, and the scrollable container.
pub trait CodeSurface {
    /// Removes every highlight overlay. No-op when there is none.
    fn remove_regions(&mut self);

    fn insert_region(&mut self, region: &HighlightRegion, style: &RegionStyle);

    fn region_count(&self) -> usize;

    fn set_highlight_status(&mut self, text: &str);

    /// The scroll container's visible window, or `None` if the code block is not in one.
    fn viewport(&self) -> Option<Viewport>;

    fn scroll_to(&mut self, top: f64, behavior: ScrollBehavior);
}

/// A recorded surface mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    RemoveRegions,
    InsertRegion(HighlightRegion),
    Status(String),
    ScrollTo(f64),
}

/// An in-memory surface that keeps the current state and a log of every mutation.
#[derive(Debug, Default, Clone)]
pub struct BufferSurface {
    regions: Vec<HighlightRegion>,
    status: String,
    viewport: Option<Viewport>,
    ops: Vec<SurfaceOp>,
}

impl BufferSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// A surface inside a scroll container of the given visible height.
    pub fn with_viewport(height: f64) -> Self {
        Self {
            viewport: Some(Viewport::new(0.0, height)),
            ..Self::default()
        }
    }

    pub fn regions(&self) -> &[HighlightRegion] {
        &self.regions
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn ops(&self) -> &[SurfaceOp] {
        &self.ops
    }

    pub fn scroll_top(&self) -> Option<f64> {
        self.viewport.map(|v| v.scroll_top)
    }
}

impl CodeSurface for BufferSurface {
    fn remove_regions(&mut self) {
        self.regions.clear();
        self.ops.push(SurfaceOp::RemoveRegions);
    }

    fn insert_region(&mut self, region: &HighlightRegion, _style: &RegionStyle) {
        self.regions.push(*region);
        self.ops.push(SurfaceOp::InsertRegion(*region));
    }

    fn region_count(&self) -> usize {
        self.regions.len()
    }

    fn set_highlight_status(&mut self, text: &str) {
        self.status = text.to_string();
        self.ops.push(SurfaceOp::Status(text.to_string()));
    }

    fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    fn scroll_to(&mut self, top: f64, _behavior: ScrollBehavior) {
        if let Some(viewport) = self.viewport.as_mut() {
            viewport.scroll_top = top;
        }
        self.ops.push(SurfaceOp::ScrollTo(top));
    }
}
