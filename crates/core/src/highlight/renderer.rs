//! Paints the single highlight region and keeps it in view.

use super::{
    CodeSurface, HighlightError, HighlightRegion, LineGeometry, LineRange, PixelSpan,
    ScrollBehavior,
};
use tracing::debug;

/// Visual treatment of the overlay: an accent bar on the left and a translucent fill.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionStyle {
    pub accent_color: &'static str,
    pub accent_width_px: u32,
    pub fill: &'static str,
    pub transition: &'static str,
}

impl Default for RegionStyle {
    fn default() -> Self {
        Self {
            accent_color: "#ffd500",
            accent_width_px: 3,
            fill: "rgba(255, 213, 0, 0.12)",
            transition: "top 0.3s ease, height 0.3s ease",
        }
    }
}

impl RegionStyle {
    /// Inline CSS for an absolutely positioned overlay covering `span`.
    pub fn css(&self, span: &PixelSpan) -> String {
        format!(
            "position: absolute; left: 0; right: 0; top: {}px; height: {}px; \
             background: {}; border-left: {}px solid {}; pointer-events: none; \
             z-index: 1; transition: {};",
            span.top,
            span.height,
            self.fill,
            self.accent_width_px,
            self.accent_color,
            self.transition
        )
    }
}

/// Turns requested line ranges into an overlay on a code surface.
///
/// At most one region exists at a time; each `highlight` replaces the previous one.
pub struct HighlightRenderer<G, S> {
    line_count: u32,
    geometry: G,
    surface: S,
    style: RegionStyle,
    current: Option<HighlightRegion>,
}

impl<G: LineGeometry, S: CodeSurface> HighlightRenderer<G, S> {
    pub fn new(line_count: u32, geometry: G, surface: S) -> Self {
        Self {
            line_count,
            geometry,
            surface,
            style: RegionStyle::default(),
            current: None,
        }
    }

    pub fn with_style(mut self, style: RegionStyle) -> Self {
        self.style = style;
        self
    }

    /// Lines that can be highlighted: the code block's, capped by what the geometry can place.
    pub fn line_count(&self) -> u32 {
        match self.geometry.line_limit() {
            Some(limit) => self.line_count.min(limit),
            None => self.line_count,
        }
    }

    pub fn current(&self) -> Option<&HighlightRegion> {
        self.current.as_ref()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Highlights the inclusive range `start..=end`, clamped into the code block.
    pub fn highlight(&mut self, start: i64, end: i64) -> Result<HighlightRegion, HighlightError> {
        let lines = LineRange::clamped(start, end, self.line_count())?;
        let span = PixelSpan::covering(
            self.geometry.measure(lines.start()),
            self.geometry.measure(lines.end()),
        );
        let region = HighlightRegion { lines, span };

        self.surface.remove_regions();
        self.surface.insert_region(&region, &self.style);
        self.surface.set_highlight_status(&lines.status_text());
        self.current = Some(region);

        if let Some(viewport) = self.surface.viewport() {
            if !viewport.contains(&span) {
                let target = viewport.centered_on(&span);
                debug!(%lines, target, "Scrolling highlight into view");
                self.surface.scroll_to(target, ScrollBehavior::Smooth);
            }
        }

        debug!(requested_start = start, requested_end = end, applied = %lines, "Highlight applied");
        Ok(region)
    }

    /// Removes the region and blanks the status. No-op when nothing is highlighted.
    pub fn clear(&mut self) {
        if self.current.take().is_none() && self.surface.region_count() == 0 {
            return;
        }
        self.surface.remove_regions();
        self.surface.set_highlight_status("");
        debug!("Highlight cleared");
    }
}
