//! Per-line vertical geometry of a rendered code block.

/// A vertical band in the code block's coordinate space, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelSpan {
    pub top: f64,
    pub height: f64,
}

impl PixelSpan {
    pub fn new(top: f64, height: f64) -> Self {
        Self { top, height }
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// The smallest span covering both `first` and `last`.
    pub fn covering(first: PixelSpan, last: PixelSpan) -> PixelSpan {
        let top = first.top.min(last.top);
        let bottom = first.bottom().max(last.bottom());
        PixelSpan::new(top, bottom - top)
    }
}

/// How a code renderer exposes where each line sits.
///
/// `line` is 1-based and callers only pass lines within the block.
pub trait LineGeometry {
    fn measure(&self, line: u32) -> PixelSpan;

    /// How many lines this geometry can place, when it knows.
    fn line_limit(&self) -> Option<u32> {
        None
    }
}

/// Every line has the same computed line height, offset by the block's top padding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedLineHeight {
    pub padding_top: f64,
    pub line_height: f64,
}

impl FixedLineHeight {
    pub fn new(padding_top: f64, line_height: f64) -> Self {
        Self {
            padding_top,
            line_height,
        }
    }
}

impl LineGeometry for FixedLineHeight {
    fn measure(&self, line: u32) -> PixelSpan {
        let index = f64::from(line.saturating_sub(1));
        PixelSpan::new(self.padding_top + index * self.line_height, self.line_height)
    }
}

/// Geometry read from per-line reference markers placed by the code renderer.
///
/// Handles wrapped or unevenly sized lines, which a fixed line height cannot.
#[derive(Debug, Clone, PartialEq)]
pub struct LineMarkers {
    spans: Vec<PixelSpan>,
}

impl LineMarkers {
    /// Builds markers from the top offset of each line and the bottom of the last one.
    ///
    /// Returns `None` when there are no lines or the offsets are not ascending.
    pub fn from_tops(tops: &[f64], block_bottom: f64) -> Option<Self> {
        if tops.is_empty() {
            return None;
        }
        let mut spans = Vec::with_capacity(tops.len());
        for (i, &top) in tops.iter().enumerate() {
            let next = tops.get(i + 1).copied().unwrap_or(block_bottom);
            if next < top {
                return None;
            }
            spans.push(PixelSpan::new(top, next - top));
        }
        Some(Self { spans })
    }

    pub fn line_count(&self) -> usize {
        self.spans.len()
    }
}

impl LineGeometry for LineMarkers {
    /// Lines past the last marker measure as the last line.
    fn measure(&self, line: u32) -> PixelSpan {
        let index = (line.max(1) as usize - 1).min(self.spans.len() - 1);
        self.spans[index]
    }

    fn line_limit(&self) -> Option<u32> {
        u32::try_from(self.spans.len()).ok()
    }
}
