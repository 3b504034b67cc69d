//! Intrinsic sizes of content-driven leaves
//!
//! Text is measured through [`TextMetrics`]; the default
//! [`ApproximateFontMetrics`] uses fixed ratios so layout stays
//! deterministic without font data.

/// Font inputs for one text run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub font_size: f32,
    /// Used line height in pixels
    pub line_height: f32,
    pub letter_spacing: f32,
    /// Whether lines may break at spaces
    pub wraps: bool,
}

/// Measured text block
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextSize {
    pub width: f32,
    pub height: f32,
    /// First baseline from the top of the block
    pub baseline: f32,
    pub lines: usize,
}

/// Text measurement used by the traversal
pub trait TextMetrics: Send + Sync {
    /// Advance width of a single-line run
    fn text_width(&self, text: &str, style: &TextStyle) -> f32;

    /// Distance from the top of the em box to the baseline
    fn ascent(&self, font_size: f32) -> f32;

    /// Lay out `text` greedily at word boundaries against `max_width`
    fn measure(&self, text: &str, style: &TextStyle, max_width: Option<f32>) -> TextSize {
        let space = self.text_width(" ", style);
        let mut widest = 0.0f32;
        let mut lines = 0usize;
        for paragraph in text.split('\n') {
            let limit = max_width.filter(|_| style.wraps);
            let mut line = 0.0f32;
            let mut started = false;
            for word in paragraph.split(' ').filter(|w| !w.is_empty()) {
                let w = self.text_width(word, style);
                if !started {
                    line = w;
                    started = true;
                } else if limit.is_some_and(|limit| line + space + w > limit) {
                    widest = widest.max(line);
                    lines += 1;
                    line = w;
                } else {
                    line += space + w;
                }
            }
            widest = widest.max(line);
            lines += 1;
        }
        let half_leading = (style.line_height - style.font_size) / 2.0;
        TextSize {
            width: widest,
            height: lines as f32 * style.line_height,
            baseline: half_leading + self.ascent(style.font_size),
            lines,
        }
    }
}

/// Fixed-ratio metrics: 0.6em per character, 0.8em ascent
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproximateFontMetrics;

impl ApproximateFontMetrics {
    pub const CHAR_WIDTH_RATIO: f32 = 0.6;
    pub const ASCENT_RATIO: f32 = 0.8;
}

impl TextMetrics for ApproximateFontMetrics {
    fn text_width(&self, text: &str, style: &TextStyle) -> f32 {
        let chars = text.chars().count() as f32;
        chars * (style.font_size * Self::CHAR_WIDTH_RATIO + style.letter_spacing)
    }

    fn ascent(&self, font_size: f32) -> f32 {
        font_size * Self::ASCENT_RATIO
    }
}

/// Size of a replaced element from its natural size and any authored size
pub fn replaced_size(
    natural_width: f32,
    natural_height: f32,
    width: Option<f32>,
    height: Option<f32>,
) -> (f32, f32) {
    let ratio = (natural_height > 0.0).then(|| natural_width / natural_height);
    match (width, height, ratio) {
        (Some(w), Some(h), _) => (w, h),
        (Some(w), None, Some(r)) if r > 0.0 => (w, w / r),
        (None, Some(h), Some(r)) => (h * r, h),
        (Some(w), None, _) => (w, natural_height),
        (None, Some(h), None) => (natural_width, h),
        (None, None, _) => (natural_width, natural_height),
    }
}
