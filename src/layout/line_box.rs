//! Line boxes for inline-block runs
//!
//! Items are packed left to right. A new line starts only when the current
//! line already holds something and the next item would overflow.

use crate::layout::geometry::Edges;
use crate::layout::types::VerticalAlign;
use crate::style::TextAlign;

/// One inline-level box on a line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineItem {
    /// Index of the child in the level being laid out
    pub index: usize,
    /// Offset of the margin box from the line start
    pub x: f32,
    pub width: f32,
    pub height: f32,
    pub margin: Edges,
    /// Baseline from the top of the border box
    pub baseline: Option<f32>,
    pub vertical_align: VerticalAlign,
    pub line_height: Option<f32>,
}

impl LineItem {
    pub fn outer_width(&self) -> f32 {
        self.width + self.margin.horizontal()
    }

    pub fn outer_height(&self) -> f32 {
        self.height + self.margin.vertical()
    }

    /// Baseline measured from the top of the margin box. Without a content
    /// baseline this is the bottom margin edge.
    fn margin_box_baseline(&self) -> f32 {
        self.margin.top + self.baseline.unwrap_or(self.height + self.margin.bottom)
    }
}

/// A completed line
#[derive(Debug, Clone, PartialEq)]
pub struct LineBox {
    /// Top of the line, relative to the first line's top
    pub top: f32,
    pub height: f32,
    /// Baseline from the line top
    pub baseline: f32,
    /// Horizontal space used by the items
    pub used_width: f32,
    pub items: Vec<LineItem>,
}

impl LineBox {
    /// Border-box position of every item, relative to the first line's
    /// top-left corner, as `(index, x, y)`
    pub fn place(&self, available_width: f32, text_align: TextAlign) -> Vec<(usize, f32, f32)> {
        let free = (available_width - self.used_width).max(0.0);
        let shift = match text_align {
            TextAlign::Left | TextAlign::Justify => 0.0,
            TextAlign::Center => free / 2.0,
            TextAlign::Right => free,
        };
        self.items
            .iter()
            .map(|item| {
                let y = match item.vertical_align {
                    VerticalAlign::Top => item.margin.top,
                    VerticalAlign::Bottom => self.height - item.height - item.margin.bottom,
                    VerticalAlign::Middle => {
                        (self.height - item.outer_height()) / 2.0 + item.margin.top
                    }
                    VerticalAlign::Baseline => {
                        self.baseline - item.margin_box_baseline() + item.margin.top
                    }
                };
                (item.index, shift + item.x + item.margin.left, self.top + y)
            })
            .collect()
    }
}

/// Packs items into lines against a fixed available width
#[derive(Debug)]
pub struct LineBuilder {
    available_width: f32,
    lines: Vec<LineBox>,
    current: Vec<LineItem>,
    x: f32,
    top: f32,
}

impl LineBuilder {
    pub fn new(available_width: f32) -> Self {
        Self {
            available_width,
            lines: Vec::new(),
            current: Vec::new(),
            x: 0.0,
            top: 0.0,
        }
    }

    /// Add the next item, wrapping first if it does not fit
    pub fn push(&mut self, mut item: LineItem) {
        let outer = item.outer_width();
        if self.x > 0.0 && self.x + outer > self.available_width {
            self.break_line();
        }
        item.x = self.x;
        self.x += outer;
        self.current.push(item);
    }

    fn break_line(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let items = std::mem::take(&mut self.current);
        let line = Self::close(items, self.top, self.x);
        self.top += line.height;
        self.lines.push(line);
        self.x = 0.0;
    }

    fn close(items: Vec<LineItem>, top: f32, used_width: f32) -> LineBox {
        let mut height = 0.0f32;
        let mut baseline = 0.0f32;
        let mut descent = 0.0f32;
        for item in &items {
            let outer = item.outer_height();
            height = height.max(outer.max(item.line_height.unwrap_or(0.0)));
            if item.vertical_align == VerticalAlign::Baseline {
                let above = item.margin_box_baseline();
                baseline = baseline.max(above);
                descent = descent.max(outer - above);
            }
        }
        height = height.max(baseline + descent);
        LineBox {
            top,
            height,
            baseline,
            used_width,
            items,
        }
    }

    /// Close the last line and return all lines
    pub fn finish(mut self) -> Vec<LineBox> {
        self.break_line();
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(index: usize, width: f32, height: f32) -> LineItem {
        LineItem {
            index,
            x: 0.0,
            width,
            height,
            margin: Edges::default(),
            baseline: None,
            vertical_align: VerticalAlign::Baseline,
            line_height: None,
        }
    }

    #[test]
    fn test_wrap_only_when_line_not_empty() {
        let mut builder = LineBuilder::new(400.0);
        builder.push(item(0, 300.0, 10.0));
        builder.push(item(1, 200.0, 10.0));
        builder.push(item(2, 150.0, 10.0));
        let lines = builder.finish();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].items.len(), 1);
        assert_eq!(lines[1].items.iter().map(|i| i.index).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(lines[1].top, 10.0);
    }

    #[test]
    fn test_oversized_item_stays_on_empty_line() {
        let mut builder = LineBuilder::new(100.0);
        builder.push(item(0, 250.0, 10.0));
        let lines = builder.finish();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].used_width, 250.0);
    }

    #[test]
    fn test_baseline_alignment() {
        let mut builder = LineBuilder::new(400.0);
        builder.push(item(0, 50.0, 40.0));
        builder.push(item(1, 50.0, 20.0));
        let lines = builder.finish();
        let line = &lines[0];
        assert_eq!(line.height, 40.0);
        assert_eq!(line.baseline, 40.0);
        let placed = line.place(400.0, TextAlign::Left);
        // bottoms line up on the shared baseline
        assert_eq!(placed, vec![(0, 0.0, 0.0), (1, 50.0, 20.0)]);
    }

    #[test]
    fn test_vertical_align_modes() {
        let mut builder = LineBuilder::new(400.0);
        builder.push(item(0, 10.0, 40.0));
        for (i, align) in [VerticalAlign::Top, VerticalAlign::Middle, VerticalAlign::Bottom]
            .into_iter()
            .enumerate()
        {
            let mut it = item(i + 1, 10.0, 10.0);
            it.vertical_align = align;
            it.margin = Edges::new(2.0, 0.0, 2.0, 0.0);
            builder.push(it);
        }
        let lines = builder.finish();
        let ys: Vec<f32> = lines[0].place(400.0, TextAlign::Left).iter().map(|p| p.2).collect();
        assert_eq!(ys, vec![0.0, 2.0, 15.0, 28.0]);
    }

    #[test]
    fn test_text_align_shift() {
        let mut builder = LineBuilder::new(100.0);
        builder.push(item(0, 40.0, 10.0));
        let lines = builder.finish();
        assert_eq!(lines[0].place(100.0, TextAlign::Center)[0].1, 30.0);
        assert_eq!(lines[0].place(100.0, TextAlign::Right)[0].1, 60.0);
    }

    #[test]
    fn test_line_height_extends_line() {
        let mut builder = LineBuilder::new(100.0);
        let mut it = item(0, 10.0, 10.0);
        it.line_height = Some(24.0);
        it.vertical_align = VerticalAlign::Middle;
        builder.push(it);
        let lines = builder.finish();
        assert_eq!(lines[0].height, 24.0);
        assert_eq!(lines[0].place(100.0, TextAlign::Left)[0].2, 7.0);
    }
}
