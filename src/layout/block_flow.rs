//! Block-flow layout for one level of the tree
//!
//! Children are processed in document order. Block-level children stack
//! vertically with margin collapsing; runs of inline-block children are
//! packed into line boxes. Out-of-flow children are positioned after the
//! flow is complete and never move the cursor.

use crate::layout::geometry::{ComputedLayout, Edges};
use crate::layout::line_box::{LineBuilder, LineItem};
use crate::layout::margin::{collapse, collapse_pending};
use crate::layout::types::{
    FlowContainer, FlowContext, FlowDisplay, FlowItem, FlowOutput, FlowPosition, ParentInner,
};
use crate::style::clamp_size;

/// Lay out `children` inside `parent`'s content box
pub fn layout(
    parent: &FlowContainer,
    children: &[FlowItem],
    available_width: f32,
    available_height: Option<f32>,
    context: FlowContext,
) -> FlowOutput {
    let origin_x = parent.border.left + parent.padding.left;
    let origin_y = parent.border.top + parent.padding.top;
    let available_width = available_width.max(0.0);

    let mut layouts: Vec<ComputedLayout> = children
        .iter()
        .map(|c| ComputedLayout {
            element_id: c.element_id,
            ..ComputedLayout::default()
        })
        .collect();
    let mut cursor = Cursor::new(parent, context);
    let mut run: Vec<usize> = Vec::new();
    let mut out_of_flow: Vec<(usize, f32)> = Vec::new();
    let mut baseline: Option<f32> = None;

    for (index, item) in children.iter().enumerate() {
        if item.display == FlowDisplay::None {
            continue;
        }
        if item.position.is_out_of_flow() {
            out_of_flow.push((index, cursor.static_y()));
            continue;
        }
        match effective_display(parent, item) {
            FlowDisplay::InlineBlock => run.push(index),
            _ => {
                if !run.is_empty() {
                    let run_baseline = place_run(
                        parent,
                        children,
                        &std::mem::take(&mut run),
                        available_width,
                        &mut cursor,
                        &mut layouts,
                    );
                    baseline = baseline.or(run_baseline);
                }
                let placed = place_block(item, available_width, &mut cursor);
                let layout = &mut layouts[index];
                layout.x = origin_x + placed.x;
                layout.y = origin_y + placed.y;
                layout.width = placed.width;
                layout.height = placed.height;
                layout.margin = placed.margin;
                if baseline.is_none() {
                    baseline = item.baseline.map(|b| layout.y + b);
                }
            }
        }
    }
    if !run.is_empty() {
        let run_baseline = place_run(parent, children, &run, available_width, &mut cursor, &mut layouts);
        baseline = baseline.or(run_baseline);
    }

    let (first_child_margin_top, last_child_margin_bottom) = cursor.close(parent, context);

    for (index, static_y) in out_of_flow {
        place_out_of_flow(
            &children[index],
            &mut layouts[index],
            origin_x,
            origin_y + static_y,
            available_width,
            available_height,
        );
    }

    for (item, layout) in children.iter().zip(layouts.iter_mut()) {
        if item.position == FlowPosition::Relative {
            layout.x += item.inset.left.or(item.inset.right.map(|r| -r)).unwrap_or(0.0);
            layout.y += item.inset.top.or(item.inset.bottom.map(|b| -b)).unwrap_or(0.0);
        }
    }

    FlowOutput {
        layouts,
        first_child_margin_top,
        last_child_margin_bottom,
        content_height: cursor.y,
        baseline,
    }
}

/// Display after blockification by a flex or grid parent
pub fn effective_display(parent: &FlowContainer, item: &FlowItem) -> FlowDisplay {
    match item.display {
        FlowDisplay::InlineBlock
            if parent.inner != ParentInner::Flow && !item.position.is_out_of_flow() =>
        {
            FlowDisplay::Block
        }
        other => other,
    }
}

/// Vertical flow state for block-level children
#[derive(Debug)]
struct Cursor {
    /// Offset from the top of the content box
    y: f32,
    /// Margin waiting to collapse with whatever comes next
    pending: Option<f32>,
    /// Nothing separates the next margin from the parent's top edge
    at_top: bool,
    can_collapse_top: bool,
    first_margin: Option<f32>,
}

impl Cursor {
    fn new(parent: &FlowContainer, context: FlowContext) -> Self {
        Self {
            y: 0.0,
            pending: None,
            at_top: true,
            can_collapse_top: parent.padding.top == 0.0
                && parent.border.top == 0.0
                && !parent.establishes_bfc
                && !context.collapse_blocked,
            first_margin: None,
        }
    }

    fn collapses_into_parent(&self) -> bool {
        self.at_top && self.can_collapse_top
    }

    /// Where a zero-margin in-flow box would start, without consuming the
    /// pending margin
    fn static_y(&self) -> f32 {
        if self.collapses_into_parent() {
            self.y
        } else {
            self.y + collapse_pending(self.pending, 0.0)
        }
    }

    /// Resolve a top margin against the pending one and advance.
    /// Returns the y of the child's border box.
    fn advance_top(&mut self, margin: f32) -> f32 {
        let m = collapse_pending(self.pending.take(), margin);
        if self.collapses_into_parent() {
            self.first_margin = Some(m);
        } else {
            self.y += m;
        }
        self.at_top = false;
        self.y
    }

    /// Commit everything pending before content that blocks collapsing
    fn commit(&mut self) {
        if let Some(pending) = self.pending.take() {
            if self.collapses_into_parent() {
                self.first_margin = Some(pending);
            } else {
                self.y += pending;
            }
        }
        self.at_top = false;
    }

    /// Settle the trailing margin; returns the escaping (top, bottom) margins
    fn close(&mut self, parent: &FlowContainer, context: FlowContext) -> (Option<f32>, Option<f32>) {
        let can_collapse_bottom = parent.padding.bottom == 0.0
            && parent.border.bottom == 0.0
            && !parent.establishes_bfc
            && !context.collapse_blocked
            && parent.height_auto;
        let mut last = None;
        if let Some(pending) = self.pending.take() {
            if self.collapses_into_parent() {
                // Only empty blocks so far: their margins collapse through.
                self.first_margin = Some(pending);
            } else if can_collapse_bottom {
                last = Some(pending);
            } else {
                self.y += pending;
            }
        }
        (self.first_margin, last)
    }
}

struct Placed {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    margin: Edges,
}

fn place_block(item: &FlowItem, available_width: f32, cursor: &mut Cursor) -> Placed {
    let (width, margin_left, margin_right) = block_width(item, available_width);
    let height = used_height(item);
    let margin = Edges::new(item.margin.top, margin_right, item.margin.bottom, margin_left);

    if item.establishes_bfc {
        // Margins of a new formatting context never collapse across it.
        cursor.commit();
        cursor.y += item.margin.top;
        let y = cursor.y;
        cursor.y += height + item.margin.bottom;
        return Placed {
            x: margin_left,
            y,
            width,
            height,
            margin,
        };
    }

    if is_empty_block(item, height) {
        let own = collapse(item.margin.top, item.margin.bottom);
        let y = if cursor.collapses_into_parent() {
            cursor.y
        } else {
            cursor.y + collapse_pending(cursor.pending, item.margin.top)
        };
        cursor.pending = Some(collapse_pending(cursor.pending, own));
        return Placed {
            x: margin_left,
            y,
            width,
            height,
            margin,
        };
    }

    let y = cursor.advance_top(item.margin.top);
    cursor.y += height;
    cursor.pending = Some(item.margin.bottom);
    Placed {
        x: margin_left,
        y,
        width,
        height,
        margin,
    }
}

/// No height, no chrome, no content: the margins collapse through
fn is_empty_block(item: &FlowItem, used_height: f32) -> bool {
    used_height == 0.0
        && item.vertical_chrome() == 0.0
        && item.content_height == 0.0
        && item.min_height.is_none_or(|m| m <= 0.0)
}

fn clamp_width(item: &FlowItem, width: f32) -> f32 {
    clamp_size(width, item.min_width, item.max_width).max(item.horizontal_chrome())
}

/// Border-box height
pub fn used_height(item: &FlowItem) -> f32 {
    let natural = item
        .height
        .unwrap_or(item.content_height + item.vertical_chrome());
    clamp_size(natural, item.min_height, item.max_height).max(item.vertical_chrome())
}

/// Shrink-to-fit border-box width
pub fn shrink_to_fit_width(item: &FlowItem, available_width: f32) -> f32 {
    match item.width {
        Some(width) => clamp_width(item, width),
        None => {
            let preferred = item.content_width + item.horizontal_chrome();
            let room = (available_width - item.margin.horizontal()).max(0.0);
            clamp_width(item, preferred.min(room))
        }
    }
}

/// Border-box width `item` will receive in this level, before its own
/// children are laid out
pub fn used_width(parent: &FlowContainer, item: &FlowItem, available_width: f32) -> f32 {
    let available_width = available_width.max(0.0);
    if item.position.is_out_of_flow() {
        return match (item.width, item.inset.left, item.inset.right) {
            (None, Some(left), Some(right)) => clamp_width(
                item,
                available_width - left - right - item.margin.horizontal(),
            ),
            _ => shrink_to_fit_width(item, available_width),
        };
    }
    match effective_display(parent, item) {
        FlowDisplay::InlineBlock => shrink_to_fit_width(item, available_width),
        FlowDisplay::Block => block_width(item, available_width).0,
        FlowDisplay::None => 0.0,
    }
}

/// Border-box width plus used left/right margins of a block-level child
fn block_width(item: &FlowItem, available_width: f32) -> (f32, f32, f32) {
    let fixed_left = if item.margin_left_auto { 0.0 } else { item.margin.left };
    let fixed_right = if item.margin_right_auto { 0.0 } else { item.margin.right };
    let width = match item.width {
        Some(width) => clamp_width(item, width),
        None => clamp_width(item, available_width - fixed_left - fixed_right),
    };
    let free = (available_width - width - fixed_left - fixed_right).max(0.0);
    match (item.margin_left_auto, item.margin_right_auto) {
        (true, true) => (width, free / 2.0, free / 2.0),
        (true, false) => (width, free, fixed_right),
        (false, true) => (width, fixed_left, free),
        (false, false) => (width, fixed_left, fixed_right),
    }
}

/// Pack a run of inline-blocks into lines; returns the first baseline
fn place_run(
    parent: &FlowContainer,
    children: &[FlowItem],
    run: &[usize],
    available_width: f32,
    cursor: &mut Cursor,
    layouts: &mut [ComputedLayout],
) -> Option<f32> {
    cursor.commit();
    let origin_x = parent.border.left + parent.padding.left;
    let origin_y = parent.border.top + parent.padding.top;

    let mut builder = LineBuilder::new(available_width);
    for &index in run {
        let item = &children[index];
        let mut margin = item.margin;
        if item.margin_left_auto {
            margin.left = 0.0;
        }
        if item.margin_right_auto {
            margin.right = 0.0;
        }
        builder.push(LineItem {
            index,
            x: 0.0,
            width: shrink_to_fit_width(item, available_width),
            height: used_height(item),
            margin,
            baseline: item.baseline,
            vertical_align: item.vertical_align,
            line_height: item.line_height,
        });
    }
    let lines = builder.finish();

    let top = cursor.y;
    let mut baseline = None;
    let mut bottom = top;
    for line in &lines {
        if baseline.is_none() {
            baseline = Some(origin_y + top + line.top + line.baseline);
        }
        for ((index, x, y), item) in line
            .place(available_width, parent.text_align)
            .into_iter()
            .zip(&line.items)
        {
            let layout = &mut layouts[index];
            layout.x = origin_x + x;
            layout.y = origin_y + top + y;
            layout.width = item.width;
            layout.height = item.height;
            layout.margin = item.margin;
        }
        bottom = top + line.top + line.height;
    }
    cursor.y = bottom;
    baseline
}

fn place_out_of_flow(
    item: &FlowItem,
    layout: &mut ComputedLayout,
    origin_x: f32,
    static_y: f32,
    available_width: f32,
    available_height: Option<f32>,
) {
    let inset = item.inset;
    let width = match (item.width, inset.left, inset.right) {
        (None, Some(left), Some(right)) => clamp_width(
            item,
            available_width - left - right - item.margin.horizontal(),
        ),
        _ => shrink_to_fit_width(item, available_width),
    };
    let height = match (item.height, inset.top, inset.bottom, available_height) {
        (None, Some(top), Some(bottom), Some(available)) => {
            let stretched = available - top - bottom - item.margin.vertical();
            clamp_size(stretched, item.min_height, item.max_height).max(item.vertical_chrome())
        }
        _ => used_height(item),
    };
    layout.x = origin_x + item.margin.left + inset.left.unwrap_or(0.0);
    layout.y = static_y + item.margin.top + inset.top.unwrap_or(0.0);
    layout.width = width;
    layout.height = height;
    layout.margin = item.margin;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::types::Insets;
    use crate::style::TextAlign;
    use pretty_assertions::assert_eq;

    fn block(id: u64, height: f32, margin_top: f32, margin_bottom: f32) -> FlowItem {
        FlowItem::new(id)
            .with_size(None, Some(height))
            .with_margin(Edges::new(margin_top, 0.0, margin_bottom, 0.0))
    }

    fn run(children: &[FlowItem]) -> FlowOutput {
        layout(
            &FlowContainer::default(),
            children,
            400.0,
            None,
            FlowContext::default(),
        )
    }

    #[test]
    fn test_sibling_margins_collapse() {
        let out = run(&[block(1, 100.0, 0.0, 20.0), block(2, 100.0, 30.0, 0.0)]);
        assert_eq!(out.layouts[1].y, 130.0);
        assert_eq!(out.layouts[0].width, 400.0);
        assert_eq!(out.content_height, 230.0);
    }

    #[test]
    fn test_negative_and_mixed_margins() {
        let out = run(&[block(1, 100.0, 0.0, -20.0), block(2, 100.0, -30.0, 0.0)]);
        assert_eq!(out.layouts[1].y, 70.0);
        let out = run(&[block(1, 100.0, 0.0, 20.0), block(2, 100.0, -30.0, 0.0)]);
        assert_eq!(out.layouts[1].y, 90.0);
    }

    #[test]
    fn test_empty_block_collapses_through() {
        let out = run(&[
            block(1, 100.0, 0.0, 0.0),
            block(2, 0.0, 20.0, 30.0),
            block(3, 100.0, 10.0, 0.0),
        ]);
        assert_eq!(out.layouts[2].y, 130.0);
    }

    #[test]
    fn test_bfc_child_does_not_collapse() {
        let mut bfc = block(2, 50.0, 0.0, 0.0);
        bfc.establishes_bfc = true;
        let out = run(&[block(1, 100.0, 0.0, 20.0), bfc, block(3, 100.0, 30.0, 0.0)]);
        assert_eq!(out.layouts[1].y, 120.0);
        assert_eq!(out.layouts[2].y, 200.0);
    }

    #[test]
    fn test_first_and_last_margins_escape() {
        let out = run(&[block(1, 10.0, 15.0, 0.0), block(2, 10.0, 0.0, 25.0)]);
        assert_eq!(out.first_child_margin_top, Some(15.0));
        assert_eq!(out.last_child_margin_bottom, None);
        assert_eq!(out.layouts[0].y, 0.0);
        // height_auto defaults to false, so the bottom margin stays inside
        assert_eq!(out.content_height, 45.0);

        let parent = FlowContainer {
            height_auto: true,
            ..FlowContainer::default()
        };
        let out = layout(
            &parent,
            &[block(1, 10.0, 15.0, 25.0)],
            400.0,
            None,
            FlowContext::default(),
        );
        assert_eq!(out.last_child_margin_bottom, Some(25.0));
        assert_eq!(out.content_height, 10.0);
    }

    #[test]
    fn test_padding_or_bfc_blocks_escape() {
        let padded = FlowContainer {
            padding: Edges::new(5.0, 0.0, 0.0, 0.0),
            ..FlowContainer::default()
        };
        let out = layout(&padded, &[block(1, 10.0, 15.0, 0.0)], 400.0, None, FlowContext::default());
        assert_eq!(out.first_child_margin_top, None);
        assert_eq!(out.layouts[0].y, 20.0);

        let blocked = FlowContext {
            collapse_blocked: true,
        };
        let out = layout(
            &FlowContainer::default(),
            &[block(1, 10.0, 15.0, 0.0)],
            400.0,
            None,
            blocked,
        );
        assert_eq!(out.first_child_margin_top, None);
        assert_eq!(out.layouts[0].y, 15.0);
    }

    #[test]
    fn test_inline_block_wrap() {
        let items: Vec<FlowItem> = [300.0, 200.0, 150.0]
            .iter()
            .enumerate()
            .map(|(i, w)| FlowItem::inline_block(i as u64).with_size(Some(*w), Some(20.0)))
            .collect();
        let out = run(&items);
        assert_eq!((out.layouts[0].x, out.layouts[0].y), (0.0, 0.0));
        assert_eq!((out.layouts[1].x, out.layouts[1].y), (0.0, 20.0));
        assert_eq!((out.layouts[2].x, out.layouts[2].y), (200.0, 20.0));
        assert_eq!(out.content_height, 40.0);
        assert_eq!(out.baseline, Some(20.0));
    }

    #[test]
    fn test_blockification_under_flex_parent() {
        let parent = FlowContainer {
            inner: ParentInner::Flex,
            ..FlowContainer::default()
        };
        let items = vec![
            FlowItem::inline_block(1).with_size(Some(100.0), Some(20.0)),
            FlowItem::inline_block(2).with_size(Some(100.0), Some(20.0)),
        ];
        let out = layout(&parent, &items, 400.0, None, FlowContext::default());
        assert_eq!(out.layouts[1].x, 0.0);
        assert_eq!(out.layouts[1].y, 20.0);
    }

    #[test]
    fn test_shrink_to_fit_and_text_align() {
        let parent = FlowContainer {
            text_align: TextAlign::Center,
            ..FlowContainer::default()
        };
        let mut item = FlowItem::inline_block(1);
        item.content_width = 100.0;
        item.content_height = 20.0;
        item.padding = Edges::uniform(10.0);
        let out = layout(&parent, &[item], 400.0, None, FlowContext::default());
        assert_eq!(out.layouts[0].width, 120.0);
        assert_eq!(out.layouts[0].height, 40.0);
        assert_eq!(out.layouts[0].x, 140.0);
    }

    #[test]
    fn test_auto_margins_center_block() {
        let mut item = block(1, 10.0, 0.0, 0.0);
        item.width = Some(200.0);
        item.margin_left_auto = true;
        item.margin_right_auto = true;
        let out = run(&[item]);
        assert_eq!(out.layouts[0].x, 100.0);
        assert_eq!(out.layouts[0].margin.left, 100.0);
    }

    #[test]
    fn test_out_of_flow_and_hidden_children() {
        let mut abs = FlowItem::new(2).with_size(Some(50.0), Some(50.0));
        abs.position = FlowPosition::Absolute;
        abs.inset = Insets {
            top: Some(5.0),
            left: Some(7.0),
            ..Insets::default()
        };
        let mut hidden = block(3, 40.0, 10.0, 10.0);
        hidden.display = FlowDisplay::None;
        let out = run(&[block(1, 100.0, 0.0, 0.0), abs, hidden, block(4, 10.0, 0.0, 0.0)]);
        assert_eq!((out.layouts[1].x, out.layouts[1].y), (7.0, 105.0));
        assert_eq!(out.layouts[2], ComputedLayout {
            element_id: 3,
            ..ComputedLayout::default()
        });
        assert_eq!(out.layouts[3].y, 100.0);
    }

    #[test]
    fn test_out_of_flow_static_position_includes_pending_margin() {
        let mut abs = FlowItem::new(2).with_size(Some(20.0), Some(20.0));
        abs.position = FlowPosition::Absolute;
        let out = run(&[block(1, 100.0, 0.0, 20.0), abs, block(3, 10.0, 5.0, 0.0)]);
        assert_eq!(out.layouts[1].y, 120.0);
        assert_eq!(out.layouts[2].y, 120.0);

        let mut abs = FlowItem::new(2).with_size(Some(20.0), Some(20.0));
        abs.position = FlowPosition::Absolute;
        let out = run(&[block(1, 100.0, 0.0, -10.0), abs]);
        assert_eq!(out.layouts[1].y, 90.0);
    }

    #[test]
    fn test_relative_offset_keeps_flow() {
        let mut rel = block(1, 10.0, 0.0, 0.0);
        rel.position = FlowPosition::Relative;
        rel.inset.top = Some(5.0);
        let out = run(&[rel, block(2, 10.0, 0.0, 0.0)]);
        assert_eq!(out.layouts[0].y, 5.0);
        assert_eq!(out.layouts[1].y, 10.0);
    }

    #[test]
    fn test_min_max_clamp_width() {
        let mut item = block(1, 10.0, 0.0, 0.0);
        item.max_width = Some(150.0);
        let out = run(&[item]);
        assert_eq!(out.layouts[0].width, 150.0);
    }
}
