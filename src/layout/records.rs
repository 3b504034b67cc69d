//! Flat numeric records for the accelerated block-flow path
//!
//! One level is flattened into a single `Vec<f32>`: a container header of
//! [`CONTAINER_STRIDE`] floats followed by one [`ITEM_STRIDE`] record per
//! child. Optional values use NaN for "none"; enums use their index.
//! Element ids do not cross the boundary; results come back in child order.

use crate::document::ElementId;
use crate::layout::geometry::{ComputedLayout, Edges};
use crate::layout::types::{
    FlowContainer, FlowContext, FlowDisplay, FlowItem, FlowOutput, FlowPosition, Insets,
    ParentInner, VerticalAlign,
};
use crate::style::TextAlign;
use crate::utils::WireError;

pub const CONTAINER_STRIDE: usize = 16;
pub const ITEM_STRIDE: usize = 31;
pub const OUTPUT_STRIDE: usize = 8;
pub const OUTPUT_TRAILER: usize = 4;

/// One decoded level, ready to run
#[derive(Debug, Clone, PartialEq)]
pub struct LevelInput {
    pub parent: FlowContainer,
    pub children: Vec<FlowItem>,
    pub available_width: f32,
    pub available_height: Option<f32>,
    pub context: FlowContext,
}

impl LevelInput {
    pub fn run(&self) -> FlowOutput {
        super::block_flow::layout(
            &self.parent,
            &self.children,
            self.available_width,
            self.available_height,
            self.context,
        )
    }
}

fn opt(value: Option<f32>) -> f32 {
    value.unwrap_or(f32::NAN)
}

fn from_opt(value: f32) -> Option<f32> {
    (!value.is_nan()).then_some(value)
}

fn flag(value: bool) -> f32 {
    if value { 1.0 } else { 0.0 }
}

fn push_edges(out: &mut Vec<f32>, edges: &Edges) {
    out.extend_from_slice(&[edges.top, edges.right, edges.bottom, edges.left]);
}

fn edges_at(values: &[f32], at: usize) -> Edges {
    Edges::new(values[at], values[at + 1], values[at + 2], values[at + 3])
}

fn code(field: &'static str, value: f32, count: u8) -> Result<u8, WireError> {
    let code = value as u8;
    if value.fract() != 0.0 || value < 0.0 || code >= count {
        return Err(WireError::UnknownEnum {
            field,
            code: value as u8,
        });
    }
    Ok(code)
}

/// Flatten one level
pub fn encode_level(
    parent: &FlowContainer,
    children: &[FlowItem],
    available_width: f32,
    available_height: Option<f32>,
    context: FlowContext,
) -> Vec<f32> {
    let mut out = Vec::with_capacity(CONTAINER_STRIDE + children.len() * ITEM_STRIDE);
    push_edges(&mut out, &parent.padding);
    push_edges(&mut out, &parent.border);
    out.push(flag(parent.establishes_bfc));
    out.push(flag(parent.height_auto));
    out.push(match parent.inner {
        ParentInner::Flow => 0.0,
        ParentInner::Flex => 1.0,
        ParentInner::Grid => 2.0,
    });
    out.push(match parent.text_align {
        TextAlign::Left => 0.0,
        TextAlign::Center => 1.0,
        TextAlign::Right => 2.0,
        TextAlign::Justify => 3.0,
    });
    out.push(available_width);
    out.push(opt(available_height));
    out.push(flag(context.collapse_blocked));
    out.push(children.len() as f32);

    for item in children {
        out.push(match item.display {
            FlowDisplay::Block => 0.0,
            FlowDisplay::InlineBlock => 1.0,
            FlowDisplay::None => 2.0,
        });
        out.push(match item.position {
            FlowPosition::Static => 0.0,
            FlowPosition::Relative => 1.0,
            FlowPosition::Absolute => 2.0,
            FlowPosition::Fixed => 3.0,
        });
        out.push(flag(item.establishes_bfc));
        out.extend_from_slice(&[
            opt(item.width),
            opt(item.height),
            opt(item.min_width),
            opt(item.max_width),
            opt(item.min_height),
            opt(item.max_height),
        ]);
        push_edges(&mut out, &item.margin);
        out.push(flag(item.margin_left_auto) + 2.0 * flag(item.margin_right_auto));
        push_edges(&mut out, &item.padding);
        push_edges(&mut out, &item.border);
        out.extend_from_slice(&[
            opt(item.inset.top),
            opt(item.inset.right),
            opt(item.inset.bottom),
            opt(item.inset.left),
        ]);
        out.push(item.content_width);
        out.push(item.content_height);
        out.push(opt(item.baseline));
        out.push(match item.vertical_align {
            VerticalAlign::Baseline => 0.0,
            VerticalAlign::Top => 1.0,
            VerticalAlign::Middle => 2.0,
            VerticalAlign::Bottom => 3.0,
        });
        out.push(opt(item.line_height));
    }
    out
}

/// Rebuild a level from its flat form. Child ids are their indices.
pub fn decode_level(values: &[f32]) -> Result<LevelInput, WireError> {
    if values.len() < CONTAINER_STRIDE {
        return Err(WireError::Truncated {
            offset: values.len(),
            needed: CONTAINER_STRIDE - values.len(),
        });
    }
    let body = values.len() - CONTAINER_STRIDE;
    if body % ITEM_STRIDE != 0 {
        return Err(WireError::RecordStride {
            len: values.len(),
            stride: ITEM_STRIDE,
        });
    }
    let count = body / ITEM_STRIDE;
    if values[15] != count as f32 {
        return Err(WireError::NodeCount {
            expected: values[15] as usize,
            found: count,
        });
    }

    let parent = FlowContainer {
        padding: edges_at(values, 0),
        border: edges_at(values, 4),
        establishes_bfc: values[8] != 0.0,
        height_auto: values[9] != 0.0,
        inner: match code("inner", values[10], 3)? {
            0 => ParentInner::Flow,
            1 => ParentInner::Flex,
            _ => ParentInner::Grid,
        },
        text_align: match code("textAlign", values[11], 4)? {
            0 => TextAlign::Left,
            1 => TextAlign::Center,
            2 => TextAlign::Right,
            _ => TextAlign::Justify,
        },
    };
    let available_width = values[12];
    let available_height = from_opt(values[13]);
    let context = FlowContext {
        collapse_blocked: values[14] != 0.0,
    };

    let mut children = Vec::with_capacity(count);
    for (index, r) in values[CONTAINER_STRIDE..].chunks_exact(ITEM_STRIDE).enumerate() {
        let auto_flags = code("marginAuto", r[13], 4)?;
        children.push(FlowItem {
            element_id: index as ElementId,
            display: match code("display", r[0], 3)? {
                0 => FlowDisplay::Block,
                1 => FlowDisplay::InlineBlock,
                _ => FlowDisplay::None,
            },
            position: match code("position", r[1], 4)? {
                0 => FlowPosition::Static,
                1 => FlowPosition::Relative,
                2 => FlowPosition::Absolute,
                _ => FlowPosition::Fixed,
            },
            establishes_bfc: r[2] != 0.0,
            width: from_opt(r[3]),
            height: from_opt(r[4]),
            min_width: from_opt(r[5]),
            max_width: from_opt(r[6]),
            min_height: from_opt(r[7]),
            max_height: from_opt(r[8]),
            margin: edges_at(r, 9),
            margin_left_auto: auto_flags & 1 != 0,
            margin_right_auto: auto_flags & 2 != 0,
            padding: edges_at(r, 14),
            border: edges_at(r, 18),
            inset: Insets {
                top: from_opt(r[22]),
                right: from_opt(r[23]),
                bottom: from_opt(r[24]),
                left: from_opt(r[25]),
            },
            content_width: r[26],
            content_height: r[27],
            baseline: from_opt(r[28]),
            vertical_align: match code("verticalAlign", r[29], 4)? {
                0 => VerticalAlign::Baseline,
                1 => VerticalAlign::Top,
                2 => VerticalAlign::Middle,
                _ => VerticalAlign::Bottom,
            },
            line_height: from_opt(r[30]),
        });
    }

    Ok(LevelInput {
        parent,
        children,
        available_width,
        available_height,
        context,
    })
}

/// Flatten a level result
pub fn encode_output(output: &FlowOutput) -> Vec<f32> {
    let mut out = Vec::with_capacity(output.layouts.len() * OUTPUT_STRIDE + OUTPUT_TRAILER);
    for layout in &output.layouts {
        out.extend_from_slice(&[layout.x, layout.y, layout.width, layout.height]);
        push_edges(&mut out, &layout.margin);
    }
    out.push(opt(output.first_child_margin_top));
    out.push(opt(output.last_child_margin_bottom));
    out.push(output.content_height);
    out.push(opt(output.baseline));
    out
}

/// Rebuild a level result, attaching the caller's element ids in order
pub fn decode_output(values: &[f32], ids: &[ElementId]) -> Result<FlowOutput, WireError> {
    let expected = ids.len() * OUTPUT_STRIDE + OUTPUT_TRAILER;
    if values.len() != expected {
        return Err(WireError::NodeCount {
            expected: ids.len(),
            found: values.len().saturating_sub(OUTPUT_TRAILER) / OUTPUT_STRIDE,
        });
    }
    let (body, trailer) = values.split_at(ids.len() * OUTPUT_STRIDE);
    let layouts = body
        .chunks_exact(OUTPUT_STRIDE)
        .zip(ids)
        .map(|(r, &element_id)| ComputedLayout {
            element_id,
            x: r[0],
            y: r[1],
            width: r[2],
            height: r[3],
            margin: edges_at(r, 4),
        })
        .collect();
    Ok(FlowOutput {
        layouts,
        first_child_margin_top: from_opt(trailer[0]),
        last_child_margin_bottom: from_opt(trailer[1]),
        content_height: trailer[2],
        baseline: from_opt(trailer[3]),
    })
}
