//! Acceleration module backed by taffy
//!
//! Styles arrive only as encoded payloads and are converted from
//! [`EngineStyle`] into `taffy::Style`. Handles index an arena of taffy
//! node ids; removed slots stay empty so a handle is never issued twice.

use taffy::prelude::*;

use super::module::{AccelerationModule, AvailableSize, NodeGeometry};
use super::style::{
    BoxSizing, ContentAlign, Dim, EngineDisplay, EngineStyle, FieldId, FlexDirection, FlexWrap,
    GridAutoFlow, ItemAlign, Overflow, Placement, Position, TrackSize, BORDER_FIELDS,
    INSET_FIELDS, MARGIN_FIELDS, PADDING_FIELDS,
};
use super::{decode_payload, decode_single, NodeHandle, StylePayload};
use crate::layout::geometry::Edges;
use crate::layout::records;
use crate::utils::{LayoutError, Result};

/// The shipped [`AccelerationModule`]
pub struct TaffyModule {
    taffy: TaffyTree<()>,
    nodes: Vec<Option<NodeId>>,
}

impl TaffyModule {
    pub fn new() -> Self {
        Self {
            taffy: TaffyTree::new(),
            nodes: Vec::new(),
        }
    }

    /// Number of live nodes
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    fn node(&self, handle: NodeHandle) -> Result<NodeId> {
        self.nodes
            .get(handle.0 as usize)
            .copied()
            .flatten()
            .ok_or(LayoutError::StaleHandle(handle))
    }

    fn issue(&mut self, node: NodeId) -> NodeHandle {
        let handle = NodeHandle(self.nodes.len() as u32);
        self.nodes.push(Some(node));
        handle
    }
}

impl Default for TaffyModule {
    fn default() -> Self {
        Self::new()
    }
}

impl AccelerationModule for TaffyModule {
    fn name(&self) -> &'static str {
        "taffy"
    }

    fn probe(&mut self) -> Result<()> {
        Ok(())
    }

    fn build_tree(&mut self, payload: &StylePayload) -> Result<Vec<NodeHandle>> {
        let batch = decode_payload(payload)?;
        let mut created: Vec<NodeId> = Vec::with_capacity(batch.nodes.len());
        let mut handles = Vec::with_capacity(batch.nodes.len());
        for node in &batch.nodes {
            let children: Vec<NodeId> = node.children.iter().map(|&c| created[c]).collect();
            let id = self
                .taffy
                .new_with_children(to_taffy_style(&node.style), &children)?;
            created.push(id);
            handles.push(self.issue(id));
        }
        Ok(handles)
    }

    fn create_node(&mut self, payload: &StylePayload) -> Result<NodeHandle> {
        let style = decode_single(payload)?;
        let id = self.taffy.new_leaf(to_taffy_style(&style))?;
        Ok(self.issue(id))
    }

    fn update_style(&mut self, node: NodeHandle, payload: &StylePayload) -> Result<()> {
        let id = self.node(node)?;
        let style = decode_single(payload)?;
        self.taffy.set_style(id, to_taffy_style(&style))?;
        Ok(())
    }

    fn set_children(&mut self, node: NodeHandle, children: &[NodeHandle]) -> Result<()> {
        let id = self.node(node)?;
        let children = children
            .iter()
            .map(|&c| self.node(c))
            .collect::<Result<Vec<_>>>()?;
        self.taffy.set_children(id, &children)?;
        Ok(())
    }

    fn remove_node(&mut self, node: NodeHandle) -> Result<()> {
        let id = self.node(node)?;
        self.taffy.remove(id)?;
        self.nodes[node.0 as usize] = None;
        Ok(())
    }

    fn clear(&mut self) {
        self.taffy.clear();
        for slot in &mut self.nodes {
            *slot = None;
        }
    }

    fn compute_layout(&mut self, root: NodeHandle, available: AvailableSize) -> Result<()> {
        let id = self.node(root)?;
        let space = |v: Option<f32>| v.map_or(AvailableSpace::MaxContent, AvailableSpace::Definite);
        self.taffy.compute_layout(
            id,
            Size {
                width: space(available.width),
                height: space(available.height),
            },
        )?;
        Ok(())
    }

    fn layout(&self, node: NodeHandle) -> Result<NodeGeometry> {
        let layout = self.taffy.layout(self.node(node)?)?;
        Ok(NodeGeometry {
            x: layout.location.x,
            y: layout.location.y,
            width: layout.size.width,
            height: layout.size.height,
            margin: Edges::new(
                layout.margin.top,
                layout.margin.right,
                layout.margin.bottom,
                layout.margin.left,
            ),
        })
    }

    fn layouts_batch(&self, nodes: &[NodeHandle]) -> Result<Vec<NodeGeometry>> {
        nodes.iter().map(|&n| self.layout(n)).collect()
    }

    fn block_layout(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        let level = records::decode_level(input)?;
        Ok(records::encode_output(&level.run()))
    }
}

fn dimension(dim: Dim) -> Dimension {
    match dim {
        Dim::Auto => Dimension::AUTO,
        Dim::Length(px) => Dimension::length(px),
        Dim::Percent(frac) => Dimension::percent(frac),
    }
}

fn length_percentage_auto(dim: Dim) -> LengthPercentageAuto {
    match dim {
        Dim::Auto => LengthPercentageAuto::AUTO,
        Dim::Length(px) => LengthPercentageAuto::length(px),
        Dim::Percent(frac) => LengthPercentageAuto::percent(frac),
    }
}

fn length_percentage(dim: Dim) -> LengthPercentage {
    match dim {
        Dim::Auto => LengthPercentage::length(0.0),
        Dim::Length(px) => LengthPercentage::length(px),
        Dim::Percent(frac) => LengthPercentage::percent(frac),
    }
}

fn content_align(code: Option<u8>) -> Option<taffy::AlignContent> {
    Some(match ContentAlign::from_code(code?)? {
        ContentAlign::Start => taffy::AlignContent::Start,
        ContentAlign::End => taffy::AlignContent::End,
        ContentAlign::FlexStart => taffy::AlignContent::FlexStart,
        ContentAlign::FlexEnd => taffy::AlignContent::FlexEnd,
        ContentAlign::Center => taffy::AlignContent::Center,
        ContentAlign::Stretch => taffy::AlignContent::Stretch,
        ContentAlign::SpaceBetween => taffy::AlignContent::SpaceBetween,
        ContentAlign::SpaceEvenly => taffy::AlignContent::SpaceEvenly,
        ContentAlign::SpaceAround => taffy::AlignContent::SpaceAround,
    })
}

fn item_align(code: Option<u8>) -> Option<taffy::AlignItems> {
    Some(match ItemAlign::from_code(code?)? {
        ItemAlign::Start => taffy::AlignItems::Start,
        ItemAlign::End => taffy::AlignItems::End,
        ItemAlign::FlexStart => taffy::AlignItems::FlexStart,
        ItemAlign::FlexEnd => taffy::AlignItems::FlexEnd,
        ItemAlign::Center => taffy::AlignItems::Center,
        ItemAlign::Baseline => taffy::AlignItems::Baseline,
        ItemAlign::Stretch => taffy::AlignItems::Stretch,
    })
}

fn overflow(value: Overflow) -> taffy::Overflow {
    match value {
        Overflow::Visible => taffy::Overflow::Visible,
        Overflow::Clip => taffy::Overflow::Clip,
        Overflow::Hidden => taffy::Overflow::Hidden,
        Overflow::Scroll => taffy::Overflow::Scroll,
    }
}

fn placement(value: Placement) -> taffy::GridPlacement {
    match value {
        Placement::Line(n) if n != 0 => taffy::style_helpers::line(n),
        Placement::Span(n) if n > 0 => taffy::style_helpers::span(n as u16),
        _ => taffy::GridPlacement::Auto,
    }
}

fn track(value: TrackSize) -> taffy::TrackSizingFunction {
    match value {
        TrackSize::Length(px) => taffy::MinMax {
            min: taffy::MinTrackSizingFunction::from(LengthPercentage::length(px)),
            max: taffy::MaxTrackSizingFunction::from(LengthPercentage::length(px)),
        },
        TrackSize::Percent(frac) => taffy::MinMax {
            min: taffy::MinTrackSizingFunction::from(LengthPercentage::percent(frac)),
            max: taffy::MaxTrackSizingFunction::from(LengthPercentage::percent(frac)),
        },
        TrackSize::Fr(fr) => taffy::MinMax {
            min: taffy::MinTrackSizingFunction::AUTO,
            max: taffy::MaxTrackSizingFunction::from_fr(fr),
        },
        TrackSize::Auto => taffy::MinMax {
            min: taffy::MinTrackSizingFunction::AUTO,
            max: taffy::MaxTrackSizingFunction::AUTO,
        },
        TrackSize::MinContent => taffy::MinMax {
            min: taffy::MinTrackSizingFunction::MIN_CONTENT,
            max: taffy::MaxTrackSizingFunction::MIN_CONTENT,
        },
        TrackSize::MaxContent => taffy::MinMax {
            min: taffy::MinTrackSizingFunction::MAX_CONTENT,
            max: taffy::MaxTrackSizingFunction::MAX_CONTENT,
        },
    }
}

fn edges<T>(fields: [FieldId; 4], value: impl Fn(FieldId) -> T) -> taffy::Rect<T> {
    taffy::Rect {
        top: value(fields[0]),
        right: value(fields[1]),
        bottom: value(fields[2]),
        left: value(fields[3]),
    }
}

/// Convert the canonical style record into taffy's style
pub fn to_taffy_style(style: &EngineStyle) -> Style {
    let keyword = |field| style.keyword(field);
    Style {
        display: match style.display() {
            EngineDisplay::Block => Display::Block,
            EngineDisplay::Flex => Display::Flex,
            EngineDisplay::Grid => Display::Grid,
            EngineDisplay::None => Display::None,
        },
        box_sizing: match style.box_sizing() {
            BoxSizing::BorderBox => taffy::BoxSizing::BorderBox,
            BoxSizing::ContentBox => taffy::BoxSizing::ContentBox,
        },
        position: match style.position() {
            Position::Relative => taffy::Position::Relative,
            Position::Absolute => taffy::Position::Absolute,
        },
        overflow: taffy::Point {
            x: overflow(style.overflow(FieldId::OverflowX)),
            y: overflow(style.overflow(FieldId::OverflowY)),
        },
        flex_direction: match keyword(FieldId::FlexDirection).and_then(FlexDirection::from_code) {
            Some(FlexDirection::Column) => taffy::FlexDirection::Column,
            Some(FlexDirection::RowReverse) => taffy::FlexDirection::RowReverse,
            Some(FlexDirection::ColumnReverse) => taffy::FlexDirection::ColumnReverse,
            Some(FlexDirection::Row) | None => taffy::FlexDirection::Row,
        },
        flex_wrap: match keyword(FieldId::FlexWrap).and_then(FlexWrap::from_code) {
            Some(FlexWrap::Wrap) => taffy::FlexWrap::Wrap,
            Some(FlexWrap::WrapReverse) => taffy::FlexWrap::WrapReverse,
            Some(FlexWrap::NoWrap) | None => taffy::FlexWrap::NoWrap,
        },
        justify_content: content_align(keyword(FieldId::JustifyContent)),
        align_content: content_align(keyword(FieldId::AlignContent)),
        align_items: item_align(keyword(FieldId::AlignItems)),
        align_self: item_align(keyword(FieldId::AlignSelf)),
        justify_items: item_align(keyword(FieldId::JustifyItems)),
        grid_auto_flow: match keyword(FieldId::GridAutoFlow).and_then(GridAutoFlow::from_code) {
            Some(GridAutoFlow::Column) => taffy::GridAutoFlow::Column,
            Some(GridAutoFlow::RowDense) => taffy::GridAutoFlow::RowDense,
            Some(GridAutoFlow::ColumnDense) => taffy::GridAutoFlow::ColumnDense,
            Some(GridAutoFlow::Row) | None => taffy::GridAutoFlow::Row,
        },
        flex_grow: style.float(FieldId::FlexGrow).unwrap_or(0.0),
        flex_shrink: style.float(FieldId::FlexShrink).unwrap_or(1.0),
        aspect_ratio: style.float(FieldId::AspectRatio),
        flex_basis: dimension(style.dim(FieldId::FlexBasis)),
        size: Size {
            width: dimension(style.dim(FieldId::Width)),
            height: dimension(style.dim(FieldId::Height)),
        },
        min_size: Size {
            width: dimension(style.dim(FieldId::MinWidth)),
            height: dimension(style.dim(FieldId::MinHeight)),
        },
        max_size: Size {
            width: dimension(style.dim(FieldId::MaxWidth)),
            height: dimension(style.dim(FieldId::MaxHeight)),
        },
        // An unset margin is zero; an unset inset is auto.
        margin: edges(MARGIN_FIELDS, |f| {
            if style.is_set(f) {
                length_percentage_auto(style.dim(f))
            } else {
                LengthPercentageAuto::length(0.0)
            }
        }),
        inset: edges(INSET_FIELDS, |f| length_percentage_auto(style.dim(f))),
        padding: edges(PADDING_FIELDS, |f| length_percentage(style.length_percentage(f))),
        border: edges(BORDER_FIELDS, |f| length_percentage(style.length_percentage(f))),
        gap: Size {
            width: length_percentage(style.length_percentage(FieldId::ColumnGap)),
            height: length_percentage(style.length_percentage(FieldId::RowGap)),
        },
        grid_row: taffy::Line {
            start: placement(style.placement(FieldId::GridRowStart)),
            end: placement(style.placement(FieldId::GridRowEnd)),
        },
        grid_column: taffy::Line {
            start: placement(style.placement(FieldId::GridColumnStart)),
            end: placement(style.placement(FieldId::GridColumnEnd)),
        },
        grid_template_rows: style
            .grid_template_rows
            .iter()
            .map(|&t| taffy::GridTemplateComponent::Single(track(t)))
            .collect(),
        grid_template_columns: style
            .grid_template_columns
            .iter()
            .map(|&t| taffy::GridTemplateComponent::Single(track(t)))
            .collect(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::style::Dim;
    use crate::bridge::{encode_batch, BatchNode, StyleBatch};
    use crate::utils::WireEncoding;

    fn sized(width: f32, height: f32) -> EngineStyle {
        let mut style = EngineStyle::new();
        style.set_dim(FieldId::Width, Dim::Length(width));
        style.set_dim(FieldId::Height, Dim::Length(height));
        style
    }

    fn build(module: &mut TaffyModule, batch: &StyleBatch) -> Vec<NodeHandle> {
        let payload = encode_batch(WireEncoding::Binary, batch).unwrap();
        module.build_tree(&payload).unwrap()
    }

    #[test]
    fn test_flex_row() {
        let mut root = EngineStyle::new();
        root.set_display(EngineDisplay::Flex);
        root.set_dim(FieldId::Width, Dim::Length(300.0));
        root.set_dim(FieldId::ColumnGap, Dim::Length(10.0));
        let batch = StyleBatch {
            nodes: vec![
                BatchNode::leaf(sized(50.0, 20.0)),
                BatchNode::leaf(sized(60.0, 20.0)),
                BatchNode {
                    style: root,
                    children: vec![0, 1],
                },
            ],
        };
        let mut module = TaffyModule::new();
        let handles = build(&mut module, &batch);
        module
            .compute_layout(handles[2], AvailableSize::definite(800.0, 600.0))
            .unwrap();
        let geometry = module.layouts_batch(&handles).unwrap();
        assert_eq!(geometry[0].x, 0.0);
        assert_eq!(geometry[1].x, 60.0);
        assert_eq!(geometry[2].width, 300.0);
    }

    #[test]
    fn test_block_margins_default_to_zero() {
        let mut root = EngineStyle::new();
        root.set_dim(FieldId::Width, Dim::Length(200.0));
        let mut second = sized(10.0, 10.0);
        second.set_dim(FieldId::MarginTop, Dim::Length(5.0));
        let batch = StyleBatch {
            nodes: vec![
                BatchNode::leaf(sized(10.0, 30.0)),
                BatchNode::leaf(second),
                BatchNode {
                    style: root,
                    children: vec![0, 1],
                },
            ],
        };
        let mut module = TaffyModule::new();
        let handles = build(&mut module, &batch);
        module
            .compute_layout(handles[2], AvailableSize::default())
            .unwrap();
        assert_eq!(module.layout(handles[1]).unwrap().y, 35.0);
    }

    #[test]
    fn test_grid_tracks_and_placement() {
        let mut root = EngineStyle::new();
        root.set_display(EngineDisplay::Grid);
        root.set_dim(FieldId::Width, Dim::Length(300.0));
        root.grid_template_columns = vec![TrackSize::Length(100.0), TrackSize::Fr(1.0)];
        let mut child = EngineStyle::new();
        child.set_placement(FieldId::GridColumnStart, Placement::Line(2));
        let batch = StyleBatch {
            nodes: vec![
                BatchNode::leaf(child),
                BatchNode {
                    style: root,
                    children: vec![0],
                },
            ],
        };
        let mut module = TaffyModule::new();
        let handles = build(&mut module, &batch);
        module
            .compute_layout(handles[1], AvailableSize::definite(300.0, 300.0))
            .unwrap();
        let child = module.layout(handles[0]).unwrap();
        assert_eq!(child.x, 100.0);
        assert_eq!(child.width, 200.0);
    }

    #[test]
    fn test_handles_are_never_reused() {
        let mut module = TaffyModule::new();
        let payload = encode_batch(WireEncoding::Textual, &StyleBatch::single(sized(1.0, 1.0))).unwrap();
        let a = module.create_node(&payload).unwrap();
        module.remove_node(a).unwrap();
        let b = module.create_node(&payload).unwrap();
        assert_ne!(a, b);
        assert!(matches!(module.layout(a), Err(LayoutError::StaleHandle(_))));
        module.clear();
        assert_eq!(module.node_count(), 0);
        assert!(module.layout(b).is_err());
    }

    #[test]
    fn test_update_style_relayouts() {
        let mut module = TaffyModule::new();
        let handle = module
            .create_node(&encode_batch(WireEncoding::Binary, &StyleBatch::single(sized(10.0, 10.0))).unwrap())
            .unwrap();
        module
            .update_style(
                handle,
                &encode_batch(WireEncoding::Binary, &StyleBatch::single(sized(40.0, 10.0))).unwrap(),
            )
            .unwrap();
        module.compute_layout(handle, AvailableSize::default()).unwrap();
        assert_eq!(module.layout(handle).unwrap().width, 40.0);
    }

    #[test]
    fn test_single_payload_must_hold_one_node() {
        let mut module = TaffyModule::new();
        let payload = encode_batch(
            WireEncoding::Binary,
            &StyleBatch {
                nodes: vec![BatchNode::default(), BatchNode::default()],
            },
        )
        .unwrap();
        assert!(module.create_node(&payload).is_err());
    }
}
