//! Whole-tree layout on the block-flow engine
//!
//! Each child's subtree is laid out at the width the child will receive
//! before the child's own level is placed, so auto heights, baselines and
//! escaping margins are known when the level stacks. Flex containers stack
//! their children as blocks. Grid containers do the same until the
//! scheduler holds a precise result for their exact inputs.

use std::collections::HashMap;

use crate::bridge::style::{
    format_tracks, BoxSizing, Dim, EngineStyle, FieldId, FlexDirection, BORDER_FIELDS,
    INSET_FIELDS, MARGIN_FIELDS, PADDING_FIELDS,
};
use crate::bridge::{AccelerationBridge, AvailableSize, BatchNode, NodeGeometry, StyleBatch};
use crate::document::ElementId;
use crate::layout::block_flow;
use crate::layout::geometry::{ComputedLayout, Edges};
use crate::layout::margin::collapse;
use crate::layout::types::{
    FlowContainer, FlowContext, FlowDisplay, FlowItem, FlowOutput, Insets, ParentInner,
};
use crate::scheduler::{AsyncScheduler, CacheKey, CachedLayout, LayoutJob};
use crate::style::{InnerDisplay, OuterDisplay};
use crate::traversal::{Measure, TextMetrics, TreePlan};
use crate::utils::Viewport;

/// Width changes below this do not re-lay out a subtree
const WIDTH_EPSILON: f32 = 0.01;

pub struct FallbackLayout<'a> {
    plan: &'a TreePlan,
    bridge: &'a mut AccelerationBridge,
    metrics: &'a dyn TextMetrics,
    scheduler: Option<&'a mut AsyncScheduler>,
    viewport: Viewport,
    /// Max-content border-box width per plan index
    max_content: Vec<f32>,
    layouts: HashMap<ElementId, ComputedLayout>,
}

impl<'a> FallbackLayout<'a> {
    pub fn new(
        plan: &'a TreePlan,
        bridge: &'a mut AccelerationBridge,
        metrics: &'a dyn TextMetrics,
        viewport: Viewport,
    ) -> Self {
        Self {
            plan,
            bridge,
            metrics,
            scheduler: None,
            viewport,
            max_content: Vec::new(),
            layouts: HashMap::with_capacity(plan.len()),
        }
    }

    /// Serve grid containers from the scheduler's cache
    pub fn with_scheduler(mut self, scheduler: &'a mut AsyncScheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Lay out every plan node. The root is placed at the origin of a
    /// viewport-sized formatting context.
    pub fn run(mut self) -> HashMap<ElementId, ComputedLayout> {
        let Some(root) = self.plan.root_index() else {
            return HashMap::new();
        };
        self.max_content = max_content_widths(self.plan, self.metrics);
        let viewport = FlowContainer {
            establishes_bfc: true,
            ..FlowContainer::default()
        };
        self.lay_out_level(
            &viewport,
            &[root],
            self.viewport.width,
            Some(self.viewport.height),
        );
        log::trace!("fallback laid out {} nodes", self.layouts.len());
        self.layouts
    }

    /// Prepare `children`, stack them, and record their layouts
    fn lay_out_level(
        &mut self,
        container: &FlowContainer,
        children: &[usize],
        width: f32,
        height: Option<f32>,
    ) -> FlowOutput {
        let mut items = Vec::with_capacity(children.len());
        let mut prepared = Vec::with_capacity(children.len());
        for &child in children {
            let (item, used) = self.prepare_item(child, container, width, height);
            items.push(item);
            prepared.push(used);
        }
        let output =
            self.bridge
                .block_layout(container, &items, width, height, FlowContext::default());
        for (((&child, item), &used), layout) in children
            .iter()
            .zip(&items)
            .zip(&prepared)
            .zip(&output.layouts)
        {
            if (layout.width - used).abs() > WIDTH_EPSILON {
                self.layout_children(child, item, layout.width);
            }
            self.layouts.insert(layout.element_id, *layout);
        }
        output
    }

    /// Build the flow item for one node, laying out its subtree first.
    /// Returns the item and the border-box width its subtree used.
    fn prepare_item(
        &mut self,
        index: usize,
        parent: &FlowContainer,
        width: f32,
        height: Option<f32>,
    ) -> (FlowItem, f32) {
        let plan = self.plan;
        let node = &plan.nodes[index];
        let style = &node.style;

        let mut item = FlowItem::new(node.element_id);
        item.display = match node.flow.display.outer() {
            None => FlowDisplay::None,
            Some(OuterDisplay::Inline) => FlowDisplay::InlineBlock,
            Some(OuterDisplay::Block) => FlowDisplay::Block,
        };
        if item.display == FlowDisplay::None {
            return (item, 0.0);
        }
        item.position = node.flow.position;
        item.establishes_bfc = node.flow.establishes_bfc;
        item.vertical_align = node.flow.vertical_align;
        item.line_height = Some(node.flow.line_height);
        item.baseline = node.flow.baseline;

        item.padding = edges(style, PADDING_FIELDS, width);
        item.border = edges(style, BORDER_FIELDS, width);
        let (extra_width, extra_height) = match style.box_sizing() {
            BoxSizing::BorderBox => (0.0, 0.0),
            BoxSizing::ContentBox => (item.horizontal_chrome(), item.vertical_chrome()),
        };
        let size = |field: FieldId, basis: Option<f32>, extra: f32| {
            style.dim(field).resolve(basis).map(|v| v + extra)
        };
        item.width = size(FieldId::Width, Some(width), extra_width);
        item.height = size(FieldId::Height, height, extra_height);
        item.min_width = size(FieldId::MinWidth, Some(width), extra_width);
        item.max_width = size(FieldId::MaxWidth, Some(width), extra_width);
        item.min_height = size(FieldId::MinHeight, height, extra_height);
        item.max_height = size(FieldId::MaxHeight, height, extra_height);

        let margin = |field: FieldId| style.dim(field).resolve(Some(width)).unwrap_or(0.0);
        item.margin = Edges::new(
            margin(MARGIN_FIELDS[0]),
            margin(MARGIN_FIELDS[1]),
            margin(MARGIN_FIELDS[2]),
            margin(MARGIN_FIELDS[3]),
        );
        let is_auto = |field: FieldId| style.is_set(field) && style.dim(field).is_auto();
        item.margin_left_auto = is_auto(FieldId::MarginLeft);
        item.margin_right_auto = is_auto(FieldId::MarginRight);

        let inset = |field: FieldId, basis: Option<f32>| {
            if style.is_set(field) {
                style.dim(field).resolve(basis)
            } else {
                None
            }
        };
        item.inset = Insets {
            top: inset(INSET_FIELDS[0], height),
            right: inset(INSET_FIELDS[1], Some(width)),
            bottom: inset(INSET_FIELDS[2], height),
            left: inset(INSET_FIELDS[3], Some(width)),
        };

        item.content_width = (self.max_content[index] - item.horizontal_chrome()).max(0.0);
        let used = block_flow::used_width(parent, &item, width);
        if let Some(output) = self.layout_children(index, &item, used) {
            item.content_height = output.content_height;
            if let Some(top) = output.first_child_margin_top {
                item.margin.top = collapse(item.margin.top, top);
            }
            if let Some(bottom) = output.last_child_margin_bottom {
                item.margin.bottom = collapse(item.margin.bottom, bottom);
            }
            if output.baseline.is_some() {
                item.baseline = output.baseline;
            }
        }
        (item, used)
    }

    /// Lay out the children of `index` inside a border box `width` wide
    fn layout_children(&mut self, index: usize, item: &FlowItem, width: f32) -> Option<FlowOutput> {
        let plan = self.plan;
        let node = &plan.nodes[index];
        if node.children.is_empty() {
            return None;
        }
        let inner = match node.flow.display.inner() {
            Some(InnerDisplay::Flex) => ParentInner::Flex,
            Some(InnerDisplay::Grid) => ParentInner::Grid,
            _ => ParentInner::Flow,
        };
        let container = FlowContainer {
            padding: item.padding,
            border: item.border,
            establishes_bfc: item.establishes_bfc,
            height_auto: item.height.is_none(),
            inner,
            text_align: node.flow.text_align,
        };
        let inner_width = (width - item.horizontal_chrome()).max(0.0);
        let inner_height = item.height.map(|h| (h - item.vertical_chrome()).max(0.0));
        let stacked = self.lay_out_level(&container, &node.children, inner_width, inner_height);
        if inner == ParentInner::Grid {
            if let Some(output) =
                self.revalidate_grid(index, &container, width, item.height, &stacked)
            {
                return Some(output);
            }
        }
        Some(stacked)
    }

    /// Use the worker's grid result when one is cached for these exact
    /// inputs; otherwise request one and keep the stacked result.
    fn revalidate_grid(
        &mut self,
        index: usize,
        container: &FlowContainer,
        width: f32,
        height: Option<f32>,
        stacked: &FlowOutput,
    ) -> Option<FlowOutput> {
        if !self.scheduler.as_ref().is_some_and(|s| s.is_ready()) {
            return None;
        }
        let plan = self.plan;
        let node = &plan.nodes[index];
        let inner_width = (width - container.padding.horizontal() - container.border.horizontal()).max(0.0);

        let mut batch = StyleBatch::default();
        for (&child, layout) in node.children.iter().zip(&stacked.layouts) {
            let mut style = plan.nodes[child].style.clone();
            if !style.is_set(FieldId::Height) {
                let chrome = match style.box_sizing() {
                    BoxSizing::BorderBox => 0.0,
                    BoxSizing::ContentBox => {
                        edges(&style, PADDING_FIELDS, inner_width).vertical()
                            + edges(&style, BORDER_FIELDS, inner_width).vertical()
                    }
                };
                style.set_dim(FieldId::Height, Dim::Length((layout.height - chrome).max(0.0)));
            }
            batch.nodes.push(BatchNode::leaf(style));
        }
        let mut grid = node.style.clone();
        grid.set_box_sizing(BoxSizing::BorderBox);
        grid.set_dim(FieldId::Width, Dim::Length(width));
        if let Some(height) = height {
            grid.set_dim(FieldId::Height, Dim::Length(height));
        }
        batch.nodes.push(BatchNode {
            style: grid,
            children: (0..node.children.len()).collect(),
        });

        let payload = match self.bridge.encode_batch(&batch) {
            Ok(payload) => payload,
            Err(err) => {
                log::debug!("grid {} not encodable: {}", node.element_id, err);
                return None;
            }
        };
        let available = AvailableSize::new(Some(width), height);
        let mut key = CacheKey::new(node.element_id, plan.child_ids(index), available);
        if node.style.has_grid_templates() {
            key = key.with_templates(
                &format_tracks(&node.style.grid_template_rows),
                &format_tracks(&node.style.grid_template_columns),
            );
        }
        let key = key.with_payload(&payload);

        let scheduler = self.scheduler.as_deref_mut()?;
        if let Some(CachedLayout::Grid(geometry)) = scheduler.get_cached(&key) {
            if geometry.len() == node.children.len() {
                let geometry = geometry.clone();
                return Some(self.apply_grid(index, container, &geometry, stacked));
            }
        }
        if !scheduler.is_in_flight(&key) {
            if let Err(err) = scheduler.schedule_async(key, LayoutJob::Grid { payload, available }) {
                log::debug!("grid {} not scheduled: {}", node.element_id, err);
            }
        }
        None
    }

    fn apply_grid(
        &mut self,
        index: usize,
        container: &FlowContainer,
        geometry: &[NodeGeometry],
        stacked: &FlowOutput,
    ) -> FlowOutput {
        let plan = self.plan;
        let node = &plan.nodes[index];
        let origin_y = container.border.top + container.padding.top;
        let inner_width = stacked
            .layouts
            .iter()
            .map(|l| l.width + l.margin.horizontal())
            .fold(0.0f32, f32::max);
        let mut output = FlowOutput {
            layouts: Vec::with_capacity(geometry.len()),
            ..FlowOutput::default()
        };
        let mut bottom = 0.0f32;
        for ((&child, before), geo) in node.children.iter().zip(&stacked.layouts).zip(geometry) {
            let layout = ComputedLayout {
                element_id: before.element_id,
                x: geo.x,
                y: geo.y,
                width: geo.width,
                height: geo.height,
                margin: geo.margin,
            };
            if (geo.width - before.width).abs() > WIDTH_EPSILON {
                let (item, _) = self.prepare_item(child, container, inner_width, None);
                self.layout_children(child, &item, geo.width);
            }
            bottom = bottom.max(geo.y + geo.height + geo.margin.bottom - origin_y);
            self.layouts.insert(layout.element_id, layout);
            output.layouts.push(layout);
        }
        output.content_height = bottom.max(0.0);
        output
    }
}

fn edges(style: &EngineStyle, fields: [FieldId; 4], basis: f32) -> Edges {
    let side = |field: FieldId| style.length_percentage(field).resolve(Some(basis)).unwrap_or(0.0);
    Edges::new(side(fields[0]), side(fields[1]), side(fields[2]), side(fields[3]))
}

fn fixed(dim: Dim) -> Option<f32> {
    match dim {
        Dim::Length(px) => Some(px),
        _ => None,
    }
}

/// Max-content border-box widths, bottom-up. Percentages count as auto.
fn max_content_widths(plan: &TreePlan, metrics: &dyn TextMetrics) -> Vec<f32> {
    let mut widths = vec![0.0f32; plan.len()];
    for (index, node) in plan.nodes.iter().enumerate() {
        if node.flow.display.is_none() {
            continue;
        }
        let style = &node.style;
        let chrome = edges(style, PADDING_FIELDS, 0.0).horizontal()
            + edges(style, BORDER_FIELDS, 0.0).horizontal();
        let extra = match style.box_sizing() {
            BoxSizing::BorderBox => 0.0,
            BoxSizing::ContentBox => chrome,
        };
        let content = match &node.measure {
            Some(Measure::Text { text, style }) => metrics.measure(text, style, None).width,
            Some(Measure::Image { natural_width, .. }) => *natural_width,
            None => children_max_content(plan, &widths, index),
        };
        let mut width = fixed(style.dim(FieldId::Width))
            .map(|w| w + extra)
            .unwrap_or(content + chrome);
        if let Some(max) = fixed(style.dim(FieldId::MaxWidth)) {
            width = width.min(max + extra);
        }
        if let Some(min) = fixed(style.dim(FieldId::MinWidth)) {
            width = width.max(min + extra);
        }
        widths[index] = width.max(chrome);
    }
    widths
}

fn children_max_content(plan: &TreePlan, widths: &[f32], index: usize) -> f32 {
    let node = &plan.nodes[index];
    let inner = node.flow.display.inner();
    let row = inner == Some(InnerDisplay::Flex)
        && matches!(
            node.style
                .keyword(FieldId::FlexDirection)
                .and_then(FlexDirection::from_code)
                .unwrap_or(FlexDirection::Row),
            FlexDirection::Row | FlexDirection::RowReverse
        );
    let gap = if row {
        fixed(node.style.length_percentage(FieldId::ColumnGap)).unwrap_or(0.0)
    } else {
        0.0
    };
    let inline_flow = matches!(inner, Some(InnerDisplay::Flow | InnerDisplay::FlowRoot));

    let mut widest = 0.0f32;
    let mut line = 0.0f32;
    let mut in_line = 0usize;
    for &child in &node.children {
        let flow = &plan.nodes[child].flow;
        if flow.position.is_out_of_flow() || flow.display.is_none() {
            continue;
        }
        let style = &plan.nodes[child].style;
        let margins = fixed(style.dim(FieldId::MarginLeft)).unwrap_or(0.0)
            + fixed(style.dim(FieldId::MarginRight)).unwrap_or(0.0);
        let outer = widths[child] + margins;
        if row || (inline_flow && flow.display.outer() == Some(OuterDisplay::Inline)) {
            if in_line > 0 {
                line += gap;
            }
            line += outer;
            in_line += 1;
        } else {
            widest = widest.max(line).max(outer);
            line = 0.0;
            in_line = 0;
        }
    }
    widest.max(line)
}
