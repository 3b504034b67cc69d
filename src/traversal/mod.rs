//! Full-tree batch traversal
//!
//! One depth-first post-order walk turns the document into a [`TreePlan`]:
//! per-node engine style records whose child indices always precede the
//! parent's own index. The source document is only read; widget defaults
//! and synthesized children are applied to copies.

pub mod intrinsic;
pub mod style_record;
pub mod widgets;

use std::collections::{HashMap, HashSet};

use crate::bridge::style::{
    BoxSizing, ContentAlign, Dim, EngineDisplay, EngineStyle, FieldId, BORDER_FIELDS,
    MARGIN_FIELDS, PADDING_FIELDS,
};
use crate::bridge::{BatchNode, StyleBatch};
use crate::document::{DocumentSource, ElementId, StyledBox};
use crate::layout::display_adapter::{apply_inline_flow_child, to_engine_display};
use crate::layout::margin::establishes_bfc;
use crate::layout::types::{FlowPosition, ParentInner, VerticalAlign};
use crate::style::{
    resolve_style, ComputedStyle, Display, ExprContext, InnerDisplay, OuterDisplay, TextAlign,
};
use crate::utils::{LayoutConfig, LayoutError, Result};

pub use intrinsic::{ApproximateFontMetrics, TextMetrics, TextSize, TextStyle};
pub use widgets::{SizeVariant, WidgetKind};

/// Box-model facts the fallback path needs beyond the engine record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowHints {
    /// Box-model display after blockification
    pub display: Display,
    pub position: FlowPosition,
    pub vertical_align: VerticalAlign,
    pub establishes_bfc: bool,
    /// Used line height in pixels
    pub line_height: f32,
    /// Inherited alignment of this node's inline content
    pub text_align: TextAlign,
    /// First baseline of a measured leaf, from the top of its border box
    pub baseline: Option<f32>,
}

/// Content measured during traversal
#[derive(Debug, Clone, PartialEq)]
pub enum Measure {
    Text { text: String, style: TextStyle },
    Image { natural_width: f32, natural_height: f32 },
}

/// One flattened node
#[derive(Debug, Clone, PartialEq)]
pub struct PlanNode {
    pub element_id: ElementId,
    pub kind: WidgetKind,
    pub style: EngineStyle,
    /// Plan indices of the children, all lower than this node's index
    pub children: Vec<usize>,
    pub flow: FlowHints,
    pub measure: Option<Measure>,
    /// Content-box width the node was prepared against
    pub available_width: f32,
}

/// Post-order flattening of the document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreePlan {
    pub nodes: Vec<PlanNode>,
    pub index_of: HashMap<ElementId, usize>,
}

impl TreePlan {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The root comes last in post-order
    pub fn root_index(&self) -> Option<usize> {
        self.nodes.len().checked_sub(1)
    }

    pub fn root(&self) -> Option<&PlanNode> {
        self.nodes.last()
    }

    pub fn get(&self, id: ElementId) -> Option<&PlanNode> {
        self.index_of.get(&id).map(|&i| &self.nodes[i])
    }

    /// Element ids of a node's children, in order
    pub fn child_ids(&self, index: usize) -> Vec<ElementId> {
        self.nodes[index]
            .children
            .iter()
            .map(|&c| self.nodes[c].element_id)
            .collect()
    }

    /// Parent index of every node
    pub fn parents(&self) -> Vec<Option<usize>> {
        let mut parents = vec![None; self.nodes.len()];
        for (index, node) in self.nodes.iter().enumerate() {
            for &child in &node.children {
                parents[child] = Some(index);
            }
        }
        parents
    }

    /// The plan as a style batch; plan indices are batch indices
    pub fn to_batch(&self) -> StyleBatch {
        StyleBatch {
            nodes: self
                .nodes
                .iter()
                .map(|n| BatchNode {
                    style: n.style.clone(),
                    children: n.children.clone(),
                })
                .collect(),
        }
    }
}

/// Inputs shared by one traversal
#[derive(Clone, Copy)]
pub struct TraversalContext<'a> {
    pub config: &'a LayoutConfig,
    pub metrics: &'a dyn TextMetrics,
    /// Widths to measure particular text leaves against, from an earlier pass
    pub measure_widths: Option<&'a HashMap<ElementId, f32>>,
}

impl<'a> TraversalContext<'a> {
    pub fn new(config: &'a LayoutConfig, metrics: &'a dyn TextMetrics) -> Self {
        Self {
            config,
            metrics,
            measure_widths: None,
        }
    }

    pub fn with_measure_widths(mut self, widths: &'a HashMap<ElementId, f32>) -> Self {
        self.measure_widths = Some(widths);
        self
    }
}

/// Walk the subtree under `root_id`
pub fn traverse(
    doc: &dyn DocumentSource,
    root_id: ElementId,
    ctx: &TraversalContext<'_>,
) -> Result<TreePlan> {
    let root = doc.element(root_id).ok_or(LayoutError::MissingRoot(root_id))?;
    let viewport = ctx.config.viewport;
    let top = ComputedStyle::root(ctx.config.root_font_size);
    let frame = Frame {
        computed: &top,
        inner: ParentInner::Flow,
        content_width: viewport.width,
        content_height: Some(viewport.height),
        shrink_to_fit: false,
    };
    let mut walker = Walker {
        doc,
        ctx,
        plan: TreePlan::default(),
        on_path: HashSet::new(),
    };
    walker.visit(root, &frame)?;
    log::trace!("traversal planned {} nodes", walker.plan.len());
    Ok(walker.plan)
}

/// What a child needs to know about its parent
struct Frame<'s> {
    computed: &'s ComputedStyle,
    inner: ParentInner,
    content_width: f32,
    content_height: Option<f32>,
    /// The parent sizes itself to its content
    shrink_to_fit: bool,
}

struct Walker<'d, 'c> {
    doc: &'d dyn DocumentSource,
    ctx: &'c TraversalContext<'c>,
    plan: TreePlan,
    on_path: HashSet<ElementId>,
}

impl Walker<'_, '_> {
    fn visit(&mut self, node: &StyledBox, parent: &Frame<'_>) -> Result<Option<usize>> {
        if self.plan.index_of.contains_key(&node.id) || !self.on_path.insert(node.id) {
            log::warn!("element {} reached twice; skipping", node.id);
            return Ok(None);
        }
        let doc = self.doc;
        let injected = widgets::inject(node, doc.child_elements(node.id));
        let source = injected.node.as_ref();

        let computed = resolve_style(&source.props.style, parent.computed);
        let position = style_record::position_of(&computed);
        let mut display = Display::from_style(computed.get("display")).unwrap_or_default();
        if parent.inner != ParentInner::Flow && !position.is_out_of_flow() {
            display = display.blockify();
        }
        let vertical_align = computed
            .keyword("verticalAlign")
            .and_then(|v| VerticalAlign::parse(&v))
            .unwrap_or_default();

        let expr = ExprContext {
            available: Some(parent.content_width),
            viewport: Some(self.ctx.config.viewport),
            font_size: computed.font_size(),
            root_font_size: computed.root_font_size,
            vars: &computed.custom_properties,
        };
        let mut style = style_record::build(&computed, position, &expr, parent.content_height);
        let content_width = content_box_width(&style, parent.content_width);
        let content_height = style
            .dim(FieldId::Height)
            .resolve(parent.content_height)
            .map(|h| match style.box_sizing() {
                BoxSizing::BorderBox => (h - vertical_chrome(&style, parent.content_width)).max(0.0),
                BoxSizing::ContentBox => h,
            });

        let hug = display.outer() == Some(OuterDisplay::Inline)
            || parent.inner != ParentInner::Flow
            || parent.shrink_to_fit
            || position.is_out_of_flow();

        let mut children = Vec::new();
        if display.is_none() {
            style.set_display(EngineDisplay::None);
        } else {
            let inner = match display.inner() {
                Some(InnerDisplay::Flex) => ParentInner::Flex,
                Some(InnerDisplay::Grid) => ParentInner::Grid,
                _ => ParentInner::Flow,
            };
            let frame = Frame {
                computed: &computed,
                inner,
                content_width,
                content_height,
                shrink_to_fit: hug && !style.is_set(FieldId::Width),
            };
            for child in &injected.children {
                if let Some(index) = self.visit(child, &frame)? {
                    children.push(index);
                }
            }
            self.adapt_display(display, computed.inherited.text_align, &children, &mut style);
        }

        let mut available_width = content_width;
        let mut measure = None;
        let mut baseline = None;
        if children.is_empty() && !display.is_none() {
            if let Some(text) = source.props.text.as_ref().filter(|_| {
                injected.kind == WidgetKind::Text || source.props.natural_width.is_none()
            }) {
                if let Some(width) = self
                    .ctx
                    .measure_widths
                    .and_then(|widths| widths.get(&source.id))
                {
                    available_width = *width;
                }
                let text_style = TextStyle {
                    font_size: computed.font_size(),
                    line_height: computed.inherited.line_height_px(),
                    letter_spacing: computed.inherited.letter_spacing,
                    wraps: computed.inherited.white_space.wraps(),
                };
                let size = self
                    .ctx
                    .metrics
                    .measure(text, &text_style, Some(available_width));
                apply_text_size(&mut style, size, hug, parent.content_width);
                baseline = Some(top_chrome(&style, parent.content_width) + size.baseline);
                measure = Some(Measure::Text {
                    text: text.clone(),
                    style: text_style,
                });
            } else if injected.kind == WidgetKind::Image || source.props.natural_width.is_some() {
                let natural_width = source.props.natural_width.unwrap_or(0.0);
                let natural_height = source.props.natural_height.unwrap_or(0.0);
                apply_replaced_size(
                    &mut style,
                    natural_width,
                    natural_height,
                    parent.content_width,
                    parent.content_height,
                );
                measure = Some(Measure::Image {
                    natural_width,
                    natural_height,
                });
            }
        }

        let index = self.plan.nodes.len();
        self.plan.nodes.push(PlanNode {
            element_id: source.id,
            kind: injected.kind,
            style,
            children,
            flow: FlowHints {
                display,
                position,
                vertical_align,
                establishes_bfc: establishes_bfc(display, &computed),
                line_height: computed.inherited.line_height_px(),
                text_align: computed.inherited.text_align,
                baseline,
            },
            measure,
            available_width,
        });
        self.plan.index_of.insert(source.id, index);
        self.on_path.remove(&source.id);
        Ok(Some(index))
    }

    /// Engine display for a parent whose children are already planned
    fn adapt_display(
        &mut self,
        display: Display,
        text_align: TextAlign,
        children: &[usize],
        style: &mut EngineStyle,
    ) {
        let in_flow: Vec<usize> = children
            .iter()
            .copied()
            .filter(|&c| !self.plan.nodes[c].flow.position.is_out_of_flow())
            .collect();
        let child_displays: Vec<Display> = in_flow
            .iter()
            .map(|&c| self.plan.nodes[c].flow.display)
            .collect();
        let plan = to_engine_display(display, &child_displays);
        plan.apply(style);
        if !plan.simulates_inline_flow() {
            return;
        }
        for &c in &in_flow {
            let child = &mut self.plan.nodes[c];
            apply_inline_flow_child(child.flow.display, child.flow.vertical_align, &mut child.style);
        }
        if !style.is_set(FieldId::JustifyContent) {
            let justify = match text_align {
                TextAlign::Center => Some(ContentAlign::Center),
                TextAlign::Right => Some(ContentAlign::FlexEnd),
                TextAlign::Left | TextAlign::Justify => None,
            };
            if let Some(justify) = justify {
                style.set_keyword_code(FieldId::JustifyContent, justify.code());
            }
        }
    }
}

fn side(style: &EngineStyle, field: FieldId, basis: f32) -> f32 {
    style.length_percentage(field).resolve(Some(basis)).unwrap_or(0.0)
}

fn horizontal_chrome(style: &EngineStyle, basis: f32) -> f32 {
    [PADDING_FIELDS, BORDER_FIELDS]
        .iter()
        .map(|f| side(style, f[1], basis) + side(style, f[3], basis))
        .sum()
}

fn vertical_chrome(style: &EngineStyle, basis: f32) -> f32 {
    [PADDING_FIELDS, BORDER_FIELDS]
        .iter()
        .map(|f| side(style, f[0], basis) + side(style, f[2], basis))
        .sum()
}

fn top_chrome(style: &EngineStyle, basis: f32) -> f32 {
    side(style, PADDING_FIELDS[0], basis) + side(style, BORDER_FIELDS[0], basis)
}

/// Estimated content-box width of a node inside a containing block
pub(crate) fn content_box_width(style: &EngineStyle, containing: f32) -> f32 {
    let chrome = horizontal_chrome(style, containing);
    let margins: f32 = [MARGIN_FIELDS[1], MARGIN_FIELDS[3]]
        .iter()
        .map(|&f| style.dim(f).resolve(Some(containing)).unwrap_or(0.0))
        .sum();
    let content = match style.dim(FieldId::Width).resolve(Some(containing)) {
        Some(width) if style.box_sizing() == BoxSizing::ContentBox => width,
        Some(width) => width - chrome,
        None => containing - margins - chrome,
    };
    content.max(0.0)
}

/// Chrome to add to a content size for the node's box-sizing
fn sizing_chrome(style: &EngineStyle, chrome: f32) -> f32 {
    match style.box_sizing() {
        BoxSizing::BorderBox => chrome,
        BoxSizing::ContentBox => 0.0,
    }
}

fn apply_text_size(style: &mut EngineStyle, size: TextSize, hug: bool, basis: f32) {
    if hug && !style.is_set(FieldId::Width) {
        let chrome = sizing_chrome(style, horizontal_chrome(style, basis));
        style.set_dim(FieldId::Width, Dim::Length(size.width + chrome));
    }
    if !style.is_set(FieldId::Height) {
        let chrome = sizing_chrome(style, vertical_chrome(style, basis));
        style.set_dim(FieldId::Height, Dim::Length(size.height + chrome));
    }
}

fn apply_replaced_size(
    style: &mut EngineStyle,
    natural_width: f32,
    natural_height: f32,
    basis_width: f32,
    basis_height: Option<f32>,
) {
    let width = style.dim(FieldId::Width).resolve(Some(basis_width));
    let height = style.dim(FieldId::Height).resolve(basis_height);
    let (w, h) = intrinsic::replaced_size(natural_width, natural_height, width, height);
    if !style.is_set(FieldId::Width) {
        style.set_dim(FieldId::Width, Dim::Length(w));
    }
    if !style.is_set(FieldId::Height) {
        style.set_dim(FieldId::Height, Dim::Length(h));
    }
    if natural_height > 0.0 && !style.is_set(FieldId::AspectRatio) {
        style.set_float(FieldId::AspectRatio, natural_width / natural_height);
    }
}
