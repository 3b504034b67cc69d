//! Inputs and outputs of the block-flow engine
//!
//! All lengths here are resolved pixels. Widths and heights describe the
//! border box.

use crate::document::ElementId;
use crate::layout::geometry::{ComputedLayout, Edges};
use crate::style::TextAlign;

/// How a child takes part in its parent's flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowDisplay {
    #[default]
    Block,
    InlineBlock,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowPosition {
    #[default]
    Static,
    Relative,
    Absolute,
    Fixed,
}

impl FlowPosition {
    pub fn is_out_of_flow(self) -> bool {
        matches!(self, FlowPosition::Absolute | FlowPosition::Fixed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerticalAlign {
    #[default]
    Baseline,
    Top,
    Middle,
    Bottom,
}

impl VerticalAlign {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "baseline" => Some(VerticalAlign::Baseline),
            "top" | "text-top" => Some(VerticalAlign::Top),
            "middle" => Some(VerticalAlign::Middle),
            "bottom" | "text-bottom" => Some(VerticalAlign::Bottom),
            _ => None,
        }
    }
}

/// Inner display of the parent being laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParentInner {
    #[default]
    Flow,
    Flex,
    Grid,
}

/// Optional per-side insets
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Insets {
    pub top: Option<f32>,
    pub right: Option<f32>,
    pub bottom: Option<f32>,
    pub left: Option<f32>,
}

/// One child as seen by the block-flow engine
#[derive(Debug, Clone, PartialEq)]
pub struct FlowItem {
    pub element_id: ElementId,
    pub display: FlowDisplay,
    pub position: FlowPosition,
    pub establishes_bfc: bool,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub min_width: Option<f32>,
    pub max_width: Option<f32>,
    pub min_height: Option<f32>,
    pub max_height: Option<f32>,
    /// Used margins; top/bottom already include margins collapsed in from
    /// the item's own first/last child
    pub margin: Edges,
    pub margin_left_auto: bool,
    pub margin_right_auto: bool,
    pub padding: Edges,
    pub border: Edges,
    pub inset: Insets,
    /// Max-content width of the content box, for shrink-to-fit
    pub content_width: f32,
    /// Height of the content box when the height is auto
    pub content_height: f32,
    /// First baseline, from the top of the border box
    pub baseline: Option<f32>,
    pub vertical_align: VerticalAlign,
    pub line_height: Option<f32>,
}

impl FlowItem {
    /// A block with no styling
    pub fn new(element_id: ElementId) -> Self {
        Self {
            element_id,
            display: FlowDisplay::Block,
            position: FlowPosition::Static,
            establishes_bfc: false,
            width: None,
            height: None,
            min_width: None,
            max_width: None,
            min_height: None,
            max_height: None,
            margin: Edges::default(),
            margin_left_auto: false,
            margin_right_auto: false,
            padding: Edges::default(),
            border: Edges::default(),
            inset: Insets::default(),
            content_width: 0.0,
            content_height: 0.0,
            baseline: None,
            vertical_align: VerticalAlign::Baseline,
            line_height: None,
        }
    }

    pub fn inline_block(element_id: ElementId) -> Self {
        Self {
            display: FlowDisplay::InlineBlock,
            ..Self::new(element_id)
        }
    }

    pub fn with_size(mut self, width: Option<f32>, height: Option<f32>) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_margin(mut self, margin: Edges) -> Self {
        self.margin = margin;
        self
    }

    pub fn horizontal_chrome(&self) -> f32 {
        self.padding.horizontal() + self.border.horizontal()
    }

    pub fn vertical_chrome(&self) -> f32 {
        self.padding.vertical() + self.border.vertical()
    }
}

/// The parent whose children are being laid out
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FlowContainer {
    pub padding: Edges,
    pub border: Edges,
    pub establishes_bfc: bool,
    /// Bottom-edge margin escape needs an auto height
    pub height_auto: bool,
    pub inner: ParentInner,
    pub text_align: TextAlign,
}

/// State inherited from enclosing levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlowContext {
    /// An ancestor already prevents margins from escaping
    pub collapse_blocked: bool,
}

/// Result of laying out one level
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlowOutput {
    /// One entry per child, in input order, relative to the parent's border box
    pub layouts: Vec<ComputedLayout>,
    /// Margin that escapes through the parent's top edge
    pub first_child_margin_top: Option<f32>,
    /// Margin that escapes through the parent's bottom edge
    pub last_child_margin_bottom: Option<f32>,
    /// Height of the parent's content box
    pub content_height: f32,
    /// First line baseline, from the top of the parent's border box
    pub baseline: Option<f32>,
}
