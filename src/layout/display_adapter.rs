//! Maps box-model display values onto the constraint engine's vocabulary
//!
//! The engine knows only `block`, `flex`, `grid` and `none`. Inline flow is
//! simulated with a wrapping flex row, and inline-level boxes become
//! fixed-size blocks.

use crate::bridge::style::{
    Dim, EngineDisplay, EngineStyle, FieldId, FlexDirection, FlexWrap, ItemAlign,
};
use crate::layout::types::VerticalAlign;
use crate::style::{Display, InnerDisplay, OuterDisplay};

/// Engine-side display decision for one node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineDisplayPlan {
    pub engine_display: EngineDisplay,
    pub flex_direction: Option<FlexDirection>,
    pub flex_wrap: Option<FlexWrap>,
    pub align_items: Option<ItemAlign>,
    pub flex_grow: Option<f32>,
    pub flex_shrink: Option<f32>,
}

impl EngineDisplayPlan {
    fn plain(engine_display: EngineDisplay) -> Self {
        Self {
            engine_display,
            flex_direction: None,
            flex_wrap: None,
            align_items: None,
            flex_grow: None,
            flex_shrink: None,
        }
    }

    /// Whether this node lays out its children as simulated inline flow
    pub fn simulates_inline_flow(&self) -> bool {
        self.engine_display == EngineDisplay::Flex && self.flex_wrap == Some(FlexWrap::Wrap)
    }

    /// Write the plan into an engine style. Fields the author already set
    /// on the engine style are left alone, except `display`.
    pub fn apply(&self, style: &mut EngineStyle) {
        style.set_display(self.engine_display);
        if let Some(direction) = self.flex_direction {
            if !style.is_set(FieldId::FlexDirection) {
                style.set_flex_direction(direction);
            }
        }
        if let Some(wrap) = self.flex_wrap {
            if !style.is_set(FieldId::FlexWrap) {
                style.set_flex_wrap(wrap);
            }
        }
        if let Some(align) = self.align_items {
            if !style.is_set(FieldId::AlignItems) {
                style.set_align_items(align);
            }
        }
        if let Some(grow) = self.flex_grow {
            if !style.is_set(FieldId::FlexGrow) {
                style.set_float(FieldId::FlexGrow, grow);
            }
        }
        if let Some(shrink) = self.flex_shrink {
            if !style.is_set(FieldId::FlexShrink) {
                style.set_float(FieldId::FlexShrink, shrink);
            }
        }
    }
}

/// Translate a node's display given its children's (already blockified) displays
pub fn to_engine_display(display: Display, child_displays: &[Display]) -> EngineDisplayPlan {
    let (Some(outer), Some(inner)) = (display.outer(), display.inner()) else {
        return EngineDisplayPlan::plain(EngineDisplay::None);
    };
    let mut plan = match inner {
        InnerDisplay::Flex => EngineDisplayPlan::plain(EngineDisplay::Flex),
        InnerDisplay::Grid => EngineDisplayPlan::plain(EngineDisplay::Grid),
        InnerDisplay::Flow | InnerDisplay::FlowRoot => {
            let has_inline_block = child_displays.iter().any(|d| *d == Display::InlineBlock);
            if has_inline_block {
                EngineDisplayPlan {
                    flex_direction: Some(FlexDirection::Row),
                    flex_wrap: Some(FlexWrap::Wrap),
                    align_items: Some(ItemAlign::Baseline),
                    ..EngineDisplayPlan::plain(EngineDisplay::Flex)
                }
            } else {
                EngineDisplayPlan::plain(EngineDisplay::Block)
            }
        }
    };
    if outer == OuterDisplay::Inline && display != Display::Inline {
        plan.flex_grow = Some(0.0);
        plan.flex_shrink = Some(0.0);
    }
    plan
}

/// Per-child rules inside a simulated inline-flow parent
pub fn apply_inline_flow_child(
    child_display: Display,
    vertical_align: VerticalAlign,
    style: &mut EngineStyle,
) {
    if child_display == Display::InlineBlock {
        if !style.is_set(FieldId::AlignSelf) {
            let align = match vertical_align {
                VerticalAlign::Baseline => ItemAlign::Baseline,
                VerticalAlign::Top => ItemAlign::FlexStart,
                VerticalAlign::Middle => ItemAlign::Center,
                VerticalAlign::Bottom => ItemAlign::FlexEnd,
            };
            style.set_keyword_code(FieldId::AlignSelf, align.code());
        }
    } else if child_display.outer() == Some(OuterDisplay::Block) {
        // A block-level box takes a whole line of its own.
        if !style.is_set(FieldId::FlexBasis) {
            style.set_dim(FieldId::FlexBasis, Dim::Percent(1.0));
        }
        if !style.is_set(FieldId::FlexShrink) {
            style.set_float(FieldId::FlexShrink, 0.0);
        }
    }
}
