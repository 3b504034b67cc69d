//! Margin collapsing and block-formatting-context rules

use crate::document::StyleValue;
use crate::style::{ComputedStyle, Display, InnerDisplay};

/// Collapse two adjoining margins
pub fn collapse(a: f32, b: f32) -> f32 {
    if a >= 0.0 && b >= 0.0 {
        a.max(b)
    } else if a < 0.0 && b < 0.0 {
        a.min(b)
    } else {
        a + b
    }
}

/// Collapse a pending margin (if any) with the next one
pub fn collapse_pending(pending: Option<f32>, next: f32) -> f32 {
    pending.map_or(next, |p| collapse(p, next))
}

/// Whether a box with this display and style starts a new block formatting context
pub fn establishes_bfc(display: Display, style: &ComputedStyle) -> bool {
    if matches!(
        display.inner(),
        Some(InnerDisplay::FlowRoot | InnerDisplay::Flex | InnerDisplay::Grid)
    ) {
        return true;
    }
    let keyword = |name: &str| style.keyword(name);
    let non_visible = |value: Option<String>| value.is_some_and(|v| v != "visible");
    if non_visible(keyword("overflow"))
        || non_visible(keyword("overflowX"))
        || non_visible(keyword("overflowY"))
    {
        return true;
    }
    if keyword("float").is_some_and(|v| v == "left" || v == "right") {
        return true;
    }
    if keyword("position").is_some_and(|v| v == "absolute" || v == "fixed") {
        return true;
    }
    style
        .get("contain")
        .and_then(StyleValue::as_str)
        .is_some_and(|v| {
            v.split_whitespace()
                .any(|t| matches!(t, "layout" | "content" | "paint" | "strict"))
        })
}
