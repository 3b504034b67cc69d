//! Box-model display values

use crate::document::StyleValue;
use crate::utils::warn_once;

/// Outer display type: how the box takes part in its parent's flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OuterDisplay {
    Block,
    Inline,
}

/// Inner display type: how the box lays out its own children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InnerDisplay {
    Flow,
    FlowRoot,
    Flex,
    Grid,
}

/// The box-model `display` vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Display {
    #[default]
    Block,
    Inline,
    InlineBlock,
    FlowRoot,
    Flex,
    InlineFlex,
    Grid,
    InlineGrid,
    None,
}

impl Display {
    /// Parse a display keyword. Unknown keywords log once and fall back to block.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "block" => Display::Block,
            "inline" => Display::Inline,
            "inline-block" => Display::InlineBlock,
            "flow-root" => Display::FlowRoot,
            "flex" => Display::Flex,
            "inline-flex" => Display::InlineFlex,
            "grid" => Display::Grid,
            "inline-grid" => Display::InlineGrid,
            "none" => Display::None,
            other => {
                warn_once(other, || format!("unsupported display {:?}, using block", other));
                Display::Block
            }
        }
    }

    /// Display from an optional authored value
    pub fn from_style(value: Option<&StyleValue>) -> Option<Self> {
        value.and_then(StyleValue::as_str).map(Display::parse)
    }

    /// Outer display; `None` for `display: none`
    pub fn outer(self) -> Option<OuterDisplay> {
        match self {
            Display::Block | Display::FlowRoot | Display::Flex | Display::Grid => {
                Some(OuterDisplay::Block)
            }
            Display::Inline | Display::InlineBlock | Display::InlineFlex | Display::InlineGrid => {
                Some(OuterDisplay::Inline)
            }
            Display::None => None,
        }
    }

    /// Inner display; `None` for `display: none`
    pub fn inner(self) -> Option<InnerDisplay> {
        match self {
            Display::Block | Display::Inline => Some(InnerDisplay::Flow),
            Display::FlowRoot | Display::InlineBlock => Some(InnerDisplay::FlowRoot),
            Display::Flex | Display::InlineFlex => Some(InnerDisplay::Flex),
            Display::Grid | Display::InlineGrid => Some(InnerDisplay::Grid),
            Display::None => None,
        }
    }

    pub fn is_none(self) -> bool {
        self == Display::None
    }

    /// Flex or grid container, inline or not
    pub fn is_flex_or_grid(self) -> bool {
        matches!(self.inner(), Some(InnerDisplay::Flex | InnerDisplay::Grid))
    }

    /// Block-level equivalent, as applied to children of flex and grid containers
    pub fn blockify(self) -> Self {
        match self {
            Display::Inline => Display::Block,
            Display::InlineBlock => Display::Block,
            Display::InlineFlex => Display::Flex,
            Display::InlineGrid => Display::Grid,
            other => other,
        }
    }
}
