//! Box-model unit resolution
//!
//! This is the legacy resolver used when building flow items straight from
//! authored styles. It understands `px`, `%`, `vw`, `vh` and `auto`; every
//! other unit resolves to `None` with a one-time warning. The richer
//! resolver in [`super::expr`] is used on the engine path.

use crate::document::{StyleMap, StyleValue};
use crate::layout::geometry::Edges;
use crate::utils::{warn_once, Viewport};

/// Split a CSS dimension like `12.5px` into its number and unit
pub fn split_dimension(text: &str) -> Option<(f64, &str)> {
    let text = text.trim();
    let end = text
        .char_indices()
        .find(|&(i, c)| {
            !(c.is_ascii_digit() || c == '.' || ((c == '-' || c == '+') && i == 0))
                && !(c == 'e' && text[i + 1..].starts_with(|n: char| n.is_ascii_digit()))
        })
        .map_or(text.len(), |(i, _)| i);
    let number: f64 = text[..end].parse().ok()?;
    Some((number, &text[end..]))
}

/// Resolve one length against `available` (for `%`) and the viewport.
///
/// Returns `None` for `auto`, for percentages without an available size,
/// for viewport units without a viewport, and for unsupported units.
pub fn resolve_size(
    value: &StyleValue,
    available: Option<f32>,
    viewport: Option<Viewport>,
) -> Option<f32> {
    let text = match value {
        StyleValue::Number(n) => return Some(*n as f32),
        StyleValue::Text(text) => text.trim(),
    };
    if text.eq_ignore_ascii_case("auto") || text.is_empty() {
        return None;
    }
    let Some((number, unit)) = split_dimension(text) else {
        warn_once(text, || format!("unsupported length token {:?}", text));
        return None;
    };
    let number = number as f32;
    match unit.to_ascii_lowercase().as_str() {
        "" | "px" => Some(number),
        "%" => available.map(|a| a * number / 100.0),
        "vw" => viewport.map(|v| v.width * number / 100.0),
        "vh" => viewport.map(|v| v.height * number / 100.0),
        _ => {
            warn_once(text, || {
                format!("unit {:?} is not supported by the box-model resolver", text)
            });
            None
        }
    }
}

/// CSS min/max clamping; `min` wins when it exceeds `max`
pub fn clamp_size(value: f32, min: Option<f32>, max: Option<f32>) -> f32 {
    let capped = max.map_or(value, |m| value.min(m));
    min.map_or(capped, |m| capped.max(m))
}

/// A box-model edge property with a shorthand and four longhands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeProperty {
    Margin,
    Padding,
    BorderWidth,
}

impl EdgeProperty {
    pub fn shorthand(self) -> &'static str {
        match self {
            EdgeProperty::Margin => "margin",
            EdgeProperty::Padding => "padding",
            EdgeProperty::BorderWidth => "borderWidth",
        }
    }

    /// Longhands in top, right, bottom, left order
    pub fn longhands(self) -> [&'static str; 4] {
        match self {
            EdgeProperty::Margin => ["marginTop", "marginRight", "marginBottom", "marginLeft"],
            EdgeProperty::Padding => [
                "paddingTop",
                "paddingRight",
                "paddingBottom",
                "paddingLeft",
            ],
            EdgeProperty::BorderWidth => [
                "borderTopWidth",
                "borderRightWidth",
                "borderBottomWidth",
                "borderLeftWidth",
            ],
        }
    }
}

/// Expand a 1/2/3/4-value shorthand into top, right, bottom, left
pub fn expand_shorthand(value: &StyleValue) -> Option<[StyleValue; 4]> {
    let parts: Vec<StyleValue> = match value {
        StyleValue::Number(_) => vec![value.clone()],
        StyleValue::Text(text) => text
            .split_whitespace()
            .map(|t| StyleValue::Text(t.to_string()))
            .collect(),
    };
    let [top, right, bottom, left] = match parts.as_slice() {
        [all] => [all, all, all, all],
        [v, h] => [v, h, v, h],
        [t, h, b] => [t, h, b, h],
        [t, r, b, l] => [t, r, b, l],
        _ => return None,
    };
    Some([top.clone(), right.clone(), bottom.clone(), left.clone()])
}

/// Per-side authored values; longhands override the shorthand
pub fn edge_values(style: &StyleMap, property: EdgeProperty) -> [Option<StyleValue>; 4] {
    let mut sides: [Option<StyleValue>; 4] = Default::default();
    if let Some(short) = style.get(property.shorthand()) {
        match expand_shorthand(short) {
            Some(expanded) => {
                for (side, value) in sides.iter_mut().zip(expanded) {
                    *side = Some(value);
                }
            }
            None => {
                let token = short.to_string();
                warn_once(&token, || {
                    format!("unsupported {} shorthand {:?}", property.shorthand(), token)
                });
            }
        }
    }
    for (side, name) in sides.iter_mut().zip(property.longhands()) {
        if let Some(value) = style.get(name) {
            *side = Some(value.clone());
        }
    }
    sides
}

/// Resolve an edge property to pixels. Percentages resolve against the
/// containing block width, as in CSS. Unresolvable sides become zero.
pub fn resolve_edges(
    style: &StyleMap,
    property: EdgeProperty,
    available_width: Option<f32>,
    viewport: Option<Viewport>,
) -> Edges {
    let [t, r, b, l] = edge_values(style, property)
        .map(|v| v.and_then(|v| resolve_size(&v, available_width, viewport)).unwrap_or(0.0));
    Edges::new(t, r, b, l)
}

/// Resolved box model for one box at one available size
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoxModel {
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub min_width: Option<f32>,
    pub max_width: Option<f32>,
    pub min_height: Option<f32>,
    pub max_height: Option<f32>,
    pub margin: Edges,
    pub padding: Edges,
    pub border: Edges,
    /// `marginLeft: auto`
    pub margin_left_auto: bool,
    /// `marginRight: auto`
    pub margin_right_auto: bool,
    /// Sizes describe the border box rather than the content box
    pub border_box_sizing: bool,
}

impl BoxModel {
    /// Resolve against the containing block's available size
    pub fn resolve(
        style: &StyleMap,
        available_width: Option<f32>,
        available_height: Option<f32>,
        viewport: Option<Viewport>,
    ) -> Self {
        let size = |name: &str, available: Option<f32>| {
            style
                .get(name)
                .and_then(|v| resolve_size(v, available, viewport))
        };
        let margins = edge_values(style, EdgeProperty::Margin);
        let is_auto = |v: &Option<StyleValue>| v.as_ref().is_some_and(|v| v.is_keyword("auto"));
        Self {
            width: size("width", available_width),
            height: size("height", available_height),
            min_width: size("minWidth", available_width),
            max_width: size("maxWidth", available_width),
            min_height: size("minHeight", available_height),
            max_height: size("maxHeight", available_height),
            margin: resolve_edges(style, EdgeProperty::Margin, available_width, viewport),
            padding: resolve_edges(style, EdgeProperty::Padding, available_width, viewport),
            border: resolve_edges(style, EdgeProperty::BorderWidth, available_width, viewport),
            margin_left_auto: is_auto(&margins[3]),
            margin_right_auto: is_auto(&margins[1]),
            border_box_sizing: !style
                .get("boxSizing")
                .is_some_and(|v| v.is_keyword("content-box")),
        }
    }

    /// Padding plus border on both horizontal sides
    pub fn horizontal_chrome(&self) -> f32 {
        self.padding.horizontal() + self.border.horizontal()
    }

    /// Padding plus border on both vertical sides
    pub fn vertical_chrome(&self) -> f32 {
        self.padding.vertical() + self.border.vertical()
    }

    /// Authored width converted to a border-box width, clamped
    pub fn border_box_width(&self) -> Option<f32> {
        self.width
            .map(|w| self.to_border_box(w, self.horizontal_chrome()))
            .map(|w| self.clamp_width(w))
    }

    /// Authored height converted to a border-box height, clamped
    pub fn border_box_height(&self) -> Option<f32> {
        self.height
            .map(|h| self.to_border_box(h, self.vertical_chrome()))
            .map(|h| self.clamp_height(h))
    }

    fn to_border_box(&self, value: f32, chrome: f32) -> f32 {
        if self.border_box_sizing {
            value.max(chrome)
        } else {
            value + chrome
        }
    }

    /// Clamp a border-box width by min/max-width
    pub fn clamp_width(&self, width: f32) -> f32 {
        let chrome = self.horizontal_chrome();
        let min = self.min_width.map(|m| self.to_border_box(m, chrome));
        let max = self.max_width.map(|m| self.to_border_box(m, chrome));
        clamp_size(width, min, max).max(chrome)
    }

    /// Clamp a border-box height by min/max-height
    pub fn clamp_height(&self, height: f32) -> f32 {
        let chrome = self.vertical_chrome();
        let min = self.min_height.map(|m| self.to_border_box(m, chrome));
        let max = self.max_height.map(|m| self.to_border_box(m, chrome));
        clamp_size(height, min, max).max(chrome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn px(text: &str) -> StyleValue {
        StyleValue::from(text)
    }

    #[test]
    fn test_split_dimension() {
        assert_eq!(split_dimension("12.5px"), Some((12.5, "px")));
        assert_eq!(split_dimension("-4%"), Some((-4.0, "%")));
        assert_eq!(split_dimension("3"), Some((3.0, "")));
        assert_eq!(split_dimension("1e2px"), Some((100.0, "px")));
        assert_eq!(split_dimension("em"), None);
    }

    #[test]
    fn test_resolve_size_units() {
        let vp = Some(Viewport::new(1000.0, 500.0));
        assert_eq!(resolve_size(&StyleValue::Number(12.0), None, None), Some(12.0));
        assert_eq!(resolve_size(&px("10px"), None, None), Some(10.0));
        assert_eq!(resolve_size(&px("50%"), Some(300.0), None), Some(150.0));
        assert_eq!(resolve_size(&px("50%"), None, None), None);
        assert_eq!(resolve_size(&px("10vw"), None, vp), Some(100.0));
        assert_eq!(resolve_size(&px("10vh"), None, vp), Some(50.0));
        assert_eq!(resolve_size(&px("10vh"), None, None), None);
        assert_eq!(resolve_size(&px("auto"), Some(100.0), vp), None);
    }

    #[test]
    fn test_resolve_size_unsupported_units() {
        assert_eq!(resolve_size(&px("2em"), Some(100.0), None), None);
        assert_eq!(resolve_size(&px("1rem"), Some(100.0), None), None);
        assert_eq!(resolve_size(&px("calc(10px + 5px)"), Some(100.0), None), None);
    }

    #[test]
    fn test_shorthand_expansion() {
        let expand = |s: &str| expand_shorthand(&px(s)).map(|v| v.map(|x| x.to_string()));
        assert_eq!(expand("1px"), Some(["1px", "1px", "1px", "1px"].map(String::from)));
        assert_eq!(expand("1px 2px"), Some(["1px", "2px", "1px", "2px"].map(String::from)));
        assert_eq!(
            expand("1px 2px 3px"),
            Some(["1px", "2px", "3px", "2px"].map(String::from))
        );
        assert_eq!(
            expand("1px 2px 3px 4px"),
            Some(["1px", "2px", "3px", "4px"].map(String::from))
        );
        assert_eq!(expand("1px 2px 3px 4px 5px"), None);
    }

    #[test]
    fn test_longhand_overrides_shorthand() {
        let mut style = StyleMap::new();
        style.insert("padding".into(), px("10px 20px"));
        style.insert("paddingLeft".into(), px("5px"));
        let edges = resolve_edges(&style, EdgeProperty::Padding, None, None);
        assert_eq!(edges, Edges::new(10.0, 20.0, 10.0, 5.0));
    }

    #[test]
    fn test_margin_percent_uses_width() {
        let mut style = StyleMap::new();
        style.insert("margin".into(), px("10%"));
        let edges = resolve_edges(&style, EdgeProperty::Margin, Some(200.0), None);
        assert_eq!(edges, Edges::uniform(20.0));
    }

    #[test]
    fn test_clamp_idempotent_inside_range() {
        assert_eq!(clamp_size(50.0, Some(10.0), Some(100.0)), 50.0);
        assert_eq!(clamp_size(5.0, Some(10.0), Some(100.0)), 10.0);
        assert_eq!(clamp_size(500.0, Some(10.0), Some(100.0)), 100.0);
        // min wins over max
        assert_eq!(clamp_size(50.0, Some(80.0), Some(60.0)), 80.0);
    }

    #[test]
    fn test_box_model_resolve() {
        let mut style = StyleMap::new();
        style.insert("width".into(), px("50%"));
        style.insert("maxWidth".into(), px("150px"));
        style.insert("padding".into(), px("10px"));
        style.insert("margin".into(), px("0 auto"));
        let model = BoxModel::resolve(&style, Some(400.0), None, None);
        assert_eq!(model.width, Some(200.0));
        assert_eq!(model.border_box_width(), Some(150.0));
        assert!(model.margin_left_auto && model.margin_right_auto);
        assert_eq!(model.margin, Edges::default());
    }

    #[test]
    fn test_box_model_content_box_sizing() {
        let mut style = StyleMap::new();
        style.insert("boxSizing".into(), px("content-box"));
        style.insert("width".into(), px("100px"));
        style.insert("borderWidth".into(), px("2px"));
        style.insert("padding".into(), px("8px"));
        let model = BoxModel::resolve(&style, Some(400.0), None, None);
        assert_eq!(model.border_box_width(), Some(120.0));
    }
}
