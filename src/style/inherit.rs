//! Inheritance propagation
//!
//! Only a fixed set of properties inherit. Everything else on a
//! [`ComputedStyle`] is the node's own authored value with CSS-wide
//! keywords removed and `currentColor` substituted.

use std::sync::Arc;

use crate::document::{StyleMap, StyleValue};
use crate::style::expr::CustomProperties;
use crate::style::units::split_dimension;
use crate::utils::warn_once;

/// Properties that inherit from the parent's computed style
pub const INHERITED_PROPERTIES: [&str; 10] = [
    "color",
    "fontFamily",
    "fontSize",
    "fontWeight",
    "fontStyle",
    "lineHeight",
    "textAlign",
    "visibility",
    "whiteSpace",
    "letterSpacing",
];

/// Whether a property inherits
pub fn is_inherited(property: &str) -> bool {
    property.starts_with("--") || INHERITED_PROPERTIES.contains(&property)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CssWideKeyword {
    Inherit,
    Initial,
    Unset,
    Revert,
}

impl CssWideKeyword {
    fn parse(value: &StyleValue) -> Option<Self> {
        match value.as_str()?.trim().to_ascii_lowercase().as_str() {
            "inherit" => Some(CssWideKeyword::Inherit),
            "initial" => Some(CssWideKeyword::Initial),
            "unset" => Some(CssWideKeyword::Unset),
            // No user-agent layer to revert to.
            "revert" | "revert-layer" => Some(CssWideKeyword::Revert),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineHeight {
    Normal,
    /// Multiple of the element's font size
    Number(f32),
    Px(f32),
}

impl LineHeight {
    /// Used line height in pixels
    pub fn resolve(self, font_size: f32) -> f32 {
        match self {
            LineHeight::Normal => font_size * 1.2,
            LineHeight::Number(n) => font_size * n,
            LineHeight::Px(px) => px,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
    Collapse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WhiteSpace {
    #[default]
    Normal,
    NoWrap,
    Pre,
    PreWrap,
    PreLine,
}

impl WhiteSpace {
    /// Whether lines may break at spaces
    pub fn wraps(self) -> bool {
        !matches!(self, WhiteSpace::NoWrap | WhiteSpace::Pre)
    }
}

/// Computed values of the inheritable set
#[derive(Debug, Clone, PartialEq)]
pub struct InheritedStyle {
    pub color: String,
    pub font_family: String,
    pub font_size: f32,
    pub font_weight: u16,
    pub font_style: String,
    pub line_height: LineHeight,
    pub text_align: TextAlign,
    pub visibility: Visibility,
    pub white_space: WhiteSpace,
    pub letter_spacing: f32,
}

impl InheritedStyle {
    /// CSS initial values
    pub fn initial(root_font_size: f32) -> Self {
        Self {
            color: "black".to_string(),
            font_family: "sans-serif".to_string(),
            font_size: root_font_size,
            font_weight: 400,
            font_style: "normal".to_string(),
            line_height: LineHeight::Normal,
            text_align: TextAlign::Left,
            visibility: Visibility::Visible,
            white_space: WhiteSpace::Normal,
            letter_spacing: 0.0,
        }
    }

    /// Used line height in pixels
    pub fn line_height_px(&self) -> f32 {
        self.line_height.resolve(self.font_size)
    }
}

/// Resolved style for one node
#[derive(Debug, Clone)]
pub struct ComputedStyle {
    pub inherited: InheritedStyle,
    /// Own non-inherited declarations
    pub own: StyleMap,
    /// Custom properties in scope
    pub custom_properties: Arc<CustomProperties>,
    pub root_font_size: f32,
}

impl ComputedStyle {
    /// Style of a virtual parent above the root
    pub fn root(root_font_size: f32) -> Self {
        Self {
            inherited: InheritedStyle::initial(root_font_size),
            own: StyleMap::new(),
            custom_properties: Arc::new(CustomProperties::new()),
            root_font_size,
        }
    }

    /// Own declaration lookup
    pub fn get(&self, property: &str) -> Option<&StyleValue> {
        self.own.get(property)
    }

    /// Own declaration as a lowercase keyword
    pub fn keyword(&self, property: &str) -> Option<String> {
        self.get(property)
            .and_then(StyleValue::as_str)
            .map(|s| s.trim().to_ascii_lowercase())
    }

    pub fn font_size(&self) -> f32 {
        self.inherited.font_size
    }
}

/// Resolve one node's style against its parent's computed style
pub fn resolve_style(raw: &StyleMap, parent: &ComputedStyle) -> ComputedStyle {
    let root_font_size = parent.root_font_size;
    let initial = InheritedStyle::initial(root_font_size);
    let from_parent = &parent.inherited;

    // fontSize goes first; lineHeight and letterSpacing can depend on it.
    let font_size = pick(raw, "fontSize", from_parent.font_size, initial.font_size, |v| {
        parse_font_size(v, from_parent.font_size, root_font_size)
    });
    let color = match raw.get("color") {
        Some(v) if v.is_keyword("currentcolor") => from_parent.color.clone(),
        _ => pick(raw, "color", from_parent.color.clone(), initial.color.clone(), |v| {
            v.as_str().map(|s| s.trim().to_string())
        }),
    };

    let inherited = InheritedStyle {
        font_family: pick(
            raw,
            "fontFamily",
            from_parent.font_family.clone(),
            initial.font_family.clone(),
            |v| v.as_str().map(|s| s.trim().to_string()),
        ),
        font_weight: pick(raw, "fontWeight", from_parent.font_weight, initial.font_weight, |v| {
            parse_font_weight(v, from_parent.font_weight)
        }),
        font_style: pick(
            raw,
            "fontStyle",
            from_parent.font_style.clone(),
            initial.font_style.clone(),
            |v| v.as_str().map(|s| s.trim().to_ascii_lowercase()),
        ),
        line_height: pick(raw, "lineHeight", from_parent.line_height, initial.line_height, |v| {
            parse_line_height(v, font_size, root_font_size)
        }),
        text_align: pick(raw, "textAlign", from_parent.text_align, initial.text_align, parse_text_align),
        visibility: pick(raw, "visibility", from_parent.visibility, initial.visibility, parse_visibility),
        white_space: pick(raw, "whiteSpace", from_parent.white_space, initial.white_space, parse_white_space),
        letter_spacing: pick(
            raw,
            "letterSpacing",
            from_parent.letter_spacing,
            initial.letter_spacing,
            |v| parse_letter_spacing(v, font_size, root_font_size),
        ),
        font_size,
        color,
    };

    let mut own = StyleMap::new();
    let mut overrides: Vec<(String, String)> = Vec::new();
    for (name, value) in raw {
        if name.starts_with("--") {
            match CssWideKeyword::parse(value) {
                None => overrides.push((name.clone(), value.to_string())),
                Some(CssWideKeyword::Inherit | CssWideKeyword::Unset) => {}
                Some(CssWideKeyword::Initial | CssWideKeyword::Revert) => {
                    overrides.push((name.clone(), String::new()))
                }
            }
            continue;
        }
        if INHERITED_PROPERTIES.contains(&name.as_str()) {
            continue;
        }
        // Non-inherited properties never read from the parent, so every
        // CSS-wide keyword means "initial" here.
        if CssWideKeyword::parse(value).is_some() {
            continue;
        }
        let value = if value.is_keyword("currentcolor") {
            StyleValue::Text(inherited.color.clone())
        } else {
            value.clone()
        };
        own.insert(name.clone(), value);
    }

    let custom_properties = if overrides.is_empty() {
        Arc::clone(&parent.custom_properties)
    } else {
        let mut scope = (*parent.custom_properties).clone();
        for (name, value) in overrides {
            if value.is_empty() {
                scope.remove(&name);
            } else {
                scope.insert(name, value);
            }
        }
        Arc::new(scope)
    };

    ComputedStyle {
        inherited,
        own,
        custom_properties,
        root_font_size,
    }
}

/// Apply the keyword rules for one inheritable property
fn pick<T>(
    raw: &StyleMap,
    property: &str,
    parent: T,
    initial: T,
    parse: impl FnOnce(&StyleValue) -> Option<T>,
) -> T {
    let Some(value) = raw.get(property) else {
        return parent;
    };
    match CssWideKeyword::parse(value) {
        Some(CssWideKeyword::Inherit | CssWideKeyword::Unset) => parent,
        Some(CssWideKeyword::Initial | CssWideKeyword::Revert) => initial,
        None => match parse(value) {
            Some(parsed) => parsed,
            None => {
                let token = format!("{}:{}", property, value);
                warn_once(&token, || format!("unsupported value for {}: {}", property, value));
                parent
            }
        },
    }
}

fn parse_font_size(value: &StyleValue, parent: f32, root: f32) -> Option<f32> {
    if let StyleValue::Number(n) = value {
        return Some(*n as f32);
    }
    let text = value.as_str()?.trim().to_ascii_lowercase();
    let keyword = match text.as_str() {
        "xx-small" => Some(9.0),
        "x-small" => Some(10.0),
        "small" => Some(13.0),
        "medium" => Some(16.0),
        "large" => Some(18.0),
        "x-large" => Some(24.0),
        "xx-large" => Some(32.0),
        "smaller" => Some(parent / 1.2),
        "larger" => Some(parent * 1.2),
        _ => None,
    };
    if keyword.is_some() {
        return keyword;
    }
    let (n, unit) = split_dimension(&text)?;
    let n = n as f32;
    match unit {
        "" | "px" => Some(n),
        "em" => Some(n * parent),
        "%" => Some(n * parent / 100.0),
        "rem" => Some(n * root),
        _ => None,
    }
}

fn parse_font_weight(value: &StyleValue, parent: u16) -> Option<u16> {
    if let Some(n) = value.as_number() {
        return (1.0..=1000.0).contains(&n).then_some(n as u16);
    }
    match value.as_str()?.trim().to_ascii_lowercase().as_str() {
        "normal" => Some(400),
        "bold" => Some(700),
        "bolder" => Some(match parent {
            0..350 => 400,
            350..550 => 700,
            _ => 900,
        }),
        "lighter" => Some(match parent {
            0..550 => 100,
            550..750 => 400,
            _ => 700,
        }),
        _ => None,
    }
}

fn parse_line_height(value: &StyleValue, font_size: f32, root: f32) -> Option<LineHeight> {
    if let StyleValue::Number(n) = value {
        return Some(LineHeight::Number(*n as f32));
    }
    let text = value.as_str()?.trim().to_ascii_lowercase();
    if text == "normal" {
        return Some(LineHeight::Normal);
    }
    let (n, unit) = split_dimension(&text)?;
    let n = n as f32;
    match unit {
        "" => Some(LineHeight::Number(n)),
        "px" => Some(LineHeight::Px(n)),
        "%" => Some(LineHeight::Px(n * font_size / 100.0)),
        "em" => Some(LineHeight::Px(n * font_size)),
        "rem" => Some(LineHeight::Px(n * root)),
        _ => None,
    }
}

fn parse_letter_spacing(value: &StyleValue, font_size: f32, root: f32) -> Option<f32> {
    if value.is_keyword("normal") {
        return Some(0.0);
    }
    if let StyleValue::Number(n) = value {
        return Some(*n as f32);
    }
    let (n, unit) = split_dimension(value.as_str()?)?;
    let n = n as f32;
    match unit {
        "" | "px" => Some(n),
        "em" => Some(n * font_size),
        "rem" => Some(n * root),
        _ => None,
    }
}

fn parse_text_align(value: &StyleValue) -> Option<TextAlign> {
    match value.as_str()?.trim().to_ascii_lowercase().as_str() {
        "left" | "start" => Some(TextAlign::Left),
        "center" => Some(TextAlign::Center),
        "right" | "end" => Some(TextAlign::Right),
        "justify" => Some(TextAlign::Justify),
        _ => None,
    }
}

fn parse_visibility(value: &StyleValue) -> Option<Visibility> {
    match value.as_str()?.trim().to_ascii_lowercase().as_str() {
        "visible" => Some(Visibility::Visible),
        "hidden" => Some(Visibility::Hidden),
        "collapse" => Some(Visibility::Collapse),
        _ => None,
    }
}

fn parse_white_space(value: &StyleValue) -> Option<WhiteSpace> {
    match value.as_str()?.trim().to_ascii_lowercase().as_str() {
        "normal" => Some(WhiteSpace::Normal),
        "nowrap" => Some(WhiteSpace::NoWrap),
        "pre" => Some(WhiteSpace::Pre),
        "pre-wrap" => Some(WhiteSpace::PreWrap),
        "pre-line" => Some(WhiteSpace::PreLine),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style(pairs: &[(&str, &str)]) -> StyleMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), StyleValue::from(*v)))
            .collect()
    }

    #[test]
    fn test_inherits_by_default() {
        let root = ComputedStyle::root(16.0);
        let parent = resolve_style(&style(&[("color", "red"), ("textAlign", "center")]), &root);
        let child = resolve_style(&StyleMap::new(), &parent);
        assert_eq!(child.inherited.color, "red");
        assert_eq!(child.inherited.text_align, TextAlign::Center);
    }

    #[test]
    fn test_css_wide_keywords() {
        let root = ComputedStyle::root(16.0);
        let parent = resolve_style(&style(&[("color", "red"), ("fontWeight", "bold")]), &root);
        let child = resolve_style(
            &style(&[("color", "initial"), ("fontWeight", "inherit")]),
            &parent,
        );
        assert_eq!(child.inherited.color, "black");
        assert_eq!(child.inherited.font_weight, 700);

        let child = resolve_style(&style(&[("color", "unset"), ("fontWeight", "revert")]), &parent);
        assert_eq!(child.inherited.color, "red");
        assert_eq!(child.inherited.font_weight, 400);
    }

    #[test]
    fn test_non_inherited_never_reads_parent() {
        let root = ComputedStyle::root(16.0);
        let parent = resolve_style(&style(&[("width", "100px")]), &root);
        let child = resolve_style(&style(&[("padding", "inherit")]), &parent);
        assert!(child.get("width").is_none());
        assert!(child.get("padding").is_none());
    }

    #[test]
    fn test_current_color() {
        let root = ComputedStyle::root(16.0);
        let node = resolve_style(
            &style(&[("color", "blue"), ("borderColor", "currentColor")]),
            &root,
        );
        assert_eq!(node.get("borderColor"), Some(&StyleValue::from("blue")));
    }

    #[test]
    fn test_relative_font_sizes() {
        let root = ComputedStyle::root(16.0);
        let parent = resolve_style(&style(&[("fontSize", "20px")]), &root);
        assert_eq!(resolve_style(&style(&[("fontSize", "1.5em")]), &parent).font_size(), 30.0);
        assert_eq!(resolve_style(&style(&[("fontSize", "50%")]), &parent).font_size(), 10.0);
        assert_eq!(resolve_style(&style(&[("fontSize", "2rem")]), &parent).font_size(), 32.0);
    }

    #[test]
    fn test_line_height_forms() {
        let root = ComputedStyle::root(16.0);
        let node = resolve_style(&style(&[("fontSize", "10px"), ("lineHeight", "1.5")]), &root);
        assert_eq!(node.inherited.line_height_px(), 15.0);
        // A unitless line height stays relative in descendants.
        let child = resolve_style(&style(&[("fontSize", "20px")]), &node);
        assert_eq!(child.inherited.line_height_px(), 30.0);
        let node = resolve_style(&style(&[("fontSize", "10px"), ("lineHeight", "200%")]), &root);
        let child = resolve_style(&style(&[("fontSize", "20px")]), &node);
        assert_eq!(child.inherited.line_height_px(), 20.0);
    }

    #[test]
    fn test_custom_properties_scope() {
        let root = ComputedStyle::root(16.0);
        let parent = resolve_style(&style(&[("--gap", "8px")]), &root);
        let child = resolve_style(&style(&[("--pad", "4px")]), &parent);
        assert_eq!(child.custom_properties.get("--gap").map(String::as_str), Some("8px"));
        assert_eq!(child.custom_properties.get("--pad").map(String::as_str), Some("4px"));
        let grandchild = resolve_style(&StyleMap::new(), &child);
        assert!(Arc::ptr_eq(&grandchild.custom_properties, &child.custom_properties));
    }

    #[test]
    fn test_invalid_value_keeps_parent() {
        let root = ComputedStyle::root(16.0);
        let parent = resolve_style(&style(&[("textAlign", "right")]), &root);
        let child = resolve_style(&style(&[("textAlign", "diagonal")]), &parent);
        assert_eq!(child.inherited.text_align, TextAlign::Right);
    }
}
