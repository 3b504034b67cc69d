//! Implicit per-widget styles
//!
//! Each widget kind maps to one injection function that fills in default
//! declarations the author did not write. The kind is resolved once per
//! node from its tag.

use std::borrow::Cow;

use crate::document::{ElementId, StyleMap, StyledBox, StyleValue};

/// High bit marks ids synthesized by the traversal
pub const SYNTHETIC_ID_BIT: ElementId = 1 << 63;

/// Id of the label child synthesized for a control
pub fn synthetic_label_id(parent: ElementId) -> ElementId {
    parent | SYNTHETIC_ID_BIT
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    Container,
    Text,
    Image,
    Button,
    Input,
    Checkbox,
    Toggle,
    Select,
    Badge,
}

/// `props.size` variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeVariant {
    Sm,
    #[default]
    Md,
    Lg,
}

impl SizeVariant {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("sm" | "small") => SizeVariant::Sm,
            Some("lg" | "large") => SizeVariant::Lg,
            _ => SizeVariant::Md,
        }
    }

    fn pick<T>(self, sm: T, md: T, lg: T) -> T {
        match self {
            SizeVariant::Sm => sm,
            SizeVariant::Md => md,
            SizeVariant::Lg => lg,
        }
    }
}

type Injector = fn(&mut StyleMap, SizeVariant);

impl WidgetKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "text" | "label" | "span" | "p" | "heading" => WidgetKind::Text,
            "image" | "img" => WidgetKind::Image,
            "button" => WidgetKind::Button,
            "input" | "textfield" | "textarea" => WidgetKind::Input,
            "checkbox" | "radio" => WidgetKind::Checkbox,
            "toggle" | "switch" => WidgetKind::Toggle,
            "select" | "dropdown" => WidgetKind::Select,
            "badge" | "tag" | "chip" => WidgetKind::Badge,
            _ => WidgetKind::Container,
        }
    }

    /// Interactive controls default to inline-block, middle-aligned
    pub fn is_control(self) -> bool {
        matches!(
            self,
            WidgetKind::Button
                | WidgetKind::Input
                | WidgetKind::Checkbox
                | WidgetKind::Toggle
                | WidgetKind::Select
                | WidgetKind::Badge
        )
    }

    /// Widgets whose authored children are ignored
    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            WidgetKind::Text
                | WidgetKind::Image
                | WidgetKind::Input
                | WidgetKind::Checkbox
                | WidgetKind::Toggle
        )
    }

    /// Controls that show a text label child
    fn has_label(self) -> bool {
        matches!(self, WidgetKind::Button | WidgetKind::Select | WidgetKind::Badge)
    }

    fn injector(self) -> Option<Injector> {
        match self {
            WidgetKind::Container | WidgetKind::Text | WidgetKind::Image => None,
            WidgetKind::Button => Some(inject_button),
            WidgetKind::Input => Some(inject_input),
            WidgetKind::Checkbox => Some(inject_checkbox),
            WidgetKind::Toggle => Some(inject_toggle),
            WidgetKind::Select => Some(inject_select),
            WidgetKind::Badge => Some(inject_badge),
        }
    }
}

fn default(style: &mut StyleMap, property: &str, value: impl Into<StyleValue>) {
    style
        .entry(property.to_string())
        .or_insert_with(|| value.into());
}

fn inject_control(style: &mut StyleMap) {
    default(style, "display", "inline-block");
    default(style, "verticalAlign", "middle");
}

fn inject_button(style: &mut StyleMap, size: SizeVariant) {
    inject_control(style);
    if !style.contains_key("padding") {
        default(style, "padding", size.pick("4px 8px", "6px 12px", "8px 16px"));
    }
    default(style, "borderWidth", 1.0);
}

fn inject_input(style: &mut StyleMap, size: SizeVariant) {
    inject_control(style);
    default(style, "width", 160.0);
    default(style, "height", size.pick(24.0, 32.0, 40.0));
    default(style, "padding", "0px 8px");
    default(style, "borderWidth", 1.0);
}

fn inject_checkbox(style: &mut StyleMap, size: SizeVariant) {
    inject_control(style);
    let side = size.pick(12.0, 16.0, 20.0);
    default(style, "width", side);
    default(style, "height", side);
}

fn inject_toggle(style: &mut StyleMap, size: SizeVariant) {
    inject_control(style);
    default(style, "width", size.pick(28.0, 36.0, 44.0));
    default(style, "height", size.pick(16.0, 20.0, 24.0));
}

fn inject_select(style: &mut StyleMap, size: SizeVariant) {
    inject_control(style);
    default(style, "minWidth", 120.0);
    default(style, "padding", size.pick("2px 8px", "4px 10px", "6px 12px"));
    default(style, "borderWidth", 1.0);
}

fn inject_badge(style: &mut StyleMap, size: SizeVariant) {
    inject_control(style);
    default(style, "padding", size.pick("0px 4px", "2px 6px", "4px 8px"));
    default(style, "fontSize", size.pick(10.0, 12.0, 14.0));
}

/// A node after injection, with the children the traversal should visit
#[derive(Debug)]
pub struct Injected<'a> {
    pub kind: WidgetKind,
    pub node: Cow<'a, StyledBox>,
    pub children: Vec<Cow<'a, StyledBox>>,
}

/// Apply the widget rules for `node`. The input is never modified; a
/// copy is made only when a default is actually added.
pub fn inject<'a>(node: &'a StyledBox, children: Vec<&'a StyledBox>) -> Injected<'a> {
    let kind = WidgetKind::from_tag(&node.tag);
    let node = match kind.injector() {
        Some(injector) => {
            let mut style = node.props.style.clone();
            injector(&mut style, SizeVariant::parse(node.props.size.as_deref()));
            if style == node.props.style {
                Cow::Borrowed(node)
            } else {
                let mut copy = node.clone();
                copy.props.style = style;
                Cow::Owned(copy)
            }
        }
        None => Cow::Borrowed(node),
    };

    let children: Vec<Cow<'a, StyledBox>> = if kind.is_leaf() {
        Vec::new()
    } else if children.is_empty() && kind.has_label() {
        node.props
            .label
            .as_ref()
            .map(|label| {
                Cow::Owned(
                    StyledBox::new(synthetic_label_id(node.id), "text")
                        .with_text(label.clone())
                        .child_of(node.id, 0.0),
                )
            })
            .into_iter()
            .collect()
    } else {
        children.into_iter().map(Cow::Borrowed).collect()
    };

    Injected {
        kind,
        node,
        children,
    }
}
