//! Engine style records built from computed styles
//!
//! Every authored property the constraint engine understands is copied
//! onto an [`EngineStyle`]. Lengths go through the expression resolver, so
//! `calc()`, `var()` and font-relative units arrive as pixels or fractions.

use crate::bridge::style::{
    BoxSizing, ContentAlign, Dim, EngineStyle, FieldId, FlexDirection, FlexWrap, GridAutoFlow,
    ItemAlign, Overflow, Placement, Position, TrackSize, BORDER_FIELDS, INSET_FIELDS,
    MARGIN_FIELDS, PADDING_FIELDS,
};
use crate::document::StyleValue;
use crate::layout::types::FlowPosition;
use crate::style::expr::{resolve_length, ExprContext, ResolvedLength};
use crate::style::units::{edge_values, EdgeProperty};
use crate::style::ComputedStyle;
use crate::utils::warn_once;

/// Upper bound on `repeat()` expansion
const MAX_REPEAT: usize = 1000;

/// The `position` keyword
pub fn position_of(style: &ComputedStyle) -> FlowPosition {
    match style.keyword("position").as_deref() {
        Some("relative" | "sticky") => FlowPosition::Relative,
        Some("absolute") => FlowPosition::Absolute,
        Some("fixed") => FlowPosition::Fixed,
        _ => FlowPosition::Static,
    }
}

/// Build the engine record for one node. `available_height` is the
/// percentage basis for heights; widths use `ctx.available`.
pub fn build(
    style: &ComputedStyle,
    position: FlowPosition,
    ctx: &ExprContext<'_>,
    available_height: Option<f32>,
) -> EngineStyle {
    let mut out = EngineStyle::new();
    match position {
        FlowPosition::Absolute | FlowPosition::Fixed => out.set_position(Position::Absolute),
        FlowPosition::Relative => out.set_position(Position::Relative),
        FlowPosition::Static => {}
    }
    let height_ctx = ExprContext {
        available: available_height,
        ..*ctx
    };

    keywords(style, &mut out);
    flex(style, ctx, &mut out);
    aspect_ratio(style, &mut out);

    for (field, name, ctx) in [
        (FieldId::Width, "width", ctx),
        (FieldId::Height, "height", &height_ctx),
        (FieldId::MinWidth, "minWidth", ctx),
        (FieldId::MinHeight, "minHeight", &height_ctx),
        (FieldId::MaxWidth, "maxWidth", ctx),
        (FieldId::MaxHeight, "maxHeight", &height_ctx),
    ] {
        if let Some(value) = style.get(name).filter(|v| !v.is_keyword("none")) {
            if let Some(dim) = dim_of(value, ctx) {
                out.set_dim(field, dim);
            }
        }
    }

    edges(style, EdgeProperty::Margin, MARGIN_FIELDS, ctx, &mut out);
    edges(style, EdgeProperty::Padding, PADDING_FIELDS, ctx, &mut out);
    edges(style, EdgeProperty::BorderWidth, BORDER_FIELDS, ctx, &mut out);
    if position != FlowPosition::Static {
        for (field, name) in INSET_FIELDS.into_iter().zip(["top", "right", "bottom", "left"]) {
            if let Some(dim) = style.get(name).and_then(|v| dim_of(v, ctx)) {
                out.set_dim(field, dim);
            }
        }
    }

    gaps(style, ctx, &mut out);
    grid(style, &mut out);
    out
}

fn dim_of(value: &StyleValue, ctx: &ExprContext<'_>) -> Option<Dim> {
    resolve_length(value, ctx).map(|resolved| match resolved {
        ResolvedLength::Auto => Dim::Auto,
        ResolvedLength::Px(px) => Dim::Length(px),
        ResolvedLength::Percent(frac) => Dim::Percent(frac),
    })
}

/// Parse a keyword property, warning once for values the engine lacks
fn keyword<K>(
    style: &ComputedStyle,
    name: &str,
    parse: impl Fn(&str) -> Option<K>,
) -> Option<K> {
    let text = style.keyword(name)?;
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let parsed = parse(&text);
    if parsed.is_none() && !matches!(text.as_str(), "normal" | "auto") {
        let token = format!("{}: {}", name, text);
        warn_once(&token, || format!("unsupported keyword {:?}", token));
    }
    parsed
}

fn overflow_keyword(text: &str) -> Option<Overflow> {
    match text {
        "auto" => Some(Overflow::Scroll),
        other => Overflow::parse(other),
    }
}

fn keywords(style: &ComputedStyle, out: &mut EngineStyle) {
    // overflow: <x> [<y>]
    if let Some(text) = style.keyword("overflow") {
        let mut parts = text.split_whitespace().map(overflow_keyword);
        if let Some(Some(x)) = parts.next() {
            let y = parts.next().flatten().unwrap_or(x);
            out.set_keyword_code(FieldId::OverflowX, x.code());
            out.set_keyword_code(FieldId::OverflowY, y.code());
        }
    }
    for (field, name) in [(FieldId::OverflowX, "overflowX"), (FieldId::OverflowY, "overflowY")] {
        if let Some(value) = keyword(style, name, overflow_keyword) {
            out.set_keyword_code(field, value.code());
        }
    }

    if let Some(direction) = keyword(style, "flexDirection", FlexDirection::parse) {
        out.set_flex_direction(direction);
    }
    if let Some(wrap) = keyword(style, "flexWrap", FlexWrap::parse) {
        out.set_flex_wrap(wrap);
    }
    for (field, name) in [
        (FieldId::JustifyContent, "justifyContent"),
        (FieldId::AlignContent, "alignContent"),
    ] {
        if let Some(align) = keyword(style, name, |t| match t {
            "left" => Some(ContentAlign::Start),
            "right" => Some(ContentAlign::End),
            other => ContentAlign::parse(other),
        }) {
            out.set_keyword_code(field, align.code());
        }
    }
    for (field, name) in [
        (FieldId::AlignItems, "alignItems"),
        (FieldId::AlignSelf, "alignSelf"),
        (FieldId::JustifyItems, "justifyItems"),
    ] {
        if let Some(align) = keyword(style, name, ItemAlign::parse) {
            out.set_keyword_code(field, align.code());
        }
    }
    if let Some(flow) = keyword(style, "gridAutoFlow", |t| match t {
        "dense" | "dense row" => Some(GridAutoFlow::RowDense),
        "dense column" => Some(GridAutoFlow::ColumnDense),
        other => GridAutoFlow::parse(other),
    }) {
        out.set_keyword_code(FieldId::GridAutoFlow, flow.code());
    }
    if let Some(sizing) = keyword(style, "boxSizing", BoxSizing::parse) {
        out.set_box_sizing(sizing);
    }
}

/// `flex` shorthand plus the three longhands
fn flex(style: &ComputedStyle, ctx: &ExprContext<'_>, out: &mut EngineStyle) {
    if let Some(value) = style.get("flex") {
        match flex_shorthand(value, ctx) {
            Some((grow, shrink, basis)) => {
                out.set_float(FieldId::FlexGrow, grow);
                out.set_float(FieldId::FlexShrink, shrink);
                out.set_dim(FieldId::FlexBasis, basis);
            }
            None => {
                let token = value.to_string();
                warn_once(&token, || format!("unsupported flex shorthand {:?}", token));
            }
        }
    }
    for (field, name) in [(FieldId::FlexGrow, "flexGrow"), (FieldId::FlexShrink, "flexShrink")] {
        if let Some(n) = style.get(name).and_then(number) {
            out.set_float(field, n);
        }
    }
    if let Some(basis) = style.get("flexBasis").and_then(|v| dim_of(v, ctx)) {
        out.set_dim(FieldId::FlexBasis, basis);
    }
}

fn number(value: &StyleValue) -> Option<f32> {
    match value {
        StyleValue::Number(n) => Some(*n as f32),
        StyleValue::Text(text) => text.trim().parse().ok(),
    }
}

fn flex_shorthand(value: &StyleValue, ctx: &ExprContext<'_>) -> Option<(f32, f32, Dim)> {
    let text = match value {
        StyleValue::Number(n) => return Some((*n as f32, 1.0, Dim::Length(0.0))),
        StyleValue::Text(text) => text.trim().to_ascii_lowercase(),
    };
    match text.as_str() {
        "none" => return Some((0.0, 0.0, Dim::Auto)),
        "auto" => return Some((1.0, 1.0, Dim::Auto)),
        "initial" => return Some((0.0, 1.0, Dim::Auto)),
        _ => {}
    }
    let mut numbers = Vec::new();
    let mut basis = None;
    for token in text.split_whitespace() {
        match token.parse::<f32>() {
            Ok(n) if basis.is_none() && numbers.len() < 2 => numbers.push(n),
            _ if basis.is_none() => basis = Some(dim_of(&StyleValue::from(token), ctx)?),
            _ => return None,
        }
    }
    let grow = numbers.first().copied().unwrap_or(1.0);
    let shrink = numbers.get(1).copied().unwrap_or(1.0);
    Some((grow, shrink, basis.unwrap_or(Dim::Length(0.0))))
}

fn aspect_ratio(style: &ComputedStyle, out: &mut EngineStyle) {
    let Some(value) = style.get("aspectRatio") else {
        return;
    };
    let ratio = match value {
        StyleValue::Number(n) => Some(*n as f32),
        StyleValue::Text(text) => match text.split_once('/') {
            Some((w, h)) => match (w.trim().parse::<f32>(), h.trim().parse::<f32>()) {
                (Ok(w), Ok(h)) if h > 0.0 => Some(w / h),
                _ => None,
            },
            None => text.trim().parse().ok(),
        },
    };
    match ratio {
        Some(ratio) if ratio > 0.0 => out.set_float(FieldId::AspectRatio, ratio),
        _ if value.is_keyword("auto") => {}
        _ => {
            let token = value.to_string();
            warn_once(&token, || format!("unsupported aspectRatio {:?}", token));
        }
    }
}

fn edges(
    style: &ComputedStyle,
    property: EdgeProperty,
    fields: [FieldId; 4],
    ctx: &ExprContext<'_>,
    out: &mut EngineStyle,
) {
    for (field, value) in fields.into_iter().zip(edge_values(&style.own, property)) {
        if let Some(dim) = value.and_then(|v| dim_of(&v, ctx)) {
            out.set_dim(field, dim);
        }
    }
}

fn gaps(style: &ComputedStyle, ctx: &ExprContext<'_>, out: &mut EngineStyle) {
    if let Some(value) = style.get("gap") {
        let parts: Vec<StyleValue> = match value {
            StyleValue::Number(_) => vec![value.clone()],
            StyleValue::Text(text) => text.split_whitespace().map(StyleValue::from).collect(),
        };
        let (row, column) = match parts.as_slice() {
            [both] => (Some(both), Some(both)),
            [row, column] => (Some(row), Some(column)),
            _ => (None, None),
        };
        if let Some(dim) = row.and_then(|v| dim_of(v, ctx)) {
            out.set_dim(FieldId::RowGap, dim);
        }
        if let Some(dim) = column.and_then(|v| dim_of(v, ctx)) {
            out.set_dim(FieldId::ColumnGap, dim);
        }
    }
    for (field, name) in [(FieldId::RowGap, "rowGap"), (FieldId::ColumnGap, "columnGap")] {
        if let Some(dim) = style.get(name).and_then(|v| dim_of(v, ctx)) {
            out.set_dim(field, dim);
        }
    }
}

fn grid(style: &ComputedStyle, out: &mut EngineStyle) {
    for (name, rows) in [("gridTemplateRows", true), ("gridTemplateColumns", false)] {
        let Some(text) = style.get(name).and_then(StyleValue::as_str) else {
            continue;
        };
        match track_list(text) {
            Some(tracks) if rows => out.grid_template_rows = tracks,
            Some(tracks) => out.grid_template_columns = tracks,
            None => {
                warn_once(text, || format!("unsupported track list {:?}", text));
            }
        }
    }

    for (shorthand, start, end) in [
        ("gridRow", FieldId::GridRowStart, FieldId::GridRowEnd),
        ("gridColumn", FieldId::GridColumnStart, FieldId::GridColumnEnd),
    ] {
        if let Some(value) = style.get(shorthand) {
            let text = value.to_string();
            let (first, second) = match text.split_once('/') {
                Some((a, b)) => (a, Some(b)),
                None => (text.as_str(), None),
            };
            if let Some(p) = placement(first) {
                out.set_placement(start, p);
            }
            if let Some(p) = second.and_then(placement) {
                out.set_placement(end, p);
            }
        }
    }
    for (field, name) in [
        (FieldId::GridRowStart, "gridRowStart"),
        (FieldId::GridRowEnd, "gridRowEnd"),
        (FieldId::GridColumnStart, "gridColumnStart"),
        (FieldId::GridColumnEnd, "gridColumnEnd"),
    ] {
        if let Some(p) = style.get(name).and_then(|v| placement(&v.to_string())) {
            out.set_placement(field, p);
        }
    }
}

/// A grid line or `span N`
fn placement(text: &str) -> Option<Placement> {
    let text = text.trim().to_ascii_lowercase();
    if text == "auto" {
        return Some(Placement::Auto);
    }
    if let Some(count) = text.strip_prefix("span") {
        return count.trim().parse().ok().map(Placement::Span);
    }
    text.parse().ok().map(Placement::Line)
}

/// Track list with `repeat(<n>, <tracks>)` expanded
pub fn track_list(text: &str) -> Option<Vec<TrackSize>> {
    let lowered = text.trim().to_ascii_lowercase();
    let mut rest = lowered.as_str();
    let mut tracks = Vec::new();
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("repeat(") {
            let close = after.find(')')?;
            let (count, pattern) = after[..close].split_once(',')?;
            let count: usize = count.trim().parse().ok()?;
            let pattern = TrackSize::parse_list(pattern)?;
            for _ in 0..count.min(MAX_REPEAT) {
                tracks.extend_from_slice(&pattern);
            }
            rest = after[close + 1..].trim_start();
        } else {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            tracks.push(TrackSize::parse(&rest[..end])?);
            rest = rest[end..].trim_start();
        }
    }
    Some(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::StyleMap;
    use crate::style::{resolve_style, CustomProperties};
    use crate::utils::Viewport;
    use pretty_assertions::assert_eq;

    fn record(pairs: &[(&str, StyleValue)], position: FlowPosition) -> EngineStyle {
        let raw: StyleMap = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        let computed = resolve_style(&raw, &ComputedStyle::root(16.0));
        let vars = CustomProperties::new();
        let ctx = ExprContext {
            available: Some(400.0),
            viewport: Some(Viewport::new(1000.0, 500.0)),
            font_size: 16.0,
            root_font_size: 16.0,
            vars: &vars,
        };
        build(&computed, position, &ctx, Some(300.0))
    }

    #[test]
    fn test_lengths_keep_percentages() {
        let style = record(
            &[
                ("width", "50%".into()),
                ("height", "calc(10px + 1em)".into()),
                ("maxWidth", "none".into()),
                ("minHeight", "10vh".into()),
            ],
            FlowPosition::Static,
        );
        assert_eq!(style.dim(FieldId::Width), Dim::Percent(0.5));
        assert_eq!(style.dim(FieldId::Height), Dim::Length(26.0));
        assert!(!style.is_set(FieldId::MaxWidth));
        assert_eq!(style.dim(FieldId::MinHeight), Dim::Length(50.0));
    }

    #[test]
    fn test_edges_and_insets() {
        let style = record(
            &[
                ("margin", "10px auto".into()),
                ("padding", 4.0.into()),
                ("paddingLeft", "8px".into()),
                ("top", 5.0.into()),
            ],
            FlowPosition::Static,
        );
        assert_eq!(style.dim(FieldId::MarginTop), Dim::Length(10.0));
        assert_eq!(style.dim(FieldId::MarginLeft), Dim::Auto);
        assert!(style.is_set(FieldId::MarginLeft));
        assert_eq!(style.length_percentage(FieldId::PaddingLeft), Dim::Length(8.0));
        // static boxes ignore insets
        assert!(!style.is_set(FieldId::InsetTop));

        let absolute = record(&[("top", 5.0.into())], FlowPosition::Absolute);
        assert_eq!(absolute.dim(FieldId::InsetTop), Dim::Length(5.0));
        assert_eq!(absolute.position(), Position::Absolute);
    }

    #[test]
    fn test_flex_shorthand() {
        let style = record(&[("flex", 1.0.into())], FlowPosition::Static);
        assert_eq!(style.float(FieldId::FlexGrow), Some(1.0));
        assert_eq!(style.float(FieldId::FlexShrink), Some(1.0));
        assert_eq!(style.dim(FieldId::FlexBasis), Dim::Length(0.0));

        let style = record(
            &[("flex", "2 0 100px".into()), ("flexShrink", 3.0.into())],
            FlowPosition::Static,
        );
        assert_eq!(style.float(FieldId::FlexGrow), Some(2.0));
        assert_eq!(style.float(FieldId::FlexShrink), Some(3.0));
        assert_eq!(style.dim(FieldId::FlexBasis), Dim::Length(100.0));

        let none = record(&[("flex", "none".into())], FlowPosition::Static);
        assert_eq!(none.float(FieldId::FlexShrink), Some(0.0));
        assert!(!none.is_set(FieldId::FlexBasis));
    }

    #[test]
    fn test_keywords() {
        let style = record(
            &[
                ("overflow", "auto".into()),
                ("overflowX", "hidden".into()),
                ("justifyContent", "space-between".into()),
                ("gridAutoFlow", "row  dense".into()),
                ("boxSizing", "content-box".into()),
            ],
            FlowPosition::Static,
        );
        assert_eq!(style.overflow(FieldId::OverflowY), Overflow::Scroll);
        assert_eq!(style.overflow(FieldId::OverflowX), Overflow::Hidden);
        assert_eq!(
            style.keyword(FieldId::JustifyContent),
            Some(ContentAlign::SpaceBetween.code())
        );
        assert_eq!(
            style.keyword(FieldId::GridAutoFlow),
            Some(GridAutoFlow::RowDense.code())
        );
        assert_eq!(style.box_sizing(), BoxSizing::ContentBox);
    }

    #[test]
    fn test_grid_properties() {
        let style = record(
            &[
                ("gridTemplateColumns", "repeat(3, 1fr) 200px".into()),
                ("gridRow", "2 / span 3".into()),
                ("gridColumnStart", 1.0.into()),
                ("gap", "8px 4px".into()),
                ("aspectRatio", "16 / 9".into()),
            ],
            FlowPosition::Static,
        );
        assert_eq!(
            style.grid_template_columns,
            vec![
                TrackSize::Fr(1.0),
                TrackSize::Fr(1.0),
                TrackSize::Fr(1.0),
                TrackSize::Length(200.0)
            ]
        );
        assert_eq!(style.placement(FieldId::GridRowStart), Placement::Line(2));
        assert_eq!(style.placement(FieldId::GridRowEnd), Placement::Span(3));
        assert_eq!(style.placement(FieldId::GridColumnStart), Placement::Line(1));
        assert_eq!(style.length_percentage(FieldId::RowGap), Dim::Length(8.0));
        assert_eq!(style.length_percentage(FieldId::ColumnGap), Dim::Length(4.0));
        assert_eq!(style.float(FieldId::AspectRatio), Some(16.0 / 9.0));
    }

    #[test]
    fn test_bad_track_list_is_skipped() {
        assert_eq!(track_list("minmax(10px, 1fr)"), None);
        assert_eq!(track_list("repeat(2, 10px 20%)").map(|t| t.len()), Some(4));
    }
}
