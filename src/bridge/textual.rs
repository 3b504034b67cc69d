//! Textual style encoding
//!
//! A JSON array with one `{"children": [..], "style": {..}}` object per
//! node. Keyword fields are strings, floats are numbers, lengths are
//! `"<n>px"` and percentages `"<n>%"`. Auto dimensions and placements are
//! omitted; margins and insets keep an explicit `"auto"`.

use serde_json::{Map, Value};

use super::style::{format_tracks, Dim, EngineStyle, FieldId, FieldKind, FieldValue, Placement, TrackSize};
use super::{BatchNode, StyleBatch, StyleCodec, StylePayload};
use crate::style::units::split_dimension;
use crate::utils::{LayoutError, Result, WireEncoding};

const ROWS_KEY: &str = "gridTemplateRows";
const COLUMNS_KEY: &str = "gridTemplateColumns";

/// JSON codec
#[derive(Debug, Clone, Copy, Default)]
pub struct TextualCodec;

impl StyleCodec for TextualCodec {
    fn encoding(&self) -> WireEncoding {
        WireEncoding::Textual
    }

    fn encode_batch(&self, batch: &StyleBatch) -> Result<StylePayload> {
        Ok(StylePayload::Textual(encode(batch)?))
    }

    fn decode_batch(&self, payload: &StylePayload) -> Result<StyleBatch> {
        match payload {
            StylePayload::Textual(text) => decode(text),
            StylePayload::Binary(_) => Err(LayoutError::Textual(
                "textual codec received a binary payload".to_string(),
            )),
        }
    }
}

fn textual_error(message: impl Into<String>) -> LayoutError {
    LayoutError::Textual(message.into())
}

/// Encode a post-order batch as JSON
pub fn encode(batch: &StyleBatch) -> Result<String> {
    batch.validate()?;
    let nodes: Vec<Value> = batch
        .nodes
        .iter()
        .map(|node| {
            let mut entry = Map::new();
            entry.insert(
                "children".to_string(),
                Value::Array(node.children.iter().map(|&c| Value::from(c)).collect()),
            );
            entry.insert("style".to_string(), Value::Object(style_to_map(&node.style)));
            Value::Object(entry)
        })
        .collect();
    Ok(serde_json::to_string(&Value::Array(nodes))?)
}

/// The textual record for one style
pub fn style_to_map(style: &EngineStyle) -> Map<String, Value> {
    let mut map = Map::new();
    for (field, value) in style.present_fields() {
        if let Some(v) = field_to_value(field, value) {
            map.insert(field.name().to_string(), v);
        }
    }
    if !style.grid_template_rows.is_empty() {
        map.insert(
            ROWS_KEY.to_string(),
            Value::String(format_tracks(&style.grid_template_rows)),
        );
    }
    if !style.grid_template_columns.is_empty() {
        map.insert(
            COLUMNS_KEY.to_string(),
            Value::String(format_tracks(&style.grid_template_columns)),
        );
    }
    map
}

fn field_to_value(field: FieldId, value: FieldValue) -> Option<Value> {
    match (field.kind(), value) {
        (FieldKind::Keyword(table), FieldValue::Keyword(code)) => table
            .get(usize::from(code))
            .map(|k| Value::String((*k).to_string())),
        (_, FieldValue::Float(v)) => {
            let number = serde_json::Number::from_f64(f64::from(v));
            if number.is_none() {
                log::debug!("skipping non-finite {} for {}", v, field.name());
            }
            number.map(Value::Number)
        }
        (kind, FieldValue::Dim(dim)) => match dim {
            Dim::Auto if kind == FieldKind::LengthPercentageAuto => {
                Some(Value::String("auto".to_string()))
            }
            Dim::Auto => None,
            Dim::Length(px) => Some(Value::String(format!("{}px", f64::from(px)))),
            Dim::Percent(frac) => Some(Value::String(format!("{}%", f64::from(frac) * 100.0))),
        },
        (_, FieldValue::Placement(placement)) => match placement {
            Placement::Auto => None,
            Placement::Line(n) => Some(Value::from(n)),
            Placement::Span(n) => Some(Value::String(format!("span {}", n))),
        },
        _ => None,
    }
}

/// Decode a JSON batch
pub fn decode(text: &str) -> Result<StyleBatch> {
    let root: Value = serde_json::from_str(text)?;
    let Value::Array(entries) = root else {
        return Err(textual_error("expected a JSON array of nodes"));
    };

    let mut nodes = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let children = match entry.get("children") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|c| {
                    c.as_u64()
                        .map(|c| c as usize)
                        .ok_or_else(|| textual_error(format!("node {}: bad child index {}", index, c)))
                })
                .collect::<Result<Vec<_>>>()?,
            Some(other) => {
                return Err(textual_error(format!("node {}: bad children {}", index, other)));
            }
        };
        let style = match entry.get("style") {
            None | Some(Value::Null) => EngineStyle::new(),
            Some(Value::Object(map)) => style_from_map(map)?,
            Some(other) => {
                return Err(textual_error(format!("node {}: bad style {}", index, other)));
            }
        };
        nodes.push(BatchNode { style, children });
    }
    let batch = StyleBatch { nodes };
    batch.validate()?;
    Ok(batch)
}

/// Parse one textual style record
pub fn style_from_map(map: &Map<String, Value>) -> Result<EngineStyle> {
    let mut style = EngineStyle::new();
    for (key, value) in map {
        if key == ROWS_KEY || key == COLUMNS_KEY {
            let tracks = value
                .as_str()
                .and_then(TrackSize::parse_list)
                .ok_or_else(|| textual_error(format!("bad track list for {}: {}", key, value)))?;
            if key == ROWS_KEY {
                style.grid_template_rows = tracks;
            } else {
                style.grid_template_columns = tracks;
            }
            continue;
        }
        let field = FieldId::from_name(key)
            .ok_or_else(|| textual_error(format!("unknown style key {}", key)))?;
        let parsed = value_to_field(field, value)
            .ok_or_else(|| textual_error(format!("bad value for {}: {}", key, value)))?;
        style.set(field, parsed);
    }
    Ok(style)
}

fn value_to_field(field: FieldId, value: &Value) -> Option<FieldValue> {
    match field.kind() {
        FieldKind::Keyword(table) => {
            let text = value.as_str()?.trim();
            table
                .iter()
                .position(|k| k.eq_ignore_ascii_case(text))
                .map(|code| FieldValue::Keyword(code as u8))
        }
        FieldKind::Float => value.as_f64().map(|v| FieldValue::Float(v as f32)),
        FieldKind::Dimension | FieldKind::LengthPercentageAuto | FieldKind::LengthPercentage => {
            parse_dim(value).map(FieldValue::Dim)
        }
        FieldKind::Placement => parse_placement(value).map(FieldValue::Placement),
    }
}

fn parse_dim(value: &Value) -> Option<Dim> {
    if let Some(n) = value.as_f64() {
        return Some(Dim::Length(n as f32));
    }
    let text = value.as_str()?.trim();
    if text.eq_ignore_ascii_case("auto") {
        return Some(Dim::Auto);
    }
    let (number, unit) = split_dimension(text)?;
    match unit {
        "" | "px" => Some(Dim::Length(number as f32)),
        "%" => Some(Dim::Percent((number / 100.0) as f32)),
        _ => None,
    }
}

fn parse_placement(value: &Value) -> Option<Placement> {
    if let Some(n) = value.as_i64() {
        return i16::try_from(n).ok().map(Placement::Line);
    }
    let text = value.as_str()?.trim();
    if text.eq_ignore_ascii_case("auto") {
        return Some(Placement::Auto);
    }
    if let Some(count) = text.strip_prefix("span") {
        return count.trim().parse().ok().map(Placement::Span);
    }
    text.parse().ok().map(Placement::Line)
}
