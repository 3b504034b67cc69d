//! Binary style encoding
//!
//! ```text
//! header: magic[4] version:u8 count:u32
//! node:   presence_lo:u32 presence_hi:u32
//!         child_count:u16 child:u16*
//!         sideband_len:u16 sideband[len]   (grid tracks as JSON)
//!         fields in ascending bit order
//! ```
//!
//! All integers and floats are little-endian. Dimension fields take a tag
//! byte (auto=0, length=1, percent=2) and an f32; percentages travel as
//! fractions. Placements take a tag byte (auto=0, line=1, span=2) and an i16.

use serde::{Deserialize, Serialize};

use super::style::{
    Dim, EngineStyle, FieldId, FieldKind, FieldValue, Placement, TrackSize, FIELD_COUNT,
};
use super::{BatchNode, StyleBatch, StyleCodec, StylePayload};
use crate::utils::{LayoutError, Result, WireEncoding, WireError};

pub const MAGIC: [u8; 4] = *b"BXLY";
pub const VERSION: u8 = 1;

const DIM_AUTO: u8 = 0;
const DIM_LENGTH: u8 = 1;
const DIM_PERCENT: u8 = 2;

const PLACE_AUTO: u8 = 0;
const PLACE_LINE: u8 = 1;
const PLACE_SPAN: u8 = 2;

#[derive(Debug, Serialize, Deserialize)]
struct GridSideband {
    #[serde(default)]
    rows: Vec<TrackSize>,
    #[serde(default)]
    columns: Vec<TrackSize>,
}

/// Fixed-layout binary codec
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl StyleCodec for BinaryCodec {
    fn encoding(&self) -> WireEncoding {
        WireEncoding::Binary
    }

    fn encode_batch(&self, batch: &StyleBatch) -> Result<StylePayload> {
        Ok(StylePayload::Binary(encode(batch)?))
    }

    fn decode_batch(&self, payload: &StylePayload) -> Result<StyleBatch> {
        match payload {
            StylePayload::Binary(bytes) => Ok(decode(bytes)?),
            StylePayload::Textual(_) => Err(LayoutError::Textual(
                "binary codec received a textual payload".to_string(),
            )),
        }
    }
}

/// Encode a post-order batch
pub fn encode(batch: &StyleBatch) -> std::result::Result<Vec<u8>, WireError> {
    batch.validate()?;
    let count = batch.nodes.len();
    if count > usize::from(u16::MAX) {
        return Err(WireError::TooManyNodes(count));
    }

    let mut out = Vec::with_capacity(9 + count * 24);
    out.extend_from_slice(&MAGIC);
    out.push(VERSION);
    out.extend_from_slice(&(count as u32).to_le_bytes());

    for node in &batch.nodes {
        let presence = node.style.presence();
        out.extend_from_slice(&(presence as u32).to_le_bytes());
        out.extend_from_slice(&((presence >> 32) as u32).to_le_bytes());

        out.extend_from_slice(&(node.children.len() as u16).to_le_bytes());
        for &child in &node.children {
            out.extend_from_slice(&(child as u16).to_le_bytes());
        }

        if node.style.has_grid_templates() {
            let sideband = serde_json::to_vec(&GridSideband {
                rows: node.style.grid_template_rows.clone(),
                columns: node.style.grid_template_columns.clone(),
            })
            .map_err(|e| WireError::BadSideband(e.to_string()))?;
            if sideband.len() > usize::from(u16::MAX) {
                return Err(WireError::SidebandTooLarge(sideband.len()));
            }
            out.extend_from_slice(&(sideband.len() as u16).to_le_bytes());
            out.extend_from_slice(&sideband);
        } else {
            out.extend_from_slice(&0u16.to_le_bytes());
        }

        for (_, value) in node.style.present_fields() {
            write_value(&mut out, value);
        }
    }
    Ok(out)
}

fn write_value(out: &mut Vec<u8>, value: FieldValue) {
    match value {
        FieldValue::Keyword(code) => out.push(code),
        FieldValue::Float(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::Dim(dim) => {
            let (tag, v) = match dim {
                Dim::Auto => (DIM_AUTO, 0.0),
                Dim::Length(px) => (DIM_LENGTH, px),
                Dim::Percent(frac) => (DIM_PERCENT, frac),
            };
            out.push(tag);
            out.extend_from_slice(&v.to_le_bytes());
        }
        FieldValue::Placement(placement) => {
            let (tag, n) = match placement {
                Placement::Auto => (PLACE_AUTO, 0),
                Placement::Line(n) => (PLACE_LINE, n),
                Placement::Span(n) => (PLACE_SPAN, n),
            };
            out.push(tag);
            out.extend_from_slice(&n.to_le_bytes());
        }
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> std::result::Result<&'a [u8], WireError> {
        let remaining = self.buf.len() - self.pos;
        if remaining < n {
            return Err(WireError::Truncated {
                offset: self.pos,
                needed: n - remaining,
            });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> std::result::Result<[u8; N], WireError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> std::result::Result<u8, WireError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> std::result::Result<u16, WireError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn i16(&mut self) -> std::result::Result<i16, WireError> {
        Ok(i16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> std::result::Result<u32, WireError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn f32(&mut self) -> std::result::Result<f32, WireError> {
        Ok(f32::from_le_bytes(self.array()?))
    }
}

/// Decode a batch, failing on any schema mismatch
pub fn decode(bytes: &[u8]) -> std::result::Result<StyleBatch, WireError> {
    let mut r = Reader { buf: bytes, pos: 0 };
    let magic: [u8; 4] = r.array()?;
    if magic != MAGIC {
        return Err(WireError::BadMagic { found: magic });
    }
    let version = r.u8()?;
    if version != VERSION {
        return Err(WireError::VersionMismatch {
            expected: VERSION,
            found: version,
        });
    }
    let count = r.u32()? as usize;

    let mut nodes = Vec::with_capacity(count.min(bytes.len() / 10));
    for index in 0..count {
        let lo = u64::from(r.u32()?);
        let hi = u64::from(r.u32()?);
        let presence = lo | (hi << 32);
        let unknown = presence >> FIELD_COUNT;
        if unknown != 0 {
            return Err(WireError::UnknownField(
                FIELD_COUNT as u32 + unknown.trailing_zeros(),
            ));
        }

        let child_count = usize::from(r.u16()?);
        let mut children = Vec::with_capacity(child_count);
        for _ in 0..child_count {
            let child = usize::from(r.u16()?);
            if child >= index {
                return Err(WireError::ForwardReference { node: index, child });
            }
            children.push(child);
        }

        let mut style = EngineStyle::new();
        let sideband_len = usize::from(r.u16()?);
        if sideband_len > 0 {
            let sideband: GridSideband = serde_json::from_slice(r.take(sideband_len)?)
                .map_err(|e| WireError::BadSideband(e.to_string()))?;
            style.grid_template_rows = sideband.rows;
            style.grid_template_columns = sideband.columns;
        }

        for field in FieldId::ALL {
            if presence & (1u64 << field.bit()) != 0 {
                let value = read_value(&mut r, field)?;
                style.set(field, value);
            }
        }
        nodes.push(BatchNode { style, children });
    }

    if r.pos != bytes.len() {
        return Err(WireError::TrailingBytes(bytes.len() - r.pos));
    }
    Ok(StyleBatch { nodes })
}

fn read_value(r: &mut Reader<'_>, field: FieldId) -> std::result::Result<FieldValue, WireError> {
    match field.kind() {
        FieldKind::Keyword(table) => {
            let code = r.u8()?;
            if usize::from(code) >= table.len() {
                return Err(WireError::UnknownEnum {
                    field: field.name(),
                    code,
                });
            }
            Ok(FieldValue::Keyword(code))
        }
        FieldKind::Float => Ok(FieldValue::Float(r.f32()?)),
        FieldKind::Dimension | FieldKind::LengthPercentageAuto | FieldKind::LengthPercentage => {
            let tag = r.u8()?;
            let v = r.f32()?;
            let dim = match tag {
                DIM_AUTO => Dim::Auto,
                DIM_LENGTH => Dim::Length(v),
                DIM_PERCENT => Dim::Percent(v),
                _ => {
                    return Err(WireError::UnknownTag {
                        field: field.name(),
                        tag,
                    });
                }
            };
            Ok(FieldValue::Dim(dim))
        }
        FieldKind::Placement => {
            let tag = r.u8()?;
            let n = r.i16()?;
            let placement = match tag {
                PLACE_AUTO => Placement::Auto,
                PLACE_LINE => Placement::Line(n),
                PLACE_SPAN => Placement::Span(n),
                _ => {
                    return Err(WireError::UnknownTag {
                        field: field.name(),
                        tag,
                    });
                }
            };
            Ok(FieldValue::Placement(placement))
        }
    }
}
