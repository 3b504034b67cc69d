//! Canonical engine style
//!
//! [`EngineStyle`] is the one in-memory form of the style schema that
//! crosses the acceleration boundary. Each field has a fixed bit position
//! ([`FieldId`]) and a value kind ([`FieldKind`]) that both codecs follow.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! keyword_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Keyword table; the index is the wire code
            pub const KEYWORDS: &'static [&'static str] = &[$($text),+];
            const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn code(self) -> u8 {
                self as u8
            }

            pub fn from_code(code: u8) -> Option<Self> {
                Self::ALL.get(usize::from(code)).copied()
            }

            pub fn keyword(self) -> &'static str {
                Self::KEYWORDS[self as usize]
            }

            pub fn parse(text: &str) -> Option<Self> {
                let text = text.trim();
                Self::KEYWORDS
                    .iter()
                    .position(|k| k.eq_ignore_ascii_case(text))
                    .map(|i| Self::ALL[i])
            }
        }
    };
}

keyword_enum!(
    /// Constraint-engine display vocabulary
    EngineDisplay {
        Block = "block",
        Flex = "flex",
        Grid = "grid",
        None = "none",
    }
);

keyword_enum!(Position {
    Relative = "relative",
    Absolute = "absolute",
});

keyword_enum!(Overflow {
    Visible = "visible",
    Clip = "clip",
    Hidden = "hidden",
    Scroll = "scroll",
});

keyword_enum!(FlexDirection {
    Row = "row",
    Column = "column",
    RowReverse = "row-reverse",
    ColumnReverse = "column-reverse",
});

keyword_enum!(FlexWrap {
    NoWrap = "nowrap",
    Wrap = "wrap",
    WrapReverse = "wrap-reverse",
});

keyword_enum!(
    /// justify-content / align-content
    ContentAlign {
        Start = "start",
        End = "end",
        FlexStart = "flex-start",
        FlexEnd = "flex-end",
        Center = "center",
        Stretch = "stretch",
        SpaceBetween = "space-between",
        SpaceEvenly = "space-evenly",
        SpaceAround = "space-around",
    }
);

keyword_enum!(
    /// align-items / align-self / justify-items
    ItemAlign {
        Start = "start",
        End = "end",
        FlexStart = "flex-start",
        FlexEnd = "flex-end",
        Center = "center",
        Baseline = "baseline",
        Stretch = "stretch",
    }
);

keyword_enum!(GridAutoFlow {
    Row = "row",
    Column = "column",
    RowDense = "row dense",
    ColumnDense = "column dense",
});

keyword_enum!(BoxSizing {
    BorderBox = "border-box",
    ContentBox = "content-box",
});

/// A size that may be auto, a length, or a percentage
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dim {
    Auto,
    Length(f32),
    /// Fraction of the containing block (50% is 0.5)
    Percent(f32),
}

impl Dim {
    pub fn is_auto(self) -> bool {
        matches!(self, Dim::Auto)
    }

    /// Pixels against a percentage basis; `None` for auto or an unknown basis
    pub fn resolve(self, basis: Option<f32>) -> Option<f32> {
        match self {
            Dim::Auto => None,
            Dim::Length(px) => Some(px),
            Dim::Percent(frac) => basis.map(|b| b * frac),
        }
    }
}

/// Grid line placement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Auto,
    Line(i16),
    Span(i16),
}

/// One grid track sizing function
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "kebab-case")]
pub enum TrackSize {
    Length(f32),
    /// Fraction of the grid container
    Percent(f32),
    Fr(f32),
    Auto,
    MinContent,
    MaxContent,
}

impl TrackSize {
    /// Parse one track token such as `100px`, `25%` or `1fr`
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim().to_ascii_lowercase();
        match token.as_str() {
            "auto" => return Some(TrackSize::Auto),
            "min-content" => return Some(TrackSize::MinContent),
            "max-content" => return Some(TrackSize::MaxContent),
            _ => {}
        }
        let (number, unit) = crate::style::units::split_dimension(&token)?;
        match unit {
            "" | "px" => Some(TrackSize::Length(number as f32)),
            "%" => Some(TrackSize::Percent((number / 100.0) as f32)),
            "fr" => Some(TrackSize::Fr(number as f32)),
            _ => None,
        }
    }

    /// Parse a whitespace-separated track list
    pub fn parse_list(text: &str) -> Option<Vec<Self>> {
        text.split_whitespace().map(TrackSize::parse).collect()
    }
}

impl fmt::Display for TrackSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackSize::Length(px) => write!(f, "{}px", px),
            TrackSize::Percent(frac) => write!(f, "{}%", f64::from(*frac) * 100.0),
            TrackSize::Fr(fr) => write!(f, "{}fr", fr),
            TrackSize::Auto => f.write_str("auto"),
            TrackSize::MinContent => f.write_str("min-content"),
            TrackSize::MaxContent => f.write_str("max-content"),
        }
    }
}

/// Format a track list for the textual encoding and cache keys
pub fn format_tracks(tracks: &[TrackSize]) -> String {
    tracks
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// How a field's value is represented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Index into a keyword table
    Keyword(&'static [&'static str]),
    Float,
    /// auto | length | percent
    Dimension,
    /// auto | length | percent, where auto is meaningful (margins, insets)
    LengthPercentageAuto,
    /// length | percent; auto degrades to zero
    LengthPercentage,
    Placement,
}

/// A field value as stored on [`EngineStyle`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Keyword(u8),
    Float(f32),
    Dim(Dim),
    Placement(Placement),
}

impl FieldValue {
    /// False for NaN or infinite floats and lengths
    pub fn is_finite(&self) -> bool {
        match self {
            FieldValue::Float(v) => v.is_finite(),
            FieldValue::Dim(Dim::Length(v) | Dim::Percent(v)) => v.is_finite(),
            FieldValue::Dim(Dim::Auto) | FieldValue::Keyword(_) | FieldValue::Placement(_) => true,
        }
    }
}

/// Bit positions of the style schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum FieldId {
    Display = 0,
    Position,
    OverflowX,
    OverflowY,
    FlexDirection,
    FlexWrap,
    JustifyContent,
    AlignItems,
    AlignSelf,
    AlignContent,
    GridAutoFlow,
    JustifyItems,
    BoxSizing,
    FlexGrow = 13,
    FlexShrink,
    AspectRatio,
    Width = 16,
    Height,
    MinWidth,
    MinHeight,
    MaxWidth,
    MaxHeight,
    FlexBasis,
    MarginTop = 23,
    MarginRight,
    MarginBottom,
    MarginLeft,
    InsetTop,
    InsetRight,
    InsetBottom,
    InsetLeft,
    PaddingTop = 31,
    PaddingRight,
    PaddingBottom,
    PaddingLeft,
    BorderTop,
    BorderRight,
    BorderBottom,
    BorderLeft,
    RowGap,
    ColumnGap,
    GridRowStart = 41,
    GridRowEnd,
    GridColumnStart,
    GridColumnEnd,
}

/// Number of defined field bits
pub const FIELD_COUNT: usize = 45;

impl FieldId {
    /// Every field in ascending bit order
    pub const ALL: [FieldId; FIELD_COUNT] = [
        FieldId::Display,
        FieldId::Position,
        FieldId::OverflowX,
        FieldId::OverflowY,
        FieldId::FlexDirection,
        FieldId::FlexWrap,
        FieldId::JustifyContent,
        FieldId::AlignItems,
        FieldId::AlignSelf,
        FieldId::AlignContent,
        FieldId::GridAutoFlow,
        FieldId::JustifyItems,
        FieldId::BoxSizing,
        FieldId::FlexGrow,
        FieldId::FlexShrink,
        FieldId::AspectRatio,
        FieldId::Width,
        FieldId::Height,
        FieldId::MinWidth,
        FieldId::MinHeight,
        FieldId::MaxWidth,
        FieldId::MaxHeight,
        FieldId::FlexBasis,
        FieldId::MarginTop,
        FieldId::MarginRight,
        FieldId::MarginBottom,
        FieldId::MarginLeft,
        FieldId::InsetTop,
        FieldId::InsetRight,
        FieldId::InsetBottom,
        FieldId::InsetLeft,
        FieldId::PaddingTop,
        FieldId::PaddingRight,
        FieldId::PaddingBottom,
        FieldId::PaddingLeft,
        FieldId::BorderTop,
        FieldId::BorderRight,
        FieldId::BorderBottom,
        FieldId::BorderLeft,
        FieldId::RowGap,
        FieldId::ColumnGap,
        FieldId::GridRowStart,
        FieldId::GridRowEnd,
        FieldId::GridColumnStart,
        FieldId::GridColumnEnd,
    ];

    pub fn bit(self) -> u32 {
        self as u32
    }

    pub fn from_bit(bit: u32) -> Option<Self> {
        Self::ALL.get(bit as usize).copied()
    }

    /// Textual record key
    pub fn name(self) -> &'static str {
        match self {
            FieldId::Display => "display",
            FieldId::Position => "position",
            FieldId::OverflowX => "overflowX",
            FieldId::OverflowY => "overflowY",
            FieldId::FlexDirection => "flexDirection",
            FieldId::FlexWrap => "flexWrap",
            FieldId::JustifyContent => "justifyContent",
            FieldId::AlignItems => "alignItems",
            FieldId::AlignSelf => "alignSelf",
            FieldId::AlignContent => "alignContent",
            FieldId::GridAutoFlow => "gridAutoFlow",
            FieldId::JustifyItems => "justifyItems",
            FieldId::BoxSizing => "boxSizing",
            FieldId::FlexGrow => "flexGrow",
            FieldId::FlexShrink => "flexShrink",
            FieldId::AspectRatio => "aspectRatio",
            FieldId::Width => "width",
            FieldId::Height => "height",
            FieldId::MinWidth => "minWidth",
            FieldId::MinHeight => "minHeight",
            FieldId::MaxWidth => "maxWidth",
            FieldId::MaxHeight => "maxHeight",
            FieldId::FlexBasis => "flexBasis",
            FieldId::MarginTop => "marginTop",
            FieldId::MarginRight => "marginRight",
            FieldId::MarginBottom => "marginBottom",
            FieldId::MarginLeft => "marginLeft",
            FieldId::InsetTop => "top",
            FieldId::InsetRight => "right",
            FieldId::InsetBottom => "bottom",
            FieldId::InsetLeft => "left",
            FieldId::PaddingTop => "paddingTop",
            FieldId::PaddingRight => "paddingRight",
            FieldId::PaddingBottom => "paddingBottom",
            FieldId::PaddingLeft => "paddingLeft",
            FieldId::BorderTop => "borderTopWidth",
            FieldId::BorderRight => "borderRightWidth",
            FieldId::BorderBottom => "borderBottomWidth",
            FieldId::BorderLeft => "borderLeftWidth",
            FieldId::RowGap => "rowGap",
            FieldId::ColumnGap => "columnGap",
            FieldId::GridRowStart => "gridRowStart",
            FieldId::GridRowEnd => "gridRowEnd",
            FieldId::GridColumnStart => "gridColumnStart",
            FieldId::GridColumnEnd => "gridColumnEnd",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }

    pub fn kind(self) -> FieldKind {
        match self {
            FieldId::Display => FieldKind::Keyword(EngineDisplay::KEYWORDS),
            FieldId::Position => FieldKind::Keyword(Position::KEYWORDS),
            FieldId::OverflowX | FieldId::OverflowY => FieldKind::Keyword(Overflow::KEYWORDS),
            FieldId::FlexDirection => FieldKind::Keyword(FlexDirection::KEYWORDS),
            FieldId::FlexWrap => FieldKind::Keyword(FlexWrap::KEYWORDS),
            FieldId::JustifyContent | FieldId::AlignContent => {
                FieldKind::Keyword(ContentAlign::KEYWORDS)
            }
            FieldId::AlignItems | FieldId::AlignSelf | FieldId::JustifyItems => {
                FieldKind::Keyword(ItemAlign::KEYWORDS)
            }
            FieldId::GridAutoFlow => FieldKind::Keyword(GridAutoFlow::KEYWORDS),
            FieldId::BoxSizing => FieldKind::Keyword(BoxSizing::KEYWORDS),
            FieldId::FlexGrow | FieldId::FlexShrink | FieldId::AspectRatio => FieldKind::Float,
            FieldId::Width
            | FieldId::Height
            | FieldId::MinWidth
            | FieldId::MinHeight
            | FieldId::MaxWidth
            | FieldId::MaxHeight
            | FieldId::FlexBasis => FieldKind::Dimension,
            FieldId::MarginTop
            | FieldId::MarginRight
            | FieldId::MarginBottom
            | FieldId::MarginLeft
            | FieldId::InsetTop
            | FieldId::InsetRight
            | FieldId::InsetBottom
            | FieldId::InsetLeft => FieldKind::LengthPercentageAuto,
            FieldId::PaddingTop
            | FieldId::PaddingRight
            | FieldId::PaddingBottom
            | FieldId::PaddingLeft
            | FieldId::BorderTop
            | FieldId::BorderRight
            | FieldId::BorderBottom
            | FieldId::BorderLeft
            | FieldId::RowGap
            | FieldId::ColumnGap => FieldKind::LengthPercentage,
            FieldId::GridRowStart
            | FieldId::GridRowEnd
            | FieldId::GridColumnStart
            | FieldId::GridColumnEnd => FieldKind::Placement,
        }
    }

    /// Whether `value` has the representation this field expects
    pub fn accepts(self, value: &FieldValue) -> bool {
        match (self.kind(), value) {
            (FieldKind::Keyword(table), FieldValue::Keyword(code)) => {
                usize::from(*code) < table.len()
            }
            (FieldKind::Float, FieldValue::Float(_)) => true,
            (
                FieldKind::Dimension
                | FieldKind::LengthPercentageAuto
                | FieldKind::LengthPercentage,
                FieldValue::Dim(_),
            ) => true,
            (FieldKind::Placement, FieldValue::Placement(_)) => true,
            _ => false,
        }
    }
}

/// Side order used for margin/inset/padding/border quadruples
pub const SIDES: [&str; 4] = ["top", "right", "bottom", "left"];

/// Style record for one node
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStyle {
    fields: [Option<FieldValue>; FIELD_COUNT],
    pub grid_template_rows: Vec<TrackSize>,
    pub grid_template_columns: Vec<TrackSize>,
}

impl Default for EngineStyle {
    fn default() -> Self {
        Self {
            fields: [None; FIELD_COUNT],
            grid_template_rows: Vec::new(),
            grid_template_columns: Vec::new(),
        }
    }
}

impl EngineStyle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: FieldId) -> Option<FieldValue> {
        self.fields[field as usize]
    }

    /// Store a value. Values of the wrong kind and non-finite numbers are
    /// ignored with a debug log, and `auto` on a length-only field becomes
    /// zero. `auto` on a field whose default is auto clears it, so both
    /// encodings agree on presence.
    pub fn set(&mut self, field: FieldId, value: FieldValue) {
        if !field.accepts(&value) || !value.is_finite() {
            log::debug!("dropping {:?} for field {}", value, field.name());
            return;
        }
        let value = match (field.kind(), value) {
            (FieldKind::LengthPercentage, FieldValue::Dim(Dim::Auto)) => {
                FieldValue::Dim(Dim::Length(0.0))
            }
            (FieldKind::Dimension, FieldValue::Dim(Dim::Auto))
            | (FieldKind::Placement, FieldValue::Placement(Placement::Auto)) => {
                self.clear(field);
                return;
            }
            _ => value,
        };
        self.fields[field as usize] = Some(value);
    }

    pub fn clear(&mut self, field: FieldId) {
        self.fields[field as usize] = None;
    }

    pub fn is_set(&self, field: FieldId) -> bool {
        self.fields[field as usize].is_some()
    }

    /// 64-bit presence bitmap
    pub fn presence(&self) -> u64 {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_some())
            .fold(0u64, |bits, (i, _)| bits | (1u64 << i))
    }

    /// Present fields in ascending bit order
    pub fn present_fields(&self) -> impl Iterator<Item = (FieldId, FieldValue)> + '_ {
        FieldId::ALL
            .iter()
            .filter_map(move |&f| self.get(f).map(|v| (f, v)))
    }

    pub fn has_grid_templates(&self) -> bool {
        !self.grid_template_rows.is_empty() || !self.grid_template_columns.is_empty()
    }

    // Typed accessors

    pub fn set_keyword_code(&mut self, field: FieldId, code: u8) {
        self.set(field, FieldValue::Keyword(code));
    }

    pub fn set_display(&mut self, display: EngineDisplay) {
        self.set_keyword_code(FieldId::Display, display.code());
    }

    pub fn display(&self) -> EngineDisplay {
        self.keyword(FieldId::Display)
            .and_then(EngineDisplay::from_code)
            .unwrap_or(EngineDisplay::Block)
    }

    pub fn set_position(&mut self, position: Position) {
        self.set_keyword_code(FieldId::Position, position.code());
    }

    pub fn position(&self) -> Position {
        self.keyword(FieldId::Position)
            .and_then(Position::from_code)
            .unwrap_or(Position::Relative)
    }

    pub fn set_flex_direction(&mut self, direction: FlexDirection) {
        self.set_keyword_code(FieldId::FlexDirection, direction.code());
    }

    pub fn set_flex_wrap(&mut self, wrap: FlexWrap) {
        self.set_keyword_code(FieldId::FlexWrap, wrap.code());
    }

    pub fn set_align_items(&mut self, align: ItemAlign) {
        self.set_keyword_code(FieldId::AlignItems, align.code());
    }

    pub fn set_box_sizing(&mut self, sizing: BoxSizing) {
        self.set_keyword_code(FieldId::BoxSizing, sizing.code());
    }

    pub fn box_sizing(&self) -> BoxSizing {
        self.keyword(FieldId::BoxSizing)
            .and_then(BoxSizing::from_code)
            .unwrap_or(BoxSizing::BorderBox)
    }

    pub fn overflow(&self, field: FieldId) -> Overflow {
        self.keyword(field)
            .and_then(Overflow::from_code)
            .unwrap_or(Overflow::Visible)
    }

    pub fn keyword(&self, field: FieldId) -> Option<u8> {
        match self.get(field) {
            Some(FieldValue::Keyword(code)) => Some(code),
            _ => None,
        }
    }

    pub fn set_float(&mut self, field: FieldId, value: f32) {
        self.set(field, FieldValue::Float(value));
    }

    pub fn float(&self, field: FieldId) -> Option<f32> {
        match self.get(field) {
            Some(FieldValue::Float(v)) => Some(v),
            _ => None,
        }
    }

    pub fn set_dim(&mut self, field: FieldId, value: Dim) {
        self.set(field, FieldValue::Dim(value));
    }

    /// Dimension value; unset reads as auto
    pub fn dim(&self, field: FieldId) -> Dim {
        match self.get(field) {
            Some(FieldValue::Dim(d)) => d,
            _ => Dim::Auto,
        }
    }

    /// Length-only value; unset reads as zero
    pub fn length_percentage(&self, field: FieldId) -> Dim {
        match self.get(field) {
            Some(FieldValue::Dim(d)) => d,
            _ => Dim::Length(0.0),
        }
    }

    pub fn set_placement(&mut self, field: FieldId, value: Placement) {
        self.set(field, FieldValue::Placement(value));
    }

    pub fn placement(&self, field: FieldId) -> Placement {
        match self.get(field) {
            Some(FieldValue::Placement(p)) => p,
            _ => Placement::Auto,
        }
    }
}

/// Margin fields in side order
pub const MARGIN_FIELDS: [FieldId; 4] = [
    FieldId::MarginTop,
    FieldId::MarginRight,
    FieldId::MarginBottom,
    FieldId::MarginLeft,
];

/// Inset fields in side order
pub const INSET_FIELDS: [FieldId; 4] = [
    FieldId::InsetTop,
    FieldId::InsetRight,
    FieldId::InsetBottom,
    FieldId::InsetLeft,
];

/// Padding fields in side order
pub const PADDING_FIELDS: [FieldId; 4] = [
    FieldId::PaddingTop,
    FieldId::PaddingRight,
    FieldId::PaddingBottom,
    FieldId::PaddingLeft,
];

/// Border width fields in side order
pub const BORDER_FIELDS: [FieldId; 4] = [
    FieldId::BorderTop,
    FieldId::BorderRight,
    FieldId::BorderBottom,
    FieldId::BorderLeft,
];
