//! Layout configuration
//!
//! Every field has a default; a JSON document only needs to name the
//! fields it overrides.

use serde::Deserialize;

use super::error::Result;

/// Viewport dimensions used for `vw`/`vh` units and the root available space
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
        }
    }
}

/// Style encoding used across the acceleration boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireEncoding {
    #[default]
    Binary,
    Textual,
}

/// Layout core configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Viewport for unit resolution and the root available space
    pub viewport: Viewport,
    /// Font size `rem` resolves against
    pub root_font_size: f32,
    /// Style encoding for the acceleration bridge
    pub encoding: WireEncoding,
    /// Minimum child count before a block level is handed to the module
    pub accelerated_block_threshold: usize,
    /// Frames to wait before re-probing a failed module
    pub reprobe_interval_frames: u64,
    /// Allowed divergence between estimated and assigned text widths
    pub correction_tolerance_px: f32,
    /// Upper bound on layout passes per frame, including the first
    pub max_layout_passes: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            root_font_size: 16.0,
            encoding: WireEncoding::Binary,
            accelerated_block_threshold: 10,
            reprobe_interval_frames: 120, // ~2s at 60fps
            correction_tolerance_px: 0.5,
            max_layout_passes: 2,
        }
    }
}

impl LayoutConfig {
    /// Parse a (possibly partial) JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
