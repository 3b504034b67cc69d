//! Layout algorithms that run without the acceleration module
//!
//! - [`block_flow`]: one level of block/inline-block flow
//! - [`records`]: flat record form of a level for the accelerated path
//! - [`display_adapter`]: box-model display to engine display
//! - [`fallback`]: whole-tree layout built on [`block_flow`]

pub mod block_flow;
pub mod display_adapter;
pub mod fallback;
pub mod geometry;
pub mod line_box;
pub mod margin;
pub mod records;
pub mod types;

pub use display_adapter::{to_engine_display, EngineDisplayPlan};
pub use fallback::FallbackLayout;
pub use geometry::{ComputedLayout, Edges, Rect, Size};
pub use types::{
    FlowContainer, FlowContext, FlowDisplay, FlowItem, FlowOutput, FlowPosition, Insets,
    ParentInner, VerticalAlign,
};
