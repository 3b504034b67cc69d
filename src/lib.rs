//! # boxflow - layout core for a canvas design tool
//!
//! Computes the position and size of every box in a tree of CSS-like
//! styled boxes, once per frame and incrementally across frames.
//!
//! ## Architecture
//!
//! The crate is organized into the following modules, leaf-first:
//!
//! - **style**: unit and box-model resolution, inheritance, display values
//! - **layout**: the self-contained block-flow engine, the display adapter
//!   and the whole-tree fallback
//! - **bridge**: the canonical engine style, its binary and textual
//!   encodings, and the acceleration module boundary
//! - **tree**: the persistent, incrementally updated layout tree
//! - **traversal**: the post-order walk that turns a document into a plan
//! - **scheduler**: stale-while-revalidate layout on a background worker
//! - **engine**: the per-frame orchestrator
//! - **document**: the input document model
//! - **utils**: shared error and configuration types

pub mod bridge;
pub mod document;
pub mod engine;
pub mod layout;
pub mod scheduler;
pub mod style;
pub mod traversal;
pub mod tree;
pub mod utils;

// Re-export main types for convenience
pub use bridge::{AccelerationBridge, AccelerationModule, EngineStyle, TaffyModule};
pub use document::{DocumentSource, DocumentTree, ElementId, StyledBox};
pub use engine::{FrameStats, LayoutEngine, ScrollExtent};
pub use layout::ComputedLayout;
pub use scheduler::AsyncScheduler;
pub use tree::LayoutTree;
pub use utils::error::{LayoutError, Result};
pub use utils::LayoutConfig;

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = "boxflow";
