//! The acceleration module contract
//!
//! A module owns its own node tree. Styles cross the boundary only as
//! encoded [`StylePayload`]s and geometry comes back as plain numbers.

use serde::Serialize;

use super::{NodeHandle, StylePayload};
use crate::layout::geometry::Edges;
use crate::utils::Result;

/// Space offered to the root of a layout; `None` means max-content
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AvailableSize {
    pub width: Option<f32>,
    pub height: Option<f32>,
}

impl AvailableSize {
    pub fn new(width: Option<f32>, height: Option<f32>) -> Self {
        Self { width, height }
    }

    pub fn definite(width: f32, height: f32) -> Self {
        Self::new(Some(width), Some(height))
    }
}

/// Geometry of one node, relative to its parent's border box
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct NodeGeometry {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub margin: Edges,
}

/// A separately built layout engine reached through a narrow call boundary.
///
/// Instances are not `Send`: a context that needs one builds its own through
/// a [`ModuleFactory`]. Dropping the instance releases its native resources.
#[cfg_attr(test, mockall::automock)]
pub trait AccelerationModule {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Check that the module can serve calls
    fn probe(&mut self) -> Result<()>;

    /// Create every node of a post-order batch in one call and wire up
    /// children. Handles come back in batch order.
    fn build_tree(&mut self, payload: &StylePayload) -> Result<Vec<NodeHandle>>;

    /// Create one childless node from a single-node payload
    fn create_node(&mut self, payload: &StylePayload) -> Result<NodeHandle>;

    /// Replace a node's style from a single-node payload
    fn update_style(&mut self, node: NodeHandle, payload: &StylePayload) -> Result<()>;

    fn set_children(&mut self, node: NodeHandle, children: &[NodeHandle]) -> Result<()>;

    /// Remove a node. Its handle becomes invalid and is never issued again.
    fn remove_node(&mut self, node: NodeHandle) -> Result<()>;

    /// Drop every node
    fn clear(&mut self);

    fn compute_layout(&mut self, root: NodeHandle, available: AvailableSize) -> Result<()>;

    fn layout(&self, node: NodeHandle) -> Result<NodeGeometry>;

    /// Geometry for many nodes in one call, in request order
    fn layouts_batch(&self, nodes: &[NodeHandle]) -> Result<Vec<NodeGeometry>>;

    /// Run one block-flow level from its flat record form
    /// (see [`crate::layout::records`]) and return the flat output
    fn block_layout(&mut self, records: &[f32]) -> Result<Vec<f32>>;
}

/// Builds a module on the thread that will own it
pub type ModuleFactory = Box<dyn Fn() -> Result<Box<dyn AccelerationModule>> + Send>;
