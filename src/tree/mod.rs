//! Persistent layout tree
//!
//! Mirrors the traversal plan inside the acceleration module across frames.
//! Each node remembers the exact payload it last sent and the joined id list
//! of its children, so a frame touches only nodes whose serialized style or
//! child sequence actually changed.

use std::collections::{HashMap, HashSet};

use crate::bridge::{AccelerationBridge, AvailableSize, EngineStyle, NodeHandle, StylePayload};
use crate::document::ElementId;
use crate::layout::geometry::ComputedLayout;
use crate::traversal::TreePlan;
use crate::utils::{LayoutError, Result};

#[derive(Debug)]
struct TreeEntry {
    handle: NodeHandle,
    payload: StylePayload,
    children_key: String,
    children: Vec<ElementId>,
}

/// What one [`LayoutTree::sync`] did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub created: usize,
    pub updated_styles: usize,
    pub updated_children: usize,
    pub removed: usize,
    pub full_build: bool,
}

impl SyncStats {
    pub fn is_noop(&self) -> bool {
        *self == SyncStats::default()
    }
}

#[derive(Debug)]
pub struct LayoutTree {
    bridge: AccelerationBridge,
    entries: HashMap<ElementId, TreeEntry>,
    /// Child to parent, for the removal-order check
    parent_of: HashMap<ElementId, ElementId>,
    root: Option<ElementId>,
    built: bool,
}

fn children_key(children: &[ElementId]) -> String {
    children
        .iter()
        .map(ElementId::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

impl LayoutTree {
    pub fn new(bridge: AccelerationBridge) -> Self {
        Self {
            bridge,
            entries: HashMap::new(),
            parent_of: HashMap::new(),
            root: None,
            built: false,
        }
    }

    pub fn bridge(&self) -> &AccelerationBridge {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut AccelerationBridge {
        &mut self.bridge
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn handle(&self, id: ElementId) -> Option<NodeHandle> {
        self.entries.get(&id).map(|e| e.handle)
    }

    /// Forget every node; the next sync rebuilds from scratch
    pub fn reset(&mut self) {
        self.bridge.clear();
        self.entries.clear();
        self.parent_of.clear();
        self.root = None;
        self.built = false;
    }

    /// Create the whole plan in one batched call
    pub fn build_full(&mut self, plan: &TreePlan) -> Result<Vec<NodeHandle>> {
        self.reset();
        let handles = self.bridge.build_tree(&plan.to_batch())?;
        for (index, (node, &handle)) in plan.nodes.iter().zip(&handles).enumerate() {
            let children = plan.child_ids(index);
            for &child in &children {
                self.parent_of.insert(child, node.element_id);
            }
            self.entries.insert(
                node.element_id,
                TreeEntry {
                    handle,
                    payload: self.bridge.encode_style(&node.style)?,
                    children_key: children_key(&children),
                    children,
                },
            );
        }
        self.root = plan.root().map(|n| n.element_id);
        self.built = true;
        log::debug!("built layout tree with {} nodes", handles.len());
        Ok(handles)
    }

    /// Send `style` if its encoding differs from the last one sent
    pub fn update_node_style(&mut self, id: ElementId, style: &EngineStyle) -> Result<bool> {
        let payload = self.bridge.encode_style(style)?;
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(LayoutError::UnknownNode(id))?;
        if entry.payload == payload {
            return Ok(false);
        }
        self.bridge.update_style(entry.handle, &payload)?;
        entry.payload = payload;
        Ok(true)
    }

    /// Replace the child list of `id` if the sequence changed
    pub fn update_children(&mut self, id: ElementId, child_ids: &[ElementId]) -> Result<bool> {
        let key = children_key(child_ids);
        let handle = match self.entries.get(&id) {
            Some(entry) if entry.children_key == key => return Ok(false),
            Some(entry) => entry.handle,
            None => return Err(LayoutError::UnknownNode(id)),
        };
        let handles = child_ids
            .iter()
            .map(|c| self.handle(*c).ok_or(LayoutError::UnknownNode(*c)))
            .collect::<Result<Vec<_>>>()?;
        self.bridge.set_children(handle, &handles)?;

        if let Some(entry) = self.entries.get_mut(&id) {
            for old in std::mem::replace(&mut entry.children, child_ids.to_vec()) {
                if self.parent_of.get(&old) == Some(&id) {
                    self.parent_of.remove(&old);
                }
            }
            entry.children_key = key;
        }
        for &child in child_ids {
            self.parent_of.insert(child, id);
        }
        Ok(true)
    }

    /// Create a childless node, or restyle it if it already exists
    pub fn add_node(&mut self, id: ElementId, style: &EngineStyle) -> Result<NodeHandle> {
        if let Some(handle) = self.handle(id) {
            self.update_node_style(id, style)?;
            return Ok(handle);
        }
        let handle = self.bridge.create_node(style)?;
        self.entries.insert(
            id,
            TreeEntry {
                handle,
                payload: self.bridge.encode_style(style)?,
                children_key: String::new(),
                children: Vec::new(),
            },
        );
        Ok(handle)
    }

    /// Remove a node no other node still lists as a child
    pub fn remove_node(&mut self, id: ElementId) -> Result<()> {
        if let Some(&parent) = self.parent_of.get(&id) {
            return Err(LayoutError::StillReferenced { child: id, parent });
        }
        let handle = self.handle(id).ok_or(LayoutError::UnknownNode(id))?;
        self.bridge.remove_node(handle)?;
        if let Some(entry) = self.entries.remove(&id) {
            for child in entry.children {
                if self.parent_of.get(&child) == Some(&id) {
                    self.parent_of.remove(&child);
                }
            }
        }
        if self.root == Some(id) {
            self.root = None;
        }
        Ok(())
    }

    /// Lay out from the root against a definite viewport
    pub fn compute_layout(&mut self, width: f32, height: f32) -> Result<()> {
        let root = self.root_handle()?;
        self.bridge
            .compute_layout(root, AvailableSize::definite(width, height))
    }

    /// Geometry of every node, fetched in one call
    pub fn get_layouts_batch(&mut self) -> Result<HashMap<ElementId, ComputedLayout>> {
        self.root_handle()?;
        let (ids, handles): (Vec<ElementId>, Vec<NodeHandle>) =
            self.entries.iter().map(|(id, e)| (*id, e.handle)).unzip();
        let geometry = self.bridge.layouts_batch(&handles)?;
        Ok(ids
            .into_iter()
            .zip(geometry)
            .map(|(element_id, g)| {
                (
                    element_id,
                    ComputedLayout {
                        element_id,
                        x: g.x,
                        y: g.y,
                        width: g.width,
                        height: g.height,
                        margin: g.margin,
                    },
                )
            })
            .collect())
    }

    fn root_handle(&self) -> Result<NodeHandle> {
        if !self.built {
            return Err(LayoutError::TreeNotBuilt);
        }
        self.root
            .and_then(|id| self.handle(id))
            .ok_or(LayoutError::TreeNotBuilt)
    }

    /// Bring the module's tree in line with `plan`. The first call, and
    /// any call after a reset or a root change, builds in one batch. A
    /// failed incremental update resets the tree.
    pub fn sync(&mut self, plan: &TreePlan) -> Result<SyncStats> {
        let root = plan.root().map(|n| n.element_id);
        if !self.built || root != self.root {
            self.build_full(plan)?;
            return Ok(SyncStats {
                created: plan.len(),
                full_build: true,
                ..SyncStats::default()
            });
        }
        match self.sync_incremental(plan) {
            Ok(stats) => Ok(stats),
            Err(err) => {
                log::warn!("incremental tree update failed, rebuilding next frame: {}", err);
                self.reset();
                Err(err)
            }
        }
    }

    fn sync_incremental(&mut self, plan: &TreePlan) -> Result<SyncStats> {
        let mut stats = SyncStats::default();

        // Post-order: children exist before any parent lists them.
        for node in &plan.nodes {
            if self.entries.contains_key(&node.element_id) {
                if self.update_node_style(node.element_id, &node.style)? {
                    stats.updated_styles += 1;
                }
            } else {
                self.add_node(node.element_id, &node.style)?;
                stats.created += 1;
            }
        }
        for (index, node) in plan.nodes.iter().enumerate() {
            if self.update_children(node.element_id, &plan.child_ids(index))? {
                stats.updated_children += 1;
            }
        }

        let live: HashSet<ElementId> = plan.nodes.iter().map(|n| n.element_id).collect();
        let stale: Vec<ElementId> = self
            .entries
            .keys()
            .copied()
            .filter(|id| !live.contains(id))
            .collect();
        for &id in &stale {
            self.update_children(id, &[])?;
        }
        for id in stale {
            self.remove_node(id)?;
            stats.removed += 1;
        }

        if !stats.is_noop() {
            log::trace!("layout tree sync: {:?}", stats);
        }
        Ok(stats)
    }
}
