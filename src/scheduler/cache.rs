//! Result cache for background layout
//!
//! Entries are grouped by parent so a parent can be invalidated without a
//! scan. Each key carries a fingerprint of the exact request it was
//! computed from.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::bridge::{AvailableSize, NodeGeometry, StylePayload};
use crate::document::ElementId;
use crate::layout::types::FlowOutput;

/// Entries kept per parent; the oldest is evicted first
pub const DEFAULT_ENTRIES_PER_PARENT: usize = 8;

/// Identifies one cacheable computation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub parent: ElementId,
    pub children: Vec<ElementId>,
    width_bits: Option<u32>,
    height_bits: Option<u32>,
    /// Grid row and column templates, when the parent is a grid
    pub templates: Option<String>,
    fingerprint: u64,
}

impl CacheKey {
    pub fn new(parent: ElementId, children: Vec<ElementId>, available: AvailableSize) -> Self {
        Self {
            parent,
            children,
            width_bits: available.width.map(f32::to_bits),
            height_bits: available.height.map(f32::to_bits),
            templates: None,
            fingerprint: 0,
        }
    }

    pub fn with_templates(mut self, rows: &str, columns: &str) -> Self {
        self.templates = Some(format!("{}|{}", rows, columns));
        self
    }

    /// Bind the key to the exact encoded styles of a grid request
    pub fn with_payload(mut self, payload: &StylePayload) -> Self {
        let mut hasher = DefaultHasher::new();
        match payload {
            StylePayload::Binary(bytes) => bytes.hash(&mut hasher),
            StylePayload::Textual(text) => text.hash(&mut hasher),
        }
        self.fingerprint = hasher.finish();
        self
    }

    /// Bind the key to the exact flat records of a block request
    pub fn with_records(mut self, records: &[f32]) -> Self {
        let mut hasher = DefaultHasher::new();
        for value in records {
            value.to_bits().hash(&mut hasher);
        }
        self.fingerprint = hasher.finish();
        self
    }

    pub fn available(&self) -> AvailableSize {
        AvailableSize::new(
            self.width_bits.map(f32::from_bits),
            self.height_bits.map(f32::from_bits),
        )
    }
}

/// A finished background computation
#[derive(Debug, Clone, PartialEq)]
pub enum CachedLayout {
    /// One block-flow level, margin-collapse outputs included
    Block(FlowOutput),
    /// Children of a grid container, in request order
    Grid(Vec<NodeGeometry>),
}

#[derive(Debug)]
pub struct LayoutCache {
    entries: HashMap<ElementId, Vec<(CacheKey, CachedLayout)>>,
    per_parent: usize,
}

impl Default for LayoutCache {
    fn default() -> Self {
        Self::new(DEFAULT_ENTRIES_PER_PARENT)
    }
}

impl LayoutCache {
    pub fn new(per_parent: usize) -> Self {
        Self {
            entries: HashMap::new(),
            per_parent: per_parent.max(1),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<&CachedLayout> {
        self.entries
            .get(&key.parent)?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn put(&mut self, key: CacheKey, value: CachedLayout) {
        let bucket = self.entries.entry(key.parent).or_default();
        bucket.retain(|(k, _)| *k != key);
        bucket.push((key, value));
        if bucket.len() > self.per_parent {
            bucket.remove(0);
        }
    }

    /// Drop every entry keyed under `parent`; returns how many were dropped
    pub fn invalidate(&mut self, parent: ElementId) -> usize {
        self.entries.remove(&parent).map_or(0, |bucket| bucket.len())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
