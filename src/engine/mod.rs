//! Frame orchestrator
//!
//! The LayoutEngine runs the layout pipeline once per frame:
//! 1. Traverse the document into a post-order plan
//! 2. Sync the plan into the persistent tree and compute geometry there,
//!    or run the block-flow fallback when the tree family is degraded
//! 3. Re-measure text leaves whose assigned width diverged from the
//!    estimate, up to the configured number of passes
//! 4. Publish layouts, scroll extents and a new version

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;

use crate::bridge::style::{FieldId, Overflow, BORDER_FIELDS, PADDING_FIELDS};
use crate::bridge::{AccelerationBridge, AccelerationModule, LayoutFamily, ModuleFactory, TaffyModule};
use crate::document::{DocumentSource, ElementId};
use crate::layout::geometry::{ComputedLayout, Rect};
use crate::layout::FallbackLayout;
use crate::scheduler::AsyncScheduler;
use crate::traversal::{traverse, ApproximateFontMetrics, Measure, TextMetrics, TraversalContext, TreePlan};
use crate::tree::{LayoutTree, SyncStats};
use crate::utils::{LayoutConfig, Result};

/// Scroll range of a scroll-clipping node
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollExtent {
    pub max_scroll_top: f32,
    pub max_scroll_left: f32,
}

/// Summary of one [`LayoutEngine::layout_frame`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    pub nodes: usize,
    pub passes: u32,
    /// Geometry came from the persistent tree
    pub accelerated: bool,
    pub sync: Option<SyncStats>,
}

/// Owns everything that lives across frames
pub struct LayoutEngine {
    config: LayoutConfig,
    tree: LayoutTree,
    scheduler: Option<AsyncScheduler>,
    metrics: Box<dyn TextMetrics>,
    layouts: HashMap<ElementId, ComputedLayout>,
    scroll_extents: HashMap<ElementId, ScrollExtent>,
    version: u64,
    needs_relayout: bool,
}

impl std::fmt::Debug for LayoutEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutEngine")
            .field("tree", &self.tree)
            .field("scheduler", &self.scheduler)
            .field("nodes", &self.layouts.len())
            .field("version", &self.version)
            .finish()
    }
}

impl LayoutEngine {
    /// An engine that always uses the block-flow fallback
    pub fn new(config: LayoutConfig) -> Self {
        let bridge = AccelerationBridge::without_module(&config);
        Self::with_bridge(config, bridge)
    }

    /// An engine backed by `module`
    pub fn with_module(config: LayoutConfig, module: Box<dyn AccelerationModule>) -> Self {
        let bridge = AccelerationBridge::new(module, &config);
        Self::with_bridge(config, bridge)
    }

    /// An engine backed by the bundled taffy module
    pub fn with_taffy(config: LayoutConfig) -> Self {
        Self::with_module(config, Box::new(TaffyModule::new()))
    }

    fn with_bridge(config: LayoutConfig, bridge: AccelerationBridge) -> Self {
        Self {
            config,
            tree: LayoutTree::new(bridge),
            scheduler: None,
            metrics: Box::new(ApproximateFontMetrics),
            layouts: HashMap::new(),
            scroll_extents: HashMap::new(),
            version: 0,
            needs_relayout: false,
        }
    }

    /// Serve fallback grid containers through a background worker
    pub fn with_scheduler(mut self, factory: ModuleFactory) -> Result<Self> {
        self.scheduler = Some(AsyncScheduler::spawn(factory)?);
        Ok(self)
    }

    pub fn with_metrics(mut self, metrics: Box<dyn TextMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn bridge(&self) -> &AccelerationBridge {
        self.tree.bridge()
    }

    pub fn scheduler_mut(&mut self) -> Option<&mut AsyncScheduler> {
        self.scheduler.as_mut()
    }

    /// Latest published layouts
    pub fn layouts(&self) -> &HashMap<ElementId, ComputedLayout> {
        &self.layouts
    }

    pub fn layout(&self, id: ElementId) -> Option<&ComputedLayout> {
        self.layouts.get(&id)
    }

    /// Incremented on every published frame
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn scroll_extents(&self) -> &HashMap<ElementId, ScrollExtent> {
        &self.scroll_extents
    }

    /// A background result has been applied since the last frame
    pub fn needs_relayout(&self) -> bool {
        self.needs_relayout
    }

    /// Lay out the subtree under `root` and publish the result
    pub fn layout_frame(&mut self, doc: &dyn DocumentSource, root: ElementId) -> Result<FrameStats> {
        self.tree.bridge_mut().begin_frame();
        let max_passes = self.config.max_layout_passes.max(1);
        let mut overrides: HashMap<ElementId, f32> = HashMap::new();
        let mut stats = FrameStats::default();

        let (plan, layouts) = loop {
            stats.passes += 1;
            let plan = {
                let mut ctx = TraversalContext::new(&self.config, self.metrics.as_ref());
                if !overrides.is_empty() {
                    ctx = ctx.with_measure_widths(&overrides);
                }
                traverse(doc, root, &ctx)?
            };
            let layouts = self.compute(&plan, &mut stats);
            if stats.passes >= max_passes {
                break (plan, layouts);
            }
            let corrections = self.corrections(&plan, &layouts, &overrides);
            if corrections.is_empty() {
                break (plan, layouts);
            }
            log::debug!(
                "re-measuring {} text leaves after pass {}",
                corrections.len(),
                stats.passes
            );
            overrides.extend(corrections);
        };

        stats.nodes = plan.len();
        self.scroll_extents = scroll_extents(&plan, &layouts);
        self.layouts = layouts;
        self.version += 1;
        self.needs_relayout = false;
        Ok(stats)
    }

    /// Apply background results that arrived since the last tick. Returns
    /// whether a new frame should be laid out.
    pub fn on_paint_tick(&mut self) -> bool {
        if let Some(scheduler) = self.scheduler.as_mut() {
            if !scheduler.on_paint_tick().is_empty() {
                self.needs_relayout = true;
            }
        }
        self.needs_relayout
    }

    /// Wait for in-flight background work and apply it
    pub async fn flush_background(&mut self, timeout: Duration) -> bool {
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.wait_ready(timeout).await;
            if !scheduler.flush(timeout).await.is_empty() {
                self.needs_relayout = true;
            }
        }
        self.needs_relayout
    }

    /// Drop cached background results for one parent
    pub fn invalidate(&mut self, parent: ElementId) {
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.invalidate(parent);
        }
    }

    pub fn clear_cache(&mut self) {
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.clear_cache();
        }
    }

    fn compute(&mut self, plan: &TreePlan, stats: &mut FrameStats) -> HashMap<ElementId, ComputedLayout> {
        if self.tree.bridge().is_available(LayoutFamily::Tree) {
            match self.accelerated(plan) {
                Ok((layouts, sync)) => {
                    stats.accelerated = true;
                    stats.sync = Some(sync);
                    return layouts;
                }
                Err(err) => {
                    log::warn!("tree layout failed, using block-flow fallback: {}", err);
                    self.tree.reset();
                }
            }
        } else if self.tree.is_built() {
            self.tree.reset();
        }
        stats.accelerated = false;
        let viewport = self.config.viewport;
        let mut fallback =
            FallbackLayout::new(plan, self.tree.bridge_mut(), self.metrics.as_ref(), viewport);
        if let Some(scheduler) = self.scheduler.as_mut() {
            fallback = fallback.with_scheduler(scheduler);
        }
        fallback.run()
    }

    fn accelerated(&mut self, plan: &TreePlan) -> Result<(HashMap<ElementId, ComputedLayout>, SyncStats)> {
        let sync = self.tree.sync(plan)?;
        let viewport = self.config.viewport;
        self.tree.compute_layout(viewport.width, viewport.height)?;
        Ok((self.tree.get_layouts_batch()?, sync))
    }

    /// Text leaves whose assigned content width diverged from the width they
    /// were measured against, and whose measurement changes at the new width
    fn corrections(
        &self,
        plan: &TreePlan,
        layouts: &HashMap<ElementId, ComputedLayout>,
        overrides: &HashMap<ElementId, f32>,
    ) -> HashMap<ElementId, f32> {
        let tolerance = self.config.correction_tolerance_px;
        let mut corrections = HashMap::new();
        for node in &plan.nodes {
            let Some(Measure::Text { text, style }) = &node.measure else {
                continue;
            };
            let Some(layout) = layouts.get(&node.element_id) else {
                continue;
            };
            let chrome: f32 = [PADDING_FIELDS, BORDER_FIELDS]
                .iter()
                .map(|fields| {
                    [fields[1], fields[3]]
                        .iter()
                        .map(|&f| {
                            node.style
                                .length_percentage(f)
                                .resolve(Some(node.available_width))
                                .unwrap_or(0.0)
                        })
                        .sum::<f32>()
                })
                .sum();
            let assigned = (layout.width - chrome).max(0.0);
            if (assigned - node.available_width).abs() <= tolerance {
                continue;
            }
            if overrides
                .get(&node.element_id)
                .is_some_and(|w| (w - assigned).abs() <= tolerance)
            {
                continue;
            }
            let before = self.metrics.measure(text, style, Some(node.available_width));
            let after = self.metrics.measure(text, style, Some(assigned));
            if (after.height - before.height).abs() > tolerance
                || (after.width - before.width).abs() > tolerance
            {
                corrections.insert(node.element_id, assigned);
            }
        }
        corrections
    }
}

/// Scroll range of every node with `overflow: scroll` on either axis
fn scroll_extents(
    plan: &TreePlan,
    layouts: &HashMap<ElementId, ComputedLayout>,
) -> HashMap<ElementId, ScrollExtent> {
    let mut extents = HashMap::new();
    for (index, node) in plan.nodes.iter().enumerate() {
        let scrolls = [FieldId::OverflowX, FieldId::OverflowY]
            .iter()
            .any(|&f| node.style.overflow(f) == Overflow::Scroll);
        if !scrolls {
            continue;
        }
        let Some(own) = layouts.get(&node.element_id) else {
            continue;
        };
        let bounds = plan
            .child_ids(index)
            .iter()
            .filter_map(|c| layouts.get(c))
            .fold(Rect::default(), |acc, child| acc.union(&child.rect()));
        extents.insert(
            node.element_id,
            ScrollExtent {
                max_scroll_top: (bounds.bottom() - own.height).max(0.0),
                max_scroll_left: (bounds.right() - own.width).max(0.0),
            },
        );
    }
    extents
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentTree, StyledBox};
    use crate::utils::Viewport;

    fn config() -> LayoutConfig {
        LayoutConfig {
            viewport: Viewport::new(400.0, 300.0),
            ..LayoutConfig::default()
        }
    }

    fn stacked() -> DocumentTree {
        DocumentTree::from_nodes([
            StyledBox::new(1, "frame"),
            StyledBox::new(2, "frame")
                .with_style("height", 100.0)
                .with_style("marginBottom", 20.0)
                .child_of(1, 0.0),
            StyledBox::new(3, "frame")
                .with_style("height", 100.0)
                .with_style("marginTop", 30.0)
                .child_of(1, 1.0),
        ])
    }

    #[test]
    fn test_pure_engine_publishes_frames() {
        let mut engine = LayoutEngine::new(config());
        let doc = stacked();
        let stats = engine.layout_frame(&doc, 1).unwrap();
        assert!(!stats.accelerated);
        assert_eq!(stats.nodes, 3);
        assert_eq!(engine.version(), 1);
        assert_eq!(engine.layout(3).map(|l| l.y), Some(130.0));

        engine.layout_frame(&doc, 1).unwrap();
        assert_eq!(engine.version(), 2);
    }

    #[test]
    fn test_taffy_engine_uses_the_tree() {
        let mut engine = LayoutEngine::with_taffy(config());
        let doc = stacked();
        let first = engine.layout_frame(&doc, 1).unwrap();
        assert!(first.accelerated);
        assert!(first.sync.is_some_and(|s| s.full_build));

        let second = engine.layout_frame(&doc, 1).unwrap();
        assert!(second.sync.is_some_and(|s| s.is_noop()));
        assert_eq!(engine.layouts().len(), 3);
    }

    #[test]
    fn test_scroll_extents() {
        let doc = DocumentTree::from_nodes([
            StyledBox::new(1, "frame")
                .with_style("height", 100.0)
                .with_style("width", 200.0)
                .with_style("overflow", "scroll"),
            StyledBox::new(2, "frame")
                .with_style("height", 250.0)
                .with_style("width", 260.0)
                .child_of(1, 0.0),
        ]);
        let mut engine = LayoutEngine::new(config());
        engine.layout_frame(&doc, 1).unwrap();
        assert_eq!(
            engine.scroll_extents().get(&1),
            Some(&ScrollExtent {
                max_scroll_top: 150.0,
                max_scroll_left: 60.0,
            })
        );
        assert!(engine.scroll_extents().get(&2).is_none());
    }

    #[test]
    fn test_shrunk_text_is_remeasured() {
        let doc = DocumentTree::from_nodes([
            StyledBox::new(1, "frame")
                .with_style("display", "flex")
                .with_style("width", 100.0),
            StyledBox::new(2, "text")
                .with_text("aaaa aaaa aaaa")
                .with_style("fontSize", 10.0)
                .child_of(1, 0.0),
            StyledBox::new(3, "frame")
                .with_style("width", 60.0)
                .with_style("height", 10.0)
                .with_style("flexShrink", 0.0)
                .child_of(1, 1.0),
        ]);
        let mut engine = LayoutEngine::with_taffy(config());
        let stats = engine.layout_frame(&doc, 1).unwrap();
        assert_eq!(stats.passes, 2);
        let text = engine.layout(2).copied().unwrap();
        assert!((text.height - 36.0).abs() < 0.01, "height {}", text.height);
        assert!((text.width - 24.0).abs() < 0.01, "width {}", text.width);
    }

    #[test]
    fn test_single_pass_when_configured() {
        let mut engine = LayoutEngine::with_taffy(LayoutConfig {
            max_layout_passes: 1,
            ..config()
        });
        let stats = engine.layout_frame(&stacked(), 1).unwrap();
        assert_eq!(stats.passes, 1);
    }
}
