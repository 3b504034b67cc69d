//! Acceleration bridge
//!
//! Serializes [`EngineStyle`] records for the acceleration module, tracks
//! whether the module is usable per layout family, and routes block-flow
//! levels to the module or the pure implementation.

pub mod binary;
pub mod module;
pub mod style;
pub mod taffy_module;
pub mod textual;

use std::fmt;

pub use binary::BinaryCodec;
pub use module::{AccelerationModule, AvailableSize, ModuleFactory, NodeGeometry};
pub use style::EngineStyle;
pub use taffy_module::TaffyModule;
pub use textual::TextualCodec;

use crate::document::ElementId;
use crate::layout::records;
use crate::layout::types::{FlowContainer, FlowContext, FlowItem, FlowOutput};
use crate::utils::{LayoutConfig, LayoutError, Result, WireEncoding, WireError};

/// Opaque identifier of a node inside an acceleration module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub u32);

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An encoded style batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StylePayload {
    Binary(Vec<u8>),
    Textual(String),
}

impl StylePayload {
    pub fn encoding(&self) -> WireEncoding {
        match self {
            StylePayload::Binary(_) => WireEncoding::Binary,
            StylePayload::Textual(_) => WireEncoding::Textual,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            StylePayload::Binary(bytes) => bytes.len(),
            StylePayload::Textual(text) => text.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One node of a post-order batch
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchNode {
    pub style: EngineStyle,
    /// Indices of earlier batch nodes
    pub children: Vec<usize>,
}

impl BatchNode {
    pub fn leaf(style: EngineStyle) -> Self {
        Self {
            style,
            children: Vec::new(),
        }
    }
}

/// Styles in post-order: every child precedes its parent
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StyleBatch {
    pub nodes: Vec<BatchNode>,
}

impl StyleBatch {
    /// A batch of one childless node, used for create/update payloads
    pub fn single(style: EngineStyle) -> Self {
        Self {
            nodes: vec![BatchNode::leaf(style)],
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check post-order: child indices must precede their parent
    pub fn validate(&self) -> std::result::Result<(), WireError> {
        for (node, entry) in self.nodes.iter().enumerate() {
            if let Some(&child) = entry.children.iter().find(|&&c| c >= node) {
                return Err(WireError::ForwardReference { node, child });
            }
        }
        Ok(())
    }
}

/// A serializer back-end for [`StyleBatch`]
pub trait StyleCodec {
    fn encoding(&self) -> WireEncoding;
    fn encode_batch(&self, batch: &StyleBatch) -> Result<StylePayload>;
    fn decode_batch(&self, payload: &StylePayload) -> Result<StyleBatch>;
}

/// Decode a payload with the codec matching its encoding
pub fn decode_payload(payload: &StylePayload) -> Result<StyleBatch> {
    match payload {
        StylePayload::Binary(_) => BinaryCodec.decode_batch(payload),
        StylePayload::Textual(_) => TextualCodec.decode_batch(payload),
    }
}

/// Decode a payload that must hold exactly one node
pub fn decode_single(payload: &StylePayload) -> Result<EngineStyle> {
    let mut batch = decode_payload(payload)?;
    if batch.nodes.len() != 1 {
        return Err(WireError::NodeCount {
            expected: 1,
            found: batch.nodes.len(),
        }
        .into());
    }
    Ok(batch.nodes.remove(0).style)
}

/// Encode with the preferred encoding. Batches too large for the binary
/// index space go out as text.
pub fn encode_batch(encoding: WireEncoding, batch: &StyleBatch) -> Result<StylePayload> {
    match encoding {
        WireEncoding::Binary if batch.len() > usize::from(u16::MAX) => {
            log::warn!(
                "batch of {} nodes exceeds the binary index space; using textual encoding",
                batch.len()
            );
            TextualCodec.encode_batch(batch)
        }
        WireEncoding::Binary => BinaryCodec.encode_batch(batch),
        WireEncoding::Textual => TextualCodec.encode_batch(batch),
    }
}

/// Groups of calls that degrade independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutFamily {
    /// Persistent tree build/update/compute
    Tree,
    /// Flat-record block-flow levels
    Block,
    /// Grid containers served by the background worker
    Grid,
}

impl LayoutFamily {
    pub const ALL: [LayoutFamily; 3] = [LayoutFamily::Tree, LayoutFamily::Block, LayoutFamily::Grid];

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Availability {
    Ready,
    Degraded { since_frame: u64 },
}

/// Owns an acceleration module and routes around it when it fails
pub struct AccelerationBridge {
    module: Option<Box<dyn AccelerationModule>>,
    encoding: WireEncoding,
    block_threshold: usize,
    reprobe_interval: u64,
    frame: u64,
    families: [Availability; 3],
}

impl fmt::Debug for AccelerationBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccelerationBridge")
            .field("module", &self.module.as_ref().map(|m| m.name()))
            .field("encoding", &self.encoding)
            .field("frame", &self.frame)
            .field("families", &self.families)
            .finish()
    }
}

impl AccelerationBridge {
    /// Take ownership of `module` and probe it
    pub fn new(mut module: Box<dyn AccelerationModule>, config: &LayoutConfig) -> Self {
        let families = match module.probe() {
            Ok(()) => {
                log::info!("acceleration module {} ready", module.name());
                [Availability::Ready; 3]
            }
            Err(err) => {
                log::warn!(
                    "acceleration module {} failed to initialize: {}",
                    module.name(),
                    err
                );
                [Availability::Degraded { since_frame: 0 }; 3]
            }
        };
        Self {
            module: Some(module),
            families,
            ..Self::without_module(config)
        }
    }

    /// A bridge that always uses the pure algorithms
    pub fn without_module(config: &LayoutConfig) -> Self {
        Self {
            module: None,
            encoding: config.encoding,
            block_threshold: config.accelerated_block_threshold,
            reprobe_interval: config.reprobe_interval_frames,
            frame: 0,
            families: [Availability::Degraded { since_frame: 0 }; 3],
        }
    }

    pub fn has_module(&self) -> bool {
        self.module.is_some()
    }

    pub fn encoding(&self) -> WireEncoding {
        self.encoding
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn is_available(&self, family: LayoutFamily) -> bool {
        self.module.is_some() && self.families[family.index()] == Availability::Ready
    }

    /// Advance the frame counter and re-probe families that have been
    /// degraded for at least the configured interval.
    pub fn begin_frame(&mut self) {
        self.frame += 1;
        let Some(module) = self.module.as_mut() else {
            return;
        };
        let due: Vec<LayoutFamily> = LayoutFamily::ALL
            .into_iter()
            .filter(|f| match self.families[f.index()] {
                Availability::Degraded { since_frame } => {
                    self.frame.saturating_sub(since_frame) >= self.reprobe_interval
                }
                Availability::Ready => false,
            })
            .collect();
        if due.is_empty() {
            return;
        }
        let ok = match module.probe() {
            Ok(()) => true,
            Err(err) => {
                log::debug!("re-probe of {} failed: {}", module.name(), err);
                false
            }
        };
        for family in due {
            self.families[family.index()] = if ok {
                log::info!("acceleration module {} restored for {:?}", module.name(), family);
                Availability::Ready
            } else {
                Availability::Degraded {
                    since_frame: self.frame,
                }
            };
        }
    }

    /// Route a family through the pure path until the next re-probe
    pub fn report_failure(&mut self, family: LayoutFamily, err: &LayoutError) {
        if self.families[family.index()] == Availability::Ready {
            log::warn!("acceleration degraded for {:?}: {}", family, err);
        }
        self.families[family.index()] = Availability::Degraded {
            since_frame: self.frame,
        };
    }

    pub fn encode_style(&self, style: &EngineStyle) -> Result<StylePayload> {
        encode_batch(self.encoding, &StyleBatch::single(style.clone()))
    }

    pub fn encode_batch(&self, batch: &StyleBatch) -> Result<StylePayload> {
        encode_batch(self.encoding, batch)
    }

    fn tree_module(&mut self) -> Result<&mut Box<dyn AccelerationModule>> {
        if !self.is_available(LayoutFamily::Tree) {
            return Err(LayoutError::ModuleUnavailable(
                "tree layout is running on the fallback path".to_string(),
            ));
        }
        self.module
            .as_mut()
            .ok_or_else(|| LayoutError::ModuleUnavailable("no module".to_string()))
    }

    /// Run a tree call and degrade the tree family if it fails with
    /// anything other than a usage error.
    fn tree_call<T>(
        &mut self,
        call: impl FnOnce(&mut Box<dyn AccelerationModule>) -> Result<T>,
    ) -> Result<T> {
        let result = call(self.tree_module()?);
        if let Err(err) = &result {
            if !is_usage_error(err) {
                self.report_failure(LayoutFamily::Tree, err);
            }
        }
        result
    }

    pub fn build_tree(&mut self, batch: &StyleBatch) -> Result<Vec<NodeHandle>> {
        let payload = self.encode_batch(batch)?;
        self.tree_call(|m| m.build_tree(&payload))
    }

    pub fn create_node(&mut self, style: &EngineStyle) -> Result<NodeHandle> {
        let payload = self.encode_style(style)?;
        self.tree_call(|m| m.create_node(&payload))
    }

    pub fn update_style(&mut self, node: NodeHandle, payload: &StylePayload) -> Result<()> {
        self.tree_call(|m| m.update_style(node, payload))
    }

    pub fn set_children(&mut self, node: NodeHandle, children: &[NodeHandle]) -> Result<()> {
        self.tree_call(|m| m.set_children(node, children))
    }

    pub fn remove_node(&mut self, node: NodeHandle) -> Result<()> {
        self.tree_call(|m| m.remove_node(node))
    }

    /// Drop every node in the module, whatever its availability
    pub fn clear(&mut self) {
        if let Some(module) = self.module.as_mut() {
            module.clear();
        }
    }

    pub fn compute_layout(&mut self, root: NodeHandle, available: AvailableSize) -> Result<()> {
        self.tree_call(|m| m.compute_layout(root, available))
    }

    pub fn layout(&mut self, node: NodeHandle) -> Result<NodeGeometry> {
        self.tree_call(|m| m.layout(node))
    }

    pub fn layouts_batch(&mut self, nodes: &[NodeHandle]) -> Result<Vec<NodeGeometry>> {
        self.tree_call(|m| m.layouts_batch(nodes))
    }

    /// Lay out one block-flow level. Levels with more children than the
    /// threshold go to the module as flat records; everything else, and any
    /// failure, runs the pure implementation.
    pub fn block_layout(
        &mut self,
        parent: &FlowContainer,
        children: &[FlowItem],
        available_width: f32,
        available_height: Option<f32>,
        context: FlowContext,
    ) -> FlowOutput {
        if children.len() > self.block_threshold && self.is_available(LayoutFamily::Block) {
            match self.accelerated_block_layout(
                parent,
                children,
                available_width,
                available_height,
                context,
            ) {
                Ok(output) => return output,
                Err(err) => self.report_failure(LayoutFamily::Block, &err),
            }
        }
        crate::layout::block_flow::layout(
            parent,
            children,
            available_width,
            available_height,
            context,
        )
    }

    fn accelerated_block_layout(
        &mut self,
        parent: &FlowContainer,
        children: &[FlowItem],
        available_width: f32,
        available_height: Option<f32>,
        context: FlowContext,
    ) -> Result<FlowOutput> {
        let module = self
            .module
            .as_mut()
            .ok_or_else(|| LayoutError::ModuleUnavailable("no module".to_string()))?;
        let input =
            records::encode_level(parent, children, available_width, available_height, context);
        let output = module.block_layout(&input)?;
        let ids: Vec<ElementId> = children.iter().map(|c| c.element_id).collect();
        Ok(records::decode_output(&output, &ids)?)
    }
}

/// Errors that point at the caller rather than the module
fn is_usage_error(err: &LayoutError) -> bool {
    matches!(
        err,
        LayoutError::StaleHandle(_) | LayoutError::TreeNotBuilt | LayoutError::Wire(_)
    )
}

#[cfg(test)]
mod tests {
    use super::module::MockAccelerationModule;
    use super::*;
    use crate::bridge::style::FieldId;
    use crate::layout::geometry::Edges;
    use crate::layout::types::FlowItem;

    fn config() -> LayoutConfig {
        LayoutConfig {
            reprobe_interval_frames: 3,
            accelerated_block_threshold: 2,
            ..LayoutConfig::default()
        }
    }

    fn children(n: usize) -> Vec<FlowItem> {
        (0..n)
            .map(|i| {
                FlowItem::new(i as u64)
                    .with_size(None, Some(10.0))
                    .with_margin(Edges::new(5.0, 0.0, 5.0, 0.0))
            })
            .collect()
    }

    #[test]
    fn test_batch_validate() {
        let batch = StyleBatch {
            nodes: vec![
                BatchNode::leaf(EngineStyle::new()),
                BatchNode {
                    style: EngineStyle::new(),
                    children: vec![0, 1],
                },
            ],
        };
        assert_eq!(
            batch.validate(),
            Err(WireError::ForwardReference { node: 1, child: 1 })
        );
    }

    #[test]
    fn test_codecs_decode_each_other() {
        let mut style = EngineStyle::new();
        style.set_float(FieldId::AspectRatio, 1.5);
        let batch = StyleBatch::single(style);
        let binary = encode_batch(WireEncoding::Binary, &batch).unwrap();
        let textual = encode_batch(WireEncoding::Textual, &batch).unwrap();
        assert_eq!(binary.encoding(), WireEncoding::Binary);
        assert_eq!(decode_payload(&binary).unwrap(), decode_payload(&textual).unwrap());
        assert!(BinaryCodec.decode_batch(&textual).is_err());
    }

    #[test]
    fn test_non_finite_values_never_reach_either_codec() {
        let mut style = EngineStyle::new();
        style.set_float(FieldId::FlexGrow, f32::NAN);
        style.set_dim(FieldId::Width, style::Dim::Length(f32::INFINITY));
        style.set_float(FieldId::FlexShrink, 0.5);
        assert!(!style.is_set(FieldId::FlexGrow));
        assert!(!style.is_set(FieldId::Width));

        let batch = StyleBatch::single(style);
        let binary = decode_payload(&encode_batch(WireEncoding::Binary, &batch).unwrap()).unwrap();
        let textual = decode_payload(&encode_batch(WireEncoding::Textual, &batch).unwrap()).unwrap();
        assert_eq!(binary, textual);
        assert_eq!(binary.nodes[0].style.float(FieldId::FlexShrink), Some(0.5));
    }

    #[test]
    fn test_oversized_batch_falls_back_to_textual() {
        let batch = StyleBatch {
            nodes: vec![BatchNode::default(); usize::from(u16::MAX) + 1],
        };
        let payload = encode_batch(WireEncoding::Binary, &batch).unwrap();
        assert_eq!(payload.encoding(), WireEncoding::Textual);
    }

    #[test]
    fn test_failed_probe_starts_degraded() {
        let mut module = MockAccelerationModule::new();
        module.expect_name().return_const("mock");
        module
            .expect_probe()
            .returning(|| Err(LayoutError::ModuleUnavailable("no device".to_string())));
        let bridge = AccelerationBridge::new(Box::new(module), &config());
        assert!(bridge.has_module());
        assert!(!bridge.is_available(LayoutFamily::Tree));
    }

    #[test]
    fn test_tree_calls_rejected_while_degraded() {
        let mut bridge = AccelerationBridge::without_module(&config());
        let err = bridge.create_node(&EngineStyle::new()).unwrap_err();
        assert!(matches!(err, LayoutError::ModuleUnavailable(_)));
    }

    #[test]
    fn test_block_failure_falls_back_and_reprobes() {
        let mut module = MockAccelerationModule::new();
        module.expect_name().return_const("mock");
        module.expect_probe().times(2).returning(|| Ok(()));
        module
            .expect_block_layout()
            .times(1)
            .returning(|_| Err(LayoutError::Engine("boom".to_string())));
        let mut bridge = AccelerationBridge::new(Box::new(module), &config());

        let items = children(3);
        let parent = FlowContainer::default();
        let pure =
            crate::layout::block_flow::layout(&parent, &items, 100.0, None, FlowContext::default());
        let out = bridge.block_layout(&parent, &items, 100.0, None, FlowContext::default());
        assert_eq!(out, pure);
        assert!(!bridge.is_available(LayoutFamily::Block));
        assert!(bridge.is_available(LayoutFamily::Tree));

        // degraded: no module call until the interval elapses
        let again = bridge.block_layout(&parent, &items, 100.0, None, FlowContext::default());
        assert_eq!(again, pure);
        for _ in 0..3 {
            bridge.begin_frame();
        }
        assert!(bridge.is_available(LayoutFamily::Block));
    }

    #[test]
    fn test_small_levels_stay_pure() {
        let mut module = MockAccelerationModule::new();
        module.expect_name().return_const("mock");
        module.expect_probe().returning(|| Ok(()));
        module.expect_block_layout().never();
        let mut bridge = AccelerationBridge::new(Box::new(module), &config());
        let items = children(2);
        let out = bridge.block_layout(
            &FlowContainer::default(),
            &items,
            100.0,
            None,
            FlowContext::default(),
        );
        assert_eq!(out.layouts.len(), 2);
    }

    #[test]
    fn test_accelerated_block_uses_module_output() {
        let mut module = MockAccelerationModule::new();
        module.expect_name().return_const("mock");
        module.expect_probe().returning(|| Ok(()));
        module.expect_block_layout().times(1).returning(|records| {
            let level = crate::layout::records::decode_level(records)?;
            Ok(crate::layout::records::encode_output(&level.run()))
        });
        let mut bridge = AccelerationBridge::new(Box::new(module), &config());
        let items = children(4);
        let parent = FlowContainer::default();
        let out = bridge.block_layout(&parent, &items, 100.0, None, FlowContext::default());
        let pure =
            crate::layout::block_flow::layout(&parent, &items, 100.0, None, FlowContext::default());
        assert_eq!(out, pure);
        assert_eq!(out.layouts[3].element_id, 3);
    }
}
