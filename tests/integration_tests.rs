//! Integration tests for boxflow
//!
//! These tests drive the public API end to end: documents in, layouts out.

use std::collections::HashMap;
use std::time::Duration;

use boxflow::bridge::style::{
    Dim, FieldId, FieldKind, FieldValue, Placement, TrackSize, FIELD_COUNT,
};
use boxflow::bridge::{
    decode_payload, encode_batch, AccelerationBridge, AccelerationModule, BatchNode,
    ModuleFactory, StyleBatch, TaffyModule,
};
use boxflow::layout::geometry::Edges;
use boxflow::layout::types::{FlowContainer, FlowContext, FlowItem};
use boxflow::layout::{block_flow, records};
use boxflow::utils::{Viewport, WireEncoding};
use boxflow::{ComputedLayout, DocumentTree, ElementId, EngineStyle, LayoutConfig, LayoutEngine, StyledBox};
use proptest::prelude::*;

fn config() -> LayoutConfig {
    let _ = env_logger::builder().is_test(true).try_init();
    LayoutConfig {
        viewport: Viewport::new(400.0, 300.0),
        ..LayoutConfig::default()
    }
}

fn taffy_factory() -> ModuleFactory {
    Box::new(|| Ok(Box::new(TaffyModule::new()) as Box<dyn AccelerationModule>))
}

fn rect(layout: &ComputedLayout) -> (f32, f32, f32, f32) {
    (layout.x, layout.y, layout.width, layout.height)
}

fn assert_layouts_close(
    left: &HashMap<ElementId, ComputedLayout>,
    right: &HashMap<ElementId, ComputedLayout>,
) {
    assert_eq!(left.len(), right.len());
    for (id, a) in left {
        let b = right.get(id).unwrap_or_else(|| panic!("missing {}", id));
        for (x, y) in [(a.x, b.x), (a.y, b.y), (a.width, b.width), (a.height, b.height)] {
            assert!((x - y).abs() < 0.01, "node {}: {:?} vs {:?}", id, a, b);
        }
    }
}

/// Engine-facing documents
mod frames {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lay_out(nodes: Vec<StyledBox>) -> HashMap<ElementId, ComputedLayout> {
        let mut engine = LayoutEngine::new(config());
        engine.layout_frame(&DocumentTree::from_nodes(nodes), 1).unwrap();
        engine.layouts().clone()
    }

    /// Pure fallback first, then the taffy-backed tree
    fn lay_out_both(nodes: Vec<StyledBox>) -> [HashMap<ElementId, ComputedLayout>; 2] {
        let doc = DocumentTree::from_nodes(nodes);
        [LayoutEngine::new(config()), LayoutEngine::with_taffy(config())].map(|mut engine| {
            let stats = engine.layout_frame(&doc, 1).unwrap();
            assert_eq!(stats.accelerated, engine.bridge().has_module());
            engine.layouts().clone()
        })
    }

    #[test]
    fn test_sibling_margins_collapse_to_the_larger() {
        for layouts in lay_out_both(vec![
            StyledBox::new(1, "frame"),
            StyledBox::new(2, "frame")
                .with_style("height", 100.0)
                .with_style("marginBottom", 20.0)
                .child_of(1, 0.0),
            StyledBox::new(3, "frame")
                .with_style("height", 100.0)
                .with_style("marginTop", 30.0)
                .child_of(1, 1.0),
        ]) {
            assert_eq!(rect(&layouts[&3]), (0.0, 130.0, 400.0, 100.0));
            assert_eq!(layouts[&1].height, 230.0);
        }
    }

    #[test]
    fn test_empty_block_margins_collapse_through() {
        for layouts in lay_out_both(vec![
            StyledBox::new(1, "frame"),
            StyledBox::new(2, "frame").with_style("height", 100.0).child_of(1, 0.0),
            StyledBox::new(3, "frame")
                .with_style("marginTop", 20.0)
                .with_style("marginBottom", 30.0)
                .child_of(1, 1.0),
            StyledBox::new(4, "frame")
                .with_style("height", 100.0)
                .with_style("marginTop", 10.0)
                .child_of(1, 2.0),
        ]) {
            assert_eq!(layouts[&3].height, 0.0);
            assert_eq!(layouts[&4].y, 130.0);
        }
    }

    #[test]
    fn test_overflow_hidden_sibling_does_not_collapse() {
        for layouts in lay_out_both(vec![
            StyledBox::new(1, "frame"),
            StyledBox::new(2, "frame")
                .with_style("height", 100.0)
                .with_style("marginBottom", 20.0)
                .child_of(1, 0.0),
            StyledBox::new(3, "frame")
                .with_style("height", 50.0)
                .with_style("overflow", "hidden")
                .child_of(1, 1.0),
            StyledBox::new(4, "frame")
                .with_style("height", 100.0)
                .with_style("marginTop", 30.0)
                .child_of(1, 2.0),
        ]) {
            assert_eq!(layouts[&3].y, 120.0);
            assert_eq!(layouts[&4].y, 200.0);
        }
    }

    #[test]
    fn test_overflow_hidden_keeps_child_margin_inside() {
        let layouts = lay_out(vec![
            StyledBox::new(1, "frame").with_style("padding", 10.0),
            StyledBox::new(2, "frame")
                .with_style("overflow", "hidden")
                .with_style("marginTop", 20.0)
                .child_of(1, 0.0),
            StyledBox::new(3, "frame")
                .with_style("height", 40.0)
                .with_style("marginTop", 30.0)
                .child_of(2, 0.0),
        ]);
        assert_eq!(rect(&layouts[&2]), (10.0, 30.0, 380.0, 70.0));
        assert_eq!(rect(&layouts[&3]), (0.0, 30.0, 380.0, 40.0));
    }

    #[test]
    fn test_every_node_in_the_subtree_gets_a_layout() {
        let doc = DocumentTree::from_nodes(vec![
            StyledBox::new(1, "frame"),
            StyledBox::new(2, "frame").with_style("display", "flex").child_of(1, 0.0),
            StyledBox::new(3, "text").with_text("one two three").child_of(2, 0.0),
            StyledBox::new(4, "frame").with_style("display", "inline-block").child_of(1, 1.0),
            StyledBox::new(5, "frame").with_style("display", "none").child_of(1, 2.0),
            StyledBox::new(6, "frame").child_of(5, 0.0),
            StyledBox::new(7, "frame")
                .with_style("position", "absolute")
                .with_style("right", 0.0)
                .child_of(1, 3.0),
            StyledBox::new(8, "frame").with_style("display", "grid").child_of(1, 4.0),
            StyledBox::new(9, "frame").child_of(8, 0.0),
        ]);
        for mut engine in [LayoutEngine::new(config()), LayoutEngine::with_taffy(config())] {
            let stats = engine.layout_frame(&doc, 1).unwrap();
            for id in [1, 2, 3, 4, 5, 7, 8, 9] {
                let layout = engine.layout(id).unwrap_or_else(|| panic!("missing layout for {}", id));
                assert!(layout.width.is_finite() && layout.height.is_finite());
            }
            assert_eq!(engine.layouts().len(), stats.nodes);
        }
    }

    #[test]
    fn test_document_json_round_trip_through_engine() {
        let doc = DocumentTree::from_json_str(
            r#"{ "nodes": [
                { "id": 1, "tag": "frame", "props": { "style": { "padding": "8px" } } },
                { "id": 2, "tag": "frame", "parentId": 1, "orderNum": 0,
                  "props": { "style": { "height": "50%", "width": 100 } } }
            ] }"#,
        )
        .unwrap();
        let mut engine = LayoutEngine::new(config());
        engine.layout_frame(&doc, doc.root_id().unwrap()).unwrap();
        let child = engine.layout(2).unwrap();
        assert_eq!((child.x, child.y, child.width), (8.0, 8.0, 100.0));
    }
}

/// The persistent tree and its fallbacks agree with a fresh build
mod incremental {
    use super::*;
    use pretty_assertions::assert_eq;
    use boxflow::document::StyleValue;

    fn doc() -> DocumentTree {
        DocumentTree::from_nodes(vec![
            StyledBox::new(1, "frame").with_style("display", "flex").with_style("gap", 10.0),
            StyledBox::new(2, "frame").with_style("width", 60.0).with_style("height", 40.0).child_of(1, 0.0),
            StyledBox::new(3, "frame").with_style("flexGrow", 1.0).with_style("height", 20.0).child_of(1, 1.0),
            StyledBox::new(4, "frame").with_style("width", 30.0).with_style("height", 30.0).child_of(1, 2.0),
        ])
    }

    #[test]
    fn test_incremental_sync_matches_full_build() {
        let mut doc = doc();
        let mut engine = LayoutEngine::with_taffy(config());
        engine.layout_frame(&doc, 1).unwrap();

        doc.style_mut(2)
            .unwrap()
            .insert("width".to_string(), StyleValue::from(90.0f64));
        doc.remove(4);
        doc.insert(StyledBox::new(5, "frame").with_style("height", 15.0).child_of(1, 0.5));

        let stats = engine.layout_frame(&doc, 1).unwrap();
        let sync = stats.sync.unwrap();
        assert!(!sync.full_build);
        assert_eq!((sync.created, sync.removed), (1, 1));

        let mut fresh = LayoutEngine::with_taffy(config());
        fresh.layout_frame(&doc, 1).unwrap();
        assert_layouts_close(engine.layouts(), fresh.layouts());
    }

    #[test]
    fn test_root_change_rebuilds() {
        let mut engine = LayoutEngine::with_taffy(config());
        let doc = doc();
        engine.layout_frame(&doc, 1).unwrap();
        let stats = engine.layout_frame(&doc, 2).unwrap();
        assert!(stats.sync.is_some_and(|s| s.full_build));
        assert_eq!(engine.layouts().len(), 1);
    }
}

/// Accelerated block levels produce the same geometry as the pure engine
mod acceleration {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bridge() -> AccelerationBridge {
        let config = LayoutConfig {
            accelerated_block_threshold: 2,
            ..config()
        };
        AccelerationBridge::new(Box::new(TaffyModule::new()), &config)
    }

    fn level(heights: &[(f32, f32, f32)]) -> Vec<FlowItem> {
        heights
            .iter()
            .enumerate()
            .map(|(i, &(height, top, bottom))| {
                FlowItem::new(i as ElementId + 10)
                    .with_size(None, Some(height))
                    .with_margin(Edges::new(top, 0.0, bottom, 0.0))
            })
            .collect()
    }

    #[test]
    fn test_large_level_goes_through_the_module() {
        let children = level(&[(10.0, 5.0, 5.0); 12]);
        let parent = FlowContainer {
            padding: Edges::uniform(4.0),
            ..FlowContainer::default()
        };
        let mut bridge = bridge();
        let accelerated = bridge.block_layout(&parent, &children, 300.0, None, FlowContext::default());
        let pure = block_flow::layout(&parent, &children, 300.0, None, FlowContext::default());
        assert_eq!(accelerated, pure);
        assert_eq!(accelerated.layouts[11].element_id, 21);
    }

    #[test]
    fn test_level_records_survive_the_wire() {
        let children = level(&[(10.0, 0.0, 20.0), (0.0, 15.0, 5.0), (30.0, -5.0, 0.0)]);
        let input = records::encode_level(
            &FlowContainer::default(),
            &children,
            250.0,
            Some(400.0),
            FlowContext { collapse_blocked: true },
        );
        let decoded = records::decode_level(&input).unwrap();
        // ids do not cross the wire; children come back numbered by index
        let expected: Vec<FlowItem> = children
            .iter()
            .enumerate()
            .map(|(i, c)| FlowItem {
                element_id: i as ElementId,
                ..c.clone()
            })
            .collect();
        assert_eq!(decoded.children, expected);
        assert_eq!(decoded.available_height, Some(400.0));
        assert!(decoded.context.collapse_blocked);
    }

    proptest! {
        #[test]
        fn test_accelerated_block_matches_pure(
            items in prop::collection::vec((0u8..80, -20i8..40, -20i8..40), 3..24),
            width in 50u16..800,
        ) {
            let items: Vec<(f32, f32, f32)> = items
                .into_iter()
                .map(|(h, t, b)| (f32::from(h), f32::from(t), f32::from(b)))
                .collect();
            let children = level(&items);
            let parent = FlowContainer::default();
            let mut bridge = bridge();
            let accelerated =
                bridge.block_layout(&parent, &children, f32::from(width), None, FlowContext::default());
            let pure = block_flow::layout(&parent, &children, f32::from(width), None, FlowContext::default());
            prop_assert_eq!(accelerated, pure);
        }
    }
}

/// Binary and textual encodings carry the same styles
mod codecs {
    use super::*;
    use pretty_assertions::assert_eq;

    type RawField = (usize, u8, i32, u8, u8, i16);

    fn value_for(field: FieldId, (_, code, number, percent, choice, line): RawField) -> FieldValue {
        let quarter = number as f32 / 4.0;
        let dim = match choice % 3 {
            0 => Dim::Auto,
            1 => Dim::Length(quarter),
            _ => Dim::Percent(f32::from(percent) / 100.0),
        };
        match field.kind() {
            FieldKind::Keyword(table) => FieldValue::Keyword(code % table.len() as u8),
            FieldKind::Float => FieldValue::Float(quarter),
            FieldKind::Dimension | FieldKind::LengthPercentageAuto | FieldKind::LengthPercentage => {
                FieldValue::Dim(dim)
            }
            FieldKind::Placement => FieldValue::Placement(match choice % 3 {
                0 => Placement::Auto,
                1 => Placement::Line(line),
                _ => Placement::Span(line.abs().max(1)),
            }),
        }
    }

    fn track(choice: u8, number: u16) -> TrackSize {
        let value = f32::from(number) / 4.0;
        match choice % 6 {
            0 => TrackSize::Length(value),
            1 => TrackSize::Percent(f32::from(number % 101) / 100.0),
            2 => TrackSize::Fr(value),
            3 => TrackSize::Auto,
            4 => TrackSize::MinContent,
            _ => TrackSize::MaxContent,
        }
    }

    fn style_strategy() -> impl Strategy<Value = EngineStyle> {
        (
            prop::collection::vec(
                (0..FIELD_COUNT, any::<u8>(), -4000i32..4000, 0u8..=100, any::<u8>(), -30i16..30),
                0..24,
            ),
            prop::collection::vec((any::<u8>(), 0u16..2000), 0..4),
            prop::collection::vec((any::<u8>(), 0u16..2000), 0..4),
        )
            .prop_map(|(fields, rows, columns)| {
                let mut style = EngineStyle::new();
                for raw in fields {
                    let field = FieldId::ALL[raw.0];
                    style.set(field, value_for(field, raw));
                }
                style.grid_template_rows = rows.into_iter().map(|(c, n)| track(c, n)).collect();
                style.grid_template_columns = columns.into_iter().map(|(c, n)| track(c, n)).collect();
                style
            })
    }

    fn batch_strategy() -> impl Strategy<Value = StyleBatch> {
        prop::collection::vec(style_strategy(), 1..6).prop_map(|styles| {
            let count = styles.len();
            let nodes = styles
                .into_iter()
                .enumerate()
                .map(|(i, style)| BatchNode {
                    style,
                    children: if i + 1 == count { (0..i).collect() } else { Vec::new() },
                })
                .collect();
            StyleBatch { nodes }
        })
    }

    proptest! {
        #[test]
        fn test_encodings_decode_identically(batch in batch_strategy()) {
            let binary = encode_batch(WireEncoding::Binary, &batch).unwrap();
            let textual = encode_batch(WireEncoding::Textual, &batch).unwrap();
            let from_binary = decode_payload(&binary).unwrap();
            let from_textual = decode_payload(&textual).unwrap();
            prop_assert_eq!(&from_binary, &batch);
            prop_assert_eq!(&from_textual, &batch);
        }

        #[test]
        fn test_binary_decoder_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
            let _ = boxflow::bridge::binary::decode(&bytes);
        }
    }
}

/// Background layout on the worker thread
mod background {
    use super::*;
    use pretty_assertions::assert_eq;
    use boxflow::scheduler::{AsyncScheduler, CacheKey, CachedLayout, LayoutJob};
    use boxflow::bridge::AvailableSize;

    #[test]
    fn test_flush_without_scheduler_is_a_no_op() {
        let mut engine = LayoutEngine::new(config());
        assert!(!tokio_test::block_on(engine.flush_background(Duration::from_millis(10))));
        assert!(!engine.on_paint_tick());
    }

    #[tokio::test]
    async fn test_scheduled_job_resolves_after_flush() {
        let mut scheduler = AsyncScheduler::spawn(taffy_factory()).unwrap();
        assert!(scheduler.wait_ready(Duration::from_secs(5)).await);

        let children = vec![
            FlowItem::new(1).with_size(None, Some(100.0)).with_margin(Edges::new(0.0, 0.0, 20.0, 0.0)),
            FlowItem::new(2).with_size(None, Some(100.0)).with_margin(Edges::new(30.0, 0.0, 0.0, 0.0)),
        ];
        let records =
            records::encode_level(&FlowContainer::default(), &children, 400.0, None, FlowContext::default());
        let key = CacheKey::new(7, vec![1, 2], AvailableSize::new(Some(400.0), None)).with_records(&records);
        let receiver = scheduler
            .schedule_async(key.clone(), LayoutJob::Block { records, ids: vec![1, 2] })
            .unwrap();

        assert_eq!(scheduler.flush(Duration::from_secs(5)).await, vec![7]);
        match receiver.await {
            Ok(Some(CachedLayout::Block(output))) => assert_eq!(output.layouts[1].y, 130.0),
            other => panic!("unexpected {:?}", other),
        }
        assert!(scheduler.get_cached(&key).is_some());
    }

    #[tokio::test]
    async fn test_grid_is_served_stale_then_revalidated() {
        let doc = DocumentTree::from_nodes(vec![
            StyledBox::new(1, "frame")
                .with_style("display", "grid")
                .with_style("gridTemplateColumns", "50px 70px"),
            StyledBox::new(2, "frame").with_style("height", 20.0).child_of(1, 0.0),
            StyledBox::new(3, "frame").with_style("height", 20.0).child_of(1, 1.0),
        ]);
        let mut engine = LayoutEngine::new(config()).with_scheduler(taffy_factory()).unwrap();
        assert!(
            engine
                .scheduler_mut()
                .unwrap()
                .wait_ready(Duration::from_secs(5))
                .await
        );

        engine.layout_frame(&doc, 1).unwrap();
        // stacked until the worker answers
        assert_eq!(engine.layout(3).map(|l| l.y), Some(20.0));

        assert!(engine.flush_background(Duration::from_secs(5)).await);
        engine.layout_frame(&doc, 1).unwrap();
        assert!(!engine.needs_relayout());
        let second = engine.layout(3).copied().unwrap();
        assert_eq!((second.x, second.y, second.width), (50.0, 0.0, 70.0));
    }

    #[tokio::test]
    async fn test_invalidate_drops_the_cached_grid() {
        let doc = DocumentTree::from_nodes(vec![
            StyledBox::new(1, "frame")
                .with_style("display", "grid")
                .with_style("gridTemplateColumns", "1fr 1fr"),
            StyledBox::new(2, "frame").with_style("height", 10.0).child_of(1, 0.0),
            StyledBox::new(3, "frame").with_style("height", 10.0).child_of(1, 1.0),
        ]);
        let mut engine = LayoutEngine::new(config()).with_scheduler(taffy_factory()).unwrap();
        engine.scheduler_mut().unwrap().wait_ready(Duration::from_secs(5)).await;
        engine.layout_frame(&doc, 1).unwrap();
        engine.flush_background(Duration::from_secs(5)).await;
        engine.layout_frame(&doc, 1).unwrap();
        assert_eq!(engine.layout(3).map(|l| l.x), Some(200.0));

        engine.invalidate(1);
        assert_eq!(engine.scheduler_mut().unwrap().cache_len(), 0);
        engine.layout_frame(&doc, 1).unwrap();
        assert_eq!(engine.layout(3).map(|l| (l.x, l.y)), Some((0.0, 10.0)));
    }
}
