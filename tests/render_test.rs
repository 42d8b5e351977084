use databoard::chart::{self, interpolate, squarify};
use databoard::codec;
use databoard::document::GraphDocument;
use databoard::node::{ChartData, ChartKind, ElementKind, Node, NodeData, Position, Record};
use databoard::render::{
    Primitive, Rect, TitleCommit, TitleEdit, TitleKey, Visual, plan_scene, render_node,
};
use databoard::style::{Curve, ResolvedStyle};
use serde_json::json;

// Helper turning json objects into chart records
fn records(rows: serde_json::Value) -> Vec<Record> {
    serde_json::from_value(rows).expect("rows are objects")
}

fn chart_node(kind: ChartKind, rows: serde_json::Value) -> Node {
    let mut data = ChartData::new(kind);
    data.data = records(rows);
    data.x_key = Some("name".to_string());
    data.y_key = Some("value".to_string());
    data.z_key = Some("other".to_string());
    Node::new("c1", Position::new(0.0, 0.0), NodeData::Chart(data))
}

fn sample_rows() -> serde_json::Value {
    json!([
        { "name": "A", "value": 10, "other": "B" },
        { "name": "B", "value": 25, "other": "C" },
        { "name": "C", "value": 5, "other": "D" },
        { "name": "D", "value": "15", "other": "A" }
    ])
}

const FRAME: Rect = Rect {
    x: 0.0,
    y: 0.0,
    w: 480.0,
    h: 320.0,
};

#[test]
fn test_unknown_chart_kind_renders_placeholder() {
    let node = chart_node(ChartKind::from_name("hexbin"), sample_rows());
    let visual = render_node(&node, FRAME);
    assert_eq!(
        visual,
        Visual::Placeholder {
            message: "Unknown chart type: hexbin".to_string()
        }
    );
    println!("✓ Unknown chart kinds fall back to a placeholder");
}

#[test]
fn test_unknown_node_and_element_types_render_placeholder() {
    let other = Node::new(
        "s1",
        Position::new(0.0, 0.0),
        NodeData::Other {
            node_type: "sticky".to_string(),
            data: json!({}),
        },
    );
    assert!(render_node(&other, FRAME).is_placeholder());

    let mut element = Node::element(ElementKind::Text, Position::new(0.0, 0.0));
    if let NodeData::Element(data) = &mut element.data {
        data.kind = ElementKind::from_name("marquee");
    }
    assert!(render_node(&element, FRAME).is_placeholder());
    println!("✓ Unknown node and element types are placeholders too");
}

#[test]
fn test_every_known_kind_draws_something() {
    for kind in ChartKind::ALL {
        let node = chart_node(kind.clone(), sample_rows());
        match render_node(&node, FRAME) {
            Visual::Chart(drawing) => {
                assert_eq!(drawing.kind, kind);
                assert!(!drawing.is_blank(), "{} drew nothing", kind.as_str());
            }
            other => panic!("{} did not render a chart: {:?}", kind.as_str(), other),
        }
    }
    println!("✓ All eleven chart kinds produce a drawing");
}

#[test]
fn test_huge_angles_still_render() {
    for kind in [ChartKind::Pie, ChartKind::RadialBar] {
        let mut node = chart_node(kind.clone(), sample_rows());
        if let NodeData::Chart(data) = &mut node.data {
            data.style.start_angle = Some(-1e12);
            data.style.end_angle = Some(1e300);
        }
        let Visual::Chart(drawing) = render_node(&node, FRAME) else {
            panic!("{} should still be a chart", kind.as_str());
        };
        assert!(!drawing.is_blank());
        for primitive in &drawing.series {
            if let Primitive::Polygon { points, .. } = primitive {
                assert!(points.len() <= 2 * 91 + 1, "arc outline stays bounded");
                assert!(points.iter().all(|(x, y)| x.is_finite() && y.is_finite()));
            }
        }
    }
    println!("✓ Out-of-range angles draw at most one full turn");
}

#[test]
fn test_mismatched_keys_render_empty_chart() {
    let mut node = chart_node(ChartKind::Bar, sample_rows());
    if let NodeData::Chart(data) = &mut node.data {
        data.y_key = Some("does_not_exist".to_string());
    }
    match render_node(&node, FRAME) {
        Visual::Chart(drawing) => {
            assert!(drawing.is_blank());
            assert!(drawing.grid.is_empty());
            assert_eq!(drawing.title.as_deref(), Some("Untitled chart"));
        }
        other => panic!("expected an empty chart, got {:?}", other),
    }
    println!("✓ Keys that match nothing give an empty chart, not an error");
}

#[test]
fn test_line_chart_defaults() {
    let style = ResolvedStyle::defaults(&ChartKind::Line);
    assert!(style.show_grid && style.show_legend && style.show_tooltip && style.show_dots);
    assert_eq!(style.curve, Curve::Monotone);
    assert_eq!(style.stroke, "#8884d8");
    assert_eq!(style.stroke_width, 2.0);

    let node = Node::chart(ChartKind::Line, Position::new(0.0, 0.0));
    let mut node = node;
    if let NodeData::Chart(data) = &mut node.data {
        data.data = records(json!([{ "x": 1, "y": 3 }, { "x": 2, "y": 5 }, { "x": 3, "y": 4 }]));
    }
    let Visual::Chart(drawing) = render_node(&node, FRAME) else {
        panic!("line chart expected");
    };
    assert!(!drawing.grid.is_empty(), "grid visible");
    assert!(!drawing.legend.is_empty(), "legend visible");
    assert_eq!(drawing.tooltips.len(), 3, "one tooltip per point");
    assert_eq!(drawing.dots.len(), 3, "dots shown");
    println!("✓ A fresh line chart shows grid, legend, tooltips and dots");
}

#[test]
fn test_style_overrides_hide_layers() {
    let mut node = chart_node(ChartKind::Line, sample_rows());
    if let NodeData::Chart(data) = &mut node.data {
        data.style.show_grid = Some(false);
        data.style.show_legend = Some(false);
        data.style.show_tooltip = Some(false);
        data.style.show_dots = Some(false);
    }
    let Visual::Chart(drawing) = render_node(&node, FRAME) else {
        panic!("line chart expected");
    };
    assert!(drawing.grid.is_empty());
    assert!(drawing.legend.is_empty());
    assert!(drawing.tooltips.is_empty());
    assert!(drawing.dots.is_empty());
    assert!(!drawing.series.is_empty());
    println!("✓ Style flags switch chart layers off");
}

#[test]
fn test_chart_fills_resized_rect() {
    let node = chart_node(ChartKind::Bar, sample_rows());
    let big = Rect::new(100.0, 100.0, 800.0, 600.0);
    let Visual::Chart(drawing) = render_node(&node, big) else {
        panic!("bar chart expected");
    };
    assert!(drawing.plot.x >= big.x && drawing.plot.right() <= big.right());
    assert!(drawing.plot.y >= big.y && drawing.plot.bottom() <= big.bottom());
    assert!(drawing.plot.w > 600.0, "plot grows with the node");
    println!("✓ Charts lay out inside whatever rect they get");
}

#[test]
fn test_numeric_strings_are_plotted() {
    let rows = json!([{ "name": "A", "value": "7.5" }, { "name": "B", "value": "oops" }]);
    let Visual::Chart(drawing) = render_node(&chart_node(ChartKind::Pie, rows), FRAME) else {
        panic!("pie chart expected");
    };
    assert_eq!(drawing.tooltips.len(), 1, "only the numeric row becomes a slice");
    assert!(drawing.tooltips[0].text.contains("7.5"));
    println!("✓ Numeric strings count, other strings are skipped");
}

#[test]
fn test_dangling_edge_is_not_drawn() {
    let text = r#"{
      "nodes": [{ "id": "a", "type": "element", "position": {"x": 0, "y": 0}, "data": {"kind": "text"} }],
      "edges": [{ "id": "e1", "source": "a", "target": "gone" }]
    }"#;
    let g = codec::decode(text).unwrap();
    let scene = plan_scene(&g, None);
    assert_eq!(g.edges.len(), 1);
    assert_eq!(scene.edges.len(), 0, "zero edge draws");
    assert_eq!(scene.nodes.len(), 1);
    println!("✓ Dangling edges are skipped when drawing");
}

#[test]
fn test_toolbar_only_for_selected_chart() {
    let chart = Node::chart(ChartKind::Area, Position::new(0.0, 0.0));
    let title = Node::element(ElementKind::Title, Position::new(0.0, 400.0));
    let (chart_id, title_id) = (chart.id().to_string(), title.id().to_string());
    let g = GraphDocument::empty()
        .add_node(chart)
        .and_then(|g| g.add_node(title))
        .unwrap();

    let scene = plan_scene(&g, Some(&chart_id));
    assert!(scene.nodes.iter().any(|n| n.node_id == chart_id && n.toolbar));
    let scene = plan_scene(&g, Some(&title_id));
    assert!(scene.nodes.iter().all(|n| !n.toolbar));
    println!("✓ Only the selected chart offers the style toolbar");
}

#[test]
fn test_divider_and_text_primitives() {
    let divider = Node::element(ElementKind::HorizontalDivider, Position::new(0.0, 0.0));
    let rect = Rect::new(0.0, 0.0, 400.0, 8.0);
    let prims = render_node(&divider, rect).primitives(rect);
    assert!(matches!(prims.as_slice(), [Primitive::Line { from, to, .. }] if from.1 == 4.0 && to.0 == 400.0));

    let mut text = Node::element(ElementKind::Text, Position::new(0.0, 0.0));
    if let NodeData::Element(data) = &mut text.data {
        data.text = Some("first\nsecond".to_string());
    }
    let prims = render_node(&text, FRAME).primitives(FRAME);
    assert_eq!(prims.len(), 2, "one label per line");
    println!("✓ Elements render as lines and labels");
}

#[test]
fn test_title_edit_commit_and_cancel() {
    let node = Node::chart(ChartKind::Line, Position::new(0.0, 0.0));

    let mut edit = TitleEdit::begin(&node).unwrap();
    assert_eq!(edit.draft(), "Untitled chart");
    edit.input("Revenue ");
    assert_eq!(
        edit.key(TitleKey::Enter),
        TitleCommit::Changed {
            node_id: node.id().to_string(),
            title: "Revenue".to_string()
        }
    );

    let mut edit = TitleEdit::begin(&node).unwrap();
    edit.input("Something else");
    assert_eq!(edit.key(TitleKey::Escape), TitleCommit::Cancelled);

    let edit = TitleEdit::begin(&node).unwrap();
    assert_eq!(edit.blur(), TitleCommit::Unchanged);

    let text = Node::element(ElementKind::Text, Position::new(0.0, 0.0));
    assert!(TitleEdit::begin(&text).is_none());
    println!("✓ Title edits commit on Enter/blur and cancel on Escape");
}

#[test]
fn test_monotone_curve_does_not_overshoot() {
    let points = [(0.0, 10.0), (10.0, 20.0), (20.0, 20.0), (30.0, 0.0)];
    let curve = interpolate(&points, Curve::Monotone);
    assert_eq!(curve.first(), Some(&(0.0, 10.0)));
    assert_eq!(curve.last(), Some(&(30.0, 0.0)));
    for (_, y) in &curve {
        assert!(*y >= -1e-9 && *y <= 20.0 + 1e-9, "overshoot at y={}", y);
    }

    let steps = interpolate(&[(0.0, 0.0), (1.0, 1.0)], Curve::Step);
    assert_eq!(steps, vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
    println!("✓ Curves interpolate without overshoot");
}

#[test]
fn test_squarify_tiles_the_area() {
    let area = Rect::new(0.0, 0.0, 600.0, 400.0);
    let rects = squarify(&[6.0, 6.0, 4.0, 3.0, 2.0, 2.0, 1.0], area);
    assert_eq!(rects.len(), 7);
    let total: f64 = rects.iter().map(|r| r.w * r.h).sum();
    assert!((total - 240_000.0).abs() < 1e-6, "tiles cover the area, got {}", total);
    for r in &rects {
        assert!(r.x >= -1e-9 && r.right() <= 600.0 + 1e-9);
        assert!(r.y >= -1e-9 && r.bottom() <= 400.0 + 1e-9);
    }
    println!("✓ Treemap tiles cover the plot exactly");
}

#[test]
fn test_field_lookup_helpers() {
    let record: Record = serde_json::from_value(json!({ "a": 1.5, "b": " 2 ", "c": true })).unwrap();
    assert_eq!(chart::number(&record, Some("a")), Some(1.5));
    assert_eq!(chart::number(&record, Some("b")), Some(2.0));
    assert_eq!(chart::number(&record, Some("c")), None);
    assert_eq!(chart::number(&record, Some("")), None);
    assert_eq!(chart::number(&record, None), None);
    assert_eq!(chart::text(&record, Some("c")).as_deref(), Some("true"));
    assert_eq!(chart::format_number(2.50), "2.5");
    println!("✓ Field selectors read numbers and labels leniently");
}
