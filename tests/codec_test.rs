use databoard::codec::{self, EMPTY_DOCUMENT};
use databoard::document::GraphDocument;
use databoard::node::{ChartKind, ElementKind, Edge, Node, NodeData, Position, Viewport};
use serde_json::json;

// A canvas as the editor would write it, including fields this crate does not model
const SAMPLE: &str = r##"{
  "nodes": [
    {
      "id": "chart-1",
      "type": "chart",
      "position": { "x": 100, "y": 80 },
      "width": 520,
      "height": 340,
      "data": {
        "kind": "line",
        "title": "Monthly revenue",
        "data": [
          { "month": "Jan", "revenue": 120, "note": "launch" },
          { "month": "Feb", "revenue": "140" }
        ],
        "xKey": "month",
        "yKey": "revenue",
        "style": { "showGrid": false, "stroke": "#ff0000", "shadow": true },
        "sourceFile": "sales.csv"
      },
      "selected": true
    },
    {
      "id": "note-1",
      "type": "element",
      "position": { "x": 0, "y": 0 },
      "data": { "kind": "title", "text": "Q1 report" }
    },
    {
      "id": "sticky-1",
      "type": "sticky",
      "position": { "x": 5, "y": 5 },
      "data": { "color": "yellow" }
    }
  ],
  "edges": [
    { "id": "e1", "source": "note-1", "target": "chart-1", "animated": true }
  ],
  "viewport": { "x": -20, "y": 10, "zoom": 0.75 }
}"##;

#[test]
fn test_round_trip_law() {
    let g = codec::decode(SAMPLE).expect("sample parses");
    let again = codec::decode(&codec::encode(&g)).expect("encoded text parses");
    assert_eq!(g, again, "decode(encode(g)) must equal g");
    println!("✓ Round trip preserves the document");
}

#[test]
fn test_round_trip_after_edits_with_fractional_numbers() {
    let chart = Node::chart(ChartKind::Pie, Position::new(0.1 + 0.2, -1.0 / 3.0));
    let note = Node::element(ElementKind::Text, Position::new(1e-7, 2.5e6)).with_size(212.3, 48.9);
    let (chart_id, note_id) = (chart.id().to_string(), note.id().to_string());
    let mut g = GraphDocument::empty()
        .add_node(chart)
        .and_then(|g| g.add_node(note))
        .and_then(|g| g.move_node(&chart_id, Position::new(719.5882415616331, 719.5882415616331 / 3.0)))
        .and_then(|g| g.resize_node(&note_id, 333.3333333333333, 0.1 + 0.7))
        .and_then(|g| g.connect(Edge::new(&note_id, &chart_id)))
        .and_then(|g| {
            g.update_chart_style(&chart_id, |style| {
                style.fill_opacity = Some(0.1 * 3.0);
                style.inner_radius = Some(100.0 / 7.0);
            })
        })
        .unwrap()
        .set_viewport(Viewport {
            x: -123.456789012345,
            y: 0.1 + 0.2,
            zoom: 2.0 / 3.0,
        });
    assert_eq!(codec::decode(&codec::encode(&g)).unwrap(), g);

    // A dragged node visits many positions whose shortest decimal form has 17 digits.
    let mut x = 0.0_f64;
    for step in 1..=500 {
        x = (x + 137.0 / step as f64 + 0.1).rem_euclid(2000.0) - 1000.0;
        g = g.move_node(&note_id, Position::new(x, x / 3.0)).unwrap();
        let again = codec::decode(&codec::encode(&g)).unwrap();
        assert_eq!(again, g, "position {} did not survive a round trip", x);
    }
    println!("✓ Round trip is exact for documents built by editing");
}

#[test]
fn test_round_trip_keeps_unknown_fields() {
    let g = codec::decode(SAMPLE).unwrap();
    let value: serde_json::Value = serde_json::from_str(&codec::encode(&g)).unwrap();

    assert_eq!(value["nodes"][0]["selected"], json!(true));
    assert_eq!(value["nodes"][0]["data"]["sourceFile"], json!("sales.csv"));
    assert_eq!(value["nodes"][0]["data"]["style"]["shadow"], json!(true));
    assert_eq!(value["nodes"][2]["type"], json!("sticky"));
    assert_eq!(value["nodes"][2]["data"]["color"], json!("yellow"));
    assert_eq!(value["edges"][0]["animated"], json!(true));
    println!("✓ Fields outside the model survive a save");
}

#[test]
fn test_decode_model_fields() {
    let g = codec::decode(SAMPLE).unwrap();
    assert_eq!(g.nodes.len(), 3);
    assert_eq!(g.viewport, Some(Viewport { x: -20.0, y: 10.0, zoom: 0.75 }));

    let chart = g.nodes[0].as_chart().unwrap();
    assert_eq!(chart.kind, ChartKind::Line);
    assert_eq!(chart.x_key.as_deref(), Some("month"));
    assert_eq!(chart.style.show_grid, Some(false));
    assert_eq!(chart.data.len(), 2);

    let element = g.nodes[1].as_element().unwrap();
    assert_eq!(element.kind, ElementKind::Title);

    match &g.nodes[2].data {
        NodeData::Other { node_type, .. } => assert_eq!(node_type, "sticky"),
        other => panic!("expected an unrendered node, got {:?}", other),
    }
    println!("✓ Decoded nodes carry the expected payloads");
}

#[test]
fn test_encode_is_pretty_with_fixed_key_order() {
    let node = Node::new(
        "n1",
        Position::new(1.0, 2.0),
        NodeData::Chart(databoard::node::ChartData::new(ChartKind::Bar)),
    );
    let g = GraphDocument::empty().add_node(node).unwrap();
    let text = codec::encode(&g);

    assert!(text.starts_with("{\n  \"nodes\": ["), "2-space pretty output: {}", text);
    let id = text.find("\"id\"").unwrap();
    let ty = text.find("\"type\"").unwrap();
    let pos = text.find("\"position\"").unwrap();
    let data = text.find("\"data\"").unwrap();
    assert!(id < ty && ty < pos && pos < data, "Node keys in model order");
    assert!(!text.contains("viewport"), "Absent viewport is not written");
    println!("✓ Encoding is stable and readable");
}

#[test]
fn test_missing_arrays_default_to_empty() {
    let g = codec::decode("{}").unwrap();
    assert_eq!(g, GraphDocument::empty());
    let g = codec::decode(EMPTY_DOCUMENT).unwrap();
    assert!(g.nodes.is_empty() && g.edges.is_empty());
    println!("✓ Missing nodes/edges read as empty");
}

#[test]
fn test_malformed_text_reports_position() {
    let err = codec::decode("{\n  \"nodes\": [\n    {,\n  ]\n}").unwrap_err();
    assert_eq!(err.line, 3, "error line: {}", err);
    assert!(err.column > 0);

    let err = codec::decode("  [1, 2]").unwrap_err();
    assert_eq!((err.line, err.column), (1, 3));

    assert!(codec::decode("").is_err());
    assert!(codec::decode(r#"{"nodes": [{"type": "chart"}]}"#).is_err(), "id is required");
    println!("✓ Malformed input is rejected with a location");
}

#[test]
fn test_missing_kind_becomes_unknown() {
    let g = codec::decode(r#"{"nodes":[{"id":"a","type":"chart","position":{"x":0,"y":0},"data":{}}]}"#)
        .unwrap();
    let chart = g.nodes[0].as_chart().unwrap();
    assert_eq!(chart.kind, ChartKind::Unknown(String::new()));

    let again = codec::decode(&codec::encode(&g)).unwrap();
    assert_eq!(g, again);
    println!("✓ A chart without a kind still round-trips");
}

#[test]
fn test_save_and_load_file() -> std::io::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("canvas.json");

    let a = Node::element(ElementKind::Text, Position::new(0.0, 0.0));
    let b = Node::chart(ChartKind::Pie, Position::new(300.0, 0.0));
    let edge = Edge::new(a.id(), b.id()).labelled("explains");
    let g = GraphDocument::empty()
        .add_node(a)
        .and_then(|g| g.add_node(b))
        .and_then(|g| g.connect(edge))
        .unwrap();

    codec::save_document(&g, &path)?;
    let loaded = codec::load_document(&path)?;
    assert_eq!(g, loaded);

    std::fs::write(&path, "not json")?;
    let err = codec::load_document(&path).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    println!("✓ Documents persist to disk");
    Ok(())
}
