use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// One row of chart data. Field names are arbitrary and chosen by whoever built the chart.
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Position { x, y }
    }
}

/// Camera over the infinite canvas. Only a presentation hint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Viewport {
    /// Replaces NaN or infinite offsets with 0 and an unusable zoom with 1.
    pub fn sanitized(self) -> Self {
        let offset = |v: f64| if v.is_finite() { v } else { 0.0 };
        Viewport {
            x: offset(self.x),
            y: offset(self.y),
            zoom: if self.zoom.is_finite() && self.zoom > 0.0 {
                self.zoom
            } else {
                1.0
            },
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

/// The eleven chart renderings a chart node can ask for.
///
/// Kinds this crate does not know are kept as [`ChartKind::Unknown`] with the raw string,
/// so a document written by a newer client survives a load/save cycle untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChartKind {
    Line,
    Bar,
    Pie,
    Area,
    Composed,
    Radar,
    RadialBar,
    Scatter,
    Funnel,
    Treemap,
    Sankey,
    Unknown(String),
}

impl ChartKind {
    pub const ALL: [ChartKind; 11] = [
        ChartKind::Line,
        ChartKind::Bar,
        ChartKind::Pie,
        ChartKind::Area,
        ChartKind::Composed,
        ChartKind::Radar,
        ChartKind::RadialBar,
        ChartKind::Scatter,
        ChartKind::Funnel,
        ChartKind::Treemap,
        ChartKind::Sankey,
    ];

    pub fn from_name(name: &str) -> Self {
        match name {
            "line" => ChartKind::Line,
            "bar" => ChartKind::Bar,
            "pie" => ChartKind::Pie,
            "area" => ChartKind::Area,
            "composed" => ChartKind::Composed,
            "radar" => ChartKind::Radar,
            "radialBar" => ChartKind::RadialBar,
            "scatter" => ChartKind::Scatter,
            "funnel" => ChartKind::Funnel,
            "treemap" => ChartKind::Treemap,
            "sankey" => ChartKind::Sankey,
            other => ChartKind::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ChartKind::Line => "line",
            ChartKind::Bar => "bar",
            ChartKind::Pie => "pie",
            ChartKind::Area => "area",
            ChartKind::Composed => "composed",
            ChartKind::Radar => "radar",
            ChartKind::RadialBar => "radialBar",
            ChartKind::Scatter => "scatter",
            ChartKind::Funnel => "funnel",
            ChartKind::Treemap => "treemap",
            ChartKind::Sankey => "sankey",
            ChartKind::Unknown(raw) => raw,
        }
    }

    fn is_unset(&self) -> bool {
        matches!(self, ChartKind::Unknown(raw) if raw.is_empty())
    }
}

impl Default for ChartKind {
    fn default() -> Self {
        ChartKind::Unknown(String::new())
    }
}

impl From<String> for ChartKind {
    fn from(name: String) -> Self {
        ChartKind::from_name(&name)
    }
}

impl From<ChartKind> for String {
    fn from(kind: ChartKind) -> Self {
        kind.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ElementKind {
    Text,
    Title,
    SectionHeader,
    HorizontalDivider,
    VerticalDivider,
    Unknown(String),
}

impl ElementKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "text" => ElementKind::Text,
            "title" => ElementKind::Title,
            "sectionHeader" => ElementKind::SectionHeader,
            "horizontalDivider" => ElementKind::HorizontalDivider,
            "verticalDivider" => ElementKind::VerticalDivider,
            other => ElementKind::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ElementKind::Text => "text",
            ElementKind::Title => "title",
            ElementKind::SectionHeader => "sectionHeader",
            ElementKind::HorizontalDivider => "horizontalDivider",
            ElementKind::VerticalDivider => "verticalDivider",
            ElementKind::Unknown(raw) => raw,
        }
    }

    pub fn is_divider(&self) -> bool {
        matches!(
            self,
            ElementKind::HorizontalDivider | ElementKind::VerticalDivider
        )
    }

    fn is_unset(&self) -> bool {
        matches!(self, ElementKind::Unknown(raw) if raw.is_empty())
    }
}

impl Default for ElementKind {
    fn default() -> Self {
        ElementKind::Unknown(String::new())
    }
}

impl From<String> for ElementKind {
    fn from(name: String) -> Self {
        ElementKind::from_name(&name)
    }
}

impl From<ElementKind> for String {
    fn from(kind: ElementKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Rendering flags of a chart node. Every flag is optional; the per-kind defaults live in
/// [`crate::style`]. Keys this struct does not model are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_grid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_legend: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_tooltip: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_dots: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bar_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outer_radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_angle: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChartStyle {
    pub fn is_empty(&self) -> bool {
        *self == ChartStyle::default()
    }
}

/// Payload of a `type: "chart"` node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    #[serde(default, skip_serializing_if = "ChartKind::is_unset")]
    pub kind: ChartKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub data: Vec<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_key: Option<String>,
    #[serde(default, skip_serializing_if = "ChartStyle::is_empty")]
    pub style: ChartStyle,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChartData {
    pub fn new(kind: ChartKind) -> Self {
        ChartData {
            kind,
            title: Some("Untitled chart".to_string()),
            x_key: Some("x".to_string()),
            y_key: Some("y".to_string()),
            ..ChartData::default()
        }
    }
}

/// Payload of a `type: "element"` node: text blocks and divider lines.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementData {
    #[serde(default, skip_serializing_if = "ElementKind::is_unset")]
    pub kind: ElementKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thickness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub divider_color: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ElementData {
    pub fn new(kind: ElementKind) -> Self {
        let text = match kind {
            ElementKind::Text => Some("Double-click to edit".to_string()),
            ElementKind::Title => Some("Title".to_string()),
            ElementKind::SectionHeader => Some("Section".to_string()),
            _ => None,
        };
        ElementData {
            kind,
            text,
            ..ElementData::default()
        }
    }
}

/// Node payload, discriminated by the node's `type` field.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Chart(ChartData),
    Element(ElementData),
    /// A node type this crate does not render. Kept verbatim.
    Other { node_type: String, data: Value },
}

impl NodeData {
    pub fn type_name(&self) -> &str {
        match self {
            NodeData::Chart(_) => "chart",
            NodeData::Element(_) => "element",
            NodeData::Other { node_type, .. } => node_type,
        }
    }
}

/// A positioned unit on the canvas.
///
/// The id is fixed at construction; everything else may be edited through
/// [`crate::document::GraphDocument`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNode", into = "RawNode")]
pub struct Node {
    id: String,
    pub position: Position,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub data: NodeData,
    pub extra: Map<String, Value>,
}

impl Node {
    pub fn new(id: impl Into<String>, position: Position, data: NodeData) -> Self {
        Node {
            id: id.into(),
            position,
            width: None,
            height: None,
            data,
            extra: Map::new(),
        }
    }

    pub fn chart(kind: ChartKind, position: Position) -> Self {
        Node::new(
            Uuid::new_v4().to_string(),
            position,
            NodeData::Chart(ChartData::new(kind)),
        )
    }

    pub fn element(kind: ElementKind, position: Position) -> Self {
        Node::new(
            Uuid::new_v4().to_string(),
            position,
            NodeData::Element(ElementData::new(kind)),
        )
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// False when any coordinate, size or numeric style value is NaN or infinite.
    /// JSON has no spelling for those, so such a node could not be saved.
    pub fn is_finite(&self) -> bool {
        let numbers: Vec<Option<f64>> = match &self.data {
            NodeData::Chart(chart) => {
                let s = &chart.style;
                vec![
                    s.stroke_width,
                    s.fill_opacity,
                    s.bar_size,
                    s.inner_radius,
                    s.outer_radius,
                    s.start_angle,
                    s.end_angle,
                ]
            }
            NodeData::Element(element) => vec![element.font_size, element.thickness],
            NodeData::Other { .. } => Vec::new(),
        };
        self.position.x.is_finite()
            && self.position.y.is_finite()
            && [self.width, self.height]
                .into_iter()
                .chain(numbers)
                .flatten()
                .all(f64::is_finite)
    }

    /// Width and height on the canvas, falling back to the default footprint of the node kind.
    pub fn size(&self) -> (f64, f64) {
        let (w, h) = default_size(&self.data);
        (self.width.unwrap_or(w), self.height.unwrap_or(h))
    }

    pub fn as_chart(&self) -> Option<&ChartData> {
        match &self.data {
            NodeData::Chart(chart) => Some(chart),
            _ => None,
        }
    }

    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }
}

fn default_size(data: &NodeData) -> (f64, f64) {
    match data {
        NodeData::Chart(_) => (480.0, 320.0),
        NodeData::Element(element) => match element.kind {
            ElementKind::Title => (400.0, 60.0),
            ElementKind::SectionHeader => (320.0, 48.0),
            ElementKind::HorizontalDivider => (400.0, element.thickness.unwrap_or(2.0).max(8.0)),
            ElementKind::VerticalDivider => (element.thickness.unwrap_or(2.0).max(8.0), 300.0),
            ElementKind::Text | ElementKind::Unknown(_) => (240.0, 40.0),
        },
        NodeData::Other { .. } => (200.0, 100.0),
    }
}

/// Wire form of a node: the payload is decoded according to `type`.
#[derive(Serialize, Deserialize)]
struct RawNode {
    id: String,
    #[serde(rename = "type")]
    node_type: String,
    #[serde(default)]
    position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    height: Option<f64>,
    #[serde(default)]
    data: Value,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl TryFrom<RawNode> for Node {
    type Error = serde_json::Error;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        let data = match raw.node_type.as_str() {
            "chart" => NodeData::Chart(serde_json::from_value(object_or_empty(raw.data))?),
            "element" => NodeData::Element(serde_json::from_value(object_or_empty(raw.data))?),
            _ => NodeData::Other {
                node_type: raw.node_type,
                data: raw.data,
            },
        };
        Ok(Node {
            id: raw.id,
            position: raw.position,
            width: raw.width,
            height: raw.height,
            data,
            extra: raw.extra,
        })
    }
}

impl From<Node> for RawNode {
    fn from(node: Node) -> Self {
        let node_type = node.data.type_name().to_string();
        let data = match node.data {
            NodeData::Chart(chart) => serde_json::to_value(chart).unwrap_or(Value::Null),
            NodeData::Element(element) => serde_json::to_value(element).unwrap_or(Value::Null),
            NodeData::Other { data, .. } => data,
        };
        RawNode {
            id: node.id,
            node_type,
            position: node.position,
            width: node.width,
            height: node.height,
            data,
            extra: node.extra,
        }
    }
}

fn object_or_empty(value: Value) -> Value {
    match value {
        Value::Null => Value::Object(Map::new()),
        other => other,
    }
}

/// A directed connection between two nodes.
///
/// Endpoints are checked when the edge is added to a document. Deleting a node later does
/// not remove its edges; readers must skip edges whose endpoint is gone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Edge::with_id(Uuid::new_v4().to_string(), source, target)
    }

    pub fn with_id(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Edge {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            label: None,
            extra: Map::new(),
        }
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}
