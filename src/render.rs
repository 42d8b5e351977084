//! Render dispatch: turns nodes into backend-neutral drawing primitives.
//!
//! Nothing in this module draws pixels. [`render_node`] picks a strategy from the node's type
//! and kind and lays out primitives inside the rectangle the node was given; the export
//! module paints them with plotters. Rendering never fails: an unknown type or kind becomes a
//! [`Visual::Placeholder`], and field selectors that match nothing produce an empty chart.

use crate::chart;
use crate::document::{GraphDocument, node_bounds};
use crate::node::{ChartKind, ElementData, ElementKind, Node, NodeData};
use crate::style::{ResolvedElementStyle, TextAlign};

pub type Point = (f64, f64);

/// Axis-aligned rectangle in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Rect {
            x,
            y,
            w: w.max(0.0),
            h: h.max(0.0),
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    pub fn center(&self) -> Point {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Shrinks the rectangle by the given margins, never below zero size.
    pub fn inset(&self, top: f64, right: f64, bottom: f64, left: f64) -> Rect {
        Rect::new(
            self.x + left,
            self.y + top,
            self.w - left - right,
            self.h - top - bottom,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Paint {
    pub color: String,
    pub opacity: f64,
}

impl Paint {
    pub fn solid(color: impl Into<String>) -> Self {
        Paint {
            color: color.into(),
            opacity: 1.0,
        }
    }

    pub fn translucent(color: impl Into<String>, opacity: f64) -> Self {
        Paint {
            color: color.into(),
            opacity,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub color: String,
    pub width: f64,
}

impl Stroke {
    pub fn new(color: impl Into<String>, width: f64) -> Self {
        Stroke {
            color: color.into(),
            width,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Start,
    Middle,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Rect {
        rect: Rect,
        fill: Option<Paint>,
        stroke: Option<Stroke>,
    },
    Line {
        from: Point,
        to: Point,
        stroke: Stroke,
    },
    Polyline {
        points: Vec<Point>,
        stroke: Stroke,
    },
    Polygon {
        points: Vec<Point>,
        fill: Paint,
        stroke: Option<Stroke>,
    },
    Circle {
        center: Point,
        radius: f64,
        fill: Paint,
    },
    Label {
        at: Point,
        text: String,
        size: f64,
        weight: u16,
        color: String,
        anchor: Anchor,
    },
}

/// Hover target for a data point. Only produced when tooltips are enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct TooltipTarget {
    pub area: Rect,
    pub text: String,
}

/// Everything a chart strategy produced, grouped by layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartDrawing {
    pub kind: ChartKind,
    pub title: Option<String>,
    pub frame: Rect,
    pub plot: Rect,
    pub grid: Vec<Primitive>,
    pub axes: Vec<Primitive>,
    pub series: Vec<Primitive>,
    pub dots: Vec<Primitive>,
    pub legend: Vec<Primitive>,
    pub tooltips: Vec<TooltipTarget>,
}

impl ChartDrawing {
    pub fn empty(kind: ChartKind, title: Option<String>, frame: Rect, plot: Rect) -> Self {
        ChartDrawing {
            kind,
            title,
            frame,
            plot,
            grid: Vec::new(),
            axes: Vec::new(),
            series: Vec::new(),
            dots: Vec::new(),
            legend: Vec::new(),
            tooltips: Vec::new(),
        }
    }

    /// True when no data point made it onto the chart.
    pub fn is_blank(&self) -> bool {
        self.series.is_empty() && self.dots.is_empty()
    }

    /// All primitives in paint order.
    pub fn primitives(&self) -> impl Iterator<Item = &Primitive> {
        self.grid
            .iter()
            .chain(&self.axes)
            .chain(&self.series)
            .chain(&self.dots)
            .chain(&self.legend)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Visual {
    Chart(ChartDrawing),
    Text {
        lines: Vec<String>,
        style: ResolvedElementStyle,
    },
    Divider {
        from: Point,
        to: Point,
        thickness: f64,
        color: String,
    },
    Placeholder {
        message: String,
    },
}

impl Visual {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Visual::Placeholder { .. })
    }

    /// Flattens the visual into primitives, including the chart title and the text lines.
    pub fn primitives(&self, rect: Rect) -> Vec<Primitive> {
        match self {
            Visual::Chart(drawing) => {
                let mut out = Vec::new();
                if let Some(title) = &drawing.title {
                    out.push(Primitive::Label {
                        at: (rect.x + 12.0, rect.y + 20.0),
                        text: title.clone(),
                        size: 16.0,
                        weight: 600,
                        color: "#111827".to_string(),
                        anchor: Anchor::Start,
                    });
                }
                out.extend(drawing.primitives().cloned());
                out
            }
            Visual::Text { lines, style } => {
                let (x, anchor) = match style.align {
                    TextAlign::Left => (rect.x, Anchor::Start),
                    TextAlign::Center => (rect.x + rect.w / 2.0, Anchor::Middle),
                    TextAlign::Right => (rect.right(), Anchor::End),
                };
                let line_height = style.font_size * 1.3;
                lines
                    .iter()
                    .enumerate()
                    .map(|(i, line)| Primitive::Label {
                        at: (x, rect.y + style.font_size + i as f64 * line_height),
                        text: line.clone(),
                        size: style.font_size,
                        weight: style.font_weight,
                        color: style.color.clone(),
                        anchor,
                    })
                    .collect()
            }
            Visual::Divider {
                from,
                to,
                thickness,
                color,
            } => vec![Primitive::Line {
                from: *from,
                to: *to,
                stroke: Stroke::new(color.clone(), *thickness),
            }],
            Visual::Placeholder { message } => vec![
                Primitive::Rect {
                    rect,
                    fill: Some(Paint::solid("#f9fafb")),
                    stroke: Some(Stroke::new("#9ca3af", 1.0)),
                },
                Primitive::Label {
                    at: rect.center(),
                    text: message.clone(),
                    size: 13.0,
                    weight: 400,
                    color: "#6b7280".to_string(),
                    anchor: Anchor::Middle,
                },
            ],
        }
    }
}

/// Picks the drawing routine for `node` and lays it out inside `rect`.
pub fn render_node(node: &Node, rect: Rect) -> Visual {
    match &node.data {
        NodeData::Chart(data) => match &data.kind {
            ChartKind::Unknown(raw) => Visual::Placeholder {
                message: format!("Unknown chart type: {}", display_kind(raw)),
            },
            _ => Visual::Chart(chart::draw(data, rect)),
        },
        NodeData::Element(element) => render_element(element, rect),
        NodeData::Other { node_type, .. } => Visual::Placeholder {
            message: format!("Unknown node type: {}", display_kind(node_type)),
        },
    }
}

fn display_kind(raw: &str) -> &str {
    if raw.is_empty() { "(none)" } else { raw }
}

fn render_element(element: &ElementData, rect: Rect) -> Visual {
    let style = ResolvedElementStyle::resolve(element);
    match &element.kind {
        ElementKind::Text | ElementKind::Title | ElementKind::SectionHeader => Visual::Text {
            lines: element
                .text
                .as_deref()
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect(),
            style,
        },
        ElementKind::HorizontalDivider => {
            let y = rect.y + rect.h / 2.0;
            Visual::Divider {
                from: (rect.x, y),
                to: (rect.right(), y),
                thickness: style.thickness,
                color: style.divider_color,
            }
        }
        ElementKind::VerticalDivider => {
            let x = rect.x + rect.w / 2.0;
            Visual::Divider {
                from: (x, rect.y),
                to: (x, rect.bottom()),
                thickness: style.thickness,
                color: style.divider_color,
            }
        }
        ElementKind::Unknown(raw) => Visual::Placeholder {
            message: format!("Unknown element type: {}", display_kind(raw)),
        },
    }
}

/// A node placed on the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeVisual {
    pub node_id: String,
    pub rect: Rect,
    pub visual: Visual,
    /// The style toolbar is only offered for the selected chart node.
    pub toolbar: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeVisual {
    pub edge_id: String,
    pub from: Point,
    pub to: Point,
    pub label: Option<String>,
}

/// One render pass over a whole document, in canvas coordinates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scene {
    pub nodes: Vec<NodeVisual>,
    pub edges: Vec<EdgeVisual>,
}

/// Renders every node and every edge whose endpoints both exist.
pub fn plan_scene(document: &GraphDocument, selected: Option<&str>) -> Scene {
    let nodes = document
        .nodes
        .iter()
        .map(|node| {
            let b = node_bounds(node);
            let rect = Rect::new(b.min_x, b.min_y, b.width(), b.height());
            NodeVisual {
                node_id: node.id().to_string(),
                rect,
                visual: render_node(node, rect),
                toolbar: selected == Some(node.id()) && node.as_chart().is_some(),
            }
        })
        .collect();

    let edges = document
        .drawable_edges()
        .map(|(edge, source, target)| {
            let s = node_bounds(source);
            let t = node_bounds(target);
            EdgeVisual {
                edge_id: edge.id().to_string(),
                from: ((s.min_x + s.max_x) / 2.0, (s.min_y + s.max_y) / 2.0),
                to: ((t.min_x + t.max_x) / 2.0, (t.min_y + t.max_y) / 2.0),
                label: edge.label.clone(),
            }
        })
        .collect();

    Scene { nodes, edges }
}

/// In-place title editor shown on a chart header.
///
/// Keystrokes only touch the draft. The edit is committed on Enter or when the field loses
/// focus, and dropped on Escape.
#[derive(Debug, Clone, PartialEq)]
pub struct TitleEdit {
    node_id: String,
    original: String,
    draft: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleKey {
    Enter,
    Escape,
}

/// Result of finishing a title edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleCommit {
    /// The title changed and should be written to the node.
    Changed { node_id: String, title: String },
    Unchanged,
    Cancelled,
}

impl TitleEdit {
    pub fn begin(node: &Node) -> Option<Self> {
        let chart = node.as_chart()?;
        let original = chart.title.clone().unwrap_or_default();
        Some(TitleEdit {
            node_id: node.id().to_string(),
            draft: original.clone(),
            original,
        })
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn input(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn key(self, key: TitleKey) -> TitleCommit {
        match key {
            TitleKey::Enter => self.commit(),
            TitleKey::Escape => TitleCommit::Cancelled,
        }
    }

    pub fn blur(self) -> TitleCommit {
        self.commit()
    }

    fn commit(self) -> TitleCommit {
        let title = self.draft.trim().to_string();
        if title == self.original {
            TitleCommit::Unchanged
        } else {
            TitleCommit::Changed {
                node_id: self.node_id,
                title,
            }
        }
    }
}
