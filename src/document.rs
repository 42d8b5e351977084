use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::node::{ChartData, ChartStyle, Edge, ElementData, Node, NodeData, Position, Viewport};

/// Axis-aligned rectangle in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn union(self, other: Bounds) -> Bounds {
        Bounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn padded(self, padding: f64) -> Bounds {
        Bounds {
            min_x: self.min_x - padding,
            min_y: self.min_y - padding,
            max_x: self.max_x + padding,
            max_y: self.max_y + padding,
        }
    }
}

/// The serialisable content of one canvas: nodes, edges and an optional camera hint.
///
/// Mutations never edit in place. Each one returns a fresh document (or an error), so the
/// previous value stays valid as an undo point and as the "last good" model of the
/// synchroniser.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
}

impl GraphDocument {
    pub fn empty() -> Self {
        GraphDocument::default()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id() == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn add_node(&self, node: Node) -> Result<Self, GraphError> {
        if self.contains_node(node.id()) {
            return Err(GraphError::DuplicateNode(node.id().to_string()));
        }
        if !node.is_finite() {
            return Err(GraphError::NonFinite(node.id().to_string()));
        }
        let mut next = self.clone();
        next.nodes.push(node);
        Ok(next)
    }

    pub fn move_node(&self, id: &str, position: Position) -> Result<Self, GraphError> {
        self.map_node(id, |node| {
            node.position = position;
            Ok(())
        })
    }

    pub fn resize_node(&self, id: &str, width: f64, height: f64) -> Result<Self, GraphError> {
        self.map_node(id, |node| {
            if !(width.is_finite() && height.is_finite()) {
                return Err(GraphError::NonFinite(node.id().to_string()));
            }
            node.width = Some(width.max(1.0));
            node.height = Some(height.max(1.0));
            Ok(())
        })
    }

    /// Removes the node only. Edges touching it stay in the document.
    pub fn delete_node(&self, id: &str) -> Result<Self, GraphError> {
        if !self.contains_node(id) {
            return Err(GraphError::UnknownNode(id.to_string()));
        }
        let mut next = self.clone();
        next.nodes.retain(|n| n.id() != id);
        Ok(next)
    }

    pub fn connect(&self, edge: Edge) -> Result<Self, GraphError> {
        if self.edge(edge.id()).is_some() {
            return Err(GraphError::DuplicateEdge(edge.id().to_string()));
        }
        for endpoint in [&edge.source, &edge.target] {
            if !self.contains_node(endpoint) {
                return Err(GraphError::MissingEndpoint {
                    edge_id: edge.id().to_string(),
                    node_id: endpoint.clone(),
                });
            }
        }
        let mut next = self.clone();
        next.edges.push(edge);
        Ok(next)
    }

    pub fn disconnect(&self, edge_id: &str) -> Result<Self, GraphError> {
        if self.edge(edge_id).is_none() {
            return Err(GraphError::UnknownEdge(edge_id.to_string()));
        }
        let mut next = self.clone();
        next.edges.retain(|e| e.id() != edge_id);
        Ok(next)
    }

    pub fn update_chart(
        &self,
        id: &str,
        f: impl FnOnce(&mut ChartData),
    ) -> Result<Self, GraphError> {
        self.map_node(id, |node| match &mut node.data {
            NodeData::Chart(chart) => {
                f(chart);
                Ok(())
            }
            _ => Err(GraphError::NotAChart(id.to_string())),
        })
    }

    pub fn update_chart_style(
        &self,
        id: &str,
        f: impl FnOnce(&mut ChartStyle),
    ) -> Result<Self, GraphError> {
        self.update_chart(id, |chart| f(&mut chart.style))
    }

    pub fn set_chart_title(&self, id: &str, title: impl Into<String>) -> Result<Self, GraphError> {
        let title = title.into();
        self.update_chart(id, |chart| chart.title = Some(title))
    }

    pub fn update_element(
        &self,
        id: &str,
        f: impl FnOnce(&mut ElementData),
    ) -> Result<Self, GraphError> {
        self.map_node(id, |node| match &mut node.data {
            NodeData::Element(element) => {
                f(element);
                Ok(())
            }
            _ => Err(GraphError::NotAnElement(id.to_string())),
        })
    }

    pub fn set_element_text(&self, id: &str, text: impl Into<String>) -> Result<Self, GraphError> {
        let text = text.into();
        self.update_element(id, |element| element.text = Some(text))
    }

    /// Stores the camera hint. Non-finite values are replaced, see [`Viewport::sanitized`].
    pub fn set_viewport(&self, viewport: Viewport) -> Self {
        let mut next = self.clone();
        next.viewport = Some(viewport.sanitized());
        next
    }

    /// Edges whose two endpoints are present. Dangling edges are silently skipped.
    pub fn drawable_edges(&self) -> impl Iterator<Item = (&Edge, &Node, &Node)> {
        self.edges.iter().filter_map(|edge| {
            let source = self.node(&edge.source)?;
            let target = self.node(&edge.target)?;
            Some((edge, source, target))
        })
    }

    /// Union of all node rectangles, or `None` for an empty canvas.
    pub fn bounds(&self) -> Option<Bounds> {
        self.nodes
            .iter()
            .map(node_bounds)
            .reduce(|acc, b| acc.union(b))
    }

    fn map_node(
        &self,
        id: &str,
        f: impl FnOnce(&mut Node) -> Result<(), GraphError>,
    ) -> Result<Self, GraphError> {
        let mut next = self.clone();
        let node = next
            .nodes
            .iter_mut()
            .find(|n| n.id() == id)
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))?;
        f(node)?;
        if !node.is_finite() {
            return Err(GraphError::NonFinite(id.to_string()));
        }
        Ok(next)
    }
}

pub fn node_bounds(node: &Node) -> Bounds {
    let (w, h) = node.size();
    Bounds {
        min_x: node.position.x,
        min_y: node.position.y,
        max_x: node.position.x + w,
        max_y: node.position.y + h,
    }
}
