use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::model::{collection_entity, require_text};
use crate::util::new_id;

pub const DEFAULT_NODE_WIDTH: f32 = 140.0;
pub const DEFAULT_NODE_HEIGHT: f32 = 44.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Topic,
    Record,
    Note,
    Sop,
    Sample,
    #[default]
    Idea,
    Task,
    Custom,
}

impl NodeKind {
    pub const ALL: [NodeKind; 8] = [
        Self::Topic,
        Self::Record,
        Self::Note,
        Self::Sop,
        Self::Sample,
        Self::Idea,
        Self::Task,
        Self::Custom,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Topic => "topic",
            Self::Record => "record",
            Self::Note => "note",
            Self::Sop => "sop",
            Self::Sample => "sample",
            Self::Idea => "idea",
            Self::Task => "task",
            Self::Custom => "custom",
        }
    }

    pub fn default_style(self) -> NodeStyle {
        let (shape, color) = match self {
            Self::Topic => (NodeShape::Ellipse, "#e0a53b"),
            Self::Record => (NodeShape::Rounded, "#4f8ef7"),
            Self::Note => (NodeShape::Rounded, "#58b368"),
            Self::Sop => (NodeShape::Rectangle, "#9b6ad6"),
            Self::Sample => (NodeShape::Diamond, "#e06a6a"),
            Self::Idea => (NodeShape::Ellipse, "#46b7c6"),
            Self::Task => (NodeShape::Rectangle, "#c7c7c7"),
            Self::Custom => (NodeShape::Rounded, "#8a94a6"),
        };
        NodeStyle {
            shape,
            color: color.to_owned(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeShape {
    Rectangle,
    #[default]
    Rounded,
    Ellipse,
    Diamond,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeStyle {
    pub shape: NodeShape,
    /// `#rrggbb`
    pub color: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MindNode {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub kind: NodeKind,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default = "default_width")]
    pub width: f32,
    #[serde(default = "default_height")]
    pub height: f32,
    pub style: NodeStyle,
    /// Hierarchy hint; may point at a removed node or form a cycle.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Lab entity this node stands for.
    #[serde(default)]
    pub entity_id: Option<String>,
}

fn default_width() -> f32 {
    DEFAULT_NODE_WIDTH
}

fn default_height() -> f32 {
    DEFAULT_NODE_HEIGHT
}

impl MindNode {
    pub fn new(title: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: new_id(),
            title: title.into(),
            kind,
            x: 0.0,
            y: 0.0,
            width: DEFAULT_NODE_WIDTH,
            height: DEFAULT_NODE_HEIGHT,
            style: kind.default_style(),
            parent_id: None,
            entity_id: None,
        }
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    #[default]
    Hierarchy,
    Flow,
    Relation,
}

impl EdgeKind {
    pub fn default_style(self) -> EdgeStyle {
        match self {
            Self::Hierarchy => EdgeStyle {
                color: "#7a8599".to_owned(),
                width: 2.0,
                dash: None,
                arrow: false,
            },
            Self::Flow => EdgeStyle {
                color: "#4f8ef7".to_owned(),
                width: 2.0,
                dash: None,
                arrow: true,
            },
            Self::Relation => EdgeStyle {
                color: "#b0b7c3".to_owned(),
                width: 1.5,
                dash: Some((6.0, 4.0)),
                arrow: false,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeStyle {
    pub color: String,
    pub width: f32,
    /// Dash and gap length; `None` draws a solid line.
    #[serde(default)]
    pub dash: Option<(f32, f32)>,
    #[serde(default)]
    pub arrow: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MindEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub kind: EdgeKind,
    pub style: EdgeStyle,
}

impl MindEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            id: new_id(),
            source: source.into(),
            target: target.into(),
            kind,
            style: kind.default_style(),
        }
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// Saved camera of a map. `pan` is the screen offset of the world origin
/// from the viewport centre.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapViewport {
    pub zoom: f32,
    pub pan_x: f32,
    pub pan_y: f32,
}

impl Default for MapViewport {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutAlgorithm {
    /// Positions come from the force simulation.
    #[default]
    Force,
    /// Positions only change when the user drags a node.
    Manual,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapLayout {
    pub algorithm: LayoutAlgorithm,
    /// Rest length of links.
    pub spacing: f32,
}

impl Default for MapLayout {
    fn default() -> Self {
        Self {
            algorithm: LayoutAlgorithm::Force,
            spacing: 180.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MindMap {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub nodes: Vec<MindNode>,
    #[serde(default)]
    pub edges: Vec<MindEdge>,
    #[serde(default)]
    pub viewport: MapViewport,
    #[serde(default)]
    pub layout: MapLayout,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MindMap {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            title: title.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            viewport: MapViewport::default(),
            layout: MapLayout::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn node(&self, id: &str) -> Option<&MindNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut MindNode> {
        self.nodes.iter_mut().find(|node| node.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&MindEdge> {
        self.edges.iter().find(|edge| edge.id == id)
    }

    pub fn edge_mut(&mut self, id: &str) -> Option<&mut MindEdge> {
        self.edges.iter_mut().find(|edge| edge.id == id)
    }

    pub fn insert_node(&mut self, node: MindNode) -> Result<(), ValidationError> {
        require_text("node.title", &node.title)?;
        if self.node(&node.id).is_some() {
            return Err(ValidationError::invalid(
                "node.id",
                format!("duplicate node id {}", node.id),
            ));
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Edges may reference missing nodes; they are kept but never drawn.
    pub fn insert_edge(&mut self, edge: MindEdge) -> Result<(), ValidationError> {
        if self.edge(&edge.id).is_some() {
            return Err(ValidationError::invalid(
                "edge.id",
                format!("duplicate edge id {}", edge.id),
            ));
        }
        self.edges.push(edge);
        Ok(())
    }

    /// Removes the node and every edge touching it. Other nodes keep their
    /// parent hints even if they pointed at the removed node.
    pub fn remove_node(&mut self, id: &str) -> Option<(MindNode, Vec<MindEdge>)> {
        let index = self.nodes.iter().position(|node| node.id == id)?;
        let node = self.nodes.remove(index);

        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.edges.len());
        for edge in self.edges.drain(..) {
            if edge.touches(id) {
                removed.push(edge);
            } else {
                kept.push(edge);
            }
        }
        self.edges = kept;
        Some((node, removed))
    }

    pub fn remove_edge(&mut self, id: &str) -> Option<MindEdge> {
        let index = self.edges.iter().position(|edge| edge.id == id)?;
        Some(self.edges.remove(index))
    }

    pub fn is_dangling(&self, edge: &MindEdge) -> bool {
        self.node(&edge.source).is_none() || self.node(&edge.target).is_none()
    }

    pub fn dangling_edges(&self) -> impl Iterator<Item = &MindEdge> {
        self.edges.iter().filter(|edge| self.is_dangling(edge))
    }

    pub fn children_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a MindNode> + 'a {
        self.nodes
            .iter()
            .filter(move |node| node.parent_id.as_deref() == Some(id))
    }

    fn check(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)?;
        if !self.viewport.zoom.is_finite() || self.viewport.zoom <= 0.0 {
            return Err(ValidationError::invalid("viewport.zoom", "must be a positive number"));
        }
        if !self.viewport.pan_x.is_finite() || !self.viewport.pan_y.is_finite() {
            return Err(ValidationError::invalid("viewport.pan", "must be finite"));
        }
        if !self.layout.spacing.is_finite() || self.layout.spacing <= 0.0 {
            return Err(ValidationError::invalid("layout.spacing", "must be a positive number"));
        }

        let mut node_ids = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            require_text("node.title", &node.title)?;
            if !node.x.is_finite() || !node.y.is_finite() {
                return Err(ValidationError::invalid(
                    "node.position",
                    format!("node {} has a non-finite position", node.id),
                ));
            }
            if !positive(node.width) || !positive(node.height) {
                return Err(ValidationError::invalid(
                    "node.size",
                    format!("node {} needs a positive width and height", node.id),
                ));
            }
            if !node_ids.insert(node.id.as_str()) {
                return Err(ValidationError::invalid(
                    "node.id",
                    format!("duplicate node id {}", node.id),
                ));
            }
        }

        let mut edge_ids = HashSet::with_capacity(self.edges.len());
        for edge in &self.edges {
            let dash_ok = edge
                .style
                .dash
                .is_none_or(|(dash, gap)| dash.is_finite() && gap.is_finite());
            if !edge.style.width.is_finite() || edge.style.width < 0.0 || !dash_ok {
                return Err(ValidationError::invalid(
                    "edge.style",
                    format!("edge {} has a non-finite width or dash", edge.id),
                ));
            }
            if !edge_ids.insert(edge.id.as_str()) {
                return Err(ValidationError::invalid(
                    "edge.id",
                    format!("duplicate edge id {}", edge.id),
                ));
            }
        }
        Ok(())
    }
}

fn positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

collection_entity!(MindMap, MindMaps, title);
