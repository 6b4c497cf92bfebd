//! Mind maps: data model, starting templates, stored edits and drafts
//! produced by the assistant.

pub mod generate;
mod model;
mod service;
mod templates;

pub use model::{
    DEFAULT_NODE_HEIGHT, DEFAULT_NODE_WIDTH, EdgeKind, EdgeStyle, LayoutAlgorithm, MapLayout,
    MapViewport, MindEdge, MindMap, MindNode, NodeKind, NodeShape, NodeStyle,
};
pub use service::NodeDraft;
pub use templates::MapTemplate;
