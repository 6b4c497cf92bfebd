//! Node and edge edits on stored mind maps. Each edit is a full
//! read-modify-write of the map collection.

use crate::error::{LabError, LabResult, ValidationError};
use crate::lab::Repo;
use crate::store::KeyValueStore;

use super::model::{EdgeKind, MindEdge, MindMap, MindNode, NodeKind};
use super::templates::MapTemplate;

/// Fields for a node added through [`Repo::add_node`].
#[derive(Clone, Debug)]
pub struct NodeDraft {
    pub title: String,
    pub kind: NodeKind,
    pub parent_id: Option<String>,
    pub position: Option<(f32, f32)>,
    pub entity_id: Option<String>,
}

impl NodeDraft {
    pub fn new(title: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            title: title.into(),
            kind,
            parent_id: None,
            position: None,
            entity_id: None,
        }
    }

    pub fn under(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

impl<S: KeyValueStore> Repo<'_, MindMap, S> {
    pub fn create_from_template(
        &mut self,
        title: &str,
        template: MapTemplate,
    ) -> LabResult<MindMap> {
        self.create(template.build(title))
    }

    /// Adds a node, linking it to its parent with a hierarchy edge when the
    /// parent exists in the map.
    pub fn add_node(&mut self, map_id: &str, draft: NodeDraft) -> LabResult<MindNode> {
        let (_, node) = self.try_update(map_id, |map| {
            let mut node = MindNode::new(draft.title, draft.kind);
            node.entity_id = draft.entity_id;

            let parent = draft
                .parent_id
                .as_deref()
                .and_then(|id| map.node(id))
                .map(|parent| (parent.id.clone(), parent.x, parent.y));
            let (x, y) = match (draft.position, &parent) {
                (Some(position), _) => position,
                (None, Some((_, px, py))) => (px + map.layout.spacing, *py),
                (None, None) => (0.0, 0.0),
            };
            node.x = x;
            node.y = y;
            node.parent_id = draft.parent_id;

            map.insert_node(node.clone())?;
            if let Some((parent_id, _, _)) = parent {
                map.insert_edge(MindEdge::new(parent_id, node.id.clone(), EdgeKind::Hierarchy))?;
            }
            Ok(node)
        })?;
        Ok(node)
    }

    pub fn update_node<F>(&mut self, map_id: &str, node_id: &str, edit: F) -> LabResult<MindNode>
    where
        F: FnOnce(&mut MindNode),
    {
        let (_, node) = self.try_update(map_id, |map| {
            let node = map
                .node_mut(node_id)
                .ok_or_else(|| missing("node", node_id))?;
            let id = node.id.clone();
            edit(node);
            node.id = id;
            Ok(node.clone())
        })?;
        Ok(node)
    }

    /// Removes the node and every edge touching it. Returns the removed
    /// edges.
    pub fn delete_node(&mut self, map_id: &str, node_id: &str) -> LabResult<Vec<MindEdge>> {
        let (_, edges) = self.try_update(map_id, |map| {
            let (_, edges) = map
                .remove_node(node_id)
                .ok_or_else(|| missing("node", node_id))?;
            Ok(edges)
        })?;
        Ok(edges)
    }

    pub fn add_edge(
        &mut self,
        map_id: &str,
        source: &str,
        target: &str,
        kind: EdgeKind,
    ) -> LabResult<MindEdge> {
        let (_, edge) = self.try_update(map_id, |map| {
            let edge = MindEdge::new(source, target, kind);
            map.insert_edge(edge.clone())?;
            Ok(edge)
        })?;
        Ok(edge)
    }

    pub fn update_edge<F>(&mut self, map_id: &str, edge_id: &str, edit: F) -> LabResult<MindEdge>
    where
        F: FnOnce(&mut MindEdge),
    {
        let (_, edge) = self.try_update(map_id, |map| {
            let edge = map
                .edge_mut(edge_id)
                .ok_or_else(|| missing("edge", edge_id))?;
            let id = edge.id.clone();
            edit(edge);
            edge.id = id;
            Ok(edge.clone())
        })?;
        Ok(edge)
    }

    pub fn delete_edge(&mut self, map_id: &str, edge_id: &str) -> LabResult<MindEdge> {
        let (_, edge) = self.try_update(map_id, |map| {
            map.remove_edge(edge_id)
                .ok_or_else(|| missing("edge", edge_id))
        })?;
        Ok(edge)
    }

    /// Stores positions and camera from an edited copy of the map. Nodes and
    /// edges added or removed elsewhere in the meantime are preserved.
    pub fn save_layout(&mut self, edited: &MindMap) -> LabResult<MindMap> {
        self.update(&edited.id, |map| {
            for node in &mut map.nodes {
                if let Some(moved) = edited.node(&node.id) {
                    node.x = moved.x;
                    node.y = moved.y;
                }
            }
            map.viewport = edited.viewport;
            map.layout = edited.layout;
        })
    }
}

fn missing(field: &'static str, id: &str) -> LabError {
    ValidationError::invalid(field, format!("no {field} with id {id} in this map")).into()
}
