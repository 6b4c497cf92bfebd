use serde::{Deserialize, Serialize};

use super::model::{EdgeKind, MindEdge, MindMap, MindNode, NodeKind};

/// Starting layouts offered when creating a map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MapTemplate {
    #[default]
    Blank,
    ProjectPlan,
    ExperimentFlow,
    LiteratureReview,
}

impl MapTemplate {
    pub const ALL: [MapTemplate; 4] = [
        Self::Blank,
        Self::ProjectPlan,
        Self::ExperimentFlow,
        Self::LiteratureReview,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Blank => "Blank",
            Self::ProjectPlan => "Project plan",
            Self::ExperimentFlow => "Experiment flow",
            Self::LiteratureReview => "Literature review",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|template| {
            template.label().eq_ignore_ascii_case(name)
                || serde_json::to_value(template)
                    .ok()
                    .and_then(|value| value.as_str().map(|key| key == name))
                    .unwrap_or(false)
        })
    }

    /// Builds an unsaved map. The root node carries the map title.
    pub fn build(self, title: &str) -> MindMap {
        let mut map = MindMap::new(title);
        match self {
            Self::Blank => {
                map.nodes.push(MindNode::new(title, NodeKind::Topic));
            }
            Self::ProjectPlan => {
                radial(
                    &mut map,
                    title,
                    &[
                        ("Goals", NodeKind::Idea),
                        ("Milestones", NodeKind::Task),
                        ("Resources", NodeKind::Sample),
                        ("Risks", NodeKind::Note),
                    ],
                );
            }
            Self::ExperimentFlow => {
                chain(
                    &mut map,
                    title,
                    &[
                        ("Hypothesis", NodeKind::Idea),
                        ("Materials", NodeKind::Sample),
                        ("Procedure", NodeKind::Sop),
                        ("Observations", NodeKind::Record),
                        ("Conclusion", NodeKind::Note),
                    ],
                );
            }
            Self::LiteratureReview => {
                radial(
                    &mut map,
                    title,
                    &[
                        ("Key papers", NodeKind::Note),
                        ("Methods", NodeKind::Sop),
                        ("Findings", NodeKind::Record),
                        ("Open questions", NodeKind::Idea),
                    ],
                );
            }
        }
        map
    }
}

fn radial(map: &mut MindMap, title: &str, branches: &[(&str, NodeKind)]) {
    let root = MindNode::new(title, NodeKind::Topic);
    let root_id = root.id.clone();
    map.nodes.push(root);

    let spacing = map.layout.spacing;
    for (index, (label, kind)) in branches.iter().enumerate() {
        let angle = index as f32 / branches.len() as f32 * std::f32::consts::TAU;
        let node = MindNode::new(*label, *kind)
            .at(angle.cos() * spacing, angle.sin() * spacing)
            .with_parent(root_id.clone());
        map.edges
            .push(MindEdge::new(root_id.clone(), node.id.clone(), EdgeKind::Hierarchy));
        map.nodes.push(node);
    }
}

fn chain(map: &mut MindMap, title: &str, steps: &[(&str, NodeKind)]) {
    let root = MindNode::new(title, NodeKind::Topic);
    let mut previous = root.id.clone();
    let root_id = root.id.clone();
    map.nodes.push(root);

    let spacing = map.layout.spacing;
    for (index, (label, kind)) in steps.iter().enumerate() {
        let node = MindNode::new(*label, *kind)
            .at((index as f32 + 1.0) * spacing, 0.0)
            .with_parent(root_id.clone());
        let edge_kind = if index == 0 {
            EdgeKind::Hierarchy
        } else {
            EdgeKind::Flow
        };
        map.edges
            .push(MindEdge::new(previous.clone(), node.id.clone(), edge_kind));
        previous = node.id.clone();
        map.nodes.push(node);
    }
}
