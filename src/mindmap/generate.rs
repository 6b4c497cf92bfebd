//! Mind maps drafted by the assistant.
//!
//! The model must answer with one JSON document of this exact shape:
//!
//! ```text
//! {"title": "...",
//!  "nodes": [{"id": "n1", "title": "...", "kind": "idea", "parent": null}],
//!  "edges": [{"source": "n1", "target": "n2", "kind": "relation"}]}
//! ```
//!
//! A single fenced code block around it is accepted. Anything else is
//! rejected; the request is repeated once with the parser error attached.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use tracing::{debug, warn};

use super::model::{EdgeKind, MindEdge, MindMap, MindNode, NodeKind};
use crate::assistant::{Assistant, RequestMessage};
use crate::error::AssistantError;
use crate::model::Role;
use crate::util::{new_id, stable_pair};

const INSTRUCTIONS: &str = "Draft a mind map for a laboratory notebook. Reply with JSON only, \
matching exactly: {\"title\": string, \"nodes\": [{\"id\": string, \"title\": string, \
\"kind\": one of topic|record|note|sop|sample|idea|task|custom, \"parent\": node id or null}], \
\"edges\": [{\"source\": node id, \"target\": node id, \"kind\": one of \
hierarchy|flow|relation}]}. No other fields.";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DraftMap {
    title: String,
    nodes: Vec<DraftNode>,
    #[serde(default)]
    edges: Vec<DraftEdge>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DraftNode {
    id: String,
    title: String,
    #[serde(default)]
    kind: NodeKind,
    #[serde(default)]
    parent: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DraftEdge {
    source: String,
    target: String,
    #[serde(default)]
    kind: EdgeKind,
}

/// Body of the only fenced block in `raw`, or `raw` itself.
fn unfence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body_start) = rest.find('\n') else {
        return trimmed;
    };
    let body = &rest[body_start + 1..];
    match body.rfind("```") {
        Some(end) if body[end + 3..].trim().is_empty() => body[..end].trim(),
        _ => trimmed,
    }
}

/// Parses a model answer into an unsaved map with fresh node ids.
pub fn parse_draft(raw: &str) -> Result<MindMap, AssistantError> {
    let draft: DraftMap = serde_json::from_str(unfence(raw))
        .map_err(|error| AssistantError::Schema(error.to_string()))?;
    if draft.title.trim().is_empty() {
        return Err(AssistantError::Schema("title is empty".to_owned()));
    }
    if draft.nodes.is_empty() {
        return Err(AssistantError::Schema("nodes is empty".to_owned()));
    }

    let mut ids = HashMap::with_capacity(draft.nodes.len());
    for node in &draft.nodes {
        if node.title.trim().is_empty() {
            return Err(AssistantError::Schema(format!("node {} has no title", node.id)));
        }
        if ids.insert(node.id.as_str(), new_id()).is_some() {
            return Err(AssistantError::Schema(format!("duplicate node id {}", node.id)));
        }
    }
    let resolve = |id: &str| {
        ids.get(id)
            .cloned()
            .ok_or_else(|| AssistantError::Schema(format!("unknown node id {id}")))
    };

    let mut map = MindMap::new(draft.title.trim());
    let mut linked = HashSet::new();
    for node in &draft.nodes {
        let mut built = MindNode::new(node.title.trim(), node.kind);
        built.id = resolve(&node.id)?;
        if let Some(parent) = node.parent.as_deref() {
            let parent = resolve(parent)?;
            linked.insert((parent.clone(), built.id.clone()));
            map.edges
                .push(MindEdge::new(parent.clone(), built.id.clone(), EdgeKind::Hierarchy));
            built.parent_id = Some(parent);
        }
        let (x, y) = stable_pair(&built.id);
        built.x = x * map.layout.spacing;
        built.y = y * map.layout.spacing;
        map.nodes.push(built);
    }
    for edge in &draft.edges {
        let source = resolve(&edge.source)?;
        let target = resolve(&edge.target)?;
        if linked.insert((source.clone(), target.clone())) {
            map.edges.push(MindEdge::new(source, target, edge.kind));
        }
    }
    Ok(map)
}

/// Asks the model for a map about `topic`, retrying once on a schema
/// mismatch. Transport failures are returned as-is.
pub fn generate(assistant: &Assistant, topic: &str) -> Result<MindMap, AssistantError> {
    let mut messages = vec![
        RequestMessage::new(Role::System, INSTRUCTIONS),
        RequestMessage::new(Role::User, topic),
    ];

    let answer = assistant.complete(messages.clone())?;
    let error = match parse_draft(&answer) {
        Ok(map) => return Ok(map),
        Err(error) => error,
    };
    warn!(%error, "mind map draft rejected; retrying once");

    messages.push(RequestMessage::new(Role::Assistant, answer));
    messages.push(RequestMessage::new(
        Role::User,
        format!(
            "That reply was rejected: {error}. \
             Answer again with JSON only, exactly in the required shape."
        ),
    ));
    let map = parse_draft(&assistant.complete(messages)?)?;
    debug!(nodes = map.nodes.len(), "mind map drafted on retry");
    Ok(map)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::assistant::{AssistantConfig, ChatRequest, ChatTransport};
    use crate::model::Entity;

    const GOOD: &str = r#"{"title":"PCR","nodes":[
        {"id":"a","title":"PCR","kind":"topic"},
        {"id":"b","title":"Primers","kind":"sample","parent":"a"},
        {"id":"c","title":"Cycling","parent":"a"}],
        "edges":[{"source":"b","target":"c","kind":"flow"},{"source":"a","target":"b"}]}"#;

    #[test]
    fn fenced_block_is_unwrapped() {
        let raw = format!("```json\n{GOOD}\n```");
        let map = parse_draft(&raw).unwrap();
        assert_eq!(map.title, "PCR");
        assert_eq!(map.nodes.len(), 3);
        // two parent links plus one flow; the explicit a->b duplicates a parent link
        assert_eq!(map.edges.len(), 3);
        assert_eq!(map.dangling_edges().count(), 0);
        map.validate().unwrap();
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let raw = r#"{"title":"x","nodes":[{"id":"a","title":"A","colour":"red"}]}"#;
        assert!(matches!(parse_draft(raw), Err(AssistantError::Schema(_))));
    }

    #[test]
    fn unknown_references_are_rejected() {
        let raw = r#"{"title":"x","nodes":[{"id":"a","title":"A","parent":"z"}]}"#;
        let error = parse_draft(raw).unwrap_err();
        assert!(error.to_string().contains("unknown node id z"));
    }

    #[test]
    fn prose_around_json_is_rejected() {
        let raw = format!("Sure! Here it is: {GOOD}");
        assert!(parse_draft(&raw).is_err());
    }

    struct Replies(Mutex<Vec<&'static str>>);

    impl ChatTransport for Replies {
        fn complete(
            &self,
            _config: &AssistantConfig,
            _request: &ChatRequest,
        ) -> Result<String, AssistantError> {
            let mut replies = self.0.lock().unwrap();
            Ok(replies.remove(0).to_owned())
        }
    }

    fn assistant(replies: Vec<&'static str>) -> (Assistant, Arc<Replies>) {
        let transport = Arc::new(Replies(Mutex::new(replies)));
        let config = AssistantConfig {
            endpoint: Some("http://localhost".to_owned()),
            ..AssistantConfig::default()
        };
        (Assistant::new(config, transport.clone()), transport)
    }

    #[test]
    fn one_retry_after_schema_mismatch() {
        let (assistant, transport) = assistant(vec!["not json", GOOD]);
        let map = generate(&assistant, "PCR").unwrap();
        assert_eq!(map.nodes.len(), 3);
        assert!(transport.0.lock().unwrap().is_empty());
    }

    #[test]
    fn second_mismatch_is_an_error() {
        let (assistant, _) = assistant(vec!["not json", "{\"title\":\"x\"}"]);
        assert!(matches!(
            generate(&assistant, "PCR"),
            Err(AssistantError::Schema(_))
        ));
    }
}
