//! Cross-collection references. Broken references are reported, never
//! treated as errors.

use std::collections::HashSet;

use serde::Serialize;

use crate::mindmap::MindMap;
use crate::model::{CalendarEvent, EntityKind, ExperimentRecord, Note, Sample, Sop, Topic};

/// A record a note points at, if it still exists.
#[derive(Clone, Debug, PartialEq)]
pub struct NoteLink {
    pub record_id: String,
    pub record: Option<ExperimentRecord>,
}

impl NoteLink {
    pub fn is_broken(&self) -> bool {
        self.record.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokenReference {
    pub kind: EntityKind,
    pub id: String,
    pub field: &'static str,
    pub missing: String,
}

/// Records filed under `topic_id`, provided that topic still exists.
pub fn records_for_topic(
    topics: &[Topic],
    records: Vec<ExperimentRecord>,
    topic_id: &str,
) -> Vec<ExperimentRecord> {
    if !topics.iter().any(|topic| topic.id == topic_id) {
        return Vec::new();
    }
    records
        .into_iter()
        .filter(|record| record.topic_id.as_deref() == Some(topic_id))
        .collect()
}

pub fn note_links(note: &Note, records: &[ExperimentRecord]) -> Vec<NoteLink> {
    note.record_ids
        .iter()
        .map(|record_id| NoteLink {
            record_id: record_id.clone(),
            record: records.iter().find(|record| &record.id == record_id).cloned(),
        })
        .collect()
}

/// Everything the integrity report looks at.
pub struct LabView<'a> {
    pub topics: &'a [Topic],
    pub records: &'a [ExperimentRecord],
    pub notes: &'a [Note],
    pub sops: &'a [Sop],
    pub samples: &'a [Sample],
    pub calendar: &'a [CalendarEvent],
    pub mind_maps: &'a [MindMap],
}

struct Ids<'a> {
    topics: HashSet<&'a str>,
    records: HashSet<&'a str>,
    notes: HashSet<&'a str>,
    sops: HashSet<&'a str>,
    samples: HashSet<&'a str>,
}

impl Ids<'_> {
    fn knows(&self, id: &str) -> bool {
        self.topics.contains(id)
            || self.records.contains(id)
            || self.notes.contains(id)
            || self.sops.contains(id)
            || self.samples.contains(id)
    }
}

pub fn broken_references(view: &LabView<'_>) -> Vec<BrokenReference> {
    let ids = Ids {
        topics: view.topics.iter().map(|t| t.id.as_str()).collect(),
        records: view.records.iter().map(|r| r.id.as_str()).collect(),
        notes: view.notes.iter().map(|n| n.id.as_str()).collect(),
        sops: view.sops.iter().map(|s| s.id.as_str()).collect(),
        samples: view.samples.iter().map(|s| s.id.as_str()).collect(),
    };

    let mut broken = Vec::new();
    let mut check = |kind, id: &str, field, target: &str, known: bool| {
        if !known {
            broken.push(BrokenReference {
                kind,
                id: id.to_owned(),
                field,
                missing: target.to_owned(),
            });
        }
    };

    for record in view.records {
        if let Some(topic) = record.topic_id.as_deref() {
            check(EntityKind::Records, &record.id, "topicId", topic, ids.topics.contains(topic));
        }
        if let Some(sop) = record.sop_id.as_deref() {
            check(EntityKind::Records, &record.id, "sopId", sop, ids.sops.contains(sop));
        }
        for sample in &record.sample_ids {
            let known = ids.samples.contains(sample.as_str());
            check(EntityKind::Records, &record.id, "sampleIds", sample, known);
        }
    }
    for note in view.notes {
        if let Some(topic) = note.topic_id.as_deref() {
            check(EntityKind::Notes, &note.id, "topicId", topic, ids.topics.contains(topic));
        }
        for record in &note.record_ids {
            let known = ids.records.contains(record.as_str());
            check(EntityKind::Notes, &note.id, "recordIds", record, known);
        }
    }
    for sample in view.samples {
        for record in &sample.record_ids {
            let known = ids.records.contains(record.as_str());
            check(EntityKind::Samples, &sample.id, "recordIds", record, known);
        }
    }
    for event in view.calendar {
        if let Some(topic) = event.topic_id.as_deref() {
            check(EntityKind::Calendar, &event.id, "topicId", topic, ids.topics.contains(topic));
        }
        if let Some(record) = event.record_id.as_deref() {
            let known = ids.records.contains(record);
            check(EntityKind::Calendar, &event.id, "recordId", record, known);
        }
    }
    for map in view.mind_maps {
        for node in &map.nodes {
            if let Some(entity) = node.entity_id.as_deref() {
                check(EntityKind::MindMaps, &map.id, "nodes.entityId", entity, ids.knows(entity));
            }
        }
    }
    broken
}
