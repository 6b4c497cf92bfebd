use std::fs;

use labnote::config::AssistantOverrides;
use labnote::lab::Snapshot;
use labnote::mindmap::MapTemplate;
use labnote::model::{EntityKind, ExperimentRecord, MessageSource, Note, Sample, Topic};
use labnote::store::FileStore;
use labnote::{Lab, LabConfig};

fn open_lab(dir: &std::path::Path) -> Lab<FileStore> {
    Lab::open(FileStore::open(dir).unwrap(), LabConfig::default())
}

#[test]
fn record_outlives_its_deleted_topic() {
    let dir = tempfile::tempdir().unwrap();
    let mut lab = open_lab(dir.path());

    let topic = lab.topics().create(Topic::new("Alpha")).unwrap();
    let record = lab
        .records()
        .create(ExperimentRecord::new("PCR run").with_topic(&topic.id))
        .unwrap();
    assert_eq!(lab.records_for_topic(&topic.id).len(), 1);

    lab.topics().delete(&topic.id).unwrap();

    let kept = lab.records().get(&record.id).unwrap();
    assert_eq!(kept.topic_id.as_deref(), Some(topic.id.as_str()));
    assert!(lab.records_for_topic(&topic.id).is_empty());
    assert!(
        lab.broken_references()
            .iter()
            .any(|broken| broken.id == record.id && broken.missing == topic.id)
    );
}

#[test]
fn collections_survive_reopening_the_data_directory() {
    let dir = tempfile::tempdir().unwrap();
    let note_id = {
        let mut lab = open_lab(dir.path());
        let note = lab.notes().create(Note::new("Buffer prep", "pH 7.4")).unwrap();
        lab.new_mind_map("Plan", MapTemplate::ProjectPlan).unwrap();
        lab.dispose();
        note.id
    };

    let mut lab = open_lab(dir.path());
    let note = lab.notes().require(&note_id).unwrap();
    assert_eq!(note.content, "pH 7.4");
    let maps = lab.mind_maps().list();
    assert_eq!(maps.len(), 1);
    assert!(!maps[0].nodes.is_empty());
}

#[test]
fn export_then_import_into_a_fresh_directory() {
    let source_dir = tempfile::tempdir().unwrap();
    let mut source = open_lab(source_dir.path());
    let topic = source.topics().create(Topic::new("Alpha")).unwrap();
    source
        .records()
        .create(ExperimentRecord::new("Western blot").with_topic(&topic.id))
        .unwrap();
    source.samples().create(Sample::new("Lysate A")).unwrap();
    let json = source.export().unwrap().to_json().unwrap();

    let target_dir = tempfile::tempdir().unwrap();
    let mut target = open_lab(target_dir.path());
    target.notes().create(Note::new("Stale", "")).unwrap();

    let summary = target.import(Snapshot::from_json(&json).unwrap()).unwrap();
    assert_eq!(summary.counts.get(&EntityKind::Topics), Some(&1));
    assert_eq!(summary.counts.get(&EntityKind::Records), Some(&1));
    assert_eq!(summary.counts.get(&EntityKind::Samples), Some(&1));
    assert!(target.notes().list().is_empty());
    assert_eq!(target.records_for_topic(&topic.id).len(), 1);
}

#[test]
fn unreachable_assistant_answers_with_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let config = LabConfig {
        assistant: AssistantOverrides {
            endpoint: Some("http://127.0.0.1:9/v1/chat/completions".to_owned()),
            api_key: Some("test".to_owned()),
            timeout_secs: Some(2),
            ..AssistantOverrides::default()
        },
        ..LabConfig::default()
    };
    let mut lab = Lab::open(FileStore::open(dir.path()).unwrap(), config);

    let (session, reply) = lab.chat(None, "How should I store ethanol?", None).unwrap();
    assert!(reply.is_fallback());
    assert!(!reply.content.is_empty());
    assert_eq!(session.messages.len(), 2);
    assert_eq!(session.messages[1].source, MessageSource::Fallback);
}

#[test]
fn corrupt_document_reads_as_empty_and_is_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("lab_samples.json"), "{not json").unwrap();

    let mut lab = open_lab(dir.path());
    assert!(lab.samples().list().is_empty());
    assert!(lab.stats().corrupt_reads >= 1);

    lab.samples().create(Sample::new("Plasmid stock")).unwrap();
    drop(lab);

    let mut reopened = open_lab(dir.path());
    assert_eq!(reopened.samples().list().len(), 1);
    assert_eq!(reopened.stats().corrupt_reads, 0);
}
