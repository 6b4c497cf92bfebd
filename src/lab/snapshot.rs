use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::{CacheManager, ChangeKind};
use crate::error::{LabError, LabResult, ValidationError};
use crate::model::{Collection, Entity, EntityKind};
use crate::store::KeyValueStore;
use crate::store::schema::SCHEMA_VERSION;

/// Every collection of a lab in one JSON document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub exported_at: DateTime<Utc>,
    pub schema_version: u32,
    pub collections: Vec<Collection>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub counts: BTreeMap<EntityKind, usize>,
}

impl Snapshot {
    /// Reads every collection. A collection the store cannot read fails the
    /// capture instead of being exported as empty.
    pub fn capture<S: KeyValueStore>(cache: &mut CacheManager<S>) -> LabResult<Self> {
        let collections = EntityKind::ALL
            .into_iter()
            .map(|kind| cache.try_get(kind))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            exported_at: Utc::now(),
            schema_version: SCHEMA_VERSION,
            collections,
        })
    }

    pub fn counts(&self) -> BTreeMap<EntityKind, usize> {
        self.collections
            .iter()
            .map(|collection| (collection.kind(), collection.len()))
            .collect()
    }

    pub fn to_json(&self) -> LabResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|error| LabError::Snapshot(format!("cannot encode snapshot: {error}")))
    }

    pub fn from_json(raw: &str) -> LabResult<Self> {
        let snapshot: Self = serde_json::from_str(raw)
            .map_err(|error| LabError::Snapshot(format!("malformed snapshot: {error}")))?;
        if snapshot.schema_version > SCHEMA_VERSION {
            return Err(LabError::Snapshot(format!(
                "snapshot schema version {} is newer than {SCHEMA_VERSION}",
                snapshot.schema_version
            )));
        }
        snapshot.check_kinds()?;
        Ok(snapshot)
    }

    fn check_kinds(&self) -> LabResult<()> {
        let mut seen = BTreeSet::new();
        for collection in &self.collections {
            if !seen.insert(collection.kind()) {
                return Err(LabError::Snapshot(format!(
                    "{} appears more than once",
                    collection.kind()
                )));
            }
        }
        Ok(())
    }

    /// Overwrites every collection present in the snapshot. Collections
    /// absent from the snapshot are left alone.
    ///
    /// All items are validated first, so an invalid snapshot writes nothing.
    /// If a write fails part way, the collections already written are put
    /// back to their previous documents before the error is returned.
    pub fn restore<S: KeyValueStore>(
        self,
        cache: &mut CacheManager<S>,
    ) -> LabResult<ImportSummary> {
        self.check_kinds()?;
        let checked = self
            .collections
            .into_iter()
            .map(|collection| {
                let ids = inspect(&collection)?;
                Ok((collection, ids))
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        let previous = checked
            .iter()
            .map(|(collection, _)| -> LabResult<_> {
                let kind = collection.kind();
                Ok((kind, cache.store().read(kind.store_key())?))
            })
            .collect::<LabResult<Vec<_>>>()?;

        let mut summary = ImportSummary::default();
        for (written, (collection, ids)) in checked.into_iter().enumerate() {
            let kind = collection.kind();
            let len = collection.len();
            if let Err(error) = cache.set_with(collection, ChangeKind::Imported, ids) {
                warn!(%kind, %error, "import failed; rolling back");
                roll_back(cache, &previous[..written]);
                return Err(error);
            }
            summary.counts.insert(kind, len);
        }
        info!(collections = summary.counts.len(), "snapshot imported");
        Ok(summary)
    }
}

/// Puts back the documents that were stored before an aborted import.
fn roll_back<S: KeyValueStore>(
    cache: &mut CacheManager<S>,
    previous: &[(EntityKind, Option<String>)],
) {
    for (kind, raw) in previous {
        let key = kind.store_key();
        let result = match raw {
            Some(raw) => cache.store_mut().write(key, raw),
            None => cache.store_mut().remove(key),
        };
        if let Err(error) = result {
            warn!(%kind, %error, "could not restore collection after failed import");
        }
        cache.invalidate(*kind);
    }
}

fn check_items<T: Entity>(items: &[T]) -> Result<Vec<String>, ValidationError> {
    items
        .iter()
        .map(|item| {
            item.validate()?;
            Ok(item.id().to_owned())
        })
        .collect()
}

/// Validates every item and returns their ids.
fn inspect(collection: &Collection) -> Result<Vec<String>, ValidationError> {
    match collection {
        Collection::Topics(items) => check_items(items),
        Collection::Records(items) => check_items(items),
        Collection::Notes(items) => check_items(items),
        Collection::Sops(items) => check_items(items),
        Collection::Samples(items) => check_items(items),
        Collection::Calendar(items) => check_items(items),
        Collection::ChatSessions(items) => check_items(items),
        Collection::MindMaps(items) => check_items(items),
        Collection::Settings(settings) => settings.validate().map(|()| Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, Interest};
    use crate::lab::Repo;
    use crate::error::StoreError;
    use crate::model::{ExperimentRecord, Note, Topic};
    use crate::store::{FlakyStore, MemoryStore};

    fn cache() -> CacheManager<MemoryStore> {
        CacheManager::new(MemoryStore::new(), CacheConfig::default())
    }

    #[test]
    fn export_then_import_reproduces_counts() {
        let mut source = cache();
        for title in ["Alpha", "Beta"] {
            Repo::<Topic, _>::new(&mut source).create(Topic::new(title)).unwrap();
        }
        Repo::<Note, _>::new(&mut source)
            .create(Note::new("Observation", "cloudy"))
            .unwrap();
        let raw = Snapshot::capture(&mut source).unwrap().to_json().unwrap();

        let mut target = cache();
        let (_, rx) = target.subscribe_channel(Interest::All);
        let summary = Snapshot::from_json(&raw).unwrap().restore(&mut target).unwrap();

        assert_eq!(summary.counts[&EntityKind::Topics], 2);
        assert_eq!(summary.counts[&EntityKind::Notes], 1);
        assert_eq!(
            Snapshot::capture(&mut target).unwrap().counts(),
            Snapshot::capture(&mut source).unwrap().counts()
        );
        assert!(rx.try_iter().all(|event| event.change == ChangeKind::Imported));
    }

    #[test]
    fn import_replaces_instead_of_merging() {
        let mut target = cache();
        Repo::<Topic, _>::new(&mut target).create(Topic::new("Old")).unwrap();

        let snapshot = Snapshot {
            exported_at: Utc::now(),
            schema_version: SCHEMA_VERSION,
            collections: vec![Collection::Topics(Vec::new())],
        };
        snapshot.restore(&mut target).unwrap();
        assert_eq!(Repo::<Topic, _>::new(&mut target).count(), 0);
    }

    #[test]
    fn invalid_item_aborts_before_writing() {
        let mut target = cache();
        let mut topic = Topic::new("");
        topic.id = "t1".to_owned();
        let snapshot = Snapshot {
            exported_at: Utc::now(),
            schema_version: SCHEMA_VERSION,
            collections: vec![Collection::Notes(Vec::new()), Collection::Topics(vec![topic])],
        };
        assert!(matches!(snapshot.restore(&mut target), Err(LabError::Validation(_))));
        assert!(target.store().is_empty());
    }

    #[test]
    fn duplicate_or_future_snapshots_are_rejected() {
        let raw = r#"{"exportedAt":"2024-03-01T10:00:00Z","schemaVersion":1,"collections":[
            {"kind":"topics","items":[]},{"kind":"topics","items":[]}]}"#;
        assert!(matches!(Snapshot::from_json(raw), Err(LabError::Snapshot(_))));

        let raw = r#"{"exportedAt":"2024-03-01T10:00:00Z","schemaVersion":9,"collections":[]}"#;
        assert!(matches!(Snapshot::from_json(raw), Err(LabError::Snapshot(_))));
    }

    #[test]
    fn duplicate_kinds_are_rejected_without_parsing() {
        let mut target = cache();
        let snapshot = Snapshot {
            exported_at: Utc::now(),
            schema_version: SCHEMA_VERSION,
            collections: vec![
                Collection::Topics(vec![Topic::new("First")]),
                Collection::Topics(Vec::new()),
            ],
        };
        assert!(matches!(snapshot.restore(&mut target), Err(LabError::Snapshot(_))));
        assert!(target.store().is_empty());
    }

    #[test]
    fn failed_write_puts_earlier_collections_back() {
        let mut seeded = cache();
        let kept = Repo::<Topic, _>::new(&mut seeded)
            .create(Topic::new("Kept"))
            .unwrap();
        let store = FlakyStore::new(seeded.dispose()).failing_writes("lab_records");
        let mut target = CacheManager::new(store, CacheConfig::default());
        assert_eq!(Repo::<Topic, _>::new(&mut target).count(), 1);

        let mut incoming = Topic::new("Incoming");
        incoming.id = "t9".to_owned();
        let mut note = Note::new("Incoming note", "");
        note.id = "n9".to_owned();
        let mut record = ExperimentRecord::new("Unwritable");
        record.id = "r9".to_owned();
        let snapshot = Snapshot {
            exported_at: Utc::now(),
            schema_version: SCHEMA_VERSION,
            collections: vec![
                Collection::Topics(vec![incoming]),
                Collection::Notes(vec![note]),
                Collection::Records(vec![record]),
            ],
        };

        let result = snapshot.restore(&mut target);
        assert!(matches!(result, Err(LabError::Store(StoreError::Unavailable { .. }))));
        assert_eq!(Repo::<Topic, _>::new(&mut target).list(), vec![kept]);
        assert!(Repo::<Note, _>::new(&mut target).list().is_empty());
        assert_eq!(target.store().inner.read("lab_notes").unwrap(), None);
    }

    #[test]
    fn capture_fails_when_a_collection_cannot_be_read() {
        let store = FlakyStore::new(MemoryStore::new()).failing_reads("lab_samples");
        let mut source = CacheManager::new(store, CacheConfig::default());
        assert!(matches!(
            Snapshot::capture(&mut source),
            Err(LabError::Store(StoreError::Unavailable { .. }))
        ));
    }
}
