//! Read-through cache over a [`KeyValueStore`].
//!
//! Reads are served from memory when an entry exists and is not older than
//! [`CacheConfig::max_age`]; otherwise the persisted document is decoded and
//! cached. Writes go to the store first and only then replace the entry, so
//! the cached value always matches what is persisted (or is absent).
//!
//! Every write publishes an [`InvalidationEvent`] to the subscribers before
//! returning.

mod entry;
mod events;

use std::collections::HashMap;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use entry::CacheEntry;
pub use events::{ChangeKind, EventBus, Interest, InvalidationEvent, SubscriptionId};

use crate::error::{DecodeError, LabError, LabResult, StoreError};
use crate::model::{Collection, Entity, EntityKind, Settings};
use crate::store::{KeyValueStore, schema};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    /// Entries older than this read through again. `None` keeps entries
    /// until they are written or invalidated.
    #[serde(with = "optional_secs")]
    pub max_age: Option<Duration>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub corrupt_reads: u64,
    pub read_failures: u64,
}

#[derive(Debug, Default)]
pub struct PreloadReport {
    pub loaded: Vec<EntityKind>,
    pub failed: Vec<(EntityKind, LoadError)>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("corrupt document: {0}")]
    Corrupt(#[from] DecodeError),
}

pub struct CacheManager<S: KeyValueStore> {
    store: S,
    config: CacheConfig,
    entries: HashMap<EntityKind, CacheEntry>,
    bus: EventBus,
    stats: CacheStats,
}

impl<S: KeyValueStore> CacheManager<S> {
    pub fn new(store: S, config: CacheConfig) -> Self {
        Self {
            store,
            config,
            entries: HashMap::new(),
            bus: EventBus::new(),
            stats: CacheStats::default(),
        }
    }

    /// Collection stored under `kind`. A missing, unreadable or corrupt
    /// document yields the empty collection.
    pub fn get(&mut self, kind: EntityKind) -> Collection {
        self.try_get(kind).unwrap_or_else(|error| {
            warn!(key = kind.store_key(), %error, "serving empty collection");
            Collection::empty(kind)
        })
    }

    /// Like [`Self::get`], but a failing store read is returned instead of
    /// being served as empty. Callers that write back what they read use
    /// this so an outage never replaces stored data.
    pub fn try_get(&mut self, kind: EntityKind) -> Result<Collection, StoreError> {
        if let Some(entry) = self.entries.get(&kind)
            && !entry.is_stale(self.config.max_age)
        {
            self.stats.hits += 1;
            return Ok(entry.value.clone());
        }

        self.stats.misses += 1;
        match self.load(kind) {
            Ok(collection) => Ok(collection),
            Err(LoadError::Corrupt(error)) => {
                self.stats.corrupt_reads += 1;
                warn!(key = kind.store_key(), %error, "treating corrupt collection as empty");
                Ok(Collection::empty(kind))
            }
            Err(LoadError::Store(error)) => {
                self.stats.read_failures += 1;
                Err(error)
            }
        }
    }

    /// Persists `collection` and caches it, announcing a whole-collection
    /// replacement.
    pub fn set(&mut self, collection: Collection) -> LabResult<()> {
        self.set_with(collection, ChangeKind::Replaced, Vec::new())
    }

    pub fn set_with(
        &mut self,
        collection: Collection,
        change: ChangeKind,
        ids: Vec<String>,
    ) -> LabResult<()> {
        let kind = collection.kind();
        let now = Utc::now();
        let raw = schema::encode(&collection, now)
            .map_err(|source| LabError::Encode { kind, source })?;
        // Never persist a document that would read back as corrupt.
        schema::decode(kind, &raw).map_err(|source| LabError::Unreadable { kind, source })?;
        self.store.write(kind.store_key(), &raw)?;

        self.stats.writes += 1;
        self.entries
            .insert(kind, CacheEntry::new(collection, Some(now)));
        debug!(key = kind.store_key(), ?change, "collection written");

        self.publish(InvalidationEvent::new(kind, change, ids));
        Ok(())
    }

    /// Drops the entry so the next read goes to the store, and tells
    /// subscribers to refetch.
    pub fn invalidate(&mut self, kind: EntityKind) {
        self.entries.remove(&kind);
        self.publish(InvalidationEvent::new(
            kind,
            ChangeKind::Invalidated,
            Vec::new(),
        ));
    }

    pub fn invalidate_all(&mut self) {
        let kinds = self.entries.keys().copied().collect::<Vec<_>>();
        for kind in kinds {
            self.invalidate(kind);
        }
    }

    /// Warms the cache for `kinds`. A failing key is reported and skipped.
    pub fn preload(&mut self, kinds: &[EntityKind]) -> PreloadReport {
        let mut report = PreloadReport::default();
        for &kind in kinds {
            if self
                .entries
                .get(&kind)
                .is_some_and(|entry| !entry.is_stale(self.config.max_age))
            {
                report.loaded.push(kind);
                continue;
            }

            match self.load(kind) {
                Ok(_) => report.loaded.push(kind),
                Err(error) => {
                    if matches!(error, LoadError::Corrupt(_)) {
                        self.stats.corrupt_reads += 1;
                    } else {
                        self.stats.read_failures += 1;
                    }
                    warn!(key = kind.store_key(), %error, "preload failed");
                    report.failed.push((kind, error));
                }
            }
        }
        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "cache preloaded"
        );
        report
    }

    pub fn is_cached(&self, kind: EntityKind) -> bool {
        self.entries.contains_key(&kind)
    }

    pub fn list<T: Entity>(&mut self) -> Vec<T> {
        T::from_collection(self.get(T::KIND))
    }

    pub fn try_list<T: Entity>(&mut self) -> Result<Vec<T>, StoreError> {
        self.try_get(T::KIND).map(T::from_collection)
    }

    pub fn replace<T: Entity>(
        &mut self,
        items: Vec<T>,
        change: ChangeKind,
        ids: Vec<String>,
    ) -> LabResult<()> {
        self.set_with(T::into_collection(items), change, ids)
    }

    pub fn settings(&mut self) -> Settings {
        match self.get(EntityKind::Settings) {
            Collection::Settings(settings) => settings,
            _ => Settings::default(),
        }
    }

    pub fn try_settings(&mut self) -> Result<Settings, StoreError> {
        Ok(match self.try_get(EntityKind::Settings)? {
            Collection::Settings(settings) => settings,
            _ => Settings::default(),
        })
    }

    pub fn subscribe<F>(&mut self, interest: Interest, callback: F) -> SubscriptionId
    where
        F: FnMut(&InvalidationEvent) + 'static,
    {
        self.bus.subscribe(interest, callback)
    }

    pub fn subscribe_channel(
        &mut self,
        interest: Interest,
    ) -> (SubscriptionId, Receiver<InvalidationEvent>) {
        self.bus.subscribe_channel(interest)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Direct store access. Writes made through it are invisible to the
    /// cache until [`Self::invalidate`] is called for the affected kind.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Drops every entry and subscriber and hands the store back.
    pub fn dispose(mut self) -> S {
        info!(
            hits = self.stats.hits,
            misses = self.stats.misses,
            writes = self.stats.writes,
            corrupt = self.stats.corrupt_reads,
            "cache disposed"
        );
        self.entries.clear();
        self.bus.clear();
        self.store
    }

    fn load(&mut self, kind: EntityKind) -> Result<Collection, LoadError> {
        self.entries.remove(&kind);
        let Some(raw) = self.store.read(kind.store_key())? else {
            let empty = Collection::empty(kind);
            self.entries
                .insert(kind, CacheEntry::new(empty.clone(), None));
            return Ok(empty);
        };

        let decoded = schema::decode(kind, &raw)?;
        if decoded.schema_version < schema::SCHEMA_VERSION {
            debug!(
                key = kind.store_key(),
                version = decoded.schema_version,
                "decoded legacy document"
            );
        }
        self.entries.insert(
            kind,
            CacheEntry::new(decoded.collection.clone(), decoded.saved_at),
        );
        Ok(decoded.collection)
    }

    fn publish(&mut self, event: InvalidationEvent) {
        let delivered = self.bus.publish(&event);
        debug!(
            key = event.kind.store_key(),
            change = ?event.change,
            delivered,
            "invalidation published"
        );
    }
}

mod optional_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(deserializer)?;
        Ok(secs
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use proptest::prelude::*;

    use super::*;
    use crate::mindmap::{
        EdgeKind, LayoutAlgorithm, MapLayout, MapViewport, MindEdge, MindMap, MindNode, NodeKind,
        NodeShape,
    };
    use crate::model::{
        CalendarEvent, ChatMessage, ChatSession, ExperimentRecord, MessageSource, Note, Quantity,
        RecordStatus, Sample, SampleStatus, Sop, Topic,
    };
    use crate::store::{FlakyStore, MemoryStore};

    fn topic(id: &str, title: &str) -> Topic {
        let mut topic = Topic::new(title);
        topic.id = id.to_owned();
        topic
    }

    fn styled_map() -> MindMap {
        let mut map = MindMap::new("Cloning plan");
        map.id = "m1".to_owned();
        let mut root = MindNode::new("Vector", NodeKind::Topic).at(-12.5, 40.25);
        root.id = "n1".to_owned();
        root.width = 210.0;
        root.style.shape = NodeShape::Diamond;
        let mut leaf = MindNode::new("Insert", NodeKind::Task)
            .at(310.75, -88.0)
            .with_parent("n1");
        leaf.id = "n2".to_owned();
        leaf.entity_id = Some("r1".to_owned());
        let mut edge = MindEdge::new("n1", "n2", EdgeKind::Relation);
        edge.id = "e1".to_owned();
        edge.style.width = 3.25;
        edge.style.dash = Some((2.5, 7.0));
        edge.style.arrow = true;
        map.nodes = vec![root, leaf];
        map.edges = vec![edge];
        map.viewport = MapViewport {
            zoom: 1.75,
            pan_x: -140.5,
            pan_y: 62.0,
        };
        map.layout = MapLayout {
            algorithm: LayoutAlgorithm::Manual,
            spacing: 96.5,
        };
        map
    }

    fn populated(kind: EntityKind) -> Collection {
        match kind {
            EntityKind::Topics => Collection::Topics(vec![topic("t1", "Alpha")]),
            EntityKind::Records => {
                let mut record = ExperimentRecord::new("Digest");
                record.topic_id = Some("t1".to_owned());
                record.status = RecordStatus::InProgress;
                record.performed_at = Some(Utc::now());
                Collection::Records(vec![record])
            }
            EntityKind::Notes => {
                let mut note = Note::new("Gel", "bands at 3kb");
                note.record_ids = vec!["r1".to_owned()];
                Collection::Notes(vec![note])
            }
            EntityKind::Sops => {
                let mut sop = Sop::new("Miniprep");
                sop.steps = vec!["Lyse".to_owned(), "Spin".to_owned()];
                Collection::Sops(vec![sop])
            }
            EntityKind::Samples => {
                let mut sample = Sample::new("Plasmid stock");
                sample.quantity = Some(Quantity {
                    value: 12.5,
                    unit: "ul".to_owned(),
                });
                sample.status = SampleStatus::InUse;
                Collection::Samples(vec![sample])
            }
            EntityKind::Calendar => {
                let mut event = CalendarEvent::new("Sequencing", Utc::now());
                event.reminder_minutes = Some(30);
                Collection::Calendar(vec![event])
            }
            EntityKind::ChatSessions => {
                let mut session = ChatSession::new("Primer design");
                session.messages = vec![
                    ChatMessage::user("Tm?"),
                    ChatMessage::assistant("About 58 C", MessageSource::Fallback),
                ];
                Collection::ChatSessions(vec![session])
            }
            EntityKind::MindMaps => Collection::MindMaps(vec![styled_map()]),
            EntityKind::Settings => {
                let mut settings = Settings::default();
                settings.assistant.temperature = 0.35;
                settings.mind_map_spacing = 142.5;
                Collection::Settings(settings)
            }
        }
    }

    #[test]
    fn missing_key_reads_as_empty_and_is_cached() {
        let mut cache = CacheManager::new(MemoryStore::new(), CacheConfig::default());
        assert_eq!(cache.get(EntityKind::Topics), Collection::Topics(Vec::new()));
        assert!(cache.is_cached(EntityKind::Topics));

        cache.get(EntityKind::Topics);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn set_then_get_returns_same_value() {
        let mut cache = CacheManager::new(MemoryStore::new(), CacheConfig::default());
        let collection = Collection::Topics(vec![topic("t1", "Alpha"), topic("t2", "Beta")]);

        cache.set(collection.clone()).unwrap();
        assert_eq!(cache.get(EntityKind::Topics), collection);

        let store = cache.dispose();
        let mut fresh = CacheManager::new(store, CacheConfig::default());
        assert_eq!(fresh.get(EntityKind::Topics), collection);
    }

    #[test]
    fn every_collection_survives_a_fresh_cache() {
        let collections = EntityKind::ALL.map(populated);
        let mut cache = CacheManager::new(MemoryStore::new(), CacheConfig::default());
        for collection in &collections {
            cache.set(collection.clone()).unwrap();
        }

        let mut fresh = CacheManager::new(cache.dispose(), CacheConfig::default());
        for collection in &collections {
            assert_eq!(&fresh.get(collection.kind()), collection);
        }
        assert_eq!(fresh.stats().corrupt_reads, 0);
    }

    #[test]
    fn styled_mind_map_reads_back_unchanged() {
        let map = styled_map();
        let mut cache = CacheManager::new(MemoryStore::new(), CacheConfig::default());
        cache.set(Collection::MindMaps(vec![map.clone()])).unwrap();

        let mut fresh = CacheManager::new(cache.dispose(), CacheConfig::default());
        assert_eq!(fresh.list::<MindMap>(), vec![map]);
    }

    #[test]
    fn document_that_would_not_read_back_is_refused() {
        let mut cache = CacheManager::new(MemoryStore::new(), CacheConfig::default());
        cache.set(Collection::MindMaps(vec![styled_map()])).unwrap();
        let (_, rx) = cache.subscribe_channel(Interest::All);

        let mut broken = styled_map();
        broken.nodes[0].width = f32::NAN;
        let result = cache.set(Collection::MindMaps(vec![broken]));

        assert!(matches!(
            result,
            Err(LabError::Unreadable {
                kind: EntityKind::MindMaps,
                ..
            })
        ));
        assert!(rx.try_recv().is_err());
        cache.invalidate(EntityKind::MindMaps);
        assert_eq!(cache.list::<MindMap>().len(), 1);
        assert_eq!(cache.stats().corrupt_reads, 0);
    }

    #[test]
    fn try_get_surfaces_store_failures() {
        let mut inner = MemoryStore::new();
        let raw = schema::encode(&Collection::Records(Vec::new()), Utc::now()).unwrap();
        inner.write("lab_records", &raw).unwrap();
        let store = FlakyStore::new(inner).failing_reads("lab_records");
        let mut cache = CacheManager::new(store, CacheConfig::default());

        assert!(matches!(
            cache.try_get(EntityKind::Records),
            Err(StoreError::Unavailable { .. })
        ));
        assert!(cache.try_list::<ExperimentRecord>().is_err());
        assert!(cache.list::<ExperimentRecord>().is_empty());
        assert_eq!(cache.stats().read_failures, 3);
        assert!(cache.try_get(EntityKind::Topics).is_ok());
    }

    #[test]
    fn corrupt_document_reads_as_empty_without_caching() {
        let mut store = MemoryStore::new();
        store.write("lab_records", "{\"schemaVersion\": 1, ").unwrap();
        let mut cache = CacheManager::new(store, CacheConfig::default());

        assert_eq!(cache.get(EntityKind::Records), Collection::Records(Vec::new()));
        assert!(!cache.is_cached(EntityKind::Records));
        assert_eq!(cache.stats().corrupt_reads, 1);

        cache
            .replace(vec![ExperimentRecord::new("Recovered")], ChangeKind::Replaced, Vec::new())
            .unwrap();
        assert_eq!(cache.list::<ExperimentRecord>().len(), 1);
    }

    #[test]
    fn corrupt_collection_does_not_affect_others() {
        let mut store = MemoryStore::new();
        store.write("lab_notes", "not json at all").unwrap();
        let mut cache = CacheManager::new(store, CacheConfig::default());
        cache
            .replace(vec![topic("t1", "Alpha")], ChangeKind::Created, vec!["t1".to_owned()])
            .unwrap();

        assert!(cache.list::<Note>().is_empty());
        assert_eq!(cache.list::<Topic>().len(), 1);
    }

    #[test]
    fn subscribers_are_notified_before_set_returns() {
        let mut cache = CacheManager::new(MemoryStore::new(), CacheConfig::default());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        cache.subscribe(Interest::only(EntityKind::Topics), move |event| {
            sink.borrow_mut().push((event.change, event.ids.clone()));
        });

        cache
            .replace(vec![topic("t1", "Alpha")], ChangeKind::Created, vec!["t1".to_owned()])
            .unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![(ChangeKind::Created, vec!["t1".to_owned()])]
        );
    }

    #[test]
    fn invalidate_forces_read_through() {
        let mut cache = CacheManager::new(MemoryStore::new(), CacheConfig::default());
        cache.set(Collection::Topics(vec![topic("t1", "Alpha")])).unwrap();

        let external = schema::encode(&Collection::Topics(Vec::new()), Utc::now()).unwrap();
        cache.store_mut().write("lab_topics", &external).unwrap();
        assert_eq!(cache.list::<Topic>().len(), 1);

        let (_, rx) = cache.subscribe_channel(Interest::All);
        cache.invalidate(EntityKind::Topics);
        assert_eq!(rx.try_recv().unwrap().change, ChangeKind::Invalidated);
        assert!(cache.list::<Topic>().is_empty());
    }

    #[test]
    fn stale_entries_read_through_again() {
        let config = CacheConfig {
            max_age: Some(Duration::ZERO),
        };
        let mut cache = CacheManager::new(MemoryStore::new(), config);
        cache.set(Collection::Topics(vec![topic("t1", "Alpha")])).unwrap();
        std::thread::sleep(Duration::from_millis(2));

        assert_eq!(cache.list::<Topic>().len(), 1);
        assert_eq!(cache.stats().hits, 0);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn preload_isolates_failing_keys() {
        let mut inner = MemoryStore::new();
        inner.write("lab_notes", "[[[").unwrap();
        let store = FlakyStore::new(inner)
            .failing_reads("lab_records")
            .failing_writes("lab_records");
        let mut cache = CacheManager::new(store, CacheConfig::default());

        let report = cache.preload(&EntityKind::FREQUENT);
        let failed = report
            .failed
            .iter()
            .map(|(kind, _)| *kind)
            .collect::<Vec<_>>();
        assert_eq!(failed, vec![EntityKind::Records, EntityKind::Notes]);
        assert!(matches!(report.failed[0].1, LoadError::Store(_)));
        assert!(matches!(report.failed[1].1, LoadError::Corrupt(_)));
        assert_eq!(
            report.loaded,
            vec![EntityKind::Topics, EntityKind::MindMaps, EntityKind::Settings]
        );
        assert!(cache.is_cached(EntityKind::MindMaps));
    }

    #[test]
    fn failed_write_leaves_cache_and_subscribers_untouched() {
        let store = FlakyStore::new(MemoryStore::new()).failing_writes("lab_records");
        let mut cache = CacheManager::new(store, CacheConfig::default());
        let (_, rx) = cache.subscribe_channel(Interest::All);

        let result = cache.replace(
            vec![ExperimentRecord::new("Lost")],
            ChangeKind::Created,
            Vec::new(),
        );
        assert!(matches!(result, Err(LabError::Store(StoreError::Unavailable { .. }))));
        assert!(!cache.is_cached(EntityKind::Records));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn config_round_trips_max_age_in_seconds() {
        let config: CacheConfig = serde_json::from_str(r#"{"maxAge": 2.5}"#).unwrap();
        assert_eq!(config.max_age, Some(Duration::from_millis(2500)));
        let empty: CacheConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.max_age, None);
    }

    proptest! {
        #[test]
        fn map_geometry_reads_back_or_is_refused(
            x in prop_oneof![Just(f32::NAN), -5000.0f32..5000.0],
            height in prop_oneof![Just(f32::INFINITY), 1.0f32..300.0],
            pan_x in prop_oneof![Just(f32::NEG_INFINITY), -900.0f32..900.0],
            dash in prop_oneof![Just(f32::NAN), 0.0f32..20.0],
        ) {
            let mut map = styled_map();
            map.nodes[1].x = x;
            map.nodes[1].height = height;
            map.viewport.pan_x = pan_x;
            map.edges[0].style.dash = Some((dash, 3.0));
            let finite = [x, height, pan_x, dash].iter().all(|value| value.is_finite());

            let mut cache = CacheManager::new(MemoryStore::new(), CacheConfig::default());
            let result = cache.set(Collection::MindMaps(vec![map.clone()]));
            prop_assert_eq!(result.is_ok(), finite);

            let mut fresh = CacheManager::new(cache.dispose(), CacheConfig::default());
            let stored = fresh.list::<MindMap>();
            if finite {
                prop_assert_eq!(stored, vec![map]);
            } else {
                prop_assert!(stored.is_empty());
            }
            prop_assert_eq!(fresh.stats().corrupt_reads, 0);
        }
    }
}
