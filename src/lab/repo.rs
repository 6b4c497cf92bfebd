use std::marker::PhantomData;

use chrono::Utc;
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use tracing::debug;

use crate::cache::{CacheManager, ChangeKind};
use crate::error::{LabError, LabResult};
use crate::model::Entity;
use crate::store::KeyValueStore;
use crate::util::{new_id, short_id};

/// CRUD over one entity collection. Every mutation rewrites the whole
/// collection through the cache, which notifies subscribers.
pub struct Repo<'a, T: Entity, S: KeyValueStore> {
    pub(crate) cache: &'a mut CacheManager<S>,
    _entity: PhantomData<T>,
}

impl<'a, T: Entity, S: KeyValueStore> Repo<'a, T, S> {
    pub fn new(cache: &'a mut CacheManager<S>) -> Self {
        Self {
            cache,
            _entity: PhantomData,
        }
    }

    pub fn list(&mut self) -> Vec<T> {
        self.cache.list()
    }

    /// The collection a mutation starts from. Unlike [`Self::list`], a
    /// failing store read is an error rather than an empty list.
    fn stored(&mut self) -> LabResult<Vec<T>> {
        Ok(self.cache.try_list()?)
    }

    pub fn count(&mut self) -> usize {
        self.list().len()
    }

    pub fn get(&mut self, id: &str) -> Option<T> {
        self.list().into_iter().find(|item| item.id() == id)
    }

    pub fn require(&mut self, id: &str) -> LabResult<T> {
        self.get(id).ok_or_else(|| not_found::<T>(id))
    }

    /// Assigns a fresh id and timestamps, validates, and appends.
    pub fn create(&mut self, mut item: T) -> LabResult<T> {
        item.stamp_new(new_id(), Utc::now());
        item.validate()?;

        let mut items = self.stored()?;
        items.push(item.clone());
        self.cache
            .replace(items, ChangeKind::Created, vec![item.id().to_owned()])?;
        debug!(kind = %T::KIND, id = short_id(item.id()), "created");
        Ok(item)
    }

    /// Applies `edit` to the stored item. Nothing is written if the edited
    /// item fails validation.
    pub fn update<F>(&mut self, id: &str, edit: F) -> LabResult<T>
    where
        F: FnOnce(&mut T),
    {
        let mut items = self.stored()?;
        let slot = items
            .iter_mut()
            .find(|item| item.id() == id)
            .ok_or_else(|| not_found::<T>(id))?;

        let mut edited = slot.clone();
        edit(&mut edited);
        edited.validate()?;
        edited.touch(Utc::now());
        *slot = edited.clone();

        self.cache
            .replace(items, ChangeKind::Updated, vec![id.to_owned()])?;
        Ok(edited)
    }

    /// Like [`Self::update`] but for edits that can fail on their own.
    pub fn try_update<F, R>(&mut self, id: &str, edit: F) -> LabResult<(T, R)>
    where
        F: FnOnce(&mut T) -> LabResult<R>,
    {
        let mut items = self.stored()?;
        let slot = items
            .iter_mut()
            .find(|item| item.id() == id)
            .ok_or_else(|| not_found::<T>(id))?;

        let mut edited = slot.clone();
        let output = edit(&mut edited)?;
        edited.validate()?;
        edited.touch(Utc::now());
        *slot = edited.clone();

        self.cache
            .replace(items, ChangeKind::Updated, vec![id.to_owned()])?;
        Ok((edited, output))
    }

    pub fn delete(&mut self, id: &str) -> LabResult<T> {
        let mut items = self.stored()?;
        let index = items
            .iter()
            .position(|item| item.id() == id)
            .ok_or_else(|| not_found::<T>(id))?;
        let removed = items.remove(index);

        self.cache
            .replace(items, ChangeKind::Deleted, vec![id.to_owned()])?;
        debug!(kind = %T::KIND, id = short_id(id), "deleted");
        Ok(removed)
    }

    /// Items whose title fuzzily matches `query`, best match first. An empty
    /// query returns everything in stored order.
    pub fn search(&mut self, query: &str) -> Vec<T> {
        let query = query.trim();
        let items = self.list();
        if query.is_empty() {
            return items;
        }

        let matcher = SkimMatcherV2::default();
        let mut scored = items
            .into_iter()
            .filter_map(|item| {
                let score = fuzzy_score(&matcher, item.title(), query)?;
                Some((score, item))
            })
            .collect::<Vec<_>>();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().map(|(_, item)| item).collect()
    }
}

fn fuzzy_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_lowercase(), &query.to_lowercase()))
}

fn not_found<T: Entity>(id: &str) -> LabError {
    LabError::NotFound {
        kind: T::KIND,
        id: id.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, Interest};
    use crate::error::ValidationError;
    use crate::error::StoreError;
    use crate::model::{EntityKind, Topic};
    use crate::store::{FlakyStore, MemoryStore};

    fn cache() -> CacheManager<MemoryStore> {
        CacheManager::new(MemoryStore::new(), CacheConfig::default())
    }

    #[test]
    fn create_assigns_identity_and_persists() {
        let mut cache = cache();
        let created = Repo::<Topic, _>::new(&mut cache)
            .create(Topic::new("Alpha"))
            .unwrap();
        assert!(!created.id.is_empty());
        assert_eq!(created.created_at, created.updated_at);

        cache.invalidate(EntityKind::Topics);
        let stored = Repo::<Topic, _>::new(&mut cache).require(&created.id).unwrap();
        assert_eq!(stored, created);
    }

    #[test]
    fn invalid_entity_is_not_written() {
        let mut cache = cache();
        let error = Repo::<Topic, _>::new(&mut cache)
            .create(Topic::new("  "))
            .unwrap_err();
        assert!(matches!(
            error,
            LabError::Validation(ValidationError { field: "title", .. })
        ));
        assert!(cache.store().is_empty());
    }

    #[test]
    fn update_rejects_invalid_edit_and_keeps_original() {
        let mut cache = cache();
        let mut topics = Repo::<Topic, _>::new(&mut cache);
        let topic = topics.create(Topic::new("Alpha")).unwrap();

        assert!(topics.update(&topic.id, |t| t.title.clear()).is_err());
        assert_eq!(topics.require(&topic.id).unwrap().title, "Alpha");

        let renamed = topics
            .update(&topic.id, |t| t.title = "Beta".to_owned())
            .unwrap();
        assert_eq!(renamed.title, "Beta");
        assert!(renamed.updated_at >= topic.updated_at);
    }

    #[test]
    fn missing_ids_are_not_found() {
        let mut cache = cache();
        let mut topics = Repo::<Topic, _>::new(&mut cache);
        assert!(matches!(
            topics.delete("nope"),
            Err(LabError::NotFound {
                kind: EntityKind::Topics,
                ..
            })
        ));
        assert!(topics.update("nope", |_| {}).is_err());
    }

    #[test]
    fn delete_notifies_with_id() {
        let mut cache = cache();
        let topic = Repo::<Topic, _>::new(&mut cache)
            .create(Topic::new("Alpha"))
            .unwrap();
        let (_, rx) = cache.subscribe_channel(Interest::only(EntityKind::Topics));

        Repo::<Topic, _>::new(&mut cache).delete(&topic.id).unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(event.change, ChangeKind::Deleted);
        assert_eq!(event.ids, vec![topic.id]);
    }

    #[test]
    fn unreadable_collection_is_never_overwritten() {
        let mut cache = cache();
        let kept = Repo::<Topic, _>::new(&mut cache)
            .create(Topic::new("Kept"))
            .unwrap();
        let store = FlakyStore::new(cache.dispose()).failing_reads("lab_topics");
        let mut cache = CacheManager::new(store, CacheConfig::default());

        let mut topics = Repo::<Topic, _>::new(&mut cache);
        assert!(matches!(
            topics.create(Topic::new("Fresh")),
            Err(LabError::Store(StoreError::Unavailable { .. }))
        ));
        assert!(topics.update(&kept.id, |t| t.title = "Edited".to_owned()).is_err());
        assert!(topics.delete(&kept.id).is_err());

        let mut store = cache.dispose();
        store.heal("lab_topics");
        let mut cache = CacheManager::new(store, CacheConfig::default());
        assert_eq!(Repo::<Topic, _>::new(&mut cache).list(), vec![kept]);
    }

    #[test]
    fn search_ranks_fuzzy_title_matches() {
        let mut cache = cache();
        let mut topics = Repo::<Topic, _>::new(&mut cache);
        for title in ["Protein folding", "PCR optimisation", "Cell culture"] {
            topics.create(Topic::new(title)).unwrap();
        }

        let hits = topics.search("pcr");
        assert_eq!(hits[0].title, "PCR optimisation");
        assert!(hits.iter().all(|t| t.title != "Cell culture"));
        assert_eq!(topics.search("").len(), 3);
    }
}
