use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::model::{Collection, EntityKind};

/// A decoded collection held in memory.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub kind: EntityKind,
    pub value: Collection,
    /// When the persisted document was last written, if known.
    pub written_at: Option<DateTime<Utc>>,
    loaded_at: Instant,
}

impl CacheEntry {
    pub fn new(value: Collection, written_at: Option<DateTime<Utc>>) -> Self {
        Self {
            kind: value.kind(),
            value,
            written_at,
            loaded_at: Instant::now(),
        }
    }

    pub fn key(&self) -> &'static str {
        self.kind.store_key()
    }

    pub fn age(&self) -> Duration {
        self.loaded_at.elapsed()
    }

    pub fn is_stale(&self, max_age: Option<Duration>) -> bool {
        max_age.is_some_and(|limit| self.age() > limit)
    }
}
