use super::{KeyValueStore, MemoryStore};
use crate::error::StoreError;

/// In-memory store that refuses reads or writes of chosen keys.
#[derive(Debug, Default)]
pub(crate) struct FlakyStore {
    pub inner: MemoryStore,
    broken_reads: Vec<&'static str>,
    broken_writes: Vec<&'static str>,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn failing_reads(mut self, key: &'static str) -> Self {
        self.broken_reads.push(key);
        self
    }

    pub fn failing_writes(mut self, key: &'static str) -> Self {
        self.broken_writes.push(key);
        self
    }

    /// Stops failing accesses to `key`.
    pub fn heal(&mut self, key: &str) {
        self.broken_reads.retain(|broken| *broken != key);
        self.broken_writes.retain(|broken| *broken != key);
    }
}

fn unavailable(key: &str) -> StoreError {
    StoreError::Unavailable {
        key: key.to_owned(),
    }
}

impl KeyValueStore for FlakyStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.broken_reads.iter().any(|broken| *broken == key) {
            return Err(unavailable(key));
        }
        self.inner.read(key)
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.broken_writes.iter().any(|broken| *broken == key) {
            return Err(unavailable(key));
        }
        self.inner.write(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        self.inner.keys()
    }
}
