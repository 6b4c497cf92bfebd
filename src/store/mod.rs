//! Persisted key-value storage.
//!
//! A store maps string keys to serialized documents. It knows nothing about
//! entities; the cache layer decodes documents through [`schema`].

mod file;
#[cfg(test)]
mod flaky;
mod memory;
pub mod schema;

pub use file::FileStore;
#[cfg(test)]
pub(crate) use flaky::FlakyStore;
pub use memory::MemoryStore;

use crate::error::StoreError;

pub trait KeyValueStore {
    /// Raw document under `key`, `None` when nothing was ever written.
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Replaces the document under `key`. Last write wins.
    fn write(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&mut self, key: &str) -> Result<(), StoreError>;

    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey {
            key: key.to_owned(),
        })
    }
}
