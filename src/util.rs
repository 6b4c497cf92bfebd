use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use uuid::Uuid;

/// Time-ordered identifier for new entities.
pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}

/// First eight characters of an id, for logs and compact listings.
pub fn short_id(id: &str) -> &str {
    id.char_indices().nth(8).map_or(id, |(end, _)| &id[..end])
}

pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}…", &text[..end]),
        None => text.to_owned(),
    }
}

fn stable_hash(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

/// Deterministic point in `[-1, 1]²` derived from `id`.
pub fn stable_pair(id: &str) -> (f32, f32) {
    let hash = stable_hash(id);

    let x = ((hash & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    let y = (((hash >> 32) & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    ((x * 2.0) - 1.0, (y * 2.0) - 1.0)
}

/// Deterministic index below `len`; `len` must be non-zero.
pub fn stable_index(text: &str, len: usize) -> usize {
    (stable_hash(text) % len as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_pair_is_deterministic_and_bounded() {
        let first = stable_pair("node-a");
        assert_eq!(first, stable_pair("node-a"));
        assert!((-1.0..=1.0).contains(&first.0));
        assert!((-1.0..=1.0).contains(&first.1));
    }

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate_chars("μ-pipette", 2), "μ-…");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(short_id("0190f7a2-1c3e"), "0190f7a2");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn new_ids_are_unique() {
        assert_ne!(new_id(), new_id());
    }
}
