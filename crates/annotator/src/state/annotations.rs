//! Saved annotations of the current scene, keyed by instance id string.

use shared::{SavedAnnotation, SavedAnnotationMap};

#[derive(Debug, Clone, Default)]
pub struct SavedAnnotationsCache {
    entries: SavedAnnotationMap,
}

impl SavedAnnotationsCache {
    /// Replace the whole cache with what the backend reported on scene load
    pub fn replace_all(&mut self, entries: SavedAnnotationMap) {
        self.entries = entries;
    }

    pub fn get(&self, key: &str) -> Option<&SavedAnnotation> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Record a successful save, overwriting any earlier entry
    pub fn record(&mut self, key: impl Into<String>, annotation: SavedAnnotation) {
        self.entries.insert(key.into(), annotation);
    }

    pub fn as_map(&self) -> &SavedAnnotationMap {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
