//! Object label registry: canonical names and ids from the category
//! mapping file, with new ids handed out for labels it does not know.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Lowest id given to a label not present in the mapping file
pub const FIRST_NEW_LABEL_ID: i64 = 1660;

const IGNORED_LABELS: [&str; 5] = ["void", "unlabeled", "remove", "delete", "unknown"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownLabel {
    pub id: i64,
    pub canonical_name: String,
}

#[derive(Debug, Clone)]
pub struct LabelRegistry {
    by_name: HashMap<String, KnownLabel>,
    by_id: BTreeMap<i64, String>,
    next_id: i64,
}

impl Default for LabelRegistry {
    fn default() -> Self {
        Self {
            by_name: HashMap::new(),
            by_id: BTreeMap::new(),
            next_id: FIRST_NEW_LABEL_ID,
        }
    }
}

impl LabelRegistry {
    /// Load the mapping file; a missing or unreadable file yields an empty registry
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let registry = Self::parse(&text);
                tracing::info!(
                    "loaded {} known labels from {}, next new id {}",
                    registry.len(),
                    path.display(),
                    registry.next_id()
                );
                registry
            }
            Err(e) => {
                tracing::error!("label info file {} unavailable: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse the tab-separated mapping: header line, then `id \t _ \t name ...`
    pub fn parse(text: &str) -> Self {
        let mut registry = Self::default();
        let mut max_id = 0;
        for (line_no, line) in text.lines().enumerate().skip(1) {
            let parts: Vec<&str> = line.trim().split('\t').collect();
            if parts.len() < 3 {
                continue;
            }
            let Ok(id) = parts[0].trim().parse::<i64>() else {
                tracing::warn!("could not parse label file line {}: '{}'", line_no + 1, line.trim());
                continue;
            };
            let raw = parts[2].trim();
            if raw.is_empty() || IGNORED_LABELS.contains(&raw) {
                continue;
            }
            let canonical = raw.replace('_', " ");
            let known = KnownLabel {
                id,
                canonical_name: canonical.clone(),
            };
            registry.by_name.insert(raw.to_lowercase(), known.clone());
            registry.by_name.insert(canonical.to_lowercase(), known);
            registry.by_id.insert(id, canonical);
            max_id = max_id.max(id);
        }
        registry.next_id = FIRST_NEW_LABEL_ID.max(max_id + 1);
        registry
    }

    /// Distinct known ids
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn next_id(&self) -> i64 {
        self.next_id
    }

    pub fn lookup(&self, label: &str) -> Option<&KnownLabel> {
        self.by_name.get(&label.trim().to_lowercase())
    }

    /// Canonical label and id for `label`, registering it under a new id
    /// when unknown. Lookup is case-insensitive.
    pub fn resolve(&mut self, label: &str) -> KnownLabel {
        let label = label.trim();
        if let Some(known) = self.lookup(label) {
            return known.clone();
        }
        let known = KnownLabel {
            id: self.next_id,
            canonical_name: label.to_string(),
        };
        self.next_id += 1;
        self.by_name.insert(label.to_lowercase(), known.clone());
        self.by_id.insert(known.id, known.canonical_name.clone());
        tracing::info!("assigning new id {} to label '{}'", known.id, known.canonical_name);
        known
    }
}
