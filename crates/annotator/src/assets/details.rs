//! Instance id → semantic metadata.

use std::collections::{BTreeMap, HashMap};

use shared::{CategoryId, InstanceDetailRecord, DEFAULT_REGION_CODE, DEFAULT_REGION_LABEL};

use super::face_map::InstanceId;
use crate::error::LoadError;

/// Metadata of one instance with region defaults applied
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceDetail {
    pub label: String,
    pub category_id: CategoryId,
    pub region_label: String,
    pub region_code: String,
}

impl From<InstanceDetailRecord> for InstanceDetail {
    fn from(r: InstanceDetailRecord) -> Self {
        Self {
            label: r.label,
            category_id: r.category_id,
            region_label: r
                .region_label
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_REGION_LABEL.to_string()),
            region_code: r
                .region_code
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_REGION_CODE.to_string()),
        }
    }
}

/// Immutable detail table for the lifetime of a loaded scene
#[derive(Debug, Clone, Default)]
pub struct InstanceDetailTable {
    entries: HashMap<InstanceId, InstanceDetail>,
}

impl InstanceDetailTable {
    /// Build from the JSON object keyed by instance id strings.
    /// Keys that are not integers cannot be addressed by the face map and are skipped.
    pub fn from_records(records: BTreeMap<String, InstanceDetailRecord>) -> Self {
        let mut entries = HashMap::with_capacity(records.len());
        for (key, record) in records {
            match key.trim().parse::<InstanceId>() {
                Ok(id) => {
                    entries.insert(id, InstanceDetail::from(record));
                }
                Err(_) => tracing::warn!("skipping instance detail with non-integer key '{key}'"),
            }
        }
        Self { entries }
    }

    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let records: BTreeMap<String, InstanceDetailRecord> = serde_json::from_str(json)
            .map_err(|e| LoadError::Malformed(format!("instance details: {e}")))?;
        Ok(Self::from_records(records))
    }

    pub fn insert(&mut self, id: InstanceId, detail: InstanceDetail) {
        self.entries.insert(id, detail);
    }

    pub fn get(&self, id: InstanceId) -> Option<&InstanceDetail> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_applies_region_defaults() {
        let t = InstanceDetailTable::from_json(
            r#"{"0":{"label":"chair","category_id":5},
                "1":{"label":"table","category_id":7,"region_label":"kitchen","region_code":"k"}}"#,
        )
        .unwrap();
        let chair = t.get(0).unwrap();
        assert_eq!(chair.region_label, "N/A");
        assert_eq!(chair.region_code, "-");
        let table = t.get(1).unwrap();
        assert_eq!(table.region_label, "kitchen");
        assert_eq!(table.region_code, "k");
    }

    #[test]
    fn test_empty_region_strings_fall_back() {
        let t = InstanceDetailTable::from_json(
            r#"{"3":{"label":"lamp","category_id":1,"region_label":"","region_code":""}}"#,
        )
        .unwrap();
        assert_eq!(t.get(3).unwrap().region_label, "N/A");
        assert_eq!(t.get(3).unwrap().region_code, "-");
    }

    #[test]
    fn test_non_integer_keys_skipped() {
        let t = InstanceDetailTable::from_json(
            r#"{"abc":{"label":"x","category_id":1},"2":{"label":"y","category_id":1}}"#,
        )
        .unwrap();
        assert_eq!(t.len(), 1);
        assert!(t.contains(2));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            InstanceDetailTable::from_json("[1,2]"),
            Err(LoadError::Malformed(_))
        ));
    }
}
