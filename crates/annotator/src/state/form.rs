//! Region dropdown and the label/query edit form.

use shared::{RegionMap, REGION_PLACEHOLDER};

use crate::assets::details::InstanceDetail;
use crate::error::SaveError;

pub const NO_REGIONS_PLACEHOLDER: &str = "-- No Regions Available --";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionChoice {
    pub code: String,
    pub label: String,
}

/// Selectable regions, sorted by label
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegionChoices {
    choices: Vec<RegionChoice>,
}

impl RegionChoices {
    /// Build the dropdown from the backend table, dropping the default code
    /// and placeholder labels.
    pub fn from_map(regions: &RegionMap) -> Self {
        let mut choices: Vec<RegionChoice> = regions
            .iter()
            .filter(|(code, label)| {
                code.as_str() != "-"
                    && label.as_str() != "no label"
                    && label.as_str() != "junk"
                    && !label.starts_with("Unknown Code")
            })
            .map(|(code, label)| RegionChoice {
                code: code.clone(),
                label: label.clone(),
            })
            .collect();
        choices.sort_by(|a, b| {
            a.label
                .to_lowercase()
                .cmp(&b.label.to_lowercase())
                .then_with(|| a.label.cmp(&b.label))
        });
        Self { choices }
    }

    /// Dropdown disabled when empty
    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.choices.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegionChoice> {
        self.choices.iter()
    }

    pub fn by_label(&self, label: &str) -> Option<&RegionChoice> {
        self.choices.iter().find(|c| c.label == label)
    }

    pub fn placeholder(&self) -> &'static str {
        if self.is_empty() {
            NO_REGIONS_PLACEHOLDER
        } else {
            REGION_PLACEHOLDER
        }
    }
}

/// Contents of the edit form
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnnotationForm {
    pub label: String,
    pub query: String,
    /// `None` is the placeholder entry
    pub region: Option<RegionChoice>,
}

impl AnnotationForm {
    pub fn new(label: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            query: query.into(),
            region: None,
        }
    }

    /// Select a dropdown entry by label; unknown labels reset to the placeholder
    pub fn select_region(&mut self, choices: &RegionChoices, label: &str) -> bool {
        self.region = choices.by_label(label).cloned();
        self.region.is_some()
    }

    /// Trimmed label and query, both required
    pub fn validated(&self) -> Result<(String, String), SaveError> {
        let label = self.label.trim();
        if label.is_empty() {
            return Err(SaveError::EmptyLabel);
        }
        let query = self.query.trim();
        if query.is_empty() {
            return Err(SaveError::EmptyQuery);
        }
        Ok((label.to_string(), query.to_string()))
    }

    /// Region label and code to save: the dropdown choice, or the instance's
    /// original region when nothing is selected.
    pub fn resolve_region(&self, original: &InstanceDetail) -> (String, String) {
        match &self.region {
            Some(choice) => (choice.label.clone(), choice.code.clone()),
            None => {
                tracing::warn!(
                    "no region selected, using original {} ({})",
                    original.region_label,
                    original.region_code
                );
                (original.region_label.clone(), original.region_code.clone())
            }
        }
    }
}
