use std::collections::HashMap;

use glam::Vec3;
use shared::{BoundingBox, SavedAnnotation};

use crate::assets::details::InstanceDetail;
use crate::assets::face_map::{instance_key, InstanceId};
use crate::viewport::picking::PickHit;

/// A just-clicked instance waiting for confirmation
#[derive(Clone, Debug, PartialEq)]
pub struct PendingSelection {
    pub instance_id: InstanceId,
    pub face_index: usize,
    /// World-space click point
    pub point: Vec3,
    pub detail: InstanceDetail,
    /// Saved annotation for this instance, if any
    pub existing: Option<SavedAnnotation>,
}

impl PendingSelection {
    pub fn from_hit(hit: &PickHit, existing: Option<SavedAnnotation>) -> Self {
        Self {
            instance_id: hit.instance_id,
            face_index: hit.face_index,
            point: hit.point,
            detail: hit.detail.clone(),
            existing,
        }
    }

    pub fn key(&self) -> String {
        instance_key(self.instance_id)
    }

    pub fn already_annotated(&self) -> bool {
        self.existing.is_some()
    }
}

/// The confirmed instance being edited
#[derive(Clone, Debug, PartialEq)]
pub struct SelectedInstance {
    pub instance_id: InstanceId,
    pub detail: InstanceDetail,
    /// Filled in by highlight extraction; stays `None` when no faces matched
    pub bounding_box: Option<BoundingBox>,
}

impl SelectedInstance {
    pub fn key(&self) -> String {
        instance_key(self.instance_id)
    }
}

impl From<PendingSelection> for SelectedInstance {
    fn from(p: PendingSelection) -> Self {
        Self {
            instance_id: p.instance_id,
            detail: p.detail,
            bounding_box: None,
        }
    }
}

/// Where the confirm/edit/save workflow currently is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnnotationPhase {
    Idle,
    /// Confirmation prompt open
    Pending,
    /// Edit form open
    Selected,
    /// Edit form open, save for the selected instance in flight
    Saving,
}

/// Save request sent and not yet answered
#[derive(Clone, Debug, PartialEq)]
pub struct InFlightSave {
    pub scene_id: String,
    /// Validated label as sent
    pub label: String,
    pub query: String,
    pub bounding_box: Option<BoundingBox>,
}

/// Pending + selected instance and the saves in flight
#[derive(Default, Debug)]
pub struct SelectionState {
    pub pending: Option<PendingSelection>,
    pub selected: Option<SelectedInstance>,
    /// Edit form visible; a new pick closes it while `selected` survives
    pub editing: bool,
    in_flight: HashMap<String, InFlightSave>,
}

impl SelectionState {
    pub fn phase(&self) -> AnnotationPhase {
        if self.pending.is_some() {
            return AnnotationPhase::Pending;
        }
        match &self.selected {
            Some(sel) if self.editing && self.in_flight.contains_key(&sel.key()) => AnnotationPhase::Saving,
            Some(_) if self.editing => AnnotationPhase::Selected,
            _ => AnnotationPhase::Idle,
        }
    }

    pub fn selected_key(&self) -> Option<String> {
        self.selected.as_ref().map(SelectedInstance::key)
    }

    pub fn is_selected(&self, key: &str) -> bool {
        self.selected.as_ref().is_some_and(|s| s.key() == key)
    }

    pub fn is_saving(&self, key: &str) -> bool {
        self.in_flight.contains_key(key)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub(crate) fn mark_in_flight(&mut self, key: String, save: InFlightSave) {
        self.in_flight.insert(key, save);
    }

    pub(crate) fn take_in_flight(&mut self, key: &str) -> Option<InFlightSave> {
        self.in_flight.remove(key)
    }

    /// Drop everything, including in-flight bookkeeping
    pub fn clear(&mut self) {
        self.pending = None;
        self.selected = None;
        self.editing = false;
        self.in_flight.clear();
    }
}
