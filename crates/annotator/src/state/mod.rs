//! Viewer session: scene data, caches, selection and visuals of one
//! annotation session, passed explicitly to every operation.

pub mod annotations;
pub mod feedback;
pub mod form;
pub mod selection;
pub mod settings;

use glam::{Vec2, Vec3};
use shared::{RegionMap, SaveAnnotationRequest, SaveAnnotationResponse, SavedAnnotation};

use crate::assets::details::InstanceDetailTable;
use crate::assets::face_map::{instance_key, FaceInstanceIndex};
use crate::error::{InitError, LoadError, SaveError};
use crate::net::loader::SceneBundle;
use crate::viewport::camera::{Camera, ViewportRect};
use crate::viewport::highlight::{extract_highlight, HighlightStyle};
use crate::viewport::mesh::MeshNode;
use crate::viewport::picking::{pick, resolve_face, PickResult};
use crate::viewport::scene_graph::SceneGraph;
use crate::viewport::visuals::{RedisplayReport, VisualLifecycleManager};

pub use annotations::SavedAnnotationsCache;
pub use feedback::{Feedback, FeedbackLog};
pub use form::{AnnotationForm, RegionChoice, RegionChoices};
pub use selection::{AnnotationPhase, InFlightSave, PendingSelection, SelectedInstance, SelectionState};
pub use settings::AnnotatorSettings;

/// Scene data installed by a completed load
pub struct LoadedScene {
    pub scene_id: String,
    pub root: MeshNode,
    pub faces: FaceInstanceIndex,
    pub details: InstanceDetailTable,
}

pub struct ViewerSession<G: SceneGraph> {
    pub settings: AnnotatorSettings,
    pub camera: Camera,
    graph: G,
    viewport: ViewportRect,
    scene: Option<LoadedScene>,
    /// Scene id of the load in progress
    loading: Option<String>,
    saved: SavedAnnotationsCache,
    visuals: VisualLifecycleManager,
    selection: SelectionState,
    regions: RegionChoices,
    pub form: AnnotationForm,
    feedback: FeedbackLog,
    highlight_style: HighlightStyle,
}

impl<G: SceneGraph> ViewerSession<G> {
    /// Fails when the viewport cannot be drawn into; the session is unusable then.
    pub fn new(settings: AnnotatorSettings, graph: G, viewport: ViewportRect) -> Result<Self, InitError> {
        viewport.validate()?;
        let visuals = VisualLifecycleManager::new(
            settings.palette.visual_palette(),
            settings.max_persistent_markers,
        );
        let highlight_style = settings.palette.highlight_style();
        Ok(Self {
            settings,
            camera: Camera::default(),
            graph,
            viewport,
            scene: None,
            loading: None,
            saved: SavedAnnotationsCache::default(),
            visuals,
            selection: SelectionState::default(),
            regions: RegionChoices::default(),
            form: AnnotationForm::default(),
            feedback: FeedbackLog::default(),
            highlight_style,
        })
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn graph(&self) -> &G {
        &self.graph
    }

    pub fn viewport(&self) -> ViewportRect {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: ViewportRect) -> Result<(), InitError> {
        viewport.validate()?;
        self.viewport = viewport;
        Ok(())
    }

    pub fn scene(&self) -> Option<&LoadedScene> {
        self.scene.as_ref()
    }

    pub fn scene_id(&self) -> Option<&str> {
        self.scene.as_ref().map(|s| s.scene_id.as_str())
    }

    pub fn loading(&self) -> Option<&str> {
        self.loading.as_deref()
    }

    pub fn saved(&self) -> &SavedAnnotationsCache {
        &self.saved
    }

    pub fn visuals(&self) -> &VisualLifecycleManager {
        &self.visuals
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn phase(&self) -> AnnotationPhase {
        self.selection.phase()
    }

    pub fn regions(&self) -> &RegionChoices {
        &self.regions
    }

    pub fn feedback(&self) -> &FeedbackLog {
        &self.feedback
    }

    pub fn drain_feedback(&mut self) -> Vec<Feedback> {
        self.feedback.drain()
    }

    pub fn push_feedback(&mut self, feedback: Feedback) {
        self.feedback.push(feedback);
    }

    /// Picking and extraction need a fully installed scene and no load running
    pub fn is_ready(&self) -> bool {
        self.scene.is_some() && self.loading.is_none()
    }

    pub fn set_regions(&mut self, regions: &RegionMap) {
        self.regions = RegionChoices::from_map(regions);
        tracing::info!("region dropdown: {} regions", self.regions.len());
    }

    // ── Scene lifecycle ───────────────────────────────────────

    /// Clear the current scene and mark `scene_id` as loading
    pub fn begin_scene_load(&mut self, scene_id: &str) {
        self.clear_scene();
        self.loading = Some(scene_id.to_string());
        self.feedback.push(Feedback::Loading(format!("Loading scene {}...", scene_id)));
    }

    /// Install a loaded scene. Bundles for a scene other than the one being
    /// loaded are ignored and `None` is returned.
    pub fn finish_scene_load(&mut self, bundle: SceneBundle) -> Option<RedisplayReport> {
        if self.loading.as_deref() != Some(bundle.scene_id.as_str()) {
            tracing::warn!("ignoring bundle for scene {} (not loading)", bundle.scene_id);
            return None;
        }
        self.loading = None;

        if let Some(bounds) = bundle.root.world_bounds() {
            self.camera.fit_to_bounds(&bounds, self.settings.camera_fit_offset);
        }
        self.saved.replace_all(bundle.existing_annotations);
        let report = self.visuals.bulk_redisplay(&mut self.graph, self.saved.as_map());

        tracing::info!(
            "scene {} ready: {} faces, {} saved annotations",
            bundle.scene_id,
            bundle.faces.len(),
            self.saved.len()
        );
        self.feedback.push(Feedback::SceneReady(format!(
            "Scene {} loaded ({} annotations)",
            bundle.scene_id,
            self.saved.len()
        )));
        self.scene = Some(LoadedScene {
            scene_id: bundle.scene_id,
            root: bundle.root,
            faces: bundle.faces,
            details: bundle.details,
        });
        Some(report)
    }

    /// Drop partial state of a failed load and report the error
    pub fn fail_scene_load(&mut self, error: &LoadError) {
        let scene_id = self.loading.clone().unwrap_or_default();
        self.clear_scene();
        self.feedback
            .push(Feedback::LoadFailed(format!("Failed to load scene {}: {}", scene_id, error)));
    }

    /// Abandon a load in progress; leaves the session as if it never started
    pub fn cancel_scene_load(&mut self) {
        if self.loading.is_some() {
            self.clear_scene();
        }
    }

    /// Dispose every visual and forget scene data, caches and selection
    pub fn clear_scene(&mut self) {
        self.visuals.dispose_all(&mut self.graph);
        self.scene = None;
        self.loading = None;
        self.saved.clear();
        self.selection.clear();
        self.form = AnnotationForm::default();
        tracing::debug!("scene cleared");
    }

    // ── Picking ───────────────────────────────────────────────

    /// Handle a click at page coordinates. `None` when the scene is not ready.
    pub fn handle_click(&mut self, screen: Vec2) -> Option<PickResult> {
        let scene = self.ready_scene()?;
        let result = pick(screen, &self.viewport, &self.camera, &scene.root, &scene.faces, &scene.details);
        self.apply_pick(&result);
        Some(result)
    }

    /// Handle a hit already resolved to a face, bypassing the raycast
    pub fn handle_face_hit(&mut self, face_index: usize, point: Vec3) -> Option<PickResult> {
        let scene = self.ready_scene()?;
        let result = resolve_face(face_index, point, &scene.faces, &scene.details);
        self.apply_pick(&result);
        Some(result)
    }

    fn ready_scene(&self) -> Option<&LoadedScene> {
        if !self.is_ready() {
            tracing::warn!("input ignored: scene not ready");
            return None;
        }
        self.scene.as_ref()
    }

    fn apply_pick(&mut self, result: &PickResult) {
        match result {
            PickResult::Miss => {
                if self.selection.pending.is_some() {
                    self.dismiss_pending();
                }
            }
            PickResult::InvalidFaceIndex { .. } | PickResult::UnmappedFace { .. } => {
                if let Some(err) = result.error() {
                    tracing::warn!("pick failed: {}", err);
                    self.feedback.push(Feedback::PickError(err.to_string()));
                }
                self.dismiss_pending();
                self.visuals.clear_highlight(&mut self.graph);
            }
            PickResult::Hit(hit) => {
                self.visuals.set_temporary_marker(&mut self.graph, hit.point);
                self.visuals.clear_highlight(&mut self.graph);
                let existing = self.saved.get(&instance_key(hit.instance_id)).cloned();
                let pending = PendingSelection::from_hit(hit, existing);
                tracing::info!(
                    "picked instance {} ({}){}",
                    pending.instance_id,
                    pending.detail.label,
                    if pending.already_annotated() { ", already annotated" } else { "" }
                );
                self.selection.pending = Some(pending);
                self.selection.editing = false;
            }
        }
    }

    fn dismiss_pending(&mut self) {
        if self.selection.pending.take().is_some() {
            self.visuals.clear_temporary_marker(&mut self.graph);
        }
    }

    /// Close the confirmation prompt without selecting
    pub fn cancel_pending(&mut self) {
        self.dismiss_pending();
    }

    // ── Confirm ───────────────────────────────────────────────

    /// Turn the pending selection into the selected instance, pre-fill the
    /// form and highlight the instance's faces.
    pub fn confirm_pending(&mut self) -> Option<&SelectedInstance> {
        let pending = self.selection.pending.take()?;
        let key = pending.key();

        let (label, query) = match self.saved.get(&key) {
            Some(saved) => (saved.final_label.clone(), saved.query.clone()),
            None => (pending.detail.label.clone(), String::new()),
        };
        let mut form = AnnotationForm::new(label, query);
        form.select_region(&self.regions, &pending.detail.region_label);
        self.form = form;

        let mut selected = SelectedInstance::from(pending);
        self.visuals.clear_highlight(&mut self.graph);
        if let Some(scene) = self.scene.as_ref() {
            match extract_highlight(selected.instance_id, &scene.root, &scene.faces, self.highlight_style) {
                Ok(Some(highlight)) => {
                    selected.bounding_box = Some(highlight.bounding_box);
                    self.visuals
                        .set_highlight(&mut self.graph, highlight.geometry, Some(highlight.bounding_box));
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("highlight for instance {} unavailable: {}", key, e),
            }
        }
        tracing::info!("selected instance {}", key);

        self.selection.selected = Some(selected);
        self.selection.editing = true;
        self.selection.selected.as_ref()
    }

    // ── Save ──────────────────────────────────────────────────

    pub fn can_save(&self) -> bool {
        self.phase() == AnnotationPhase::Selected
    }

    /// Validate the form and build the save payload. Nothing is sent on error.
    pub fn begin_save(&mut self) -> Result<SaveAnnotationRequest, SaveError> {
        let result = self.prepare_save();
        match &result {
            Ok(request) => self.feedback.push(Feedback::Saving(format!(
                "Saving annotation for instance {}...",
                request.instance_id
            ))),
            Err(e) => self.feedback.push(Feedback::SaveFailed(e.to_string())),
        }
        result
    }

    fn prepare_save(&mut self) -> Result<SaveAnnotationRequest, SaveError> {
        let scene_id = self.scene_id().ok_or(SaveError::NoScene)?.to_string();
        let selected = match &self.selection.selected {
            Some(sel) if self.selection.editing => sel,
            _ => return Err(SaveError::NoSelection),
        };
        let (label, query) = self.form.validated()?;
        let key = selected.key();
        if self.selection.is_saving(&key) {
            return Err(SaveError::InFlight(key));
        }
        let (region_label, region_code) = self.form.resolve_region(&selected.detail);
        let bounding_box = selected.bounding_box;

        let request = SaveAnnotationRequest {
            scene_id: scene_id.clone(),
            instance_id: key.clone(),
            original_category_id: selected.detail.category_id.clone(),
            final_label_string: label.clone(),
            query: query.clone(),
            bounding_box,
            final_region_label: region_label,
            final_region_code: region_code,
        };
        self.selection.mark_in_flight(
            key,
            InFlightSave {
                scene_id,
                label,
                query,
                bounding_box,
            },
        );
        Ok(request)
    }

    /// Apply the backend's answer to a save started with [`Self::begin_save`].
    ///
    /// On success the cache takes the label the backend echoed. If the
    /// instance is still the open selection its temporary visuals are
    /// promoted and the highlight cleared; otherwise persistent visuals are
    /// drawn from the saved box. On failure nothing is committed.
    pub fn complete_save(
        &mut self,
        key: &str,
        result: Result<SaveAnnotationResponse, SaveError>,
    ) -> Result<SavedAnnotation, SaveError> {
        let Some(in_flight) = self.selection.take_in_flight(key) else {
            tracing::warn!("save result for {} without a save in flight", key);
            return Err(SaveError::NoSelection);
        };
        if self.scene_id() != Some(in_flight.scene_id.as_str()) {
            tracing::warn!("dropping save result for {} from scene {}", key, in_flight.scene_id);
            return Err(SaveError::NoScene);
        }

        let response = result.and_then(|r| {
            if r.is_success() {
                Ok(r)
            } else {
                Err(SaveError::Rejected(r.message.unwrap_or_else(|| "Save failed.".to_string())))
            }
        });
        let response = match response {
            Ok(r) => r,
            Err(e) => {
                tracing::error!("saving annotation for {} failed: {}", key, e);
                self.feedback.push(Feedback::SaveFailed(format!("Save failed: {}", e)));
                return Err(e);
            }
        };

        let final_label = response.saved_label.clone().unwrap_or(in_flight.label);
        let annotation = SavedAnnotation::new(final_label.clone(), in_flight.query, in_flight.bounding_box);

        let promote = self.selection.editing && self.selection.pending.is_none() && self.selection.is_selected(key);
        if promote {
            self.visuals.promote_temporary_to_persistent(&mut self.graph, key);
            self.visuals.clear_highlight(&mut self.graph);
        } else {
            self.visuals.add_persistent(&mut self.graph, key, in_flight.bounding_box);
        }
        self.saved.record(key, annotation.clone());

        tracing::info!("saved annotation for {} as '{}'", key, final_label);
        self.feedback
            .push(Feedback::SaveOk(format!("Saved! Label: '{}'", final_label)));
        Ok(annotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::viewport::scene_graph::HeadlessScene;

    fn session() -> ViewerSession<HeadlessScene> {
        let mut s = fixtures::headless_session();
        s.begin_scene_load("S1");
        s.finish_scene_load(fixtures::strip_bundle("S1")).unwrap();
        s.drain_feedback();
        s
    }

    #[test]
    fn test_zero_viewport_is_init_error() {
        let err = ViewerSession::new(AnnotatorSettings::default(), HeadlessScene::new(), ViewportRect::sized(0.0, 10.0));
        assert!(matches!(err, Err(InitError::InvalidViewport { .. })));
    }

    #[test]
    fn test_input_rejected_until_ready() {
        let mut s = fixtures::headless_session();
        assert!(s.handle_face_hit(0, Vec3::ZERO).is_none());
        s.begin_scene_load("S1");
        assert!(s.handle_face_hit(0, Vec3::ZERO).is_none());
    }

    #[test]
    fn test_stale_bundle_ignored() {
        let mut s = fixtures::headless_session();
        s.begin_scene_load("S2");
        assert!(s.finish_scene_load(fixtures::strip_bundle("S1")).is_none());
        assert!(!s.is_ready());
    }

    #[test]
    fn test_hit_creates_pending_and_marker() {
        let mut s = session();
        let result = s.handle_face_hit(4, Vec3::new(4.5, 0.3, 0.0)).unwrap();
        assert_eq!(result.hit().unwrap().instance_id, 1);
        assert_eq!(s.phase(), AnnotationPhase::Pending);
        let marker = s.visuals().temporary_marker().unwrap();
        assert!(s.graph().is_live(marker));
    }

    #[test]
    fn test_new_hit_replaces_pending() {
        let mut s = session();
        s.handle_face_hit(0, Vec3::ZERO);
        s.handle_face_hit(8, Vec3::ZERO);
        assert_eq!(s.selection().pending.as_ref().unwrap().instance_id, 2);
        assert_eq!(s.graph().count_where(|v| v.kind.is_marker()), 1);
    }

    #[test]
    fn test_miss_dismisses_pending() {
        let mut s = session();
        s.handle_face_hit(0, Vec3::ZERO);
        s.apply_pick(&PickResult::Miss);
        assert_eq!(s.phase(), AnnotationPhase::Idle);
        assert!(s.visuals().temporary_marker().is_none());
    }

    #[test]
    fn test_pick_errors_reset_to_idle() {
        let mut s = session();
        s.handle_face_hit(0, Vec3::ZERO);
        let result = s.handle_face_hit(5, Vec3::ZERO).unwrap();
        assert!(matches!(result, PickResult::UnmappedFace { instance_id: -1, .. }));
        assert_eq!(s.phase(), AnnotationPhase::Idle);
        assert!(matches!(s.feedback().last(), Some(Feedback::PickError(_))));

        let result = s.handle_face_hit(99, Vec3::ZERO).unwrap();
        assert!(matches!(result, PickResult::InvalidFaceIndex { face_index: 99, face_count: 10 }));
    }

    #[test]
    fn test_confirm_prefills_from_detail() {
        let mut s = session();
        s.handle_face_hit(4, Vec3::ZERO);
        let selected = s.confirm_pending().unwrap().clone();
        assert_eq!(selected.instance_id, 1);
        assert_eq!(s.form.label, "table");
        assert_eq!(s.form.query, "");
        let bbox = selected.bounding_box.unwrap();
        assert_eq!(bbox.min.x, 2.0);
        assert_eq!(bbox.max.x, 5.0);
        assert!(s.visuals().highlight().is_some());
        assert!(s.visuals().temporary_outline().is_some());
        assert_eq!(s.phase(), AnnotationPhase::Selected);
    }

    #[test]
    fn test_confirm_prefers_saved_annotation() {
        let mut s = fixtures::headless_session();
        s.begin_scene_load("S1");
        let mut bundle = fixtures::strip_bundle("S1");
        bundle
            .existing_annotations
            .insert("2".into(), SavedAnnotation::new("desk lamp", "the lamp on the desk", None));
        s.finish_scene_load(bundle);

        s.handle_face_hit(7, Vec3::ZERO);
        assert!(s.selection().pending.as_ref().unwrap().already_annotated());
        s.confirm_pending();
        assert_eq!(s.form.label, "desk lamp");
        assert_eq!(s.form.query, "the lamp on the desk");
    }

    #[test]
    fn test_save_validation_sends_nothing() {
        let mut s = session();
        s.handle_face_hit(4, Vec3::ZERO);
        s.confirm_pending();
        s.form.label = "".into();
        s.form.query = "non-empty".into();
        assert_eq!(s.begin_save(), Err(SaveError::EmptyLabel));
        s.form.label = "table".into();
        s.form.query = "".into();
        assert_eq!(s.begin_save(), Err(SaveError::EmptyQuery));
        assert_eq!(s.selection().in_flight_count(), 0);
    }

    #[test]
    fn test_duplicate_save_blocked() {
        let mut s = session();
        s.handle_face_hit(4, Vec3::ZERO);
        s.confirm_pending();
        s.form.query = "q".into();
        assert!(s.begin_save().is_ok());
        assert_eq!(s.phase(), AnnotationPhase::Saving);
        assert!(!s.can_save());
        assert_eq!(s.begin_save(), Err(SaveError::InFlight("1".into())));
    }

    #[test]
    fn test_failed_save_commits_nothing() {
        let mut s = session();
        s.handle_face_hit(4, Vec3::ZERO);
        s.confirm_pending();
        s.form.query = "q".into();
        s.begin_save().unwrap();
        let before = s.selection().selected.clone();
        let err = s.complete_save("1", Err(SaveError::Network("connection reset".into())));
        assert!(err.is_err());
        assert!(!s.saved().contains("1"));
        assert_eq!(s.selection().selected, before);
        assert!(s.can_save());
        assert!(s.visuals().temporary_marker().is_some());
    }

    #[test]
    fn test_rejected_status_is_failure() {
        let mut s = session();
        s.handle_face_hit(4, Vec3::ZERO);
        s.confirm_pending();
        s.form.query = "q".into();
        s.begin_save().unwrap();
        let response = SaveAnnotationResponse {
            status: "error".into(),
            message: Some("disk full".into()),
            ..Default::default()
        };
        assert_eq!(
            s.complete_save("1", Ok(response)),
            Err(SaveError::Rejected("disk full".into()))
        );
        assert!(!s.saved().contains("1"));
    }

    #[test]
    fn test_save_after_switching_selection_draws_from_box() {
        let mut s = session();
        s.handle_face_hit(4, Vec3::ZERO);
        s.confirm_pending();
        s.form.query = "q".into();
        s.begin_save().unwrap();

        // new pick while the save is in flight
        s.handle_face_hit(8, Vec3::ONE);
        let pending_marker = s.visuals().temporary_marker().unwrap();
        s.complete_save("1", Ok(fixtures::save_ok("table"))).unwrap();

        assert_eq!(s.visuals().temporary_marker(), Some(pending_marker));
        assert!(s.visuals().persistent("1").unwrap().is_live());
        assert_eq!(s.saved().get("1").unwrap().final_label, "table");
    }

    #[test]
    fn test_save_without_echo_keeps_sent_label() {
        let mut s = session();
        s.handle_face_hit(4, Vec3::ZERO);
        s.confirm_pending();
        s.form.label = "dining table".into();
        s.form.query = "q".into();
        s.begin_save().unwrap();

        s.handle_face_hit(8, Vec3::ONE);
        s.confirm_pending();
        s.form.label = "lamp".into();
        let response = SaveAnnotationResponse {
            saved_label: None,
            ..fixtures::save_ok("unused")
        };
        s.complete_save("1", Ok(response)).unwrap();

        assert_eq!(s.saved().get("1").unwrap().final_label, "dining table");
        assert_eq!(s.form.label, "lamp");
        assert!(!s.saved().contains("2"));
    }

    #[test]
    fn test_clear_scene_disposes_everything() {
        let mut s = session();
        s.handle_face_hit(4, Vec3::ZERO);
        s.confirm_pending();
        s.clear_scene();
        assert_eq!(s.graph().live_count(), 0);
        assert_eq!(s.graph().stale_removals(), 0);
        assert!(!s.is_ready());
        assert_eq!(s.phase(), AnnotationPhase::Idle);
    }
}
