//! Headless test harness: a [`ViewerSession`] over an in-memory scene graph,
//! plus an in-memory backend for driving loads and saves without a server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use glam::{Vec2, Vec3};
use shared::{
    LoadSceneResponse, RegionMap, SaveAnnotationRequest, SaveAnnotationResponse, SavedAnnotationMap,
    STATUS_SUCCESS,
};

use crate::error::{LoadError, SaveError};
use crate::fixtures;
use crate::net::{AnnotationBackend, DetailRecords};
use crate::state::{AnnotationPhase, AnnotatorSettings, ViewerSession};
use crate::viewport::camera::Camera;
use crate::viewport::picking::PickResult;
use crate::viewport::scene_graph::HeadlessScene;
use crate::viewport::visuals::RedisplayReport;

/// One session over one headless scene graph
pub struct TestHarness {
    pub session: ViewerSession<HeadlessScene>,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            session: fixtures::headless_session(),
        }
    }

    pub fn with_settings(settings: AnnotatorSettings) -> Self {
        Self {
            session: fixtures::headless_session_with(settings),
        }
    }

    // ── Scene ─────────────────────────────────────────────────

    /// Load the ten-face strip with the given saved annotations
    pub fn load_strip_scene(&mut self, scene_id: &str, saved: SavedAnnotationMap) -> RedisplayReport {
        let mut bundle = fixtures::strip_bundle(scene_id);
        bundle.existing_annotations = saved;
        self.session.begin_scene_load(scene_id);
        self.session.finish_scene_load(bundle).unwrap_or_default()
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.session.camera = camera;
    }

    pub fn clear(&mut self) {
        self.session.clear_scene();
    }

    // ── Interaction ───────────────────────────────────────────

    /// Synthetic hit on a face, at the face's first corner
    pub fn click_face(&mut self, face_index: usize) -> Option<PickResult> {
        self.session.handle_face_hit(face_index, Vec3::new(face_index as f32, 0.0, 0.0))
    }

    pub fn click_screen(&mut self, x: f32, y: f32) -> Option<PickResult> {
        self.session.handle_click(Vec2::new(x, y))
    }

    pub fn confirm(&mut self) -> bool {
        self.session.confirm_pending().is_some()
    }

    pub fn cancel(&mut self) {
        self.session.cancel_pending();
    }

    pub fn fill(&mut self, label: &str, query: &str) {
        self.session.form.label = label.to_string();
        self.session.form.query = query.to_string();
    }

    /// Start a save and answer it with `response`
    pub fn save_with(
        &mut self,
        response: Result<SaveAnnotationResponse, SaveError>,
    ) -> Result<SaveAnnotationRequest, SaveError> {
        let request = self.session.begin_save()?;
        self.session.complete_save(&request.instance_id, response)?;
        Ok(request)
    }

    /// Start a save that the backend accepts, echoing the label
    pub fn save_ok(&mut self) -> Result<SaveAnnotationRequest, SaveError> {
        let request = self.session.begin_save()?;
        let response = fixtures::save_ok(&request.final_label_string);
        self.session.complete_save(&request.instance_id, Ok(response))?;
        Ok(request)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn phase(&self) -> AnnotationPhase {
        self.session.phase()
    }

    pub fn graph(&self) -> &HeadlessScene {
        self.session.graph()
    }

    pub fn live_markers(&self) -> usize {
        self.graph().count_where(|v| v.kind.is_marker())
    }

    pub fn live_outlines(&self) -> usize {
        self.graph().count_where(|v| v.kind.is_outline())
    }

    pub fn live_highlights(&self) -> usize {
        self.graph().count_where(|v| v.kind.is_highlight())
    }

    /// Every created visual was released, and none twice
    pub fn all_released(&self) -> bool {
        self.graph().live_count() == 0
            && self.graph().released_count() == self.graph().created_count()
            && self.graph().stale_removals() == 0
    }
}

/// One scene as served by [`MemoryBackend`]
#[derive(Clone, Debug, Default)]
pub struct MemoryScene {
    pub glb: Vec<u8>,
    pub details: DetailRecords,
    pub face_map: Vec<u8>,
    pub annotations: SavedAnnotationMap,
}

impl MemoryScene {
    pub fn strip() -> Self {
        Self {
            glb: fixtures::strip_glb(),
            details: fixtures::strip_detail_records(),
            face_map: fixtures::strip_face_map_bytes(),
            annotations: SavedAnnotationMap::new(),
        }
    }
}

/// In-memory [`AnnotationBackend`] with an optional per-asset delay
#[derive(Default)]
pub struct MemoryBackend {
    scenes: HashMap<String, MemoryScene>,
    regions: RegionMap,
    delay: Duration,
    reject_saves: AtomicBool,
    saves: Mutex<Vec<SaveAnnotationRequest>>,
    asset_requests: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scene(mut self, scene_id: &str, scene: MemoryScene) -> Self {
        self.scenes.insert(scene_id.to_string(), scene);
        self
    }

    pub fn with_regions(mut self, regions: RegionMap) -> Self {
        self.regions = regions;
        self
    }

    /// Delay every asset fetch, to keep loads in flight
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn set_reject_saves(&self, reject: bool) {
        self.reject_saves.store(reject, Ordering::SeqCst);
    }

    pub fn saves(&self) -> Vec<SaveAnnotationRequest> {
        self.saves.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn asset_requests(&self) -> usize {
        self.asset_requests.load(Ordering::SeqCst)
    }

    /// Scene owning a `/temp_files/{scene}_{suffix}` url
    fn scene_for(&self, url: &str, suffix: &str) -> Result<&MemoryScene, LoadError> {
        let name = url.rsplit('/').next().unwrap_or(url);
        if let Some(scene) = name.strip_suffix(suffix).and_then(|id| self.scenes.get(id)) {
            return Ok(scene);
        }
        Err(LoadError::Status {
            status: 404,
            message: format!("File not found: {}", name),
        })
    }

    async fn delayed(&self) {
        self.asset_requests.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

impl AnnotationBackend for MemoryBackend {
    async fn list_scenes(&self) -> Result<Vec<String>, LoadError> {
        let mut ids: Vec<String> = self.scenes.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn get_regions(&self) -> Result<RegionMap, LoadError> {
        Ok(self.regions.clone())
    }

    async fn load_scene(&self, scene_id: &str) -> Result<LoadSceneResponse, LoadError> {
        let scene = self.scenes.get(scene_id).ok_or_else(|| LoadError::Status {
            status: 404,
            message: format!("Preprocessed files not found for scene {}", scene_id),
        })?;
        Ok(LoadSceneResponse {
            status: STATUS_SUCCESS.to_string(),
            glb_url: Some(format!("/temp_files/{}_mesh.glb", scene_id)),
            details_url: Some(format!("/temp_files/{}_details.json", scene_id)),
            face_map_url: Some(format!("/temp_files/{}_face_map.bin", scene_id)),
            existing_annotations: Some(scene.annotations.clone()),
            message: None,
        })
    }

    async fn fetch_asset(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        self.delayed().await;
        Ok(self.scene_for(url, "_mesh.glb")?.glb.clone())
    }

    async fn fetch_details(&self, url: &str) -> Result<DetailRecords, LoadError> {
        self.delayed().await;
        Ok(self.scene_for(url, "_details.json")?.details.clone())
    }

    async fn fetch_face_map(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        self.delayed().await;
        Ok(self.scene_for(url, "_face_map.bin")?.face_map.clone())
    }

    async fn save_annotation(&self, request: &SaveAnnotationRequest) -> Result<SaveAnnotationResponse, SaveError> {
        if let Ok(mut saves) = self.saves.lock() {
            saves.push(request.clone());
        }
        if self.reject_saves.load(Ordering::SeqCst) {
            return Ok(SaveAnnotationResponse {
                status: "error".to_string(),
                message: Some("Save rejected".to_string()),
                ..Default::default()
            });
        }
        Ok(fixtures::save_ok(&request.final_label_string))
    }
}
