//! Visual Lifecycle Manager.
//!
//! Owns every marker, outline and highlight the annotation workflow puts in
//! the scene: at most one temporary click marker, at most one temporary
//! highlight with its outline, and a bounded map of persistent visuals for
//! saved annotations. Every handle dropped from here is removed from the
//! scene graph first; promoted handles change owner and are never removed
//! twice.

use std::collections::{HashMap, VecDeque};

use glam::Vec3;
use shared::{BoundingBox, SavedAnnotationMap};

use super::highlight::HighlightGeometry;
use super::scene_graph::{Rgb, SceneGraph, VisualId, VisualKind};

pub const MAX_PERSISTENT_MARKERS: usize = 200;

const ORDER_OUTLINE: i32 = 1;
const ORDER_HIGHLIGHT: i32 = 1;
const ORDER_MARKER: i32 = 2;
const ORDER_TEMP_OUTLINE: i32 = 2;

/// Colors and sizes of the managed visuals
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisualPalette {
    pub temporary_marker: Rgb,
    pub temporary_outline: Rgb,
    pub persistent_marker: Rgb,
    pub persistent_outline: Rgb,
    pub temporary_marker_radius: f32,
    pub persistent_marker_radius: f32,
}

impl Default for VisualPalette {
    fn default() -> Self {
        Self {
            temporary_marker: [1.0, 0.0, 0.0],
            temporary_outline: [1.0, 0.0, 0.0],
            persistent_marker: [0.0, 0.8, 0.0],
            persistent_outline: [0.0, 0.8, 0.0],
            temporary_marker_radius: 0.03,
            persistent_marker_radius: 0.04,
        }
    }
}

/// Persistent visuals of one saved annotation; both `None` means the
/// annotation is tracked but had nothing valid to draw
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PersistentVisual {
    pub marker: Option<VisualId>,
    pub outline: Option<VisualId>,
}

impl PersistentVisual {
    pub fn is_live(&self) -> bool {
        self.marker.is_some() || self.outline.is_some()
    }
}

/// Counters of one bulk redisplay
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RedisplayReport {
    pub displayed: usize,
    /// Annotations without a drawable box
    pub invalid: usize,
    /// Valid annotations left out once the capacity was reached
    pub over_capacity: Vec<String>,
}

impl RedisplayReport {
    pub fn skipped(&self) -> usize {
        self.invalid + self.over_capacity.len()
    }
}

pub struct VisualLifecycleManager {
    palette: VisualPalette,
    capacity: usize,
    temporary_marker: Option<VisualId>,
    highlight: Option<VisualId>,
    temporary_outline: Option<VisualId>,
    persistent: HashMap<String, PersistentVisual>,
    /// Keys of live persistent entries, oldest first
    live_order: VecDeque<String>,
}

impl Default for VisualLifecycleManager {
    fn default() -> Self {
        Self::new(VisualPalette::default(), MAX_PERSISTENT_MARKERS)
    }
}

impl VisualLifecycleManager {
    /// `capacity` is the live persistent entry bound, never below one
    pub fn new(palette: VisualPalette, capacity: usize) -> Self {
        Self {
            palette,
            capacity: capacity.max(1),
            temporary_marker: None,
            highlight: None,
            temporary_outline: None,
            persistent: HashMap::new(),
            live_order: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn temporary_marker(&self) -> Option<VisualId> {
        self.temporary_marker
    }

    pub fn highlight(&self) -> Option<VisualId> {
        self.highlight
    }

    pub fn temporary_outline(&self) -> Option<VisualId> {
        self.temporary_outline
    }

    pub fn persistent(&self, key: &str) -> Option<&PersistentVisual> {
        self.persistent.get(key)
    }

    /// Annotations processed, drawn or not
    pub fn tracked_count(&self) -> usize {
        self.persistent.len()
    }

    /// Entries holding at least one visual in the scene
    pub fn live_persistent_count(&self) -> usize {
        self.live_order.len()
    }

    // ── Temporary marker ──────────────────────────────────────

    pub fn set_temporary_marker(&mut self, scene: &mut dyn SceneGraph, point: Vec3) -> VisualId {
        self.clear_temporary_marker(scene);
        let id = scene.add_visual(
            VisualKind::Marker {
                center: point,
                radius: self.palette.temporary_marker_radius,
            },
            self.palette.temporary_marker,
            ORDER_MARKER,
        );
        self.temporary_marker = Some(id);
        id
    }

    pub fn clear_temporary_marker(&mut self, scene: &mut dyn SceneGraph) {
        if let Some(id) = self.temporary_marker.take() {
            scene.remove_visual(id);
        }
    }

    // ── Temporary highlight + outline ─────────────────────────

    /// Replace the highlight overlay and its outline. Empty boxes get no outline.
    pub fn set_highlight(
        &mut self,
        scene: &mut dyn SceneGraph,
        geometry: HighlightGeometry,
        bounds: Option<BoundingBox>,
    ) {
        self.clear_highlight(scene);
        self.highlight = Some(scene.add_visual(
            VisualKind::Highlight(geometry),
            [1.0, 1.0, 1.0],
            ORDER_HIGHLIGHT,
        ));
        if let Some(bounds) = bounds.filter(|b| !b.is_empty()) {
            self.temporary_outline = Some(scene.add_visual(
                VisualKind::BoxOutline { bounds },
                self.palette.temporary_outline,
                ORDER_TEMP_OUTLINE,
            ));
        }
    }

    /// Remove the highlight overlay and the temporary outline. Idempotent.
    pub fn clear_highlight(&mut self, scene: &mut dyn SceneGraph) {
        if let Some(id) = self.highlight.take() {
            scene.remove_visual(id);
        }
        if let Some(id) = self.temporary_outline.take() {
            scene.remove_visual(id);
        }
    }

    // ── Persistent visuals ────────────────────────────────────

    /// Hand the temporary marker and outline over to the persistent store
    /// under `key`, recolored to the persistent palette.
    ///
    /// An existing entry for `key` is removed first. When a new live entry
    /// would exceed the capacity the oldest live entry is evicted.
    pub fn promote_temporary_to_persistent(
        &mut self,
        scene: &mut dyn SceneGraph,
        key: &str,
    ) -> PersistentVisual {
        self.remove_persistent(scene, key);

        let marker = self.temporary_marker.take();
        let outline = self.temporary_outline.take();
        if let Some(id) = marker {
            scene.set_color(id, self.palette.persistent_marker);
        }
        if let Some(id) = outline {
            scene.set_color(id, self.palette.persistent_outline);
        }

        let entry = PersistentVisual { marker, outline };
        if entry.is_live() {
            self.evict_for_new_entry(scene);
            self.live_order.push_back(key.to_string());
        }
        tracing::debug!(
            "stored persistent visuals for {} (marker: {}, outline: {})",
            key,
            marker.is_some(),
            outline.is_some()
        );
        self.persistent.insert(key.to_string(), entry);
        entry
    }

    /// Draw persistent visuals for one saved annotation from its stored box,
    /// replacing any existing entry and evicting the oldest at capacity.
    pub fn add_persistent(
        &mut self,
        scene: &mut dyn SceneGraph,
        key: &str,
        bounds: Option<BoundingBox>,
    ) -> PersistentVisual {
        self.remove_persistent(scene, key);
        let entry = match bounds.filter(|b| !b.is_empty()) {
            Some(bounds) => {
                self.evict_for_new_entry(scene);
                let entry = self.draw_persistent(scene, bounds);
                self.live_order.push_back(key.to_string());
                entry
            }
            None => PersistentVisual::default(),
        };
        self.persistent.insert(key.to_string(), entry);
        entry
    }

    /// Rebuild all persistent visuals from the saved annotations.
    ///
    /// Each annotation with a valid non-empty box gets a marker at the box
    /// center and an outline, until `capacity` live entries exist; the rest
    /// are reported as over capacity. Annotations without a drawable box are
    /// tracked with an empty entry.
    pub fn bulk_redisplay(
        &mut self,
        scene: &mut dyn SceneGraph,
        annotations: &SavedAnnotationMap,
    ) -> RedisplayReport {
        self.clear_persistent(scene);
        let mut report = RedisplayReport::default();

        for (key, annotation) in annotations {
            let Some(bounds) = annotation.bounding_box().filter(|b| !b.is_empty()) else {
                tracing::debug!("annotation {} has no drawable bounding box", key);
                self.persistent.insert(key.clone(), PersistentVisual::default());
                report.invalid += 1;
                continue;
            };
            if self.live_order.len() >= self.capacity {
                report.over_capacity.push(key.clone());
                continue;
            }
            let entry = self.draw_persistent(scene, bounds);
            self.persistent.insert(key.clone(), entry);
            self.live_order.push_back(key.clone());
            report.displayed += 1;
        }

        if !report.over_capacity.is_empty() {
            tracing::warn!(
                "max persistent visuals ({}) reached, {} annotations not drawn",
                self.capacity,
                report.over_capacity.len()
            );
        }
        tracing::info!(
            "displayed {} visuals, skipped {}",
            report.displayed,
            report.skipped()
        );
        report
    }

    /// Tear down every owned visual and reset all tracking
    pub fn dispose_all(&mut self, scene: &mut dyn SceneGraph) {
        self.clear_temporary_marker(scene);
        self.clear_highlight(scene);
        self.clear_persistent(scene);
    }

    fn draw_persistent(&self, scene: &mut dyn SceneGraph, bounds: BoundingBox) -> PersistentVisual {
        let c = bounds.center();
        let marker = scene.add_visual(
            VisualKind::Marker {
                center: Vec3::new(c.x, c.y, c.z),
                radius: self.palette.persistent_marker_radius,
            },
            self.palette.persistent_marker,
            ORDER_MARKER,
        );
        let outline = scene.add_visual(
            VisualKind::BoxOutline { bounds },
            self.palette.persistent_outline,
            ORDER_OUTLINE,
        );
        PersistentVisual {
            marker: Some(marker),
            outline: Some(outline),
        }
    }

    /// FIFO eviction so one more live entry fits
    fn evict_for_new_entry(&mut self, scene: &mut dyn SceneGraph) {
        while self.live_order.len() >= self.capacity {
            let Some(oldest) = self.live_order.pop_front() else {
                break;
            };
            tracing::info!("persistent visuals at capacity, evicting {}", oldest);
            if let Some(entry) = self.persistent.remove(&oldest) {
                release(scene, entry);
            }
        }
    }

    fn clear_persistent(&mut self, scene: &mut dyn SceneGraph) {
        tracing::debug!("clearing {} persistent visuals", self.persistent.len());
        for (_, entry) in self.persistent.drain() {
            release(scene, entry);
        }
        self.live_order.clear();
    }

    fn remove_persistent(&mut self, scene: &mut dyn SceneGraph, key: &str) {
        if let Some(old) = self.persistent.remove(key) {
            release(scene, old);
            self.live_order.retain(|k| k != key);
        }
    }
}

fn release(scene: &mut dyn SceneGraph, entry: PersistentVisual) {
    if let Some(id) = entry.marker {
        scene.remove_visual(id);
    }
    if let Some(id) = entry.outline {
        scene.remove_visual(id);
    }
}
