//! The rendering capability the annotation core draws into.
//!
//! The real renderer lives outside this crate; it only has to add visuals,
//! recolor them and remove them (releasing their GPU resources on removal).
//! `HeadlessScene` is the in-memory implementation used by tests and by the
//! command-line driver.

use std::collections::BTreeMap;

use glam::Vec3;
use shared::BoundingBox;

use super::highlight::HighlightGeometry;

/// Linear RGB color, 0..1 per channel
pub type Rgb = [f32; 3];

/// `0xRRGGBB` → [`Rgb`]
pub fn rgb_from_hex(hex: u32) -> Rgb {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

/// Handle to a visual owned by the scene graph
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VisualId(pub u64);

/// What to draw
#[derive(Clone, Debug, PartialEq)]
pub enum VisualKind {
    /// Small sphere drawn on top of the scene (no depth test)
    Marker { center: Vec3, radius: f32 },
    /// Wireframe box outline
    BoxOutline { bounds: BoundingBox },
    /// Extracted instance faces
    Highlight(HighlightGeometry),
}

impl VisualKind {
    pub fn is_marker(&self) -> bool {
        matches!(self, VisualKind::Marker { .. })
    }

    pub fn is_outline(&self) -> bool {
        matches!(self, VisualKind::BoxOutline { .. })
    }

    pub fn is_highlight(&self) -> bool {
        matches!(self, VisualKind::Highlight(_))
    }
}

pub trait SceneGraph {
    /// Add a visual to the scene; higher `render_order` draws later
    fn add_visual(&mut self, kind: VisualKind, color: Rgb, render_order: i32) -> VisualId;

    fn set_color(&mut self, id: VisualId, color: Rgb);

    /// Remove a visual and release its geometry and material
    fn remove_visual(&mut self, id: VisualId);
}

/// A visual held by [`HeadlessScene`]
#[derive(Clone, Debug, PartialEq)]
pub struct HeadlessVisual {
    pub kind: VisualKind,
    pub color: Rgb,
    pub render_order: i32,
}

/// In-memory scene graph that records what would be on screen
#[derive(Default)]
pub struct HeadlessScene {
    next_id: u64,
    live: BTreeMap<VisualId, HeadlessVisual>,
    released: u64,
    /// Removals of ids that were not live (double dispose)
    stale_removals: u64,
}

impl HeadlessScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: VisualId) -> Option<&HeadlessVisual> {
        self.live.get(&id)
    }

    pub fn is_live(&self, id: VisualId) -> bool {
        self.live.contains_key(&id)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn count_where(&self, pred: impl Fn(&HeadlessVisual) -> bool) -> usize {
        self.live.values().filter(|v| pred(v)).count()
    }

    /// Visuals added since creation
    pub fn created_count(&self) -> u64 {
        self.next_id
    }

    /// Visuals removed and released
    pub fn released_count(&self) -> u64 {
        self.released
    }

    pub fn stale_removals(&self) -> u64 {
        self.stale_removals
    }
}

impl SceneGraph for HeadlessScene {
    fn add_visual(&mut self, kind: VisualKind, color: Rgb, render_order: i32) -> VisualId {
        let id = VisualId(self.next_id);
        self.next_id += 1;
        self.live.insert(id, HeadlessVisual { kind, color, render_order });
        id
    }

    fn set_color(&mut self, id: VisualId, color: Rgb) {
        if let Some(v) = self.live.get_mut(&id) {
            v.color = color;
        }
    }

    fn remove_visual(&mut self, id: VisualId) {
        if self.live.remove(&id).is_some() {
            self.released += 1;
        } else {
            tracing::warn!("remove_visual on unknown visual {:?}", id);
            self.stale_removals += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_from_hex() {
        assert_eq!(rgb_from_hex(0xff0000), [1.0, 0.0, 0.0]);
        assert_eq!(rgb_from_hex(0x00ff00), [0.0, 1.0, 0.0]);
        assert_eq!(rgb_from_hex(0x000000), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_headless_lifecycle() {
        let mut s = HeadlessScene::new();
        let id = s.add_visual(
            VisualKind::Marker { center: Vec3::ZERO, radius: 0.1 },
            [1.0, 0.0, 0.0],
            2,
        );
        assert!(s.is_live(id));
        s.set_color(id, [0.0, 1.0, 0.0]);
        assert_eq!(s.get(id).unwrap().color, [0.0, 1.0, 0.0]);
        s.remove_visual(id);
        assert!(!s.is_live(id));
        assert_eq!(s.released_count(), 1);
        s.remove_visual(id);
        assert_eq!(s.stale_removals(), 1);
    }
}
