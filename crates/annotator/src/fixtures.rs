//! Factory functions for test scenes, sessions and annotation sets.
//!
//! The test scene is a strip of ten triangles along +X: face `f` spans
//! `x ∈ [f, f + 1]` with its apex at `(f + 0.5, 1, 0)`, instances
//! `[0, 0, 1, 1, 1, -1, -1, 2, 2, 2]` and labels chair / table / lamp.

use std::collections::BTreeMap;

use glam::{Mat4, Vec2, Vec3};
use serde_json::json;
use shared::{
    BoundingBox, CategoryId, InstanceDetailRecord, Point3, SaveAnnotationResponse, SavedAnnotation,
    SavedAnnotationMap, STATUS_SUCCESS,
};

use crate::assets::details::InstanceDetailTable;
use crate::assets::face_map::FaceInstanceIndex;
use crate::net::loader::SceneBundle;
use crate::state::{AnnotatorSettings, ViewerSession};
use crate::viewport::camera::{Camera, ViewportRect};
use crate::viewport::mesh::{Geometry, MeshNode};
use crate::viewport::scene_graph::HeadlessScene;

pub const STRIP_FACE_MAP: [i32; 10] = [0, 0, 1, 1, 1, -1, -1, 2, 2, 2];

// ── Ten-face strip ──────────────────────────────────────────────

/// Ten-face strip, indexed, sequential indices
pub fn strip_geometry() -> Geometry {
    strip_with_faces(10)
}

/// `faces` triangles along +X, one triangle per unit
pub fn strip_with_faces(faces: usize) -> Geometry {
    let mut positions = Vec::with_capacity(faces * 9);
    for f in 0..faces {
        let x = f as f32;
        positions.extend_from_slice(&[x, 0.0, 0.0, x + 1.0, 0.0, 0.0, x + 0.5, 1.0, 0.0]);
    }
    let indices = (0..(faces * 3) as u32).collect();
    Geometry::indexed(positions, indices)
}

pub fn strip_root() -> MeshNode {
    MeshNode::new("scene").with_child(MeshNode::new("scan").with_geometry(strip_geometry()))
}

pub fn strip_faces() -> FaceInstanceIndex {
    FaceInstanceIndex::new(STRIP_FACE_MAP.to_vec())
}

pub fn detail_record(label: &str, category: i64) -> InstanceDetailRecord {
    InstanceDetailRecord {
        label: label.to_string(),
        category_id: CategoryId::Int(category),
        region_label: None,
        region_code: None,
    }
}

pub fn strip_detail_records() -> BTreeMap<String, InstanceDetailRecord> {
    BTreeMap::from([
        ("0".to_string(), detail_record("chair", 5)),
        ("1".to_string(), detail_record("table", 7)),
        ("2".to_string(), detail_record("lamp", 28)),
    ])
}

pub fn strip_details() -> InstanceDetailTable {
    InstanceDetailTable::from_records(strip_detail_records())
}

pub fn strip_bundle(scene_id: &str) -> SceneBundle {
    SceneBundle {
        scene_id: scene_id.to_string(),
        root: strip_root(),
        faces: strip_faces(),
        details: strip_details(),
        existing_annotations: SavedAnnotationMap::new(),
    }
}

/// Strip face map as served: little-endian i32 per face
pub fn strip_face_map_bytes() -> Vec<u8> {
    STRIP_FACE_MAP.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn strip_glb() -> Vec<u8> {
    glb_from_geometry(&strip_geometry(), Mat4::IDENTITY)
}

/// Camera looking straight down (-Z) at the strip
pub fn top_down_camera(x: f32, y: f32) -> Camera {
    Camera::new(Vec3::new(x, y, 5.0), Vec3::new(x, y, 0.0), Vec3::Y)
}

pub fn test_viewport() -> ViewportRect {
    ViewportRect::sized(100.0, 100.0)
}

/// Page position of the viewport center
pub fn viewport_center() -> Vec2 {
    test_viewport().center()
}

// ── Sessions ────────────────────────────────────────────────

pub fn headless_session() -> ViewerSession<HeadlessScene> {
    headless_session_with(AnnotatorSettings::default())
}

pub fn headless_session_with(settings: AnnotatorSettings) -> ViewerSession<HeadlessScene> {
    match ViewerSession::new(settings, HeadlessScene::new(), test_viewport()) {
        Ok(session) => session,
        Err(e) => panic!("test viewport rejected: {e}"),
    }
}

// ── Annotations ─────────────────────────────────────────────

pub fn unit_box() -> BoundingBox {
    BoundingBox::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0))
}

/// `n` annotations with valid unit boxes, keyed "0".."n-1"
pub fn annotations_with_boxes(n: usize) -> SavedAnnotationMap {
    (0..n)
        .map(|i| {
            (
                i.to_string(),
                SavedAnnotation::new(format!("object {i}"), format!("query {i}"), Some(unit_box())),
            )
        })
        .collect()
}

pub fn save_ok(label: &str) -> SaveAnnotationResponse {
    SaveAnnotationResponse {
        status: STATUS_SUCCESS.to_string(),
        saved_label: Some(label.to_string()),
        saved_label_id: Some(1660),
        message: Some("Annotation saved".to_string()),
    }
}

// ── GLB encoding ────────────────────────────────────────────

const GLB_MAGIC: u32 = 0x4654_6C67;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

/// Encode one geometry as a single-node binary glTF
pub fn glb_from_geometry(geometry: &Geometry, transform: Mat4) -> Vec<u8> {
    let mut bin: Vec<u8> = geometry.positions.iter().flat_map(|v| v.to_le_bytes()).collect();
    let positions_len = bin.len();
    if let Some(indices) = &geometry.indices {
        bin.extend(indices.iter().flat_map(|i| i.to_le_bytes()));
    }
    let indices_len = bin.len() - positions_len;
    while bin.len() % 4 != 0 {
        bin.push(0);
    }

    let (mut min, mut max) = ([f32::MAX; 3], [f32::MIN; 3]);
    for p in geometry.positions.chunks_exact(3) {
        for axis in 0..3 {
            min[axis] = min[axis].min(p[axis]);
            max[axis] = max[axis].max(p[axis]);
        }
    }

    let mut buffer_views = vec![json!({
        "buffer": 0, "byteOffset": 0, "byteLength": positions_len, "target": 34962
    })];
    let mut accessors = vec![json!({
        "bufferView": 0, "componentType": 5126, "count": geometry.vertex_count(),
        "type": "VEC3", "min": min, "max": max
    })];
    let mut primitive = json!({ "attributes": { "POSITION": 0 }, "mode": 4 });
    if let Some(indices) = &geometry.indices {
        buffer_views.push(json!({
            "buffer": 0, "byteOffset": positions_len, "byteLength": indices_len, "target": 34963
        }));
        accessors.push(json!({
            "bufferView": 1, "componentType": 5125, "count": indices.len(), "type": "SCALAR"
        }));
        primitive["indices"] = json!(1);
    }

    let mut node = json!({ "name": "scan", "mesh": 0 });
    if transform != Mat4::IDENTITY {
        node["matrix"] = json!(transform.to_cols_array());
    }

    let document = json!({
        "asset": { "version": "2.0", "generator": "annotator fixtures" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [node],
        "meshes": [{ "primitives": [primitive] }],
        "accessors": accessors,
        "bufferViews": buffer_views,
        "buffers": [{ "byteLength": bin.len() }],
    });
    let mut json_bytes = document.to_string().into_bytes();
    while json_bytes.len() % 4 != 0 {
        json_bytes.push(b' ');
    }

    let total = 12 + 8 + json_bytes.len() + 8 + bin.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json_bytes);
    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
    out.extend_from_slice(&bin);
    out
}
