//! Instance Geometry Extractor.
//!
//! Gathers every face of one instance from the first qualifying mesh node,
//! moves it to world space and packs it into a standalone highlight
//! geometry plus its axis-aligned box. The scan over the face map is linear
//! in the number of faces and runs once per confirmed selection.

use glam::{Mat4, Vec3};
use shared::BoundingBox;

use super::mesh::{Geometry, MeshNode};
use super::picking::Aabb;
use super::scene_graph::Rgb;
use crate::assets::face_map::{FaceInstanceIndex, InstanceId};
use crate::error::ExtractError;

/// Material flags of the highlight overlay
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HighlightMaterial {
    pub double_sided: bool,
    pub transparent: bool,
    pub opacity: f32,
    /// Disabled so the overlay renders atop the base mesh
    pub depth_test: bool,
}

impl HighlightMaterial {
    pub fn overlay(opacity: f32) -> Self {
        Self {
            double_sided: true,
            transparent: true,
            opacity,
            depth_test: false,
        }
    }
}

/// Non-indexed world-space triangles with a parallel per-vertex color buffer
#[derive(Clone, Debug, PartialEq)]
pub struct HighlightGeometry {
    pub positions: Vec<f32>,
    pub colors: Vec<f32>,
    pub material: HighlightMaterial,
}

impl HighlightGeometry {
    pub fn triangle_count(&self) -> usize {
        self.positions.len() / 9
    }

    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_positions(&self.positions)
    }
}

/// Result of a non-empty extraction
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceHighlight {
    pub geometry: HighlightGeometry,
    pub bounding_box: BoundingBox,
    /// Faces owned by the instance that fell outside the index buffer
    pub skipped_faces: usize,
}

/// Look-and-feel of the extracted overlay
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HighlightStyle {
    pub color: Rgb,
    pub opacity: f32,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 0.0],
            opacity: 0.6,
        }
    }
}

/// First visible node (depth-first) carrying an index buffer and positions.
/// Only this node is used as the face data source even if more qualify.
pub fn find_geometry_source(root: &MeshNode) -> Option<(&Geometry, Mat4)> {
    let qualifies = |node: &MeshNode| {
        node.visible
            && node
                .geometry
                .as_ref()
                .is_some_and(|g| g.is_indexed() && !g.positions.is_empty())
    };
    root.find_with_world(Mat4::IDENTITY, &qualifies)
        .and_then(|(node, world)| node.geometry.as_ref().map(|g| (g, world)))
}

/// Extract the faces of `target` as a highlight geometry.
///
/// `Ok(None)` when the instance owns no extractable face; the caller must not
/// add an empty overlay and the selection keeps a null bounding box.
pub fn extract_highlight(
    target: InstanceId,
    root: &MeshNode,
    faces: &FaceInstanceIndex,
    style: HighlightStyle,
) -> Result<Option<InstanceHighlight>, ExtractError> {
    let (geometry, world) = find_geometry_source(root).ok_or(ExtractError::NoGeometrySource)?;

    let mut positions = Vec::new();
    let mut colors = Vec::new();
    let mut skipped = 0;

    for face in faces.faces_of(target) {
        let Some(corners) = geometry.face_positions(face) else {
            tracing::warn!(
                "highlight: face {} of instance {} is out of bounds for {} index slots",
                face,
                target,
                geometry.index_count()
            );
            skipped += 1;
            continue;
        };
        for p in corners {
            let wp: Vec3 = world.transform_point3(p);
            positions.extend_from_slice(&[wp.x, wp.y, wp.z]);
            colors.extend_from_slice(&style.color);
        }
    }

    let geometry = HighlightGeometry {
        positions,
        colors,
        material: HighlightMaterial::overlay(style.opacity),
    };

    let Some(bounds) = geometry.bounds() else {
        tracing::warn!("highlight: no faces found for instance {}", target);
        return Ok(None);
    };

    tracing::info!(
        "highlight: instance {} has {} faces ({} skipped)",
        target,
        geometry.triangle_count(),
        skipped
    );

    Ok(Some(InstanceHighlight {
        geometry,
        bounding_box: bounds.to_bounding_box(),
        skipped_faces: skipped,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Point3;

    /// One triangle per face along +X: face f spans x in [f, f+1]
    fn strip(n: usize) -> Geometry {
        let mut positions = Vec::new();
        let mut indices = Vec::new();
        for f in 0..n {
            let x = f as f32;
            positions.extend_from_slice(&[x, 0.0, 0.0, x + 1.0, 0.0, 0.0, x + 0.5, 1.0, 0.0]);
            let base = (f * 3) as u32;
            indices.extend_from_slice(&[base, base + 1, base + 2]);
        }
        Geometry::indexed(positions, indices)
    }

    #[test]
    fn test_extracts_matching_faces() {
        let root = MeshNode::new("mesh").with_geometry(strip(4));
        let faces = FaceInstanceIndex::new(vec![0, 1, 1, -1]);
        let h = extract_highlight(1, &root, &faces, HighlightStyle::default())
            .unwrap()
            .unwrap();
        assert_eq!(h.geometry.triangle_count(), 2);
        assert_eq!(h.geometry.colors.len(), h.geometry.positions.len());
        assert_eq!(h.bounding_box.min, Point3::new(1.0, 0.0, 0.0));
        assert_eq!(h.bounding_box.max, Point3::new(3.0, 1.0, 0.0));
        assert!(!h.geometry.material.depth_test);
        assert!(h.geometry.material.double_sided);
    }

    #[test]
    fn test_zero_faces_yields_none() {
        let root = MeshNode::new("mesh").with_geometry(strip(2));
        let faces = FaceInstanceIndex::new(vec![0, 0]);
        assert!(extract_highlight(9, &root, &faces, HighlightStyle::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_out_of_bounds_faces_skipped() {
        let root = MeshNode::new("mesh").with_geometry(strip(2));
        // face map longer than the index buffer
        let faces = FaceInstanceIndex::new(vec![3, 3, 3, 3]);
        let h = extract_highlight(3, &root, &faces, HighlightStyle::default())
            .unwrap()
            .unwrap();
        assert_eq!(h.geometry.triangle_count(), 2);
        assert_eq!(h.skipped_faces, 2);
    }

    #[test]
    fn test_world_matrix_applied() {
        let root = MeshNode::new("root").with_child(
            MeshNode::new("mesh")
                .with_geometry(strip(1))
                .with_transform(Mat4::from_translation(Vec3::new(0.0, 0.0, 2.0))),
        );
        let faces = FaceInstanceIndex::new(vec![4]);
        let h = extract_highlight(4, &root, &faces, HighlightStyle::default())
            .unwrap()
            .unwrap();
        assert_eq!(h.bounding_box.min.z, 2.0);
        assert_eq!(h.bounding_box.max.z, 2.0);
    }

    #[test]
    fn test_first_match_source_skips_hidden_and_unindexed() {
        let hidden = MeshNode::new("hidden").with_geometry(strip(1)).hidden();
        let unindexed = MeshNode::new("soup").with_geometry(Geometry::non_indexed(vec![0.0; 9]));
        let target = MeshNode::new("target")
            .with_geometry(strip(1))
            .with_transform(Mat4::from_translation(Vec3::X * 7.0));
        let second = MeshNode::new("second").with_geometry(strip(1));
        let root = MeshNode::new("root")
            .with_child(hidden)
            .with_child(unindexed)
            .with_child(target)
            .with_child(second);
        let (_, world) = find_geometry_source(&root).unwrap();
        assert_eq!(world.transform_point3(Vec3::ZERO), Vec3::X * 7.0);
    }

    #[test]
    fn test_no_source_is_error() {
        let root = MeshNode::new("empty");
        let faces = FaceInstanceIndex::new(vec![0]);
        assert_eq!(
            extract_highlight(0, &root, &faces, HighlightStyle::default()),
            Err(ExtractError::NoGeometrySource)
        );
    }
}
