//! Picking Engine: screen point → ray → nearest face → instance.

use glam::{Mat4, Vec2, Vec3};
use shared::{BoundingBox, Point3};

use super::camera::{Camera, ViewportRect};
use super::mesh::{Geometry, MeshNode};
use crate::assets::details::{InstanceDetail, InstanceDetailTable};
use crate::assets::face_map::{FaceInstanceIndex, InstanceId};
use crate::error::PickError;

/// A ray in world space
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Axis-aligned bounding box
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Bounds of a flat `[x, y, z, ...]` buffer, `None` when it holds no point
    pub fn from_positions(positions: &[f32]) -> Option<Self> {
        let mut it = positions.chunks_exact(3).map(|p| Vec3::new(p[0], p[1], p[2]));
        let first = it.next()?;
        let mut b = Self { min: first, max: first };
        for p in it {
            b.expand(p);
        }
        Some(b)
    }

    pub fn expand(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Center of the bounding box
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn is_empty(&self) -> bool {
        self.max.cmplt(self.min).any()
    }

    pub fn to_bounding_box(self) -> BoundingBox {
        BoundingBox::new(
            Point3::new(self.min.x, self.min.y, self.min.z),
            Point3::new(self.max.x, self.max.y, self.max.z),
        )
    }

    /// Bounds of the eight transformed corners
    pub fn transformed(&self, m: Mat4) -> Self {
        let mut out = Self {
            min: m.transform_point3(self.min),
            max: m.transform_point3(self.min),
        };
        for i in 1..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.expand(m.transform_point3(corner));
        }
        out
    }

    pub fn padded(&self, margin: f32) -> Self {
        Self {
            min: self.min - Vec3::splat(margin),
            max: self.max + Vec3::splat(margin),
        }
    }
}

/// Slab test. Distance to where the ray enters the box, or to where it
/// leaves when the origin is inside.
pub fn ray_aabb(ray: &Ray, aabb: &Aabb) -> Option<f32> {
    let inv_dir = Vec3::ONE / ray.direction;

    let t1 = (aabb.min - ray.origin) * inv_dir;
    let t2 = (aabb.max - ray.origin) * inv_dir;

    let tmin = t1.min(t2).max_element();
    let tmax = t1.max(t2).min_element();

    if tmax < 0.0 || tmin > tmax {
        return None;
    }

    Some(if tmin < 0.0 { tmax } else { tmin })
}

/// Möller-Trumbore ray-triangle intersection algorithm.
/// Returns the distance along the ray if hit, or None if no intersection.
/// Both windings are accepted (picking ignores face culling).
pub fn ray_triangle_intersect(ray: &Ray, v0: Vec3, v1: Vec3, v2: Vec3) -> Option<f32> {
    const EPSILON: f32 = 1e-7;

    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = ray.direction.cross(edge2);
    let a = edge1.dot(h);

    // Ray is parallel to triangle
    if a.abs() < EPSILON {
        return None;
    }

    let f = 1.0 / a;
    let s = ray.origin - v0;
    let u = f * s.dot(h);

    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * ray.direction.dot(q);

    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(q);

    // Intersection is behind ray origin
    if t > EPSILON {
        Some(t)
    } else {
        None
    }
}

const BROAD_PHASE_MARGIN: f32 = 1e-4;

/// Nearest intersection of a ray with the scene hierarchy
#[derive(Clone, Debug, PartialEq)]
pub struct RayHit {
    /// Name of the node whose geometry was hit
    pub node: String,
    /// Face index within that node's geometry (index buffer offset / 3)
    pub face_index: usize,
    /// Distance from ray origin to hit point
    pub distance: f32,
    /// Hit point in world space
    pub point: Vec3,
}

/// Intersect every visible geometry node in world space and keep the nearest hit.
/// Subtrees under a hidden node are skipped.
pub fn raycast(ray: &Ray, root: &MeshNode) -> Option<RayHit> {
    let mut best: Option<RayHit> = None;
    raycast_node(ray, root, Mat4::IDENTITY, &mut best);
    best
}

fn raycast_node(ray: &Ray, node: &MeshNode, parent: Mat4, best: &mut Option<RayHit>) {
    if !node.visible {
        return;
    }
    let world = parent * node.transform;

    if let Some(geometry) = node.geometry.as_ref().filter(|g| node_may_hit(ray, g, world, best)) {
        for face in 0..geometry.triangle_count() {
            let Some([a, b, c]) = geometry.face_positions(face) else {
                continue;
            };
            let (a, b, c) = (
                world.transform_point3(a),
                world.transform_point3(b),
                world.transform_point3(c),
            );
            if let Some(dist) = ray_triangle_intersect(ray, a, b, c) {
                if best.as_ref().map_or(true, |h| dist < h.distance) {
                    *best = Some(RayHit {
                        node: node.name.clone(),
                        face_index: face,
                        distance: dist,
                        point: ray.at(dist),
                    });
                }
            }
        }
    }

    for child in &node.children {
        raycast_node(ray, child, world, best);
    }
}

/// Broad phase: skip a node whose world bounds the ray misses or only
/// reaches beyond the current nearest hit.
fn node_may_hit(ray: &Ray, geometry: &Geometry, world: Mat4, best: &Option<RayHit>) -> bool {
    let Some(local) = Aabb::from_positions(&geometry.positions) else {
        return false;
    };
    let bounds = local.transformed(world).padded(BROAD_PHASE_MARGIN);
    match ray_aabb(ray, &bounds) {
        Some(entry) => best.as_ref().map_or(true, |h| entry <= h.distance),
        None => false,
    }
}

/// A successful pick on a mapped instance
#[derive(Clone, Debug, PartialEq)]
pub struct PickHit {
    pub instance_id: InstanceId,
    pub face_index: usize,
    pub point: Vec3,
    pub detail: InstanceDetail,
}

/// Outcome of one click
#[derive(Clone, Debug, PartialEq)]
pub enum PickResult {
    Miss,
    InvalidFaceIndex { face_index: usize, face_count: usize },
    UnmappedFace { face_index: usize, instance_id: InstanceId },
    Hit(PickHit),
}

impl PickResult {
    pub fn hit(&self) -> Option<&PickHit> {
        match self {
            PickResult::Hit(h) => Some(h),
            _ => None,
        }
    }

    /// The user-facing error for failed lookups
    pub fn error(&self) -> Option<PickError> {
        match *self {
            PickResult::InvalidFaceIndex { face_index, face_count } => {
                Some(PickError::FaceOutOfBounds { face_index, face_count })
            }
            PickResult::UnmappedFace { face_index, instance_id } => {
                Some(PickError::UnmappedFace { face_index, instance_id })
            }
            _ => None,
        }
    }
}

/// Resolve a face hit to an instance through the face map and detail table
pub fn resolve_face(
    face_index: usize,
    point: Vec3,
    faces: &FaceInstanceIndex,
    details: &InstanceDetailTable,
) -> PickResult {
    let Some(raw) = faces.get(face_index) else {
        return PickResult::InvalidFaceIndex {
            face_index,
            face_count: faces.len(),
        };
    };
    match details.get(raw).filter(|_| raw >= 0) {
        Some(detail) => PickResult::Hit(PickHit {
            instance_id: raw,
            face_index,
            point,
            detail: detail.clone(),
        }),
        None => PickResult::UnmappedFace {
            face_index,
            instance_id: raw,
        },
    }
}

/// Full pick: screen coordinates relative to the page, viewport rect of the
/// canvas element, current camera.
pub fn pick(
    screen: Vec2,
    viewport: &ViewportRect,
    camera: &Camera,
    mesh: &MeshNode,
    faces: &FaceInstanceIndex,
    details: &InstanceDetailTable,
) -> PickResult {
    let ray = camera.screen_ray(screen, viewport);
    match raycast(&ray, mesh) {
        Some(hit) => resolve_face(hit.face_index, hit.point, faces, details),
        None => PickResult::Miss,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::InstanceDetailRecord;
    use std::collections::BTreeMap;

    fn down_ray(x: f32, y: f32) -> Ray {
        Ray {
            origin: Vec3::new(x, y, 5.0),
            direction: Vec3::NEG_Z,
        }
    }

    fn details(ids: &[i32]) -> InstanceDetailTable {
        let records: BTreeMap<String, InstanceDetailRecord> = ids
            .iter()
            .map(|id| {
                (
                    id.to_string(),
                    InstanceDetailRecord {
                        label: format!("obj{id}"),
                        category_id: shared::CategoryId::Int(*id as i64),
                        region_label: None,
                        region_code: None,
                    },
                )
            })
            .collect();
        InstanceDetailTable::from_records(records)
    }

    #[test]
    fn test_ray_triangle_hit_and_miss() {
        let (a, b, c) = (Vec3::ZERO, Vec3::X, Vec3::Y);
        assert!((ray_triangle_intersect(&down_ray(0.2, 0.2), a, b, c).unwrap() - 5.0).abs() < 1e-5);
        assert!(ray_triangle_intersect(&down_ray(0.9, 0.9), a, b, c).is_none());
    }

    #[test]
    fn test_ray_behind_origin_misses() {
        let ray = Ray {
            origin: Vec3::new(0.2, 0.2, -1.0),
            direction: Vec3::NEG_Z,
        };
        assert!(ray_triangle_intersect(&ray, Vec3::ZERO, Vec3::X, Vec3::Y).is_none());
    }

    #[test]
    fn test_ray_aabb_flat_and_inside() {
        let b = Aabb { min: Vec3::ZERO, max: Vec3::ONE };
        assert!((ray_aabb(&down_ray(0.5, 0.5), &b).unwrap() - 4.0).abs() < 1e-5);
        assert!(ray_aabb(&down_ray(2.0, 0.5), &b).is_none());

        // zero-thickness box, as for a planar node
        let flat = Aabb { min: Vec3::ZERO, max: Vec3::new(1.0, 1.0, 0.0) };
        assert!((ray_aabb(&down_ray(0.5, 0.5), &flat).unwrap() - 5.0).abs() < 1e-5);

        let inside = Ray { origin: Vec3::splat(0.5), direction: Vec3::NEG_Z };
        assert!((ray_aabb(&inside, &b).unwrap() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_transformed_bounds() {
        let b = Aabb { min: Vec3::ZERO, max: Vec3::ONE };
        let t = b.transformed(Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)) * Mat4::from_scale(Vec3::splat(2.0)));
        assert_eq!(t.min, Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(t.max, Vec3::new(12.0, 2.0, 2.0));
    }

    #[test]
    fn test_broad_phase_culls_far_and_missed_nodes() {
        let near = Geometry::non_indexed(vec![0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 1.0, 1.0]);
        let far = Geometry::non_indexed(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        let best = Some(RayHit {
            node: "near".into(),
            face_index: 0,
            distance: 4.0,
            point: Vec3::new(0.2, 0.2, 1.0),
        });
        assert!(node_may_hit(&down_ray(0.2, 0.2), &near, Mat4::IDENTITY, &None));
        assert!(!node_may_hit(&down_ray(0.2, 0.2), &far, Mat4::IDENTITY, &best));
        assert!(!node_may_hit(&down_ray(3.0, 3.0), &near, Mat4::IDENTITY, &None));
        assert!(!node_may_hit(&down_ray(0.2, 0.2), &Geometry::default(), Mat4::IDENTITY, &None));

        // order of children does not change the nearest hit
        let root = MeshNode::new("root")
            .with_child(MeshNode::new("near").with_geometry(near))
            .with_child(MeshNode::new("far").with_geometry(far));
        assert_eq!(raycast(&down_ray(0.2, 0.2), &root).unwrap().node, "near");
    }

    #[test]
    fn test_raycast_takes_nearest_layer() {
        // two stacked triangles, upper one at z = 1 is nearer
        let lower = Geometry::non_indexed(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        let upper = Geometry::non_indexed(vec![0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 1.0, 1.0]);
        let root = MeshNode::new("root")
            .with_child(MeshNode::new("lower").with_geometry(lower))
            .with_child(MeshNode::new("upper").with_geometry(upper));
        let hit = raycast(&down_ray(0.2, 0.2), &root).unwrap();
        assert_eq!(hit.node, "upper");
        assert!((hit.point.z - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_raycast_applies_world_transform() {
        let tri = Geometry::non_indexed(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        let root = MeshNode::new("moved")
            .with_geometry(tri)
            .with_transform(Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        assert!(raycast(&down_ray(0.2, 0.2), &root).is_none());
        assert_eq!(raycast(&down_ray(10.2, 0.2), &root).unwrap().face_index, 0);
    }

    #[test]
    fn test_raycast_skips_hidden_nodes() {
        let tri = Geometry::non_indexed(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        let root = MeshNode::new("hidden").with_geometry(tri).hidden();
        assert!(raycast(&down_ray(0.2, 0.2), &root).is_none());
    }

    #[test]
    fn test_resolve_face_variants() {
        let faces = FaceInstanceIndex::new(vec![0, -1, 5]);
        let d = details(&[0]);
        assert!(matches!(resolve_face(0, Vec3::ZERO, &faces, &d), PickResult::Hit(h) if h.instance_id == 0));
        assert_eq!(
            resolve_face(1, Vec3::ZERO, &faces, &d),
            PickResult::UnmappedFace { face_index: 1, instance_id: -1 }
        );
        // assigned in the face map but missing from the detail table
        assert_eq!(
            resolve_face(2, Vec3::ZERO, &faces, &d),
            PickResult::UnmappedFace { face_index: 2, instance_id: 5 }
        );
        assert_eq!(
            resolve_face(3, Vec3::ZERO, &faces, &d),
            PickResult::InvalidFaceIndex { face_index: 3, face_count: 3 }
        );
    }

    #[test]
    fn test_pick_result_error_mapping() {
        assert!(PickResult::Miss.error().is_none());
        assert_eq!(
            PickResult::UnmappedFace { face_index: 1, instance_id: -1 }.error(),
            Some(PickError::UnmappedFace { face_index: 1, instance_id: -1 })
        );
    }

    #[test]
    fn test_aabb_from_positions() {
        assert!(Aabb::from_positions(&[]).is_none());
        let b = Aabb::from_positions(&[1.0, 2.0, 3.0, -1.0, 5.0, 0.0]).unwrap();
        assert_eq!(b.min, Vec3::new(-1.0, 2.0, 0.0));
        assert_eq!(b.max, Vec3::new(1.0, 5.0, 3.0));
        assert_eq!(b.to_bounding_box().center(), Point3::new(0.0, 3.5, 1.5));
    }
}
