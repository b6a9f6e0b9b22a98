use glam::{Mat4, Vec3};

use super::picking::Aabb;

/// CPU-side triangle geometry: tightly packed `[x, y, z]` positions and an
/// optional index buffer (three indices per face)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Geometry {
    pub positions: Vec<f32>,
    pub indices: Option<Vec<u32>>,
}

impl Geometry {
    pub fn indexed(positions: Vec<f32>, indices: Vec<u32>) -> Self {
        Self { positions, indices: Some(indices) }
    }

    pub fn non_indexed(positions: Vec<f32>) -> Self {
        Self { positions, indices: None }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn is_indexed(&self) -> bool {
        self.indices.is_some()
    }

    /// Number of index slots (vertex count for non-indexed geometry)
    pub fn index_count(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len(),
            None => self.vertex_count(),
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.index_count() / 3
    }

    pub fn position(&self, vertex: usize) -> Option<Vec3> {
        let base = vertex.checked_mul(3)?;
        let p = self.positions.get(base..base + 3)?;
        Some(Vec3::new(p[0], p[1], p[2]))
    }

    /// Vertex indices of a face, `None` when the face lies beyond the index buffer
    pub fn face_vertices(&self, face: usize) -> Option<[usize; 3]> {
        let base = face.checked_mul(3)?;
        if base + 2 >= self.index_count() {
            return None;
        }
        match &self.indices {
            Some(indices) => Some([
                indices[base] as usize,
                indices[base + 1] as usize,
                indices[base + 2] as usize,
            ]),
            None => Some([base, base + 1, base + 2]),
        }
    }

    /// Face corners in local space, `None` if any index is out of range
    pub fn face_positions(&self, face: usize) -> Option<[Vec3; 3]> {
        let [a, b, c] = self.face_vertices(face)?;
        Some([self.position(a)?, self.position(b)?, self.position(c)?])
    }
}

/// Node of the loaded scene hierarchy
#[derive(Clone, Debug)]
pub struct MeshNode {
    pub name: String,
    pub visible: bool,
    /// Local transform relative to the parent node
    pub transform: Mat4,
    pub geometry: Option<Geometry>,
    pub children: Vec<MeshNode>,
}

impl MeshNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visible: true,
            transform: Mat4::IDENTITY,
            geometry: None,
            children: Vec::new(),
        }
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_child(mut self, child: MeshNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Depth-first pre-order walk with world matrices
    pub fn walk(&self, parent: Mat4, f: &mut impl FnMut(&MeshNode, Mat4)) {
        let world = parent * self.transform;
        f(self, world);
        for child in &self.children {
            child.walk(world, f);
        }
    }

    /// First node (pre-order) accepted by `pred`, with its world matrix
    pub fn find_with_world(
        &self,
        parent: Mat4,
        pred: &impl Fn(&MeshNode) -> bool,
    ) -> Option<(&MeshNode, Mat4)> {
        let world = parent * self.transform;
        if pred(self) {
            return Some((self, world));
        }
        self.children
            .iter()
            .find_map(|child| child.find_with_world(world, pred))
    }

    /// Total faces over every node carrying geometry
    pub fn triangle_count(&self) -> usize {
        let mut total = 0;
        self.walk(Mat4::IDENTITY, &mut |node, _| {
            if let Some(g) = &node.geometry {
                total += g.triangle_count();
            }
        });
        total
    }

    /// World-space bounds of all visible geometry
    pub fn world_bounds(&self) -> Option<Aabb> {
        let mut bounds: Option<Aabb> = None;
        self.walk(Mat4::IDENTITY, &mut |node, world| {
            let Some(g) = node.geometry.as_ref().filter(|_| node.visible) else {
                return;
            };
            for v in 0..g.vertex_count() {
                if let Some(p) = g.position(v) {
                    let wp = world.transform_point3(p);
                    match bounds.as_mut() {
                        Some(b) => b.expand(wp),
                        None => bounds = Some(Aabb { min: wp, max: wp }),
                    }
                }
            }
        });
        bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> Geometry {
        Geometry::indexed(
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
            vec![0, 1, 2, 0, 2, 3],
        )
    }

    #[test]
    fn test_counts() {
        let g = quad();
        assert_eq!(g.vertex_count(), 4);
        assert_eq!(g.index_count(), 6);
        assert_eq!(g.triangle_count(), 2);
    }

    #[test]
    fn test_face_vertices_bounds() {
        let g = quad();
        assert_eq!(g.face_vertices(1), Some([0, 2, 3]));
        assert_eq!(g.face_vertices(2), None);
    }

    #[test]
    fn test_non_indexed_faces() {
        let g = Geometry::non_indexed(vec![0.0; 18]);
        assert_eq!(g.triangle_count(), 2);
        assert_eq!(g.face_vertices(1), Some([3, 4, 5]));
    }

    #[test]
    fn test_face_positions_rejects_bad_index() {
        let g = Geometry::indexed(vec![0.0; 9], vec![0, 1, 7]);
        assert!(g.face_positions(0).is_none());
    }

    #[test]
    fn test_walk_composes_transforms() {
        let root = MeshNode::new("root")
            .with_transform(Mat4::from_translation(Vec3::X))
            .with_child(MeshNode::new("child").with_transform(Mat4::from_translation(Vec3::Y)));
        let mut seen = Vec::new();
        root.walk(Mat4::IDENTITY, &mut |node, world| {
            seen.push((node.name.clone(), world.transform_point3(Vec3::ZERO)));
        });
        assert_eq!(seen[0], ("root".to_string(), Vec3::X));
        assert_eq!(seen[1], ("child".to_string(), Vec3::new(1.0, 1.0, 0.0)));
    }

    #[test]
    fn test_world_bounds_skips_hidden() {
        let root = MeshNode::new("root")
            .with_child(MeshNode::new("a").with_geometry(quad()))
            .with_child(
                MeshNode::new("far")
                    .with_geometry(quad())
                    .with_transform(Mat4::from_translation(Vec3::splat(10.0)))
                    .hidden(),
            );
        let b = root.world_bounds().unwrap();
        assert_eq!(b.min, Vec3::ZERO);
        assert_eq!(b.max, Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(root.triangle_count(), 4);
    }
}
