//! Per-face instance lookup table.
//!
//! The backend emits one little-endian `i32` per mesh face, in the same
//! triangle order as the index buffer of the exported mesh. Face `f` is
//! therefore addressed as `indices[f * 3..f * 3 + 3]`. Anything that
//! re-triangulates the mesh after export breaks this correspondence
//! silently, so decoders must keep the stored triangle order.

use std::collections::BTreeSet;

/// Integer id of a semantic object instance
pub type InstanceId = i32;

/// Values below zero mark background / unassigned faces
pub const UNASSIGNED: InstanceId = -1;

/// String key used by the annotation caches and the backend
pub fn instance_key(id: InstanceId) -> String {
    id.to_string()
}

/// Face index → owning instance id (negative = unassigned)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaceInstanceIndex {
    faces: Vec<InstanceId>,
}

impl FaceInstanceIndex {
    pub fn new(faces: Vec<InstanceId>) -> Self {
        Self { faces }
    }

    /// Decode the binary face map. Trailing bytes that do not form a whole
    /// `i32` are dropped with a warning (producer/consumer mismatch).
    pub fn from_le_bytes(bytes: &[u8]) -> Self {
        let remainder = bytes.len() % 4;
        if remainder != 0 {
            tracing::warn!(
                "face map length {} is not a multiple of 4, ignoring {} trailing bytes",
                bytes.len(),
                remainder
            );
        }
        let faces = bytes
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Self { faces }
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Raw value at a face, including sentinels
    pub fn get(&self, face_index: usize) -> Option<InstanceId> {
        self.faces.get(face_index).copied()
    }

    /// Owning instance of a face, `None` for out-of-range or unassigned faces
    pub fn instance_at(&self, face_index: usize) -> Option<InstanceId> {
        self.get(face_index).filter(|id| *id >= 0)
    }

    pub fn as_slice(&self) -> &[InstanceId] {
        &self.faces
    }

    /// Faces owned by `id`, in face order. O(faces).
    pub fn faces_of(&self, id: InstanceId) -> impl Iterator<Item = usize> + '_ {
        self.faces
            .iter()
            .enumerate()
            .filter(move |(_, v)| **v == id)
            .map(|(f, _)| f)
    }

    pub fn face_count_of(&self, id: InstanceId) -> usize {
        self.faces.iter().filter(|v| **v == id).count()
    }

    /// Distinct assigned instance ids
    pub fn instance_ids(&self) -> BTreeSet<InstanceId> {
        self.faces.iter().copied().filter(|id| *id >= 0).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(values: &[i32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_decode_little_endian() {
        let idx = FaceInstanceIndex::from_le_bytes(&encode(&[0, 0, 1, -1, 70000]));
        assert_eq!(idx.as_slice(), &[0, 0, 1, -1, 70000]);
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut bytes = encode(&[3, 4]);
        bytes.extend_from_slice(&[0xff, 0xff]);
        let idx = FaceInstanceIndex::from_le_bytes(&bytes);
        assert_eq!(idx.len(), 2);
        assert_eq!(idx.get(1), Some(4));
    }

    #[test]
    fn test_empty_payload() {
        let idx = FaceInstanceIndex::from_le_bytes(&[]);
        assert!(idx.is_empty());
        assert_eq!(idx.instance_at(0), None);
    }

    #[test]
    fn test_instance_at_filters_sentinel() {
        let idx = FaceInstanceIndex::new(vec![2, -1, -7]);
        assert_eq!(idx.instance_at(0), Some(2));
        assert_eq!(idx.instance_at(1), None);
        assert_eq!(idx.instance_at(2), None);
        assert_eq!(idx.get(1), Some(UNASSIGNED));
        assert_eq!(idx.instance_at(3), None);
    }

    #[test]
    fn test_faces_of() {
        let idx = FaceInstanceIndex::new(vec![0, 0, 1, 1, 1, -1, -1, 2, 2, 2]);
        assert_eq!(idx.faces_of(1).collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(idx.face_count_of(2), 3);
        assert_eq!(idx.face_count_of(9), 0);
        assert_eq!(idx.instance_ids().into_iter().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_instance_key() {
        assert_eq!(instance_key(42), "42");
    }
}
