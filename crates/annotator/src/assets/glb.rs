//! Binary glTF → [`MeshNode`] hierarchy.
//!
//! Only positions and triangle indices are read. Triangles keep the order
//! they have in the file, which is the order the face map was produced
//! against.

use glam::Mat4;
use gltf::buffer::Source;
use gltf::mesh::Mode;

use crate::error::LoadError;
use crate::viewport::mesh::{Geometry, MeshNode};

/// Decode a `.glb` payload into a node tree rooted at an unnamed group.
pub fn decode_glb(bytes: &[u8]) -> Result<MeshNode, LoadError> {
    let gltf = gltf::Gltf::from_slice(bytes).map_err(|e| LoadError::InvalidAsset(e.to_string()))?;
    let blob = gltf.blob.as_deref();

    let scene = gltf
        .default_scene()
        .or_else(|| gltf.scenes().next())
        .ok_or_else(|| LoadError::InvalidAsset("asset has no scene".into()))?;

    let mut root = MeshNode::new(scene.name().unwrap_or("scene"));
    for node in scene.nodes() {
        root.children.push(convert_node(&node, blob)?);
    }

    let triangles = root.triangle_count();
    if triangles == 0 {
        return Err(LoadError::InvalidAsset("asset contains no triangles".into()));
    }
    tracing::info!("decoded glb: {} triangles", triangles);
    Ok(root)
}

fn convert_node(node: &gltf::Node, blob: Option<&[u8]>) -> Result<MeshNode, LoadError> {
    let name = node
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node_{}", node.index()));
    let transform = Mat4::from_cols_array_2d(&node.transform().matrix());
    let mut out = MeshNode::new(name).with_transform(transform);

    if let Some(mesh) = node.mesh() {
        let mut parts = Vec::new();
        for primitive in mesh.primitives() {
            if primitive.mode() != Mode::Triangles {
                tracing::warn!(
                    "skipping primitive {} of mesh {}: mode {:?}",
                    primitive.index(),
                    mesh.index(),
                    primitive.mode()
                );
                continue;
            }
            parts.push(read_primitive(&primitive, blob)?);
        }
        // One primitive lives on the node itself; several become children so
        // each keeps its own face numbering.
        if parts.len() == 1 {
            out.geometry = parts.pop();
        } else {
            for (i, geometry) in parts.into_iter().enumerate() {
                out.children
                    .push(MeshNode::new(format!("{}_{}", out.name, i)).with_geometry(geometry));
            }
        }
    }

    for child in node.children() {
        out.children.push(convert_node(&child, blob)?);
    }
    Ok(out)
}

fn read_primitive(primitive: &gltf::Primitive, blob: Option<&[u8]>) -> Result<Geometry, LoadError> {
    let reader = primitive.reader(|buffer| match buffer.source() {
        Source::Bin => blob,
        Source::Uri(_) => None,
    });

    let positions: Vec<f32> = reader
        .read_positions()
        .ok_or_else(|| LoadError::InvalidAsset("primitive without positions".into()))?
        .flatten()
        .collect();

    let geometry = match reader.read_indices() {
        Some(indices) => {
            let indices: Vec<u32> = indices.into_u32().collect();
            let vertex_count = positions.len() / 3;
            if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(LoadError::InvalidAsset(format!(
                    "index {} out of range for {} vertices",
                    bad, vertex_count
                )));
            }
            Geometry::indexed(positions, indices)
        }
        None => Geometry::non_indexed(positions),
    };
    Ok(geometry)
}
