//! Scene-side core: mesh hierarchy, camera, picking, highlight extraction
//! and the lifecycle of everything drawn on top of the scan.

pub mod camera;
pub mod highlight;
pub mod mesh;
pub mod picking;
pub mod scene_graph;
pub mod visuals;
