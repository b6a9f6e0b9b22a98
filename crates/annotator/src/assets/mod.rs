//! Per-scene reference data: face map, detail table, mesh asset.

pub mod details;
pub mod face_map;
pub mod glb;
