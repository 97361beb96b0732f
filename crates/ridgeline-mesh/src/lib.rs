//! Heightmap-to-mesh conversion with LOD decimation and seam-free borders.

mod buffers;
mod builder;

pub use buffers::MeshBuffers;
pub use builder::{MeshError, build_terrain_mesh, lod_step};
