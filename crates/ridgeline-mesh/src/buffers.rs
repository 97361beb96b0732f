//! Renderable mesh buffers produced by the terrain mesh builder.

/// Owned vertex and index buffers for one chunk mesh, ready for upload by a
/// host renderer adapter.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshBuffers {
    /// Vertex positions, chunk-local, centered on the chunk midpoint.
    pub positions: Vec<[f32; 3]>,
    /// Texture coordinates, normalized 0..1 across the unsimplified chunk
    /// extent.
    pub uvs: Vec<[f32; 2]>,
    /// Triangle indices, flat ordered triples with consistent winding.
    pub indices: Vec<u32>,
    /// Per-vertex normals. `Some` when baked analytically (smooth shading);
    /// `None` in flat-shading mode, where the renderer recomputes uniform
    /// per-face normals after vertex duplication.
    pub normals: Option<Vec<[f32; 3]>>,
}

impl MeshBuffers {
    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}
