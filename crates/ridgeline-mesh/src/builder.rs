//! Border-aware terrain mesh triangulation.
//!
//! The bordered heightmap's outer sample ring becomes transient border
//! vertices: triangulated against their interior neighbors so edge normals
//! are computed from real neighboring terrain, then dropped from the
//! returned buffers. Adjacent chunks therefore shade seamlessly without
//! knowing each other's geometry.

use glam::Vec3;

use ridgeline_map::HeightCurve;
use ridgeline_noise::HeightGrid;

use crate::buffers::MeshBuffers;

/// Errors from a single mesh build. Fatal to that call only; the grid is
/// never silently reshaped or truncated.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MeshError {
    /// The height grid is not the square bordered grid the builder expects.
    #[error("height grid is {width}x{height}, expected a square bordered grid of at least 4")]
    DimensionMismatch {
        /// Grid width encountered.
        width: usize,
        /// Grid height encountered.
        height: usize,
    },

    /// The LOD step does not evenly divide the interior quad count.
    #[error("LOD {lod} (step {step}) does not divide interior extent {interior} minus one")]
    UnsupportedLod {
        /// Requested LOD index.
        lod: u32,
        /// Derived decimation step.
        step: usize,
        /// Interior extent of the grid.
        interior: usize,
    },
}

/// Decimation step for a LOD index: 1 at LOD 0, `2 * lod` above.
pub fn lod_step(lod: u32) -> usize {
    if lod == 0 { 1 } else { lod as usize * 2 }
}

/// A vertex slot in one of the two index spaces: real interior vertices
/// that end up in the returned buffers, or transient border vertices used
/// only for normal computation.
#[derive(Clone, Copy, Debug, PartialEq)]
enum VertexSlot {
    Interior(u32),
    Border(u32),
}

/// Working state for one build: interior buffers that survive, border
/// positions that do not.
struct MeshLattice {
    positions: Vec<[f32; 3]>,
    uvs: Vec<[f32; 2]>,
    indices: Vec<u32>,
    normals: Vec<Vec3>,
    border_positions: Vec<[f32; 3]>,
}

impl MeshLattice {
    fn position(&self, slot: VertexSlot) -> Vec3 {
        match slot {
            VertexSlot::Interior(i) => Vec3::from_array(self.positions[i as usize]),
            VertexSlot::Border(i) => Vec3::from_array(self.border_positions[i as usize]),
        }
    }

    fn add_triangle(&mut self, a: VertexSlot, b: VertexSlot, c: VertexSlot) {
        let normal = face_normal(self.position(a), self.position(b), self.position(c));
        for slot in [a, b, c] {
            if let VertexSlot::Interior(i) = slot {
                self.normals[i as usize] += normal;
            }
        }
        if let (VertexSlot::Interior(ia), VertexSlot::Interior(ib), VertexSlot::Interior(ic)) =
            (a, b, c)
        {
            self.indices.extend_from_slice(&[ia, ib, ic]);
        }
    }
}

fn face_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    (b - a).cross(c - a).normalize_or_zero()
}

/// Build the renderable mesh for a bordered height grid.
///
/// `grid` must be the square `(interior + 2)` bordered grid produced by the
/// chunk compositor. Vertex heights are `curve.evaluate(h) * height_multiplier`;
/// positions are centered on the chunk midpoint with the top sample row at
/// +z. With `flat_shading`, every triangle gets its own three vertices and
/// normals are left to the renderer.
pub fn build_terrain_mesh(
    grid: &HeightGrid,
    curve: &HeightCurve,
    height_multiplier: f32,
    lod: u32,
    flat_shading: bool,
) -> Result<MeshBuffers, MeshError> {
    let bordered = grid.width();
    if grid.height() != bordered || bordered < 4 {
        return Err(MeshError::DimensionMismatch {
            width: grid.width(),
            height: grid.height(),
        });
    }

    let interior = bordered - 2;
    let step = lod_step(lod);
    if (interior - 1) % step != 0 {
        return Err(MeshError::UnsupportedLod {
            lod,
            step,
            interior,
        });
    }

    // Sample columns/rows used by this LOD: the one-cell border ring always
    // participates, interior samples are decimated by `step`.
    let per_line = (interior - 1) / step + 1;
    let mut line = Vec::with_capacity(per_line + 2);
    line.push(0);
    for j in 0..per_line {
        line.push(1 + j * step);
    }
    line.push(bordered - 1);
    let lattice_size = line.len();

    // Two explicit index spaces instead of sign-encoded indices: interior
    // slots are kept, border slots exist only for normal accumulation.
    let mut slots = vec![VertexSlot::Border(0); lattice_size * lattice_size];
    let mut interior_count = 0u32;
    let mut border_count = 0u32;
    for ly in 0..lattice_size {
        for lx in 0..lattice_size {
            let is_border =
                lx == 0 || ly == 0 || lx == lattice_size - 1 || ly == lattice_size - 1;
            slots[ly * lattice_size + lx] = if is_border {
                let slot = VertexSlot::Border(border_count);
                border_count += 1;
                slot
            } else {
                let slot = VertexSlot::Interior(interior_count);
                interior_count += 1;
                slot
            };
        }
    }

    let extent = (interior - 1) as f32;
    let half_extent = extent / 2.0;

    let mut lattice = MeshLattice {
        positions: vec![[0.0; 3]; interior_count as usize],
        uvs: vec![[0.0; 2]; interior_count as usize],
        indices: Vec::with_capacity((per_line - 1) * (per_line - 1) * 6),
        normals: vec![Vec3::ZERO; interior_count as usize],
        border_positions: vec![[0.0; 3]; border_count as usize],
    };

    for ly in 0..lattice_size {
        for lx in 0..lattice_size {
            let sx = line[lx];
            let sy = line[ly];

            // UVs are measured from the first interior sample so the border
            // ring never shifts texture coordinates.
            let u = (sx as f32 - 1.0) / extent;
            let v = (sy as f32 - 1.0) / extent;
            let height = curve.evaluate(grid.get(sx, sy)) * height_multiplier;
            let position = [u * extent - half_extent, height, half_extent - v * extent];

            match slots[ly * lattice_size + lx] {
                VertexSlot::Interior(i) => {
                    lattice.positions[i as usize] = position;
                    lattice.uvs[i as usize] = [u, v];
                }
                VertexSlot::Border(i) => {
                    lattice.border_positions[i as usize] = position;
                }
            }
        }
    }

    for ly in 0..lattice_size - 1 {
        for lx in 0..lattice_size - 1 {
            let a = slots[ly * lattice_size + lx];
            let b = slots[ly * lattice_size + lx + 1];
            let c = slots[(ly + 1) * lattice_size + lx];
            let d = slots[(ly + 1) * lattice_size + lx + 1];
            lattice.add_triangle(a, d, c);
            lattice.add_triangle(d, a, b);
        }
    }

    if flat_shading {
        // Break vertex sharing: one vertex per triangle corner, so each
        // triangle can carry a uniform normal. Flat per-face normals need no
        // cross-chunk data, so their computation is left to the renderer.
        let mut positions = Vec::with_capacity(lattice.indices.len());
        let mut uvs = Vec::with_capacity(lattice.indices.len());
        let mut indices = Vec::with_capacity(lattice.indices.len());
        for (flat, &index) in lattice.indices.iter().enumerate() {
            positions.push(lattice.positions[index as usize]);
            uvs.push(lattice.uvs[index as usize]);
            indices.push(flat as u32);
        }
        return Ok(MeshBuffers {
            positions,
            uvs,
            indices,
            normals: None,
        });
    }

    let normals = lattice
        .normals
        .iter()
        .map(|n| n.normalize_or_zero().to_array())
        .collect();

    Ok(MeshBuffers {
        positions: lattice.positions,
        uvs: lattice.uvs,
        indices: lattice.indices,
        normals: Some(normals),
    })
}
