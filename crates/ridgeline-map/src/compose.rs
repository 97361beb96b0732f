//! Per-chunk heightmap composition: bordered noise, falloff, classification.

use glam::Vec2;

use ridgeline_noise::{FalloffMask, HeightGrid, NoiseParams, synthesize};

use crate::regions::{RegionGrid, RegionTable};

/// Width of the extra sample ring around a chunk's interior. The ring gives
/// the mesh builder real neighbor data for edge normals and is never
/// exposed outside the compositor/mesh-builder pair.
pub const BORDER: usize = 1;

/// The canonical generation result for one chunk.
#[derive(Clone, Debug)]
pub struct ChunkHeightmap {
    /// Bordered height samples, `(extent + 2*BORDER)` per side.
    pub grid: HeightGrid,
    /// Classified band per *interior* cell, when a region table was given.
    pub regions: Option<RegionGrid>,
}

/// Compose the heightmap for the chunk centered at `center` (world units).
///
/// Synthesizes bordered noise sampled at `center + params.offset`, then
/// optionally subtracts a falloff mask (clamping at zero), then classifies
/// interior cells against `regions`.
///
/// # Panics
///
/// Panics if a falloff mask is supplied whose size differs from the
/// bordered extent; masks are precomputed per chunk size and a mismatch is
/// a caller bug, not a runtime condition.
pub fn compose_chunk(
    extent: usize,
    center: Vec2,
    params: &NoiseParams,
    falloff: Option<&FalloffMask>,
    regions: Option<&RegionTable>,
) -> ChunkHeightmap {
    let bordered = extent + 2 * BORDER;

    let chunk_params = NoiseParams {
        offset: params.offset + center,
        ..params.clone()
    };
    let mut grid = synthesize(bordered, bordered, &chunk_params);

    if let Some(mask) = falloff {
        assert_eq!(
            mask.size(),
            bordered,
            "falloff mask size must match the bordered chunk extent"
        );
        for y in 0..bordered {
            for x in 0..bordered {
                let tapered = (grid.get(x, y) - mask.get(x, y)).clamp(0.0, 1.0);
                grid.set(x, y, tapered);
            }
        }
    }

    let regions = regions.map(|table| {
        let mut bands = Vec::with_capacity(extent * extent);
        for y in 0..extent {
            for x in 0..extent {
                let h = grid.get(x + BORDER, y + BORDER);
                bands.push(table.classify(h));
            }
        }
        RegionGrid::new(extent, extent, bands)
    });

    ChunkHeightmap { grid, regions }
}
