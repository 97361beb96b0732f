//! Heightmap composition: region classification, height remap curves, and
//! the bordered per-chunk heightmap pipeline.

mod compose;
mod curve;
mod preview;
mod regions;

pub use compose::{BORDER, ChunkHeightmap, compose_chunk};
pub use curve::{CurveKey, HeightCurve};
pub use preview::{PixelGrid, render_height_grid, render_region_grid};
pub use regions::{Region, RegionGrid, RegionTable, RegionTableError};
