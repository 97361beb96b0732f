//! Deterministic multi-octave noise synthesis and edge falloff masks.

mod falloff;
mod fbm;
mod grid;

pub use falloff::FalloffMask;
pub use fbm::{NoiseParams, NormalizeMode, max_possible_height, synthesize};
pub use grid::HeightGrid;
