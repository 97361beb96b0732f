//! Multi-octave fractal Brownian motion (fBm) height synthesis.
//!
//! Composites several octaves of Perlin noise into a normalized height grid.
//! Identical inputs always produce bit-identical grids, which chunk
//! regeneration relies on.

use glam::Vec2;
use noise::{NoiseFn, Perlin};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::grid::HeightGrid;

/// The Perlin primitive repeats beyond this input magnitude, so per-octave
/// offsets are drawn from `[-OFFSET_RANGE, OFFSET_RANGE)`.
const OFFSET_RANGE: i32 = 100_000;

/// Smallest allowed sampling scale. Non-positive scales are raised to this.
pub const MIN_SCALE: f32 = 1e-4;

/// How a raw fBm grid is mapped into `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NormalizeMode {
    /// Rescale this grid's own observed min/max to `[0, 1]`. Cheap, but
    /// neighboring grids normalize independently and can disagree in
    /// absolute height at their shared border.
    Local,
    /// Divide by twice the theoretical maximum amplitude sum, shifted into
    /// `[0, 1]` and clamped. Comparable across grids at the cost of not
    /// using the full output range.
    #[default]
    Global,
}

/// Configuration for one fBm synthesis call. Immutable per call.
#[derive(Clone, Debug, PartialEq)]
pub struct NoiseParams {
    /// Seed for the coherent primitive and the per-octave offset derivation.
    pub seed: u64,
    /// Spatial scale: larger values zoom out. Must be positive; use
    /// [`NoiseParams::sanitized`] to enforce the invariant.
    pub scale: f32,
    /// Number of noise layers composited. More octaves add finer detail.
    pub octaves: u32,
    /// Amplitude decay per octave, conventionally in `0..1`.
    pub persistence: f32,
    /// Frequency growth per octave, conventionally `>= 1`.
    pub lacunarity: f32,
    /// World-space sample offset, folded into every octave's offset.
    pub offset: Vec2,
    /// Normalization regime for the finished grid.
    pub normalize: NormalizeMode,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            seed: 0,
            scale: 25.0,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            offset: Vec2::ZERO,
            normalize: NormalizeMode::Global,
        }
    }
}

impl NoiseParams {
    /// Return a copy with out-of-range fields auto-corrected: non-positive
    /// scale raised to [`MIN_SCALE`], lacunarity below 1 raised to 1.
    /// These are corrections, not errors; synthesis never fails on them.
    pub fn sanitized(&self) -> Self {
        let mut p = self.clone();
        if !(p.scale > 0.0) {
            p.scale = MIN_SCALE;
        }
        if p.lacunarity < 1.0 {
            p.lacunarity = 1.0;
        }
        p
    }
}

/// Theoretical maximum of the octave amplitude sum: `Σ persistence^i`.
///
/// Global normalization divides by twice this value.
pub fn max_possible_height(octaves: u32, persistence: f32) -> f32 {
    let mut sum = 0.0;
    let mut amplitude = 1.0_f32;
    for _ in 0..octaves {
        sum += amplitude;
        amplitude *= persistence;
    }
    sum
}

/// Synthesize a `width x height` fBm grid.
///
/// Each octave samples the Perlin primitive at a distinct seeded offset so
/// octaves decorrelate; sampling is centered on the grid midpoint so grids
/// tile consistently under translation of `params.offset`.
pub fn synthesize(width: usize, height: usize, params: &NoiseParams) -> HeightGrid {
    let params = params.sanitized();
    let perlin = Perlin::new(params.seed as u32);

    // One offset pair per octave, derived from the seed. The user offset is
    // folded in here (x added, y subtracted) so panning moves the whole
    // fractal, not just the first octave.
    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let mut octave_offsets = Vec::with_capacity(params.octaves as usize);
    for _ in 0..params.octaves {
        let ox = rng.random_range(-OFFSET_RANGE..OFFSET_RANGE) as f32 + params.offset.x;
        let oy = rng.random_range(-OFFSET_RANGE..OFFSET_RANGE) as f32 - params.offset.y;
        octave_offsets.push(Vec2::new(ox, oy));
    }

    let max_possible = max_possible_height(params.octaves, params.persistence);

    let half_width = width as f32 / 2.0;
    let half_height = height as f32 / 2.0;

    let mut grid = HeightGrid::from_fn(width, height, |x, y| {
        let mut amplitude = 1.0_f32;
        let mut frequency = 1.0_f32;
        let mut sum = 0.0_f32;

        for octave in &octave_offsets {
            let sx = (x as f32 - half_width + octave.x) / params.scale * frequency;
            let sy = (y as f32 - half_height + octave.y) / params.scale * frequency;

            // The primitive is signed in [-1, 1]; octaves must be able to
            // cancel each other, so the signed value is weighted directly.
            let signed = perlin.get([sx as f64, sy as f64]) as f32;
            sum += signed * amplitude;

            amplitude *= params.persistence;
            frequency *= params.lacunarity;
        }

        sum
    });

    match params.normalize {
        NormalizeMode::Local => {
            let (min, max) = grid.min_max().unwrap_or((0.0, 0.0));
            let span = max - min;
            if span > 0.0 {
                grid.map_in_place(|v| (v - min) / span);
            } else {
                grid.map_in_place(|_| 0.0);
            }
        }
        NormalizeMode::Global => {
            if max_possible > 0.0 {
                let inv_span = 1.0 / (2.0 * max_possible);
                grid.map_in_place(|v| ((v + max_possible) * inv_span).clamp(0.0, 1.0));
            } else {
                // Zero octaves: the raw grid is identically zero, which the
                // shifted remap maps to the midpoint.
                grid.map_in_place(|_| 0.5);
            }
        }
    }

    grid
}
