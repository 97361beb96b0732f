//! Integer chunk coordinates and chunk world bounds.

use glam::Vec2;

/// Position of a chunk in the infinite grid: world position divided by the
/// chunk's world size, rounded to the nearest integer. Hash and equality
/// are by value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkCoord {
    /// Grid column.
    pub x: i32,
    /// Grid row.
    pub y: i32,
}

impl ChunkCoord {
    /// Convenience constructor.
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The coordinate of the chunk containing `position`.
    pub fn from_world(position: Vec2, chunk_world_size: f32) -> Self {
        Self {
            x: (position.x / chunk_world_size).round() as i32,
            y: (position.y / chunk_world_size).round() as i32,
        }
    }

    /// World-space center of this chunk.
    pub fn world_center(&self, chunk_world_size: f32) -> Vec2 {
        Vec2::new(
            self.x as f32 * chunk_world_size,
            self.y as f32 * chunk_world_size,
        )
    }
}

impl std::fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A chunk's square footprint on the ground plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChunkBounds {
    center: Vec2,
    half_size: f32,
}

impl ChunkBounds {
    /// Bounds of the chunk at `coord` with the given world edge length.
    pub fn new(coord: ChunkCoord, chunk_world_size: f32) -> Self {
        Self {
            center: coord.world_center(chunk_world_size),
            half_size: chunk_world_size / 2.0,
        }
    }

    /// Distance from `point` to the nearest edge of the square, 0 inside.
    pub fn distance(&self, point: Vec2) -> f32 {
        let delta = (point - self.center).abs() - Vec2::splat(self.half_size);
        delta.max(Vec2::ZERO).length()
    }
}
