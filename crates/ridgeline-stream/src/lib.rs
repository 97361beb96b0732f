//! Chunk streaming: visibility, LOD selection, collider promotion, and the
//! asynchronous generation pipeline feeding them.

mod coord;
mod lod;
mod queue;
mod streamer;

pub use coord::{ChunkBounds, ChunkCoord};
pub use lod::{LodBand, LodTable};
pub use queue::{TaskError, WorkQueue};
pub use streamer::{StreamEvent, StreamerConfig, TerrainChunk, TerrainStreamer};
