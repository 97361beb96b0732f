//! Observer-driven chunk streaming with per-LOD mesh caching.
//!
//! A control tick is two calls: `queue.drain(&mut streamer)` to deliver
//! completed generation work, then `streamer.tick(observer, &queue)` to
//! refresh visibility, LOD selection, and collider promotion and to issue
//! any new generation requests. Host adapters consume the resulting
//! [`StreamEvent`]s via [`TerrainStreamer::drain_events`].

use std::sync::Arc;

use glam::Vec2;
use hashbrown::HashMap;
use tracing::{debug, warn};

use ridgeline_map::{BORDER, ChunkHeightmap, HeightCurve, RegionTable, compose_chunk};
use ridgeline_mesh::{MeshBuffers, build_terrain_mesh};
use ridgeline_noise::{FalloffMask, NoiseParams};

use crate::coord::{ChunkBounds, ChunkCoord};
use crate::lod::LodTable;
use crate::queue::{TaskError, WorkQueue};

/// How far the observer must move (world units) before the visible chunk
/// set is recomputed. Per-chunk LOD refresh is not gated by this.
const OBSERVER_MOVE_THRESHOLD: f32 = 25.0;
const SQR_OBSERVER_MOVE_THRESHOLD: f32 = OBSERVER_MOVE_THRESHOLD * OBSERVER_MOVE_THRESHOLD;

/// Everything the streamer needs to generate and mesh chunks. Validated by
/// the configuration layer before construction.
#[derive(Clone, Debug)]
pub struct StreamerConfig {
    /// Interior samples per chunk side. The chunk's world edge length is
    /// `chunk_extent - 1`.
    pub chunk_extent: usize,
    /// Noise synthesis parameters shared by every chunk.
    pub noise: NoiseParams,
    /// Height remap applied before the multiplier.
    pub height_curve: HeightCurve,
    /// World-space height scale.
    pub height_multiplier: f32,
    /// Duplicate vertices per triangle instead of baking smooth normals.
    pub flat_shading: bool,
    /// Taper heights toward chunk edges with a falloff mask.
    pub use_falloff: bool,
    /// Optional height-band classification for preview/export consumers.
    pub regions: Option<RegionTable>,
    /// LOD bands, finest first.
    pub lods: LodTable,
    /// Index of the band whose mesh doubles as the collision surface.
    pub collider_lod: usize,
    /// Distance at which a prepared collider mesh is committed. Preparation
    /// starts earlier, at the collider band's own visible distance.
    pub collider_install_distance: f32,
}

/// Notifications for host renderer/physics adapters, emitted during drain
/// and tick and collected with [`TerrainStreamer::drain_events`].
#[derive(Clone, Debug)]
pub enum StreamEvent {
    /// A chunk's heightmap (and classification, if configured) arrived.
    HeightmapReady {
        /// Chunk that finished generating.
        coord: ChunkCoord,
        /// The composed heightmap, shared with the chunk cache.
        heightmap: Arc<ChunkHeightmap>,
    },
    /// A chunk entered or left the view distance.
    VisibilityChanged {
        /// Chunk whose visibility flipped.
        coord: ChunkCoord,
        /// New visibility.
        visible: bool,
    },
    /// A chunk switched its active mesh to this LOD band.
    MeshActivated {
        /// Chunk whose mesh changed.
        coord: ChunkCoord,
        /// Active band index.
        lod: usize,
        /// The mesh buffers to render, shared with the chunk cache.
        mesh: Arc<MeshBuffers>,
    },
    /// A chunk committed its collision mesh. Happens at most once per chunk.
    ColliderInstalled {
        /// Chunk that gained collision.
        coord: ChunkCoord,
        /// The collider-band mesh buffers.
        mesh: Arc<MeshBuffers>,
    },
}

#[derive(Clone, Default)]
struct LodSlot {
    mesh: Option<Arc<MeshBuffers>>,
    requested: bool,
}

/// Per-chunk streaming state. Created on first visibility, never freed;
/// out-of-range chunks are hidden and keep their caches.
pub struct TerrainChunk {
    coord: ChunkCoord,
    bounds: ChunkBounds,
    heightmap: Option<Arc<ChunkHeightmap>>,
    heightmap_requested: bool,
    slots: Vec<LodSlot>,
    active_lod: i32,
    visible: bool,
    collider_installed: bool,
}

impl TerrainChunk {
    fn new(coord: ChunkCoord, bounds: ChunkBounds, lod_count: usize) -> Self {
        Self {
            coord,
            bounds,
            heightmap: None,
            heightmap_requested: false,
            slots: vec![LodSlot::default(); lod_count],
            active_lod: -1,
            visible: false,
            collider_installed: false,
        }
    }

    /// This chunk's grid coordinate.
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// The cached heightmap, once received.
    pub fn heightmap(&self) -> Option<&Arc<ChunkHeightmap>> {
        self.heightmap.as_ref()
    }

    /// Active LOD band index, or -1 before any mesh was activated.
    pub fn active_lod(&self) -> i32 {
        self.active_lod
    }

    /// Whether the chunk is within view distance.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether a mesh is cached for the band.
    pub fn has_mesh(&self, lod: usize) -> bool {
        self.slots[lod].mesh.is_some()
    }

    /// Whether a mesh request is or was in flight for the band.
    pub fn is_mesh_requested(&self, lod: usize) -> bool {
        self.slots[lod].requested
    }

    /// Whether the collision mesh has been committed.
    pub fn collider_installed(&self) -> bool {
        self.collider_installed
    }
}

/// Owns the chunk table and drives visibility, LOD, and generation.
pub struct TerrainStreamer {
    config: Arc<StreamerConfig>,
    falloff: Option<Arc<FalloffMask>>,
    chunks: HashMap<ChunkCoord, TerrainChunk>,
    observer: Vec2,
    last_scan_observer: Option<Vec2>,
    chunk_world_size: f32,
    chunks_in_view: i32,
    events: Vec<StreamEvent>,
}

impl TerrainStreamer {
    /// Build a streamer from a validated configuration.
    ///
    /// # Panics
    ///
    /// Panics if `collider_lod` is out of range or the chunk extent is
    /// smaller than two samples; the configuration layer rejects both.
    pub fn new(config: StreamerConfig) -> Self {
        assert!(
            config.collider_lod < config.lods.len(),
            "collider LOD index out of range"
        );
        assert!(config.chunk_extent >= 2, "chunk extent too small");

        let chunk_world_size = (config.chunk_extent - 1) as f32;
        let chunks_in_view = (config.lods.max_view_distance() / chunk_world_size).round() as i32;
        let falloff = config
            .use_falloff
            .then(|| Arc::new(FalloffMask::generate(config.chunk_extent + 2 * BORDER)));

        Self {
            config: Arc::new(config),
            falloff,
            chunks: HashMap::new(),
            observer: Vec2::ZERO,
            last_scan_observer: None,
            chunk_world_size,
            chunks_in_view,
            events: Vec::new(),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &StreamerConfig {
        &self.config
    }

    /// Number of chunks ever tracked.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Look up a tracked chunk.
    pub fn chunk(&self, coord: ChunkCoord) -> Option<&TerrainChunk> {
        self.chunks.get(&coord)
    }

    /// Iterate over all tracked chunks.
    pub fn chunks(&self) -> impl Iterator<Item = &TerrainChunk> {
        self.chunks.values()
    }

    /// Take the events accumulated since the last call.
    pub fn drain_events(&mut self) -> Vec<StreamEvent> {
        std::mem::take(&mut self.events)
    }

    /// Advance one control tick: refresh every tracked chunk's distance,
    /// LOD, and collider state, then — if the observer moved beyond the
    /// hysteresis threshold since the last scan — recompute the visible
    /// chunk set and start tracking newcomers.
    ///
    /// Call [`WorkQueue::drain`] with this streamer first so completed
    /// generation work is visible to the refresh.
    pub fn tick(&mut self, observer: Vec2, queue: &WorkQueue<Self>) {
        self.observer = observer;

        let tracked: Vec<ChunkCoord> = self.chunks.keys().copied().collect();
        for coord in tracked {
            self.refresh_chunk(coord, queue);
        }

        let should_scan = match self.last_scan_observer {
            None => true,
            Some(last) => last.distance_squared(observer) > SQR_OBSERVER_MOVE_THRESHOLD,
        };
        if should_scan {
            self.last_scan_observer = Some(observer);
            self.scan_for_new_chunks(queue);
        }
    }

    /// Track every untracked coordinate within view of the observer's
    /// current chunk and request its heightmap.
    fn scan_for_new_chunks(&mut self, queue: &WorkQueue<Self>) {
        let current = ChunkCoord::from_world(self.observer, self.chunk_world_size);
        for y_offset in -self.chunks_in_view..=self.chunks_in_view {
            for x_offset in -self.chunks_in_view..=self.chunks_in_view {
                let coord = ChunkCoord::new(current.x + x_offset, current.y + y_offset);
                if self.chunks.contains_key(&coord) {
                    continue;
                }
                let bounds = ChunkBounds::new(coord, self.chunk_world_size);
                let chunk = TerrainChunk::new(coord, bounds, self.config.lods.len());
                self.chunks.insert(coord, chunk);
                self.request_heightmap(coord, queue);
            }
        }
    }

    fn refresh_chunk(&mut self, coord: ChunkCoord, queue: &WorkQueue<Self>) {
        let max_view = self.config.lods.max_view_distance();
        let (distance, has_heightmap, heightmap_requested) = {
            let chunk = &self.chunks[&coord];
            (
                chunk.bounds.distance(self.observer),
                chunk.heightmap.is_some(),
                chunk.heightmap_requested,
            )
        };

        if !has_heightmap {
            // A failed generation cleared the request flag; re-attempt while
            // the chunk still matters.
            if !heightmap_requested && distance <= max_view {
                self.request_heightmap(coord, queue);
            }
            return;
        }

        let visible = distance <= max_view;
        if visible {
            let lod_index = self.config.lods.select(distance);
            let need_mesh_request = {
                let chunk = self.chunks.get_mut(&coord).expect("tracked chunk");
                if lod_index as i32 != chunk.active_lod {
                    if let Some(mesh) = chunk.slots[lod_index].mesh.clone() {
                        chunk.active_lod = lod_index as i32;
                        self.events.push(StreamEvent::MeshActivated {
                            coord,
                            lod: lod_index,
                            mesh,
                        });
                        false
                    } else {
                        !chunk.slots[lod_index].requested
                    }
                } else {
                    false
                }
            };
            if need_mesh_request {
                self.request_mesh(coord, lod_index, queue);
            }

            self.promote_collider(coord, distance, queue);
        }

        let chunk = self.chunks.get_mut(&coord).expect("tracked chunk");
        if chunk.visible != visible {
            chunk.visible = visible;
            self.events.push(StreamEvent::VisibilityChanged { coord, visible });
        }
    }

    /// Start preparing the collider-band mesh early and commit it late:
    /// request within the band's own visible distance, install only within
    /// the (smaller) install distance, and only ever once.
    fn promote_collider(&mut self, coord: ChunkCoord, distance: f32, queue: &WorkQueue<Self>) {
        let collider_lod = self.config.collider_lod;
        let prepare_distance = self.config.lods.get(collider_lod).visible_distance;
        let install_distance = self.config.collider_install_distance;

        let (need_request, install_mesh) = {
            let chunk = self.chunks.get_mut(&coord).expect("tracked chunk");
            if chunk.collider_installed {
                (false, None)
            } else {
                let slot = &chunk.slots[collider_lod];
                let need_request =
                    distance <= prepare_distance && slot.mesh.is_none() && !slot.requested;
                let install_mesh = if distance <= install_distance {
                    slot.mesh.clone()
                } else {
                    None
                };
                (need_request, install_mesh)
            }
        };

        if need_request {
            self.request_mesh(coord, collider_lod, queue);
        }
        if let Some(mesh) = install_mesh {
            let chunk = self.chunks.get_mut(&coord).expect("tracked chunk");
            chunk.collider_installed = true;
            self.events.push(StreamEvent::ColliderInstalled { coord, mesh });
        }
    }

    fn request_heightmap(&mut self, coord: ChunkCoord, queue: &WorkQueue<Self>) {
        let chunk = self.chunks.get_mut(&coord).expect("tracked chunk");
        debug_assert!(
            !chunk.heightmap_requested,
            "second heightmap request for {coord} while one is in flight"
        );
        chunk.heightmap_requested = true;

        let config = Arc::clone(&self.config);
        let falloff = self.falloff.clone();
        let center = coord.world_center(self.chunk_world_size);
        debug!(%coord, "requesting heightmap");
        queue.submit(
            move || {
                Ok(compose_chunk(
                    config.chunk_extent,
                    center,
                    &config.noise,
                    falloff.as_deref(),
                    config.regions.as_ref(),
                ))
            },
            move |streamer: &mut Self, result| streamer.on_heightmap(coord, result),
        );
    }

    fn on_heightmap(&mut self, coord: ChunkCoord, result: Result<ChunkHeightmap, TaskError>) {
        match result {
            Ok(heightmap) => {
                let heightmap = Arc::new(heightmap);
                if let Some(chunk) = self.chunks.get_mut(&coord) {
                    chunk.heightmap = Some(Arc::clone(&heightmap));
                    self.events
                        .push(StreamEvent::HeightmapReady { coord, heightmap });
                }
            }
            Err(err) => {
                warn!(%coord, %err, "heightmap generation failed");
                if let Some(chunk) = self.chunks.get_mut(&coord) {
                    chunk.heightmap_requested = false;
                }
            }
        }
    }

    fn request_mesh(&mut self, coord: ChunkCoord, lod_index: usize, queue: &WorkQueue<Self>) {
        let config = Arc::clone(&self.config);
        let chunk = self.chunks.get_mut(&coord).expect("tracked chunk");
        debug_assert!(
            !chunk.slots[lod_index].requested,
            "second mesh request for {coord} LOD {lod_index} while one is in flight"
        );
        let Some(heightmap) = chunk.heightmap.clone() else {
            return;
        };
        chunk.slots[lod_index].requested = true;

        let lod = config.lods.get(lod_index).lod;
        debug!(%coord, lod_index, "requesting mesh");
        queue.submit(
            move || {
                build_terrain_mesh(
                    &heightmap.grid,
                    &config.height_curve,
                    config.height_multiplier,
                    lod,
                    config.flat_shading,
                )
                .map_err(|err| TaskError::Failed(err.to_string()))
            },
            move |streamer: &mut Self, result| streamer.on_mesh(coord, lod_index, result),
        );
    }

    fn on_mesh(
        &mut self,
        coord: ChunkCoord,
        lod_index: usize,
        result: Result<MeshBuffers, TaskError>,
    ) {
        match result {
            Ok(mesh) => {
                if let Some(chunk) = self.chunks.get_mut(&coord) {
                    // The slot keeps its requested flag: the mesh is cached
                    // for the session and never re-requested.
                    chunk.slots[lod_index].mesh = Some(Arc::new(mesh));
                }
            }
            Err(err) => {
                warn!(%coord, lod_index, %err, "mesh generation failed");
                if let Some(chunk) = self.chunks.get_mut(&coord) {
                    chunk.slots[lod_index].requested = false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lod::LodBand;
    use std::time::{Duration, Instant};

    /// Small chunks so tests stay fast: interior 13 samples, 12 world units
    /// per chunk, three LOD bands (steps 1, 2, 4 all divide 12).
    fn test_config() -> StreamerConfig {
        StreamerConfig {
            chunk_extent: 13,
            noise: NoiseParams {
                seed: 3,
                ..Default::default()
            },
            height_curve: HeightCurve::identity(),
            height_multiplier: 4.0,
            flat_shading: false,
            use_falloff: false,
            regions: None,
            lods: LodTable::new(vec![
                LodBand::new(0, 24.0),
                LodBand::new(1, 48.0),
                LodBand::new(2, 72.0),
            ]),
            collider_lod: 0,
            collider_install_distance: 2.0,
        }
    }

    fn pump_until(
        streamer: &mut TerrainStreamer,
        queue: &WorkQueue<TerrainStreamer>,
        observer: Vec2,
        mut done: impl FnMut(&TerrainStreamer) -> bool,
    ) {
        let deadline = Instant::now() + Duration::from_secs(20);
        loop {
            queue.drain(streamer);
            streamer.tick(observer, queue);
            if done(streamer) {
                return;
            }
            assert!(Instant::now() < deadline, "streamer did not converge");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_first_tick_tracks_all_chunks_in_view() {
        let mut streamer = TerrainStreamer::new(test_config());
        let queue = WorkQueue::new(2);
        streamer.tick(Vec2::ZERO, &queue);

        // max view 72, chunk size 12: 6 chunks in each direction.
        let per_side = 2 * 6 + 1;
        assert_eq!(streamer.chunk_count(), per_side * per_side);
        assert_eq!(queue.pending_count(), per_side * per_side);
    }

    #[test]
    fn test_single_flight_heightmap_requests() {
        let mut streamer = TerrainStreamer::new(test_config());
        let queue = WorkQueue::new(2);
        // Two passes with no drain in between must not double-submit.
        streamer.tick(Vec2::ZERO, &queue);
        let submitted = queue.pending_count();
        streamer.tick(Vec2::ZERO, &queue);
        assert_eq!(
            queue.pending_count(),
            submitted,
            "a second pass without completions must not re-request"
        );
    }

    #[test]
    fn test_chunk_becomes_visible_with_finest_lod_at_observer() {
        let mut streamer = TerrainStreamer::new(test_config());
        let queue = WorkQueue::new(2);
        let origin = ChunkCoord::new(0, 0);

        pump_until(&mut streamer, &queue, Vec2::ZERO, |s| {
            s.chunk(origin).is_some_and(|c| c.active_lod() == 0)
        });

        let chunk = streamer.chunk(origin).unwrap();
        assert!(chunk.is_visible());
        assert!(chunk.has_mesh(0));

        let events = streamer.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            StreamEvent::MeshActivated { coord, lod: 0, .. } if *coord == origin
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            StreamEvent::VisibilityChanged { coord, visible: true } if *coord == origin
        )));
    }

    #[test]
    fn test_lod_coarsens_with_distance() {
        let mut streamer = TerrainStreamer::new(test_config());
        let queue = WorkQueue::new(4);

        // Chunk (3,0): bounds [30, 42] from the origin, distance 30 -> band 1.
        // Chunk (5,0): bounds [54, 66] from the origin, distance 54 -> band 2.
        let mid = ChunkCoord::new(3, 0);
        let far = ChunkCoord::new(5, 0);
        pump_until(&mut streamer, &queue, Vec2::ZERO, |s| {
            s.chunk(mid).is_some_and(|c| c.active_lod() >= 0)
                && s.chunk(far).is_some_and(|c| c.active_lod() >= 0)
        });

        assert_eq!(streamer.chunk(mid).unwrap().active_lod(), 1);
        assert_eq!(streamer.chunk(far).unwrap().active_lod(), 2);
    }

    #[test]
    fn test_collider_installed_once_at_observer_chunk() {
        let mut streamer = TerrainStreamer::new(test_config());
        let queue = WorkQueue::new(2);
        let origin = ChunkCoord::new(0, 0);

        pump_until(&mut streamer, &queue, Vec2::ZERO, |s| {
            s.chunk(origin).is_some_and(|c| c.collider_installed())
        });

        let events = streamer.drain_events();
        let installs = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::ColliderInstalled { coord, .. } if *coord == origin))
            .count();
        assert_eq!(installs, 1);

        // Re-entering range later must not reinstall.
        queue.drain(&mut streamer);
        streamer.tick(Vec2::ZERO, &queue);
        let events = streamer.drain_events();
        assert!(!events.iter().any(|e| matches!(
            e,
            StreamEvent::ColliderInstalled { coord, .. } if *coord == origin
        )));
    }

    #[test]
    fn test_chunks_hidden_not_freed_when_observer_leaves() {
        let mut streamer = TerrainStreamer::new(test_config());
        let queue = WorkQueue::new(2);
        let origin = ChunkCoord::new(0, 0);

        pump_until(&mut streamer, &queue, Vec2::ZERO, |s| {
            s.chunk(origin).is_some_and(|c| c.is_visible())
        });
        let _ = streamer.drain_events();
        let tracked_before = streamer.chunk_count();

        // Move far away: origin chunk hides but stays tracked with its caches.
        let far_away = Vec2::new(10_000.0, 0.0);
        queue.drain(&mut streamer);
        streamer.tick(far_away, &queue);

        let chunk = streamer.chunk(origin).unwrap();
        assert!(!chunk.is_visible());
        assert!(chunk.heightmap().is_some(), "caches survive hiding");
        assert!(streamer.chunk_count() > tracked_before, "new area tracked");

        let events = streamer.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            StreamEvent::VisibilityChanged { coord, visible: false } if *coord == origin
        )));
    }

    #[test]
    fn test_visible_set_scan_gated_by_hysteresis() {
        let mut streamer = TerrainStreamer::new(test_config());
        let queue = WorkQueue::new(2);

        streamer.tick(Vec2::ZERO, &queue);
        let tracked = streamer.chunk_count();

        // A 10-unit move would shift the observer's chunk coordinate, but it
        // is below the 25-unit hysteresis threshold: no scan, no new chunks.
        streamer.tick(Vec2::new(10.0, 0.0), &queue);
        assert_eq!(streamer.chunk_count(), tracked);

        // A move beyond the threshold rescans and tracks the new edge.
        streamer.tick(Vec2::new(30.0, 0.0), &queue);
        assert!(streamer.chunk_count() > tracked);
    }

    #[test]
    fn test_failed_mesh_leaves_chunk_without_active_lod() {
        // Band step 10 does not divide the 12-quad interior: every mesh
        // build fails, the chunk keeps its heightmap and never activates.
        let config = StreamerConfig {
            lods: LodTable::new(vec![LodBand::new(5, 24.0)]),
            ..test_config()
        };
        let mut streamer = TerrainStreamer::new(config);
        let queue = WorkQueue::new(1);
        let origin = ChunkCoord::new(0, 0);

        // Pump until a mesh request was issued and its failure reset the
        // requested flag (observed after a drain, before the next tick).
        let deadline = Instant::now() + Duration::from_secs(20);
        let mut saw_request = false;
        loop {
            queue.drain(&mut streamer);
            if let Some(chunk) = streamer.chunk(origin) {
                if chunk.is_mesh_requested(0) {
                    saw_request = true;
                } else if saw_request && chunk.heightmap().is_some() {
                    break;
                }
            }
            streamer.tick(Vec2::ZERO, &queue);
            assert!(Instant::now() < deadline, "mesh failure never round-tripped");
            std::thread::sleep(Duration::from_millis(1));
        }

        let chunk = streamer.chunk(origin).unwrap();
        assert_eq!(chunk.active_lod(), -1);
        assert!(!chunk.has_mesh(0));
        let events = streamer.drain_events();
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, StreamEvent::MeshActivated { .. })),
            "a failing build must never activate a mesh"
        );
    }
}
