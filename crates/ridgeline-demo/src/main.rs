//! Headless demo: streams terrain around a moving observer and reports
//! chunk, mesh, and collider activity.
//!
//! Configuration is loaded from `terrain.ron` (created with defaults on
//! first run) and can be overridden via CLI flags. Run with
//! `cargo run -p ridgeline-demo -- --ticks 600 --speed 12`, or with
//! `--preview` to compose a single chunk and report its preview grids.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use glam::Vec2;
use tracing::info;

use ridgeline_config::{CliArgs, ConfigError, TerrainSettings};
use ridgeline_log::init_logging;
use ridgeline_map::{BORDER, compose_chunk, render_height_grid, render_region_grid};
use ridgeline_noise::FalloffMask;
use ridgeline_stream::{StreamEvent, StreamerConfig, TerrainStreamer, WorkQueue};

#[derive(Parser, Debug)]
#[command(name = "ridgeline-demo", about = "Headless terrain streaming demo")]
struct DemoArgs {
    #[command(flatten)]
    config: CliArgs,

    /// Number of control ticks to simulate.
    #[arg(long, default_value_t = 300)]
    ticks: u32,

    /// Observer speed in world units per tick.
    #[arg(long, default_value_t = 6.0)]
    speed: f32,

    /// Compose one chunk, report preview grid statistics, and exit.
    #[arg(long)]
    preview: bool,
}

#[derive(Default)]
struct StreamStats {
    heightmaps: usize,
    activations: usize,
    visibility_flips: usize,
    colliders: usize,
}

impl StreamStats {
    fn record(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::HeightmapReady { .. } => self.heightmaps += 1,
            StreamEvent::MeshActivated { .. } => self.activations += 1,
            StreamEvent::VisibilityChanged { .. } => self.visibility_flips += 1,
            StreamEvent::ColliderInstalled { .. } => self.colliders += 1,
        }
    }
}

fn main() -> Result<(), ConfigError> {
    let args = DemoArgs::parse();

    let config_path = args
        .config
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("terrain.ron"));
    let mut settings = TerrainSettings::load_or_create(&config_path)?;
    settings.apply_cli_overrides(&args.config);
    init_logging(Some(&settings.debug.log_level));

    let config = settings.build()?;
    info!(
        seed = config.noise.seed,
        chunk_extent = config.chunk_extent,
        lod_bands = config.lods.len(),
        max_view = config.lods.max_view_distance(),
        "terrain configuration ready"
    );

    if args.preview {
        run_preview(&config);
        return Ok(());
    }

    let queue: WorkQueue<TerrainStreamer> = match settings.worker_threads() {
        Some(count) => WorkQueue::new(count),
        None => WorkQueue::with_default_workers(),
    };
    let mut streamer = TerrainStreamer::new(config);

    let direction = Vec2::new(1.0, 0.35).normalize();
    let mut observer = Vec2::ZERO;
    let mut stats = StreamStats::default();

    for tick in 0..args.ticks {
        queue.drain(&mut streamer);
        streamer.tick(observer, &queue);
        for event in streamer.drain_events() {
            stats.record(&event);
        }

        if tick % 60 == 0 {
            let visible = streamer.chunks().filter(|c| c.is_visible()).count();
            info!(
                tick,
                tracked = streamer.chunk_count(),
                visible,
                pending = queue.pending_count(),
                heightmaps = stats.heightmaps,
                activations = stats.activations,
                "streaming"
            );
        }

        observer += direction * args.speed;
        std::thread::sleep(Duration::from_millis(5));
    }

    info!(
        tracked = streamer.chunk_count(),
        heightmaps = stats.heightmaps,
        activations = stats.activations,
        visibility_flips = stats.visibility_flips,
        colliders = stats.colliders,
        "demo finished"
    );
    Ok(())
}

/// Compose the chunk at the origin and report its preview grids: grayscale
/// height pixels plus, when regions are configured, a band histogram.
fn run_preview(config: &StreamerConfig) {
    let falloff = config
        .use_falloff
        .then(|| FalloffMask::generate(config.chunk_extent + 2 * BORDER));
    let map = compose_chunk(
        config.chunk_extent,
        Vec2::ZERO,
        &config.noise,
        falloff.as_ref(),
        config.regions.as_ref(),
    );

    let height_image = render_height_grid(&map.grid);
    info!(
        width = height_image.width,
        height = height_image.height,
        bytes = height_image.pixels.len(),
        "height preview grid"
    );

    if let (Some(regions), Some(table)) = (map.regions.as_ref(), config.regions.as_ref()) {
        let color_image = render_region_grid(regions, table);
        info!(
            width = color_image.width,
            height = color_image.height,
            "region preview grid"
        );

        let mut counts = vec![0usize; table.len()];
        for y in 0..regions.height() {
            for x in 0..regions.width() {
                counts[regions.get(x, y) as usize] += 1;
            }
        }
        for (band, region) in table.iter().enumerate() {
            info!(band, name = %region.name, cells = counts[band], "region coverage");
        }
    }
}
