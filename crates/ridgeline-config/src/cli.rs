//! Command-line overrides for terrain configuration.

use std::path::PathBuf;

use clap::Parser;

use crate::config::TerrainSettings;

/// CLI values that override settings loaded from the RON config file.
#[derive(Parser, Debug, Default)]
#[command(name = "ridgeline", about = "Ridgeline terrain core")]
pub struct CliArgs {
    /// Path to the terrain config file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// World seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Noise sampling scale.
    #[arg(long)]
    pub scale: Option<f32>,

    /// Interior chunk extent (121 or 241).
    #[arg(long)]
    pub chunk_extent: Option<usize>,

    /// Per-triangle flat shading.
    #[arg(long)]
    pub flat_shading: Option<bool>,

    /// Island-style edge falloff.
    #[arg(long)]
    pub falloff: Option<bool>,

    /// Worker thread count (0 = size from CPU count).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Log filter (e.g. "debug", "info,ridgeline_stream=trace").
    #[arg(long)]
    pub log_level: Option<String>,
}

impl TerrainSettings {
    /// Apply CLI overrides to loaded settings.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(seed) = args.seed {
            self.noise.seed = seed;
        }
        if let Some(scale) = args.scale {
            self.noise.scale = scale;
        }
        if let Some(extent) = args.chunk_extent {
            self.streaming.chunk_extent = extent;
        }
        if let Some(flat) = args.flat_shading {
            self.terrain.flat_shading = flat;
        }
        if let Some(falloff) = args.falloff {
            self.terrain.use_falloff = falloff;
        }
        if let Some(workers) = args.workers {
            self.streaming.worker_threads = workers;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut settings = TerrainSettings::default();
        let args = CliArgs {
            seed: Some(777),
            flat_shading: Some(true),
            ..Default::default()
        };
        settings.apply_cli_overrides(&args);
        assert_eq!(settings.noise.seed, 777);
        assert!(settings.terrain.flat_shading);
        // Non-overridden fields retain defaults.
        assert_eq!(settings.streaming.chunk_extent, 241);
    }

    #[test]
    fn test_cli_no_override() {
        let original = TerrainSettings::default();
        let mut settings = TerrainSettings::default();
        settings.apply_cli_overrides(&CliArgs::default());
        assert_eq!(settings, original);
    }
}
