//! Terrain configuration structs with RON persistence and validation.

use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::info;

use ridgeline_map::{CurveKey, HeightCurve, Region, RegionTable};
use ridgeline_mesh::lod_step;
use ridgeline_noise::{NoiseParams, NormalizeMode};
use ridgeline_stream::{LodBand, LodTable, StreamerConfig};

use crate::error::ConfigError;

/// Supported interior chunk extents. For each, `extent - 1` is divisible by
/// every supported LOD step (1, 2, 4, 6, 8, 10, 12), and the LOD-0 vertex
/// count stays under a 16-bit-index host's per-mesh ceiling.
pub const CHUNK_EXTENT_WHITELIST: [usize; 2] = [121, 241];

/// Top-level terrain configuration bundle, persisted as RON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerrainSettings {
    /// Noise synthesis settings.
    pub noise: NoiseSettings,
    /// Height shaping and shading settings.
    pub terrain: ShapeSettings,
    /// Height bands for classification. Empty disables classification.
    pub regions: Vec<RegionSetting>,
    /// LOD bands, finest first, ascending distance thresholds.
    pub lods: Vec<LodSetting>,
    /// Chunk streaming settings.
    pub streaming: StreamingSettings,
    /// Debug/development settings.
    pub debug: DebugSettings,
}

/// Serialized form of the noise normalization regime.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum NormalizeSetting {
    /// Per-grid observed min/max rescale.
    Local,
    /// Theoretical-amplitude normalization, comparable across chunks.
    #[default]
    Global,
}

/// Noise synthesis configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NoiseSettings {
    /// World seed.
    pub seed: u64,
    /// Sampling scale. Non-positive values are auto-corrected upward.
    pub scale: f32,
    /// Octave count. Negative values are auto-corrected to zero.
    pub octaves: i32,
    /// Amplitude decay per octave.
    pub persistence: f32,
    /// Frequency growth per octave. Values below 1 are auto-corrected to 1.
    pub lacunarity: f32,
    /// World-space sample offset.
    pub offset: [f32; 2],
    /// Normalization regime.
    pub normalize: NormalizeSetting,
}

/// Height shaping and shading configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShapeSettings {
    /// World-space height scale applied after the curve.
    pub height_multiplier: f32,
    /// Height remap curve keyframes as `[t, value]` pairs over [0, 1].
    pub height_curve: Vec<[f32; 2]>,
    /// Per-triangle vertex duplication instead of smooth baked normals.
    pub flat_shading: bool,
    /// Taper heights toward chunk edges (island-style terrain).
    pub use_falloff: bool,
}

/// One height classification band.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegionSetting {
    /// Band name, unique.
    pub name: String,
    /// Minimum height at which the band starts.
    pub threshold: f32,
    /// RGBA preview color.
    pub color: [u8; 4],
}

/// One LOD band.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LodSetting {
    /// Mesh decimation level.
    pub lod: u32,
    /// Maximum observer distance for this band.
    pub visible_distance: f32,
}

/// Chunk streaming configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamingSettings {
    /// Interior samples per chunk side; must be on
    /// [`CHUNK_EXTENT_WHITELIST`].
    pub chunk_extent: usize,
    /// Index of the LOD band used for collision meshes.
    pub collider_lod: usize,
    /// Distance at which a prepared collider mesh is committed.
    pub collider_install_distance: f32,
    /// Worker thread count; 0 sizes the pool from the CPU count.
    pub worker_threads: usize,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugSettings {
    /// Log filter override (e.g. "debug", "info,ridgeline_stream=trace").
    pub log_level: String,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            scale: 27.5,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            offset: [0.0, 0.0],
            normalize: NormalizeSetting::Global,
        }
    }
}

impl Default for ShapeSettings {
    fn default() -> Self {
        Self {
            height_multiplier: 24.0,
            // Flatten the water band so lakes stay level.
            height_curve: vec![[0.0, 0.0], [0.4, 0.0], [1.0, 1.0]],
            flat_shading: false,
            use_falloff: false,
        }
    }
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            chunk_extent: 241,
            collider_lod: 0,
            collider_install_distance: 5.0,
            worker_threads: 0,
        }
    }
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            log_level: String::new(),
        }
    }
}

/// The default island palette used when a config file carries no regions.
pub(crate) fn default_regions() -> Vec<RegionSetting> {
    [
        ("deep water", 0.0, [26, 60, 150]),
        ("shallow water", 0.3, [52, 98, 195]),
        ("sand", 0.4, [210, 205, 125]),
        ("grass", 0.45, [86, 152, 23]),
        ("forest", 0.55, [62, 107, 18]),
        ("rock", 0.7, [90, 69, 60]),
        ("snow", 0.9, [240, 240, 240]),
    ]
    .into_iter()
    .map(|(name, threshold, [r, g, b])| RegionSetting {
        name: name.to_string(),
        threshold,
        color: [r, g, b, 255],
    })
    .collect()
}

/// The default LOD ladder used when a config file carries no bands.
pub(crate) fn default_lods() -> Vec<LodSetting> {
    vec![
        LodSetting {
            lod: 0,
            visible_distance: 200.0,
        },
        LodSetting {
            lod: 1,
            visible_distance: 400.0,
        },
        LodSetting {
            lod: 2,
            visible_distance: 600.0,
        },
    ]
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            noise: NoiseSettings::default(),
            terrain: ShapeSettings::default(),
            regions: default_regions(),
            lods: default_lods(),
            streaming: StreamingSettings::default(),
            debug: DebugSettings::default(),
        }
    }
}

impl TerrainSettings {
    /// Load settings from `path`, or write and return the defaults if the
    /// file does not exist.
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
            let settings: TerrainSettings = ron::from_str(&contents).map_err(ConfigError::Parse)?;
            info!("loaded terrain config from {}", path.display());
            Ok(settings)
        } else {
            let settings = Self::default();
            settings.save(path)?;
            info!("created default terrain config at {}", path.display());
            Ok(settings)
        }
    }

    /// Save settings to `path` as pretty-printed RON.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(ConfigError::Write)?;
        }
        let pretty = ron::ser::PrettyConfig::new().depth_limit(3);
        let serialized = ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Serialize)?;
        std::fs::write(path, serialized).map_err(ConfigError::Write)
    }

    /// Validate and convert into the streamer's runtime configuration.
    ///
    /// Auto-corrects what the contract allows (non-positive scale, negative
    /// octaves, lacunarity below 1) and rejects what it does not: an
    /// off-whitelist chunk extent, an empty or misordered LOD table, a LOD
    /// whose step does not divide the extent, an out-of-range collider
    /// index, or a misordered region table.
    pub fn build(&self) -> Result<StreamerConfig, ConfigError> {
        let extent = self.streaming.chunk_extent;
        if !CHUNK_EXTENT_WHITELIST.contains(&extent) {
            return Err(ConfigError::UnsupportedChunkExtent(extent));
        }

        if self.lods.is_empty() {
            return Err(ConfigError::InvalidLodTable("no LOD bands".into()));
        }
        for (i, band) in self.lods.iter().enumerate() {
            if band.visible_distance <= 0.0 {
                return Err(ConfigError::InvalidLodTable(format!(
                    "band {i} has non-positive distance {}",
                    band.visible_distance
                )));
            }
            if i > 0 && band.visible_distance <= self.lods[i - 1].visible_distance {
                return Err(ConfigError::InvalidLodTable(format!(
                    "band {i} distance {} does not increase past {}",
                    band.visible_distance,
                    self.lods[i - 1].visible_distance
                )));
            }
            let step = lod_step(band.lod);
            if (extent - 1) % step != 0 {
                return Err(ConfigError::InvalidLodTable(format!(
                    "LOD {} (step {step}) does not divide extent {extent} minus one",
                    band.lod
                )));
            }
        }
        if self.streaming.collider_lod >= self.lods.len() {
            return Err(ConfigError::InvalidColliderLod {
                index: self.streaming.collider_lod,
                bands: self.lods.len(),
            });
        }

        let regions = if self.regions.is_empty() {
            None
        } else {
            let entries = self
                .regions
                .iter()
                .map(|r| Region::new(r.name.clone(), r.threshold, r.color))
                .collect();
            Some(RegionTable::new(entries)?)
        };

        let noise = NoiseParams {
            seed: self.noise.seed,
            scale: self.noise.scale,
            octaves: self.noise.octaves.max(0) as u32,
            persistence: self.noise.persistence,
            lacunarity: self.noise.lacunarity,
            offset: Vec2::from_array(self.noise.offset),
            normalize: match self.noise.normalize {
                NormalizeSetting::Local => NormalizeMode::Local,
                NormalizeSetting::Global => NormalizeMode::Global,
            },
        }
        .sanitized();

        let height_curve = HeightCurve::from_keys(
            self.terrain
                .height_curve
                .iter()
                .map(|&[t, value]| CurveKey::new(t, value))
                .collect(),
        );

        let lods = LodTable::new(
            self.lods
                .iter()
                .map(|band| LodBand::new(band.lod, band.visible_distance))
                .collect(),
        );

        Ok(StreamerConfig {
            chunk_extent: extent,
            noise,
            height_curve,
            height_multiplier: self.terrain.height_multiplier,
            flat_shading: self.terrain.flat_shading,
            use_falloff: self.terrain.use_falloff,
            regions,
            lods,
            collider_lod: self.streaming.collider_lod,
            collider_install_distance: self.streaming.collider_install_distance,
        })
    }

    /// Worker pool size, or `None` to size from the CPU count.
    pub fn worker_threads(&self) -> Option<usize> {
        (self.streaming.worker_threads > 0).then_some(self.streaming.worker_threads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ridgeline_map::RegionTableError;

    #[test]
    fn test_default_settings_build() {
        let config = TerrainSettings::default().build().unwrap();
        assert_eq!(config.chunk_extent, 241);
        assert_eq!(config.lods.len(), 3);
        assert!(config.regions.is_some());
    }

    #[test]
    fn test_ron_round_trip() {
        let settings = TerrainSettings::default();
        let text = ron::to_string(&settings).unwrap();
        let parsed: TerrainSettings = ron::from_str(&text).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let parsed: TerrainSettings =
            ron::from_str("(noise: (seed: 9, octaves: 6))").unwrap();
        assert_eq!(parsed.noise.seed, 9);
        assert_eq!(parsed.noise.octaves, 6);
        assert_eq!(parsed.noise.scale, 27.5);
        assert_eq!(parsed.streaming.chunk_extent, 241);
    }

    #[test]
    fn test_load_or_create_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("terrain.ron");

        let created = TerrainSettings::load_or_create(&path).unwrap();
        assert!(path.exists());
        let loaded = TerrainSettings::load_or_create(&path).unwrap();
        assert_eq!(created, loaded);
    }

    #[test]
    fn test_negative_octaves_clamped_not_rejected() {
        let mut settings = TerrainSettings::default();
        settings.noise.octaves = -3;
        settings.noise.scale = -1.0;
        settings.noise.lacunarity = 0.5;
        let config = settings.build().unwrap();
        assert_eq!(config.noise.octaves, 0);
        assert!(config.noise.scale > 0.0);
        assert_eq!(config.noise.lacunarity, 1.0);
    }

    #[test]
    fn test_off_whitelist_extent_rejected() {
        let mut settings = TerrainSettings::default();
        settings.streaming.chunk_extent = 100;
        assert!(matches!(
            settings.build(),
            Err(ConfigError::UnsupportedChunkExtent(100))
        ));
    }

    #[test]
    fn test_non_increasing_lod_distances_rejected() {
        let mut settings = TerrainSettings::default();
        settings.lods[1].visible_distance = settings.lods[0].visible_distance;
        assert!(matches!(
            settings.build(),
            Err(ConfigError::InvalidLodTable(_))
        ));
    }

    #[test]
    fn test_indivisible_lod_step_rejected() {
        let mut settings = TerrainSettings::default();
        // LOD 7 means step 14, which does not divide 240.
        settings.lods.push(LodSetting {
            lod: 7,
            visible_distance: 800.0,
        });
        assert!(matches!(
            settings.build(),
            Err(ConfigError::InvalidLodTable(_))
        ));
    }

    #[test]
    fn test_collider_lod_out_of_range_rejected() {
        let mut settings = TerrainSettings::default();
        settings.streaming.collider_lod = 3;
        assert!(matches!(
            settings.build(),
            Err(ConfigError::InvalidColliderLod { index: 3, bands: 3 })
        ));
    }

    #[test]
    fn test_misordered_regions_rejected() {
        let mut settings = TerrainSettings::default();
        settings.regions.swap(0, 6);
        assert!(matches!(
            settings.build(),
            Err(ConfigError::InvalidRegions(
                RegionTableError::Misordered { .. }
            ))
        ));
    }

    #[test]
    fn test_empty_regions_disable_classification() {
        let mut settings = TerrainSettings::default();
        settings.regions.clear();
        let config = settings.build().unwrap();
        assert!(config.regions.is_none());
    }
}
