//! Terrain configuration: RON persistence, CLI overrides, and validation
//! into the streamer's runtime configuration.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    CHUNK_EXTENT_WHITELIST, DebugSettings, LodSetting, NoiseSettings, NormalizeSetting,
    RegionSetting, ShapeSettings, StreamingSettings, TerrainSettings,
};
pub use error::ConfigError;
