//! Configuration error types.

use ridgeline_map::RegionTableError;

/// Errors from loading, saving, or validating terrain configuration.
///
/// Out-of-range noise fields (scale, lacunarity, octaves) are auto-corrected
/// during validation and never reported here.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the config file from disk.
    #[error("failed to read config: {0}")]
    Read(#[source] std::io::Error),

    /// Failed to write the config file to disk.
    #[error("failed to write config: {0}")]
    Write(#[source] std::io::Error),

    /// Failed to parse RON content.
    #[error("failed to parse config: {0}")]
    Parse(#[source] ron::error::SpannedError),

    /// Failed to serialize config to RON.
    #[error("failed to serialize config: {0}")]
    Serialize(#[source] ron::Error),

    /// The chunk extent is not on the supported whitelist.
    #[error("unsupported chunk extent {0}; supported extents are 121 and 241")]
    UnsupportedChunkExtent(usize),

    /// The LOD table is empty, misordered, or incompatible with the extent.
    #[error("invalid LOD table: {0}")]
    InvalidLodTable(String),

    /// The collider LOD index does not name a band.
    #[error("collider LOD index {index} out of range for {bands} LOD bands")]
    InvalidColliderLod {
        /// Configured index.
        index: usize,
        /// Number of configured bands.
        bands: usize,
    },

    /// The region table failed validation.
    #[error("invalid region table: {0}")]
    InvalidRegions(#[from] RegionTableError),
}
