use std::path::{Path, PathBuf};

use cubebatch_common::{ChunkGrid, GridError};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("grid: {0}")]
    Grid(#[from] GridError),
    #[error("tile size must be non-zero")]
    ZeroTileSize,
}

/// Settings of a render subsystem, fixed for its lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Directory image paths are resolved against.
    pub asset_root: PathBuf,
    /// Pixel size of one atlas tile.
    pub tile_size: u32,
    /// Chunk partition of the world; fixes the slot count of every graphic.
    pub grid: ChunkGrid,
    pub clear_color: [f32; 4],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("res"),
            tile_size: 32,
            grid: ChunkGrid::default(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile_size == 0 {
            return Err(ConfigError::ZeroTileSize);
        }
        self.grid.validate()?;
        Ok(())
    }

    /// Read a config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: RenderConfig = serde_json::from_reader(std::fs::File::open(path)?)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded render config");
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        serde_json::to_writer_pretty(std::fs::File::create(path)?, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = RenderConfig::default();
        config.validate().unwrap();
        assert_eq!(config.tile_size, 32);
        assert_eq!(config.grid.chunk_count(), 512);
    }

    #[test]
    fn save_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("render.json");
        let config = RenderConfig {
            asset_root: PathBuf::from("assets/blocks"),
            tile_size: 16,
            grid: ChunkGrid::cubic(3, 8.0).unwrap(),
            clear_color: [0.2, 0.3, 0.4, 1.0],
        };
        config.save(&path).unwrap();
        assert_eq!(RenderConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("render.json");
        std::fs::write(&path, r#"{ "tile_size": 64 }"#).unwrap();
        let config = RenderConfig::load(&path).unwrap();
        assert_eq!(config.tile_size, 64);
        assert_eq!(config.asset_root, PathBuf::from("res"));
    }

    #[test]
    fn zero_tile_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("render.json");
        std::fs::write(&path, r#"{ "tile_size": 0 }"#).unwrap();
        assert!(matches!(
            RenderConfig::load(&path),
            Err(ConfigError::ZeroTileSize)
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            RenderConfig::load(&dir.path().join("nope.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
