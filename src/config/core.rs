use crate::config::chunksys::ChunkSysConfig;
use crate::config::worldgen::WorldGenConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub world_seed: u32,
    pub world_name: String,
    /// Chunk radius that is meshed and rendered. The loaded window extends
    /// four chunks further to host the dependency-gate neighborhoods.
    pub render_distance: i32,
    pub save_interval_secs: f32,
    #[serde(default)]
    pub worldgen: WorldGenConfig,
    #[serde(default)]
    pub chunksys: ChunkSysConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            world_seed: 0,
            world_name: "New World".into(),
            render_distance: 6,
            save_interval_secs: 300.0,
            worldgen: WorldGenConfig::default(),
            chunksys: ChunkSysConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Loads from a TOML file, falling back to defaults when the file is
    /// missing or malformed.
    pub fn load_or_default(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => match toml::from_str(&text) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("bad config {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}
