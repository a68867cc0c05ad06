use serde::{Deserialize, Serialize};

/// World generation toggles. All of these are persisted in the save header.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WorldGenConfig {
    pub superflat: bool,
    pub caves: bool,
    /// Surface decorations (trees, flowers, tall grass).
    pub details: bool,
    pub rivers: bool,
}

impl Default for WorldGenConfig {
    fn default() -> Self {
        Self {
            superflat: false,
            caves: true,
            details: true,
            rivers: true,
        }
    }
}
