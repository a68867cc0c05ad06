pub mod config;
pub mod player;
pub mod render;
pub mod utils;
pub mod world;

// Re-export commonly used types
pub use config::{ChunkSysConfig, EngineConfig, WorldGenConfig};
pub use player::{Inventory, Item, Player};
pub use render::{BufferHandle, MeshData, NullBackend, RenderBackend};
pub use utils::{BitReader, BitWriter, SaveError, WorldError};
pub use world::{
    BlockEvent, BlockId, ChunkCoord, LightChannel, Screen, SetBlockOpts, TickContext, World,
    BLOCKS, SHAPES,
};
