pub mod chunksys;
pub mod core;
pub mod worldgen;

pub use chunksys::ChunkSysConfig;
pub use self::core::EngineConfig;
pub use worldgen::WorldGenConfig;
