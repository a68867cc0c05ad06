pub mod block_data;
pub mod block_id;
pub mod chunk;
pub mod chunk_coord;
pub mod core;
pub mod edit_log;
pub mod generator;
pub mod light;
pub mod mesher;
pub mod pool;
pub mod shape;
pub mod storage;

// Re-export commonly used types
pub use block_data::{block_ids, BlockData, BlockRegistry, BLOCKS};
pub use block_id::{BlockId, BlockState, Rotation, ShapeSel};
pub use chunk::{Chunk, CHUNK_SIZE, MAX_HEIGHT};
pub use chunk_coord::ChunkCoord;
pub use self::core::{BlockEvent, Screen, SetBlockOpts, TickContext, World};
pub use edit_log::{BlockEdit, EditLog};
pub use generator::TerrainGenerator;
pub use light::LightChannel;
pub use pool::WorkerPool;
pub use shape::{Shape, ShapeId, ShapeRegistry, SHAPES};
pub use storage::SAVE_VERSION;

#[cfg(test)]
pub(crate) mod testutil {
    use crate::config::{ChunkSysConfig, EngineConfig, WorldGenConfig};
    use crate::player::Player;
    use crate::render::mesh::NullBackend;
    use crate::world::core::{Screen, TickContext, World};

    /// Superflat, cave-less config that drives the full pipeline quickly.
    pub(crate) fn flat_config(render_distance: i32) -> EngineConfig {
        EngineConfig {
            world_seed: 12345,
            world_name: "Test".into(),
            render_distance,
            worldgen: WorldGenConfig {
                superflat: true,
                caves: false,
                details: false,
                rivers: false,
            },
            chunksys: ChunkSysConfig {
                tick_budget_ms: 250,
                max_work_units: 1_000_000,
                worker_threads: 1,
                gate_stall_ticks: 100_000,
            },
            ..Default::default()
        }
    }

    pub(crate) fn run_until_idle(world: &mut World, player: &Player, backend: &mut NullBackend) {
        for _ in 0..10_000 {
            let mut ctx = TickContext {
                screen: Screen::Loading,
                player,
                backend,
            };
            world.tick(&mut ctx);
            if world.is_idle() {
                return;
            }
        }
        panic!("world never drained its queues");
    }

    /// Builds a world and runs the pipeline until every queued chunk is
    /// generated, lit, and meshed.
    pub(crate) fn ready_world(config: &EngineConfig) -> (World, Player, NullBackend) {
        let mut world = World::new(config);
        let player = Player::default();
        let mut backend = NullBackend::new();
        run_until_idle(&mut world, &player, &mut backend);
        (world, player, backend)
    }
}
