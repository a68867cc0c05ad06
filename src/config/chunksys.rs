use serde::{Deserialize, Serialize};

/// Chunk pipeline tuning: scheduler budget, worker pool size, liveness guard.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkSysConfig {
    /// Soft time budget for one `World::tick` work drain, in milliseconds.
    pub tick_budget_ms: u64,
    /// Hard cap on work units per tick regardless of elapsed time.
    pub max_work_units: u32,
    /// Cave worker threads. 0 means `available_parallelism - 1`.
    pub worker_threads: usize,
    /// Ticks a chunk may sit at the head of the readiness queue without its
    /// dependency gate making progress before a starvation warning.
    pub gate_stall_ticks: u32,
}

impl Default for ChunkSysConfig {
    fn default() -> Self {
        Self {
            tick_budget_ms: 10,
            max_work_units: 256,
            worker_threads: 0,
            gate_stall_ticks: 600,
        }
    }
}
