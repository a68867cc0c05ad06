use crate::config::EngineConfig;
use crate::player::Player;
use crate::render::mesh::RenderBackend;
use crate::world::block_data::{block_ids, BLOCKS};
use crate::world::block_id::BlockId;
use crate::world::chunk::{Chunk, MAX_HEIGHT};
use crate::world::chunk_coord::ChunkCoord;
use crate::utils::error::WorldError;
use crate::world::edit_log::{BlockEdit, EditLog};
use crate::world::generator::{apply_carve_mask, PlaceRule, TerrainGenerator};
use crate::world::pool::{CaveJob, WorkerPool};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Extra chunk rings beyond the render distance kept loaded so the
/// dependency gate's 9x9 neighborhood always indexes inside the window.
pub const WINDOW_MARGIN: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Play,
    Loading,
    Paused,
    Menu,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SetBlockOpts {
    /// Skip light updates, remeshing and event emission (bulk edits).
    pub lazy: bool,
    /// Replayed from the network; never logged, never re-broadcast.
    pub remote: bool,
    /// Applied but kept out of the player's edit history.
    pub no_log: bool,
}

/// Emitted for every local, non-lazy block change; the multiplayer layer
/// drains these and broadcasts them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockEvent {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub id: BlockId,
}

/// Buffered edits for a chunk that is not currently windowed in, keyed by
/// local voxel index. Populated by `set_block` misses and by save loading;
/// drained when the chunk finishes loading.
#[derive(Debug, Default)]
pub struct PendingChunk {
    pub edits: HashMap<u16, u16>,
}

/// Everything the scheduler needs from the frame loop for one tick.
pub struct TickContext<'a> {
    pub screen: Screen,
    pub player: &'a Player,
    pub backend: &'a mut dyn RenderBackend,
}

pub struct World {
    pub(crate) seed: u32,
    pub(crate) name: String,
    pub(crate) generator: TerrainGenerator,
    pub(crate) loaded: Vec<Chunk>,
    pub(crate) offset_x: i32,
    pub(crate) offset_z: i32,
    pub(crate) lwidth: i32,
    render_distance: i32,

    /// Chunks waiting to advance through optimize/mesh, nearest first.
    pub(crate) chunk_gen_queue: Vec<ChunkCoord>,
    pub(crate) generate_queue: Vec<ChunkCoord>,
    pub(crate) populate_queue: Vec<ChunkCoord>,
    pub(crate) load_queue: Vec<ChunkCoord>,
    pub(crate) lighting_queue: Vec<ChunkCoord>,
    pub(crate) mesh_queue: Vec<ChunkCoord>,

    pub(crate) load_from: HashMap<ChunkCoord, PendingChunk>,
    pub(crate) edit_log: EditLog,
    events: Vec<BlockEvent>,
    pool: WorkerPool,

    pub(crate) tick_count: u32,
    pub(crate) generated_chunks: u32,
    last_window: Option<(i32, i32)>,
    screen: Screen,
    pub(crate) current_player: String,

    pub(crate) superflat: bool,
    pub(crate) caves: bool,
    pub(crate) details: bool,
    pub(crate) rivers: bool,
    /// Format version of the save this world came from, if any.
    pub(crate) loaded_version: Option<(u8, u8, u8)>,

    tick_budget: Duration,
    max_work_units: u32,
    gate_stall_ticks: u32,
    stalled_on: Option<(ChunkCoord, u32)>,
}

impl World {
    pub fn new(config: &EngineConfig) -> Self {
        let seed = if config.world_seed != 0 {
            config.world_seed
        } else {
            rand::random::<u32>() & 0x7FFF_FFFF
        };
        let worldgen = config.worldgen;
        Self {
            seed,
            name: config.world_name.clone(),
            generator: TerrainGenerator::new(seed, worldgen),
            loaded: Vec::new(),
            offset_x: 0,
            offset_z: 0,
            lwidth: 0,
            render_distance: config.render_distance,
            chunk_gen_queue: Vec::new(),
            generate_queue: Vec::new(),
            populate_queue: Vec::new(),
            load_queue: Vec::new(),
            lighting_queue: Vec::new(),
            mesh_queue: Vec::new(),
            load_from: HashMap::new(),
            edit_log: EditLog::new(),
            events: Vec::new(),
            pool: WorkerPool::new(config.chunksys.worker_threads),
            tick_count: 0,
            generated_chunks: 0,
            last_window: None,
            screen: Screen::Loading,
            current_player: "Player".into(),
            superflat: worldgen.superflat,
            caves: worldgen.caves,
            details: worldgen.details,
            rivers: worldgen.rivers,
            loaded_version: None,
            tick_budget: Duration::from_millis(config.chunksys.tick_budget_ms),
            max_work_units: config.chunksys.max_work_units,
            gate_stall_ticks: config.chunksys.gate_stall_ticks,
            stalled_on: None,
        }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tick_count(&self) -> u32 {
        self.tick_count
    }

    /// Re-seeds the generator. The worker pool needs no notification: every
    /// carve job carries the seed it should use.
    pub fn set_seed(&mut self, seed: u32) {
        self.seed = seed;
        self.generator = TerrainGenerator::new(
            seed,
            crate::config::WorldGenConfig {
                superflat: self.superflat,
                caves: self.caves,
                details: self.details,
                rivers: self.rivers,
            },
        );
    }

    pub fn set_current_player(&mut self, name: &str) {
        self.current_player = name.to_string();
    }

    pub fn loaded_version(&self) -> Option<(u8, u8, u8)> {
        self.loaded_version
    }

    /// Forgets the current window and queue state so the next tick
    /// re-centers from scratch. Save loading goes through here.
    pub(crate) fn reset_window(&mut self) {
        self.last_window = None;
        self.offset_x = 0;
        self.offset_z = 0;
        self.chunk_gen_queue.clear();
        self.generate_queue.clear();
        self.populate_queue.clear();
        self.load_queue.clear();
        self.lighting_queue.clear();
        self.mesh_queue.clear();
        self.generated_chunks = 0;
        self.stalled_on = None;
    }

    // --- window & chunk access -------------------------------------------

    #[inline]
    pub(crate) fn slot(&self, cx: i32, cz: i32) -> Option<usize> {
        let ix = cx + self.offset_x;
        let iz = cz + self.offset_z;
        if ix < 0 || iz < 0 || ix >= self.lwidth || iz >= self.lwidth {
            None
        } else {
            Some((ix * self.lwidth + iz) as usize)
        }
    }

    pub(crate) fn chunk_at(&self, cx: i32, cz: i32) -> Option<&Chunk> {
        self.slot(cx, cz).map(|i| &self.loaded[i])
    }

    pub(crate) fn chunk_at_mut(&mut self, cx: i32, cz: i32) -> Option<&mut Chunk> {
        self.slot(cx, cz).map(move |i| &mut self.loaded[i])
    }

    /// Uniform out-of-range contract: anything above the build height,
    /// below bedrock, or outside the loaded window reads as air.
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> BlockId {
        if y < 0 || y > MAX_HEIGHT {
            return BlockId::AIR;
        }
        match self.chunk_at(x >> 4, z >> 4) {
            Some(chunk) => chunk.get_block(x & 15, y, z & 15),
            None => BlockId::AIR,
        }
    }

    pub fn get_surface_height(&self, x: i32, z: i32) -> i32 {
        self.chunk_at(x >> 4, z >> 4)
            .map(|c| c.surface_height(x & 15, z & 15))
            .unwrap_or(0)
    }

    /// Direct write that bypasses lighting, logging and remeshing. The
    /// populate pass and save loading go through here.
    pub(crate) fn set_block_raw(&mut self, x: i32, y: i32, z: i32, id: BlockId) {
        if y < 0 || y > MAX_HEIGHT {
            return;
        }
        if let Some(chunk) = self.chunk_at_mut(x >> 4, z >> 4) {
            chunk.set_block(x & 15, y, z & 15, id);
        }
    }

    /// Populate-time conditional write: never overwrites existing blocks.
    pub(crate) fn spawn_block(&mut self, x: i32, y: i32, z: i32, id: BlockId) {
        if self.get_block(x, y, z).is_air() {
            self.set_block_raw(x, y, z, id);
        }
    }

    // --- block edits ------------------------------------------------------

    pub fn set_block(&mut self, x: i32, y: i32, z: i32, id: BlockId, opts: SetBlockOpts) {
        if y < 0 || y > MAX_HEIGHT {
            return;
        }
        let coord = ChunkCoord::from_block(x, z);
        let loaded = self
            .chunk_at(coord.x(), coord.z())
            .map(|c| c.loaded)
            .unwrap_or(false);
        if !loaded {
            // Outside the window (or not through the pipeline yet): buffer
            // the edit for when the chunk loads.
            let index = (y * 256 + (x & 15) * 16 + (z & 15)) as u16;
            self.load_from
                .entry(coord)
                .or_default()
                .edits
                .insert(index, id.0);
            return;
        }

        let xm = x & 15;
        let zm = z & 15;
        let chunk = self.chunk_at(coord.x(), coord.z()).expect("windowed chunk");
        let old = chunk.get_block(xm, y, zm);
        let has_buffer = chunk.buffer.is_some();

        if !opts.remote && !opts.no_log {
            let player = self.current_player.clone();
            self.edit_log.record(
                &player,
                BlockEdit {
                    x,
                    y,
                    z,
                    new_id: id,
                    old_id: old,
                    tick: self.tick_count,
                },
            );
        }

        // The light update keys off whichever block is opaque or emitting:
        // the one being placed, or the one being removed.
        let light_data = if !id.is_air() {
            *BLOCKS.get(id)
        } else {
            *BLOCKS.get(old)
        };
        {
            let chunk = self.chunk_at_mut(coord.x(), coord.z()).expect("windowed chunk");
            if !id.is_air() {
                chunk.set_block(xm, y, zm, id);
            } else {
                chunk.delete_block(xm, y, zm);
            }
        }
        if !opts.lazy
            && has_buffer
            && (!light_data.transparent || light_data.light_level > 0)
            && self.screen != Screen::Loading
        {
            self.update_light(x, y, z, !id.is_air(), light_data.light_level);
        }
        if opts.lazy {
            return;
        }
        if !opts.remote {
            self.events.push(BlockEvent { x, y, z, id });
        }

        self.request_remesh(x, y, z);
        self.request_remesh(x - 1, y, z);
        self.request_remesh(x + 1, y, z);
        self.request_remesh(x, y - 1, z);
        self.request_remesh(x, y + 1, z);
        self.request_remesh(x, y, z - 1);
        self.request_remesh(x, y, z + 1);
        // Corner voxels also touch the diagonal chunk's shading.
        match (xm, zm) {
            (0, 0) => self.request_remesh(x - 1, y, z - 1),
            (15, 0) => self.request_remesh(x + 1, y, z - 1),
            (0, 15) => self.request_remesh(x - 1, y, z + 1),
            (15, 15) => self.request_remesh(x + 1, y, z + 1),
            _ => {}
        }
    }

    pub fn delete_block(&mut self, x: i32, y: i32, z: i32, opts: SetBlockOpts) {
        self.set_block(x, y, z, BlockId::AIR, opts);
    }

    /// Marks the owning chunk for a mesh rebuild if it is already meshed.
    pub(crate) fn request_remesh(&mut self, x: i32, y: i32, z: i32) {
        if y < 0 || y > MAX_HEIGHT {
            return;
        }
        let coord = ChunkCoord::from_block(x, z);
        let Some(chunk) = self.chunk_at_mut(coord.x(), coord.z()) else {
            return;
        };
        if chunk.buffer.is_none() {
            return;
        }
        chunk.optimized = false;
        if !self.mesh_queue.contains(&coord) {
            self.mesh_queue.push(coord);
        }
    }

    pub fn drain_block_events(&mut self) -> Vec<BlockEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn history(&self, player: &str) -> &[BlockEdit] {
        self.edit_log.history(player)
    }

    /// Rolls back the player's most recent edit by re-applying the block it
    /// replaced. The rollback itself stays out of the history.
    pub fn undo(&mut self, player: &str) -> Result<BlockEdit, WorldError> {
        let edit = self
            .edit_log
            .pop_last(player)
            .ok_or_else(|| WorldError::NoHistory(player.to_string()))?;
        self.set_block(
            edit.x,
            edit.y,
            edit.z,
            edit.old_id,
            SetBlockOpts {
                no_log: true,
                ..Default::default()
            },
        );
        Ok(edit)
    }

    // --- pipeline ---------------------------------------------------------

    fn push_unique(queue: &mut Vec<ChunkCoord>, coord: ChunkCoord) {
        if !queue.contains(&coord) {
            queue.push(coord);
        }
    }

    /// Dependency gate: 9x9 generated, 7x7 populated, 5x5 load-applied,
    /// 3x3 lit around the candidate chunk. Queues whatever is missing and
    /// reports whether everything is already satisfied.
    pub(crate) fn fill_reqs(&mut self, cx: i32, cz: i32) -> bool {
        let mut done = true;
        for i in (cx - 4)..=(cx + 4) {
            for j in (cz - 4)..=(cz + 4) {
                let Some(slot) = self.slot(i, j) else {
                    done = false;
                    continue;
                };
                let coord = ChunkCoord::new(i, j);
                let ring = (i - cx).abs().max((j - cz).abs());
                let (generated, populated, loaded, lit) = {
                    let c = &self.loaded[slot];
                    (c.generated, c.populated, c.loaded, c.lit)
                };
                if !generated {
                    Self::push_unique(&mut self.generate_queue, coord);
                    done = false;
                }
                if !populated && ring <= 3 {
                    Self::push_unique(&mut self.populate_queue, coord);
                    done = false;
                }
                if !loaded && ring <= 2 {
                    if !populated {
                        done = false;
                    } else if self.load_from.contains_key(&coord) {
                        Self::push_unique(&mut self.load_queue, coord);
                        done = false;
                    } else {
                        // Nothing buffered for it; loading is just the
                        // snapshot point for the save diff.
                        let chunk = &mut self.loaded[slot];
                        chunk.snapshot_original();
                        chunk.loaded = true;
                    }
                }
                if !lit && ring <= 1 {
                    if loaded {
                        Self::push_unique(&mut self.lighting_queue, coord);
                    }
                    done = false;
                }
            }
        }
        done
    }

    fn generate_chunk(&mut self, coord: ChunkCoord) {
        if let Some(slot) = self.slot(coord.x(), coord.z()) {
            let chunk = &mut self.loaded[slot];
            self.generator.generate(chunk);
        }
    }

    /// Feature pass. Requires terrain (and carving, handled by the caller)
    /// to be complete; idempotent via the populated flag.
    fn populate_chunk(&mut self, coord: ChunkCoord) {
        let Some(slot) = self.slot(coord.x(), coord.z()) else {
            return;
        };
        {
            let chunk = &self.loaded[slot];
            if chunk.populated || !chunk.generated {
                return;
            }
        }
        let tops = self.loaded[slot].tops.clone();
        let decorations = self.generator.decorations(coord, &tops, self.details);
        for d in decorations {
            match d.rule {
                PlaceRule::InAir => self.spawn_block(d.x, d.y, d.z, d.id),
                PlaceRule::ReplaceStone => {
                    if self.get_block(d.x, d.y, d.z) == block_ids::STONE {
                        self.set_block_raw(d.x, d.y, d.z, d.id);
                    }
                }
                PlaceRule::OnGrass => {
                    if self.get_block(d.x, d.y, d.z).is_air()
                        && self.get_block(d.x, d.y - 1, d.z) == block_ids::GRASS
                    {
                        self.set_block_raw(d.x, d.y, d.z, d.id);
                    }
                }
            }
        }
        self.loaded[slot].populated = true;
    }

    /// Applies buffered save edits and snapshots the terrain for diffing.
    fn load_chunk(&mut self, coord: ChunkCoord) {
        let Some(slot) = self.slot(coord.x(), coord.z()) else {
            return;
        };
        if !self.loaded[slot].populated || self.loaded[slot].loaded {
            return;
        }
        let pending = self.load_from.remove(&coord);
        let chunk = &mut self.loaded[slot];
        chunk.snapshot_original();
        if let Some(pending) = pending {
            chunk.apply_edits(&pending.edits);
        }
        chunk.loaded = true;
    }

    /// Drains ready carve results into their chunks. Returns whether the
    /// named chunk is carved.
    fn poll_caves(&mut self, coord: ChunkCoord) -> bool {
        for result in self.pool.poll() {
            if let Some(chunk) = self.chunk_at_mut(result.coord.x(), result.coord.z()) {
                if !chunk.caves_done {
                    apply_carve_mask(chunk, &result.mask);
                    chunk.caves_done = true;
                    chunk.carve_requested = false;
                }
            }
        }
        self.chunk_at(coord.x(), coord.z())
            .map(|c| c.caves_done)
            .unwrap_or(true)
    }

    /// One cooperative drain of the work queues, bounded by the configured
    /// time/unit budget. Priority order: mesh uploads, generation,
    /// population (with async carving), save loading, lighting, then the
    /// gate-checked readiness queue.
    pub fn tick(&mut self, ctx: &mut TickContext) {
        self.screen = ctx.screen;
        self.tick_count += 1;

        let pcx = ctx.player.chunk_x();
        let pcz = ctx.player.chunk_z();
        if self.last_window != Some((pcx, pcz)) {
            self.load_chunks(pcx, pcz, ctx.backend);
        }
        if !matches!(ctx.screen, Screen::Play | Screen::Loading) {
            return;
        }

        let deadline = Instant::now() + self.tick_budget;
        let mut units = 0u32;
        let mut did_work = true;
        let mut gate_progress = false;
        while did_work && units < self.max_work_units && Instant::now() < deadline {
            did_work = false;

            while let Some(coord) = self.mesh_queue.pop() {
                if self.slot(coord.x(), coord.z()).is_none() {
                    continue;
                }
                if !self.loaded[self.slot(coord.x(), coord.z()).unwrap()].optimized {
                    self.optimize_chunk(coord);
                }
                let slot = self.slot(coord.x(), coord.z()).unwrap();
                self.loaded[slot].gen_mesh(ctx.backend);
                did_work = true;
                units += 1;
            }

            if !did_work {
                if let Some(coord) = self.generate_queue.pop() {
                    self.generate_chunk(coord);
                    did_work = true;
                }
            }

            if !did_work {
                if let Some(&coord) = self.populate_queue.last() {
                    if !self.caves {
                        if let Some(chunk) = self.chunk_at_mut(coord.x(), coord.z()) {
                            chunk.caves_done = true;
                        }
                    }
                    let carved = self.poll_caves(coord);
                    if carved {
                        self.populate_chunk(coord);
                        self.populate_queue.pop();
                        did_work = true;
                    } else {
                        let needs_submit = match self.chunk_at_mut(coord.x(), coord.z()) {
                            Some(chunk) if !chunk.carve_requested && chunk.generated => {
                                chunk.carve_requested = true;
                                true
                            }
                            _ => false,
                        };
                        if needs_submit {
                            let seed = self.seed;
                            self.pool.submit(CaveJob { seed, coord });
                        }
                        // Carve still in flight: yield to the other queues
                        // rather than busy-wait on the worker.
                    }
                }
            }

            if !did_work {
                if let Some(coord) = self.load_queue.pop() {
                    self.load_chunk(coord);
                    did_work = true;
                }
            }

            if !did_work {
                if let Some(coord) = self.lighting_queue.pop() {
                    self.fill_light_chunk(coord);
                    did_work = true;
                }
            }

            if !did_work && !self.chunk_gen_queue.is_empty() && self.lighting_queue.is_empty() {
                let coord = self.chunk_gen_queue[0];
                if !self.fill_reqs(coord.x(), coord.z()) {
                    // Deficits are queued now; progress resumes above.
                    did_work = self.has_stage_work();
                } else {
                    let slot = self.slot(coord.x(), coord.z()).expect("gated chunk in window");
                    if !self.loaded[slot].optimized {
                        self.optimize_chunk(coord);
                    } else if self.loaded[slot].buffer.is_none() {
                        self.loaded[slot].gen_mesh(ctx.backend);
                    } else {
                        self.chunk_gen_queue.remove(0);
                        self.generated_chunks += 1;
                    }
                    did_work = true;
                    gate_progress = true;
                }
            }
            if did_work {
                units += 1;
            }
        }

        self.check_starvation(gate_progress);
    }

    fn has_stage_work(&self) -> bool {
        !self.generate_queue.is_empty()
            || !self.populate_queue.is_empty()
            || !self.load_queue.is_empty()
            || !self.lighting_queue.is_empty()
            || !self.mesh_queue.is_empty()
    }

    /// Liveness guard: a chunk pinned at the head of the readiness queue
    /// with no gate progress and nothing in flight points at a bug in the
    /// neighbor-loading logic, not a transient condition.
    fn check_starvation(&mut self, gate_progress: bool) {
        let Some(&head) = self.chunk_gen_queue.first() else {
            self.stalled_on = None;
            return;
        };
        if gate_progress || self.has_stage_work() || self.pool.busy_count() > 0 {
            self.stalled_on = None;
            return;
        }
        match &mut self.stalled_on {
            Some((coord, ticks)) if *coord == head => {
                *ticks += 1;
                if *ticks == self.gate_stall_ticks {
                    log::warn!(
                        "chunk {:?} starved: dependency gate unsatisfied for {} ticks",
                        head,
                        ticks
                    );
                    debug_assert!(false, "dependency gate starvation for {:?}", head);
                }
            }
            _ => self.stalled_on = Some((head, 1)),
        }
    }

    /// Re-centers the loaded window on the player's chunk, keeping chunks
    /// still in range and evicting the rest. Evicted chunks flush their
    /// edit diff back into the pending map so nothing is lost before the
    /// next save.
    pub fn load_chunks(&mut self, pcx: i32, pcz: i32, backend: &mut dyn RenderBackend) {
        self.last_window = Some((pcx, pcz));
        let radius = self.render_distance + WINDOW_MARGIN;
        let lwidth = radius * 2 + 1;
        let min_cx = pcx - radius;
        let min_cz = pcz - radius;

        let mut retained: HashMap<ChunkCoord, Chunk> = HashMap::new();
        for mut chunk in self.loaded.drain(..) {
            let cx = chunk.coord.x();
            let cz = chunk.coord.z();
            if cx < min_cx || cx > min_cx + lwidth - 1 || cz < min_cz || cz > min_cz + lwidth - 1 {
                chunk.unload(backend);
                let edits = chunk.diff_edits();
                if !edits.is_empty() {
                    let pending = self.load_from.entry(chunk.coord).or_default();
                    for (index, id) in edits {
                        pending.edits.insert(index, id);
                    }
                }
            } else {
                retained.insert(chunk.coord, chunk);
            }
        }

        self.offset_x = -min_cx;
        self.offset_z = -min_cz;
        self.lwidth = lwidth;
        self.loaded = Vec::with_capacity((lwidth * lwidth) as usize);
        let player_chunk = ChunkCoord::new(pcx, pcz);
        for cx in min_cx..=(min_cx + lwidth - 1) {
            for cz in min_cz..=(min_cz + lwidth - 1) {
                let coord = ChunkCoord::new(cx, cz);
                let mut chunk = retained.remove(&coord).unwrap_or_else(|| {
                    let mut c = Chunk::new(coord);
                    c.caves_done = !self.caves;
                    c
                });
                chunk.dist_sq = coord.dist_sq(player_chunk);
                self.loaded.push(chunk);
            }
        }

        // Orphan removal: stage queues are rebuilt by the gate; remesh and
        // load requests survive only for chunks still in the window.
        self.generate_queue.clear();
        self.populate_queue.clear();
        self.lighting_queue.clear();
        let in_window = |coord: &ChunkCoord| {
            coord.x() >= min_cx
                && coord.x() < min_cx + lwidth
                && coord.z() >= min_cz
                && coord.z() < min_cz + lwidth
        };
        self.load_queue.retain(in_window);
        self.mesh_queue.retain(in_window);

        self.chunk_gen_queue.clear();
        let max_render = self.render_distance as f32 + std::f32::consts::FRAC_1_SQRT_2;
        for chunk in &self.loaded {
            if chunk.buffer.is_none() && (chunk.dist_sq as f32) <= max_render * max_render {
                self.chunk_gen_queue.push(chunk.coord);
            }
        }
        self.chunk_gen_queue
            .sort_by_key(|c| c.dist_sq(player_chunk));
        self.stalled_on = None;
        log::debug!(
            "window re-centered on ({}, {}): {} chunks, {} queued for mesh",
            pcx,
            pcz,
            self.loaded.len(),
            self.chunk_gen_queue.len()
        );
    }

    /// Frees every chunk's render resources, e.g. when leaving the world.
    /// Storage stays intact so a save can still be written afterwards.
    pub fn unload_all(&mut self, backend: &mut dyn RenderBackend) {
        for chunk in &mut self.loaded {
            chunk.unload(backend);
            chunk.optimized = false;
        }
        self.mesh_queue.clear();
    }

    // --- status -----------------------------------------------------------

    /// Readiness counters for progress display.
    pub fn progress(&self) -> (u32, usize) {
        (self.generated_chunks, self.chunk_gen_queue.len())
    }

    pub fn is_idle(&self) -> bool {
        self.chunk_gen_queue.is_empty() && !self.has_stage_work()
    }

    /// Meshed chunks in near-to-far order for the render pass.
    pub fn render_list(&self) -> Vec<(ChunkCoord, crate::render::mesh::BufferHandle)> {
        let mut list: Vec<_> = self
            .loaded
            .iter()
            .filter_map(|c| c.buffer.map(|b| (c.coord, b, c.dist_sq)))
            .collect();
        list.sort_by_key(|&(_, _, d)| d);
        list.into_iter().map(|(c, b, _)| (c, b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::mesh::NullBackend;
    use crate::world::light::LightChannel;
    use crate::world::testutil::{flat_config, ready_world, run_until_idle};

    fn play_tick(world: &mut World, player: &Player, backend: &mut NullBackend) {
        let mut ctx = TickContext {
            screen: Screen::Play,
            player,
            backend,
        };
        world.tick(&mut ctx);
    }

    #[test]
    fn test_out_of_range_reads_are_air() {
        let (world, _player, _backend) = ready_world(&flat_config(1));
        assert!(world.get_block(100_000, 50, 100_000).is_air());
        assert!(world.get_block(0, -1, 0).is_air());
        assert!(world.get_block(0, 256, 0).is_air());
        assert_eq!(world.get_block(8, 8, 8), block_ids::GRASS);
    }

    #[test]
    fn test_dependency_gate_held_for_every_meshed_chunk() {
        let (world, _player, _backend) = ready_world(&flat_config(1));
        let mut meshed = 0;
        for chunk in &world.loaded {
            if chunk.buffer.is_none() {
                continue;
            }
            meshed += 1;
            let (cx, cz) = (chunk.coord.x(), chunk.coord.z());
            for i in (cx - 4)..=(cx + 4) {
                for j in (cz - 4)..=(cz + 4) {
                    let n = world.chunk_at(i, j).expect("gate neighborhood in window");
                    let ring = (i - cx).abs().max((j - cz).abs());
                    assert!(n.generated, "ungenerated {},{} near meshed {},{}", i, j, cx, cz);
                    if ring <= 3 {
                        assert!(n.populated);
                    }
                    if ring <= 2 {
                        assert!(n.loaded);
                    }
                    if ring <= 1 {
                        assert!(n.lit);
                    }
                }
            }
        }
        // Render distance 1 meshes at least the 3x3 around the player.
        assert!(meshed >= 9, "only {} chunks meshed", meshed);
    }

    #[test]
    fn test_sky_light_column_and_convergence() {
        let (world, _player, _backend) = ready_world(&flat_config(1));
        // Superflat surface sits at y = 8: open sky above, opaque below.
        for y in [9, 20, 100, 255] {
            assert_eq!(world.get_light_channel(4, y, 4, LightChannel::Sky), 15);
        }
        assert_eq!(world.get_light_channel(4, 8, 4, LightChannel::Sky), 0);
        assert_eq!(world.get_light_channel(4, 3, 4, LightChannel::Sky), 0);

        // Flood-fill convergence: no transparent voxel sits more than one
        // level below any transparent neighbor.
        for x in -8..24 {
            for z in -8..24 {
                for y in 1..24 {
                    if !BLOCKS.get(world.get_block(x, y, z)).transparent {
                        continue;
                    }
                    let own = world.get_light_channel(x, y, z, LightChannel::Sky);
                    for (dx, dy, dz) in crate::world::shape::DIR_OFFSETS {
                        let (nx, ny, nz) = (x + dx, y + dy, z + dz);
                        if !BLOCKS.get(world.get_block(nx, ny, nz)).transparent {
                            continue;
                        }
                        let n = world.get_light_channel(nx, ny, nz, LightChannel::Sky);
                        assert!(
                            own + 1 >= n,
                            "light hole at ({},{},{}): {} vs neighbor {}",
                            x,
                            y,
                            z,
                            own,
                            n
                        );
                    }
                }
            }
        }
    }

    /// The spec's enclosed-room scenario: an emission-14 source in a dark
    /// 5x5x5 room lights the Manhattan-distance-3 voxel to exactly 11, and
    /// removing the source leaves the room fully dark again.
    #[test]
    fn test_enclosed_room_light_scenario() {
        let config = flat_config(1);
        let mut world = World::new(&config);
        let player = Player::default();
        let mut backend = NullBackend::new();

        // Build the 7x7x7 shell before the first tick; the edits buffer
        // into the pending map and the initial light pass sees the finished
        // room.
        let (rx, ry, rz) = (20, 40, 20);
        for dx in 0..7 {
            for dy in 0..7 {
                for dz in 0..7 {
                    let boundary = dx == 0 || dx == 6 || dy == 0 || dy == 6 || dz == 0 || dz == 6;
                    if boundary {
                        world.set_block(
                            rx + dx,
                            ry + dy,
                            rz + dz,
                            block_ids::STONE,
                            SetBlockOpts::default(),
                        );
                    }
                }
            }
        }
        run_until_idle(&mut world, &player, &mut backend);
        play_tick(&mut world, &player, &mut backend);

        let center = (rx + 3, ry + 3, rz + 3);
        for dx in -2..=2 {
            for dy in -2..=2 {
                for dz in -2..=2 {
                    let (x, y, z) = (center.0 + dx, center.1 + dy, center.2 + dz);
                    assert_eq!(world.get_light(x, y, z), 0, "room not dark at {},{},{}", x, y, z);
                }
            }
        }

        world.set_block(center.0, center.1, center.2, block_ids::LANTERN, SetBlockOpts::default());
        play_tick(&mut world, &player, &mut backend);
        assert_eq!(
            world.get_light_channel(center.0, center.1, center.2, LightChannel::Block),
            14
        );
        assert_eq!(
            world.get_light_channel(center.0 + 1, center.1, center.2, LightChannel::Block),
            13
        );
        // Manhattan distance 3 must read exactly 14 - 3 = 11.
        assert_eq!(
            world.get_light_channel(center.0 + 1, center.1 + 1, center.2 + 1, LightChannel::Block),
            11
        );
        assert_eq!(
            world.get_light_channel(center.0 + 2, center.1, center.2 + 1, LightChannel::Block),
            11
        );

        world.delete_block(center.0, center.1, center.2, SetBlockOpts::default());
        play_tick(&mut world, &player, &mut backend);
        for dx in -2..=2 {
            for dy in -2..=2 {
                for dz in -2..=2 {
                    let (x, y, z) = (center.0 + dx, center.1 + dy, center.2 + dz);
                    assert_eq!(
                        world.get_light_channel(x, y, z, LightChannel::Block),
                        0,
                        "stale light at {},{},{}",
                        x,
                        y,
                        z
                    );
                }
            }
        }
    }

    /// Retraction must never darken a voxel still reachable from a second,
    /// surviving source.
    #[test]
    fn test_light_retraction_keeps_second_source() {
        let config = flat_config(1);
        let mut world = World::new(&config);
        let player = Player::default();
        let mut backend = NullBackend::new();
        let (rx, ry, rz) = (20, 40, 20);
        // A 3-voxel-high, 9-long corridor with two lanterns near its ends.
        for dx in -1..=9 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let boundary = !(0..=8).contains(&dx) || dy != 0 || dz != 0;
                    if boundary {
                        world.set_block(
                            rx + dx,
                            ry + dy,
                            rz + dz,
                            block_ids::STONE,
                            SetBlockOpts::default(),
                        );
                    }
                }
            }
        }
        run_until_idle(&mut world, &player, &mut backend);
        play_tick(&mut world, &player, &mut backend);
        world.set_block(rx, ry, rz, block_ids::LANTERN, SetBlockOpts::default());
        world.set_block(rx + 8, ry, rz, block_ids::LANTERN, SetBlockOpts::default());
        play_tick(&mut world, &player, &mut backend);
        let mid = world.get_light_channel(rx + 4, ry, rz, LightChannel::Block);
        assert_eq!(mid, 10);

        world.delete_block(rx, ry, rz, SetBlockOpts::default());
        play_tick(&mut world, &player, &mut backend);
        // Everything the surviving lantern reaches keeps its gradient.
        for dx in 0..=8 {
            let expect = 14u8.saturating_sub((8 - dx) as u8);
            assert_eq!(
                world.get_light_channel(rx + dx, ry, rz, LightChannel::Block),
                expect,
                "corridor voxel {}",
                dx
            );
        }
    }

    #[test]
    fn test_set_block_idempotent() {
        let (mut world, player, mut backend) = ready_world(&flat_config(1));
        play_tick(&mut world, &player, &mut backend);
        let sample = |world: &World| {
            let mut out = Vec::new();
            for x in 0..12 {
                for y in 4..16 {
                    for z in 0..12 {
                        out.push((
                            world.get_block(x, y, z),
                            world.get_light_channel(x, y, z, LightChannel::Sky),
                            world.get_light_channel(x, y, z, LightChannel::Block),
                        ));
                    }
                }
            }
            out
        };
        world.set_block(5, 9, 5, block_ids::GLOWSTONE, SetBlockOpts::default());
        play_tick(&mut world, &player, &mut backend);
        let first = sample(&world);
        world.set_block(5, 9, 5, block_ids::GLOWSTONE, SetBlockOpts::default());
        play_tick(&mut world, &player, &mut backend);
        assert_eq!(first, sample(&world));
    }

    #[test]
    fn test_window_recenter_preserves_and_evicts() {
        let (mut world, mut player, mut backend) = ready_world(&flat_config(1));
        world.set_block(20, 30, 4, block_ids::COBBLESTONE, SetBlockOpts::default());
        assert!(world.chunk_at(-5, 0).is_some());

        player.pos.x += 64.0;
        run_until_idle(&mut world, &player, &mut backend);
        // Chunks behind the window edge are gone, kept chunks retain edits.
        assert!(world.chunk_at(-5, 0).is_none());
        assert_eq!(world.get_block(20, 30, 4), block_ids::COBBLESTONE);
        let live = world.loaded.iter().filter(|c| c.buffer.is_some()).count();
        assert_eq!(backend.live_buffers(), live);
    }

    #[test]
    fn test_pending_edits_apply_when_chunk_loads() {
        let config = flat_config(1);
        let (mut world, mut player, mut backend) = ready_world(&config);
        // Far outside the window: buffered, not applied.
        world.set_block(320, 40, 320, block_ids::PLANKS, SetBlockOpts::default());
        assert!(world.get_block(320, 40, 320).is_air());
        assert!(world.load_from.contains_key(&ChunkCoord::new(20, 20)));

        player.pos.x = 320.0;
        player.pos.z = 320.0;
        run_until_idle(&mut world, &player, &mut backend);
        assert_eq!(world.get_block(320, 40, 320), block_ids::PLANKS);
        assert!(!world.load_from.contains_key(&ChunkCoord::new(20, 20)));
    }

    #[test]
    fn test_block_events_emitted_for_local_edits_only() {
        let (mut world, _player, _backend) = ready_world(&flat_config(1));
        world.set_block(3, 9, 3, block_ids::SAND, SetBlockOpts::default());
        let events = world.drain_block_events();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0],
            BlockEvent {
                x: 3,
                y: 9,
                z: 3,
                id: block_ids::SAND
            }
        );

        world.set_block(
            3,
            10,
            3,
            block_ids::SAND,
            SetBlockOpts {
                remote: true,
                ..Default::default()
            },
        );
        assert!(world.drain_block_events().is_empty());

        world.set_block(
            3,
            11,
            3,
            block_ids::SAND,
            SetBlockOpts {
                lazy: true,
                ..Default::default()
            },
        );
        assert!(world.drain_block_events().is_empty());
    }

    #[test]
    fn test_edit_history_and_undo() {
        let (mut world, _player, _backend) = ready_world(&flat_config(1));
        world.set_current_player("alice");
        let old = world.get_block(6, 8, 6);
        world.set_block(6, 8, 6, block_ids::GLASS, SetBlockOpts::default());

        let history = world.history("alice");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].new_id, block_ids::GLASS);
        assert_eq!(history[0].old_id, old);

        let undone = world.undo("alice").unwrap();
        assert_eq!(undone.new_id, block_ids::GLASS);
        assert_eq!(world.get_block(6, 8, 6), old);
        assert!(world.history("alice").is_empty());
        assert!(world.undo("alice").is_err());
    }

    #[test]
    fn test_remote_edits_never_logged() {
        let (mut world, _player, _backend) = ready_world(&flat_config(1));
        world.set_current_player("alice");
        world.set_block(
            2,
            9,
            2,
            block_ids::SAND,
            SetBlockOpts {
                remote: true,
                ..Default::default()
            },
        );
        assert!(world.history("alice").is_empty());
    }

    #[test]
    fn test_surface_height_tracks_edits() {
        let (mut world, _player, _backend) = ready_world(&flat_config(1));
        assert_eq!(world.get_surface_height(4, 4), 8);
        world.set_block(4, 30, 4, block_ids::STONE, SetBlockOpts::default());
        assert_eq!(world.get_surface_height(4, 4), 30);
        world.delete_block(4, 30, 4, SetBlockOpts::default());
        assert_eq!(world.get_surface_height(4, 4), 8);
    }
}
