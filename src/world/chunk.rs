use crate::render::mesh::{BufferHandle, MeshData, RenderBackend};
use crate::world::block_data::BLOCKS;
use crate::world::block_id::BlockId;
use crate::world::chunk_coord::ChunkCoord;

pub const CHUNK_SIZE: i32 = 16;
pub const WORLD_HEIGHT: i32 = 256;
pub const MAX_HEIGHT: i32 = WORLD_HEIGHT - 1;
pub const CHUNK_VOLUME: usize = (CHUNK_SIZE * WORLD_HEIGHT * CHUNK_SIZE) as usize;

/// Local voxel index; the same layout the save format's section codec
/// addresses.
#[inline]
pub fn voxel_index(x: i32, y: i32, z: i32) -> usize {
    debug_assert!((0..CHUNK_SIZE).contains(&x));
    debug_assert!((0..WORLD_HEIGHT).contains(&y));
    debug_assert!((0..CHUNK_SIZE).contains(&z));
    (y * 256 + x * 16 + z) as usize
}

/// One 16-wide full-height voxel column: dense block ids, two light
/// channels, a per-column top cache, and the lifecycle flags that drive the
/// generate -> populate -> light -> mesh pipeline. Owned exclusively by the
/// world; all cross-chunk operations live there.
pub struct Chunk {
    pub coord: ChunkCoord,
    pub blocks: Vec<u16>,
    /// Post-generation snapshot taken when the chunk finishes loading; the
    /// save format stores the diff against it.
    original: Option<Vec<u16>>,
    sky_light: Vec<u8>,
    block_light: Vec<u8>,
    /// Topmost non-air y per column, indexed `x * 16 + z`. 0 for empty
    /// columns.
    pub tops: Vec<u8>,
    /// Highest non-air y in the whole chunk; bounds mesh and carve loops.
    pub max_y: i32,
    pub generated: bool,
    pub populated: bool,
    pub lit: bool,
    pub loaded: bool,
    pub optimized: bool,
    pub caves_done: bool,
    pub carve_requested: bool,
    pub mesh: Option<MeshData>,
    pub buffer: Option<BufferHandle>,
    /// Squared chunk distance from the player, refreshed on re-window.
    pub dist_sq: i32,
}

impl Chunk {
    pub fn new(coord: ChunkCoord) -> Self {
        Self {
            coord,
            blocks: vec![0; CHUNK_VOLUME],
            original: None,
            sky_light: vec![0; CHUNK_VOLUME],
            block_light: vec![0; CHUNK_VOLUME],
            tops: vec![0; 256],
            max_y: 0,
            generated: false,
            populated: false,
            lit: false,
            loaded: false,
            optimized: false,
            caves_done: false,
            carve_requested: false,
            mesh: None,
            buffer: None,
            dist_sq: 0,
        }
    }

    #[inline]
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> BlockId {
        BlockId(self.blocks[voxel_index(x, y, z)])
    }

    /// Writes a block and keeps the column top cache current.
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, id: BlockId) {
        self.blocks[voxel_index(x, y, z)] = id.0;
        let col = (x * 16 + z) as usize;
        if !id.is_air() {
            if y as u8 > self.tops[col] {
                self.tops[col] = y as u8;
            }
            if y > self.max_y {
                self.max_y = y;
            }
        } else if self.tops[col] as i32 == y {
            self.recompute_top(x, z);
        }
    }

    pub fn delete_block(&mut self, x: i32, y: i32, z: i32) {
        self.set_block(x, y, z, BlockId::AIR);
    }

    fn recompute_top(&mut self, x: i32, z: i32) {
        let col = (x * 16 + z) as usize;
        for y in (0..WORLD_HEIGHT).rev() {
            if self.blocks[voxel_index(x, y, z)] != 0 {
                self.tops[col] = y as u8;
                return;
            }
        }
        self.tops[col] = 0;
    }

    pub fn recompute_tops(&mut self) {
        self.max_y = 0;
        for x in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                self.recompute_top(x, z);
                self.max_y = self.max_y.max(self.tops[(x * 16 + z) as usize] as i32);
            }
        }
    }

    pub fn surface_height(&self, x: i32, z: i32) -> i32 {
        self.tops[(x * 16 + z) as usize] as i32
    }

    #[inline]
    pub fn get_sky_light(&self, x: i32, y: i32, z: i32) -> u8 {
        self.sky_light[voxel_index(x, y, z)]
    }

    #[inline]
    pub fn get_block_light(&self, x: i32, y: i32, z: i32) -> u8 {
        self.block_light[voxel_index(x, y, z)]
    }

    /// Shading light: the brighter of the two channels.
    #[inline]
    pub fn get_light(&self, x: i32, y: i32, z: i32) -> u8 {
        self.get_sky_light(x, y, z).max(self.get_block_light(x, y, z))
    }

    #[inline]
    pub fn set_sky_light(&mut self, x: i32, y: i32, z: i32, level: u8) {
        debug_assert!(level <= 15);
        self.sky_light[voxel_index(x, y, z)] = level;
    }

    #[inline]
    pub fn set_block_light(&mut self, x: i32, y: i32, z: i32, level: u8) {
        debug_assert!(level <= 15);
        self.block_light[voxel_index(x, y, z)] = level;
    }

    /// Zeroes both channels at a voxel (used when a placed block occludes
    /// previously lit space).
    pub fn clear_light(&mut self, x: i32, y: i32, z: i32) {
        let i = voxel_index(x, y, z);
        self.sky_light[i] = 0;
        self.block_light[i] = 0;
    }

    /// Marks the end of terrain construction: everything set after this
    /// snapshot counts as an edit and goes into the save diff.
    pub fn snapshot_original(&mut self) {
        if self.original.is_none() {
            self.original = Some(self.blocks.clone());
        }
    }

    /// Applies buffered edits from the save stream. Only meaningful once
    /// the chunk is populated; the caller sequences that.
    pub fn apply_edits(&mut self, edits: &std::collections::HashMap<u16, u16>) {
        for (&index, &id) in edits {
            let index = index as usize;
            if index >= CHUNK_VOLUME {
                continue;
            }
            let id = if BLOCKS.is_valid(BlockId(id)) {
                id
            } else {
                log::warn!("save references unknown block {:#x}, keeping terrain", id);
                continue;
            };
            let y = index as i32 / 256;
            let x = (index as i32 >> 4) & 15;
            let z = index as i32 & 15;
            self.set_block(x, y, z, BlockId(id));
        }
    }

    /// Sparse diff against the post-generation snapshot, ordered by voxel
    /// index. Empty when the chunk carries no edits worth saving.
    pub fn diff_edits(&self) -> Vec<(u16, u16)> {
        let Some(original) = &self.original else {
            return Vec::new();
        };
        let mut edits = Vec::new();
        for (i, (&now, &before)) in self.blocks.iter().zip(original).enumerate() {
            if now != before {
                edits.push((i as u16, now));
            }
        }
        edits
    }

    /// Uploads the optimized attribute arrays, replacing any previous
    /// buffer. Idempotent once the mesh is current.
    pub fn gen_mesh(&mut self, backend: &mut dyn RenderBackend) {
        if self.mesh.is_none() {
            return;
        }
        if let Some(old) = self.buffer.take() {
            backend.free_mesh(old);
        }
        if let Some(mesh) = &self.mesh {
            self.buffer = Some(backend.upload_mesh(mesh));
        }
    }

    /// Frees render resources on eviction. Storage is dropped with the
    /// chunk itself.
    pub fn unload(&mut self, backend: &mut dyn RenderBackend) {
        if let Some(buffer) = self.buffer.take() {
            backend.free_mesh(buffer);
        }
        self.mesh = None;
    }
}
