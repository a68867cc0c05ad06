use crate::config::WorldGenConfig;
use crate::world::block_data::block_ids;
use crate::world::block_id::BlockId;
use crate::world::chunk::{Chunk, CHUNK_SIZE, MAX_HEIGHT};
use crate::world::chunk_coord::ChunkCoord;
use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use parking_lot::RwLock;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use std::collections::HashMap;

const BASE_TERRAIN_HEIGHT: f64 = 64.0;
const TERRAIN_AMPLITUDE: f64 = 24.0;
const SEA_LEVEL: i32 = 62;
const RIVER_HALF_WIDTH: f64 = 0.05;
const RIVER_DEPTH: f64 = 12.0;
const SUPERFLAT_SURFACE: i32 = 8;

/// How a decoration block is allowed to land in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceRule {
    /// Only into air.
    InAir,
    /// Only replacing stone (ore veins).
    ReplaceStone,
    /// Only into air directly above a grass block.
    OnGrass,
}

/// One decoration block in world coordinates, produced at populate time.
#[derive(Debug, Clone, Copy)]
pub struct Decoration {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub id: BlockId,
    pub rule: PlaceRule,
}

/// Deterministic terrain: every output is a pure function of the world
/// seed and the queried coordinate, so regenerated chunks are identical
/// across sessions.
pub struct TerrainGenerator {
    seed: u32,
    config: WorldGenConfig,
    terrain: Fbm<Perlin>,
    detail: Fbm<Perlin>,
    river: Fbm<Perlin>,
    height_cache: RwLock<HashMap<(i32, i32), i32>>,
}

impl TerrainGenerator {
    pub fn new(seed: u32, config: WorldGenConfig) -> Self {
        Self {
            seed,
            config,
            terrain: Fbm::<Perlin>::new(seed)
                .set_octaves(5)
                .set_frequency(0.008)
                .set_persistence(0.5)
                .set_lacunarity(2.0),
            detail: Fbm::<Perlin>::new(seed.wrapping_add(1))
                .set_octaves(3)
                .set_frequency(0.05)
                .set_persistence(0.8),
            river: Fbm::<Perlin>::new(seed.wrapping_add(2))
                .set_octaves(2)
                .set_frequency(0.002),
            height_cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn config(&self) -> &WorldGenConfig {
        &self.config
    }

    pub fn surface_height(&self, x: i32, z: i32) -> i32 {
        if self.config.superflat {
            return SUPERFLAT_SURFACE;
        }
        if let Some(&h) = self.height_cache.read().get(&(x, z)) {
            return h;
        }
        let fx = x as f64;
        let fz = z as f64;
        let mut h = BASE_TERRAIN_HEIGHT
            + self.terrain.get([fx, fz]) * TERRAIN_AMPLITUDE
            + self.detail.get([fx, fz]) * 4.0;
        if self.config.rivers {
            let r = self.river.get([fx, fz]).abs();
            if r < RIVER_HALF_WIDTH {
                h -= (RIVER_HALF_WIDTH - r) / RIVER_HALF_WIDTH * RIVER_DEPTH;
            }
        }
        let h = (h as i32).clamp(1, MAX_HEIGHT);
        self.height_cache.write().insert((x, z), h);
        h
    }

    /// Terrain fill. Writes block ids and the column top cache; features
    /// and cave carving come later in the pipeline.
    pub fn generate(&self, chunk: &mut Chunk) {
        if chunk.generated {
            return;
        }
        let bx = chunk.coord.block_x();
        let bz = chunk.coord.block_z();
        for x in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                let h = self.surface_height(bx + x, bz + z);
                chunk.set_block(x, 0, z, block_ids::BEDROCK);
                if self.config.superflat {
                    for y in 1..h {
                        chunk.set_block(x, y, z, block_ids::DIRT);
                    }
                    chunk.set_block(x, h, z, block_ids::GRASS);
                    continue;
                }
                for y in 1..(h - 3).max(1) {
                    chunk.set_block(x, y, z, block_ids::STONE);
                }
                for y in (h - 3).max(1)..h {
                    chunk.set_block(x, y, z, block_ids::DIRT);
                }
                let surface = if h <= SEA_LEVEL + 1 {
                    block_ids::SAND
                } else {
                    block_ids::GRASS
                };
                chunk.set_block(x, h, z, surface);
            }
        }
        chunk.generated = true;
    }

    /// Feature pass: ore veins always, surface decorations only with
    /// details enabled. `tops` is the chunk's column top cache after cave
    /// carving, indexed `x * 16 + z`.
    pub fn decorations(&self, coord: ChunkCoord, tops: &[u8], details: bool) -> Vec<Decoration> {
        let mut rng = ChaCha12Rng::seed_from_u64(
            self.seed as u64
                ^ (coord.x() as u64).wrapping_mul(341873128712)
                ^ (coord.z() as u64).wrapping_mul(132897987541),
        );
        let bx = coord.block_x();
        let bz = coord.block_z();
        let mut out = Vec::new();

        if !self.config.superflat {
            self.ore_veins(&mut rng, bx, bz, &mut out);
        }
        if details && !self.config.superflat {
            for _ in 0..rng.gen_range(0..3) {
                let x = rng.gen_range(2..14);
                let z = rng.gen_range(2..14);
                let top = tops[(x * 16 + z) as usize] as i32;
                self.tree(&mut rng, bx + x, top + 1, bz + z, &mut out);
            }
            for _ in 0..rng.gen_range(0..6) {
                let x = rng.gen_range(0..16);
                let z = rng.gen_range(0..16);
                let top = tops[(x * 16 + z) as usize] as i32;
                let id = match rng.gen_range(0..3) {
                    0 => block_ids::ROSE,
                    1 => block_ids::DANDELION,
                    _ => block_ids::TALL_GRASS,
                };
                out.push(Decoration {
                    x: bx + x,
                    y: top + 1,
                    z: bz + z,
                    id,
                    rule: PlaceRule::OnGrass,
                });
            }
        }
        out
    }

    fn ore_veins(&self, rng: &mut ChaCha12Rng, bx: i32, bz: i32, out: &mut Vec<Decoration>) {
        for _ in 0..8 {
            let depth = rng.gen_range(2..56);
            let ore = match depth {
                2..=14 => {
                    if rng.gen_ratio(1, 6) {
                        block_ids::DIAMOND_ORE
                    } else {
                        block_ids::GOLD_ORE
                    }
                }
                15..=32 => block_ids::IRON_ORE,
                _ => block_ids::COAL_ORE,
            };
            let mut x = rng.gen_range(0..16);
            let mut y = depth;
            let mut z = rng.gen_range(0..16);
            for _ in 0..rng.gen_range(3..7) {
                out.push(Decoration {
                    x: bx + x,
                    y,
                    z: bz + z,
                    id: ore,
                    rule: PlaceRule::ReplaceStone,
                });
                match rng.gen_range(0..6) {
                    0 => x = (x + 1).min(15),
                    1 => x = (x - 1).max(0),
                    2 => y = (y + 1).min(MAX_HEIGHT),
                    3 => y = (y - 1).max(1),
                    4 => z = (z + 1).min(15),
                    _ => z = (z - 1).max(0),
                }
            }
        }
    }

    fn tree(&self, rng: &mut ChaCha12Rng, x: i32, y: i32, z: i32, out: &mut Vec<Decoration>) {
        let height = rng.gen_range(4..7);
        for dy in 0..height {
            out.push(Decoration {
                x,
                y: y + dy,
                z,
                id: block_ids::LOG,
                rule: PlaceRule::InAir,
            });
        }
        let crown = y + height - 1;
        for dx in -2i32..=2 {
            for dz in -2i32..=2 {
                for dy in 0..2 {
                    if dx == 0 && dz == 0 && dy == 0 {
                        continue;
                    }
                    if dx.abs() == 2 && dz.abs() == 2 && rng.gen_ratio(1, 2) {
                        continue;
                    }
                    out.push(Decoration {
                        x: x + dx,
                        y: crown + dy,
                        z: z + dz,
                        id: block_ids::LEAVES,
                        rule: PlaceRule::InAir,
                    });
                }
            }
        }
        out.push(Decoration {
            x,
            y: crown + 2,
            z,
            id: block_ids::LEAVES,
            rule: PlaceRule::InAir,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::chunk_coord::ChunkCoord;

    #[test]
    fn test_generation_is_deterministic() {
        let config = WorldGenConfig::default();
        let gen_a = TerrainGenerator::new(12345, config);
        let gen_b = TerrainGenerator::new(12345, config);
        let coord = ChunkCoord::new(3, -2);
        let mut a = Chunk::new(coord);
        let mut b = Chunk::new(coord);
        gen_a.generate(&mut a);
        gen_b.generate(&mut b);
        assert_eq!(a.blocks, b.blocks);
        assert_eq!(a.tops, b.tops);
    }

    #[test]
    fn test_seed_changes_terrain() {
        let config = WorldGenConfig::default();
        let gen_a = TerrainGenerator::new(1, config);
        let gen_b = TerrainGenerator::new(2, config);
        let coord = ChunkCoord::new(0, 0);
        let mut a = Chunk::new(coord);
        let mut b = Chunk::new(coord);
        gen_a.generate(&mut a);
        gen_b.generate(&mut b);
        assert_ne!(a.blocks, b.blocks);
    }

    #[test]
    fn test_superflat_layers() {
        let config = WorldGenConfig {
            superflat: true,
            ..Default::default()
        };
        let gen = TerrainGenerator::new(7, config);
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0));
        gen.generate(&mut chunk);
        assert_eq!(chunk.get_block(5, 0, 5), block_ids::BEDROCK);
        assert_eq!(chunk.get_block(5, 3, 5), block_ids::DIRT);
        assert_eq!(chunk.get_block(5, SUPERFLAT_SURFACE, 5), block_ids::GRASS);
        assert!(chunk.get_block(5, SUPERFLAT_SURFACE + 1, 5).is_air());
        assert_eq!(chunk.surface_height(5, 5), SUPERFLAT_SURFACE);
    }

    #[test]
    fn test_decorations_deterministic_per_chunk() {
        let config = WorldGenConfig::default();
        let gen = TerrainGenerator::new(99, config);
        let tops = vec![70u8; 256];
        let a = gen.decorations(ChunkCoord::new(1, 1), &tops, true);
        let b = gen.decorations(ChunkCoord::new(1, 1), &tops, true);
        assert_eq!(a.len(), b.len());
        assert!(a
            .iter()
            .zip(&b)
            .all(|(d, e)| (d.x, d.y, d.z, d.id) == (e.x, e.y, e.z, e.id)));
    }
}
