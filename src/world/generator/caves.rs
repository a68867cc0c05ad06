use crate::world::block_data::block_ids;
use crate::world::chunk::{Chunk, CHUNK_SIZE, CHUNK_VOLUME};
use crate::world::chunk_coord::ChunkCoord;
use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

/// Carve masks are bit-packed over the full chunk volume.
pub const CARVE_WORDS: usize = CHUNK_VOLUME / 64;

const CARVE_THRESHOLD: f64 = 0.38;
const CARVE_CEILING: i32 = 120;

/// Computes the cave carve mask for one chunk. Stateless on purpose: the
/// worker pool calls this off-thread with nothing but the seed and the
/// chunk coordinate, and the synchronous fallback calls the same function.
pub fn carve_mask(seed: u32, coord: ChunkCoord) -> Vec<u64> {
    let caves = Fbm::<Perlin>::new(seed.wrapping_add(3))
        .set_octaves(3)
        .set_frequency(0.04)
        .set_persistence(0.7);
    let bx = coord.block_x();
    let bz = coord.block_z();
    let mut mask = vec![0u64; CARVE_WORDS];
    for x in 0..CHUNK_SIZE {
        for z in 0..CHUNK_SIZE {
            for y in 4..CARVE_CEILING {
                let sample = caves.get([
                    (bx + x) as f64,
                    y as f64 * 1.5,
                    (bz + z) as f64,
                ]);
                if sample > CARVE_THRESHOLD {
                    let index = (y * 256 + x * 16 + z) as usize;
                    mask[index / 64] |= 1 << (index % 64);
                }
            }
        }
    }
    mask
}

/// Applies a carve mask: stone and dirt become air, everything else
/// (bedrock, the surface layer's grass) is left alone. Recomputes the
/// column tops afterwards since surfaces may have opened up.
pub fn apply_carve_mask(chunk: &mut Chunk, mask: &[u64]) {
    debug_assert_eq!(mask.len(), CARVE_WORDS);
    let mut changed = false;
    for (word_index, &word) in mask.iter().enumerate() {
        if word == 0 {
            continue;
        }
        for bit in 0..64 {
            if word & (1 << bit) == 0 {
                continue;
            }
            let index = word_index * 64 + bit;
            let id = chunk.blocks[index];
            if id == block_ids::STONE.0 || id == block_ids::DIRT.0 {
                chunk.blocks[index] = 0;
                changed = true;
            }
        }
    }
    if changed {
        chunk.recompute_tops();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldGenConfig;
    use crate::world::generator::terrain::TerrainGenerator;

    #[test]
    fn test_carve_mask_deterministic() {
        let coord = ChunkCoord::new(2, 5);
        assert_eq!(carve_mask(42, coord), carve_mask(42, coord));
        assert_ne!(carve_mask(42, coord), carve_mask(43, coord));
    }

    #[test]
    fn test_apply_mask_spares_bedrock() {
        let gen = TerrainGenerator::new(42, WorldGenConfig::default());
        let coord = ChunkCoord::new(0, 0);
        let mut chunk = Chunk::new(coord);
        gen.generate(&mut chunk);
        let mut mask = vec![0u64; CARVE_WORDS];
        // Try to carve the bedrock floor and one stone voxel.
        mask[0] |= 1; // index 0 = (0, 0, 0), bedrock
        let stone_index = 10 * 256 + 8 * 16 + 8;
        mask[stone_index / 64] |= 1 << (stone_index % 64);
        apply_carve_mask(&mut chunk, &mask);
        assert_eq!(chunk.get_block(0, 0, 0), block_ids::BEDROCK);
        assert!(chunk.get_block(8, 10, 8).is_air());
    }
}
