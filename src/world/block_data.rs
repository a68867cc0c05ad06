use crate::world::block_id::{BlockId, SHAPE_MASK, SLAB, STAIR};
use crate::world::shape::{ShapeId, SHAPES};
use bitflags::bitflags;
use once_cell::sync::Lazy;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BlockFlags: u8 {
        const SOLID = 1 << 0;
        const TRANSPARENT = 1 << 1;
        /// Eligible for the rotation bits of the id.
        const ROTATES = 1 << 2;
        /// Eligible for the flip bit of the id.
        const FLIPS = 1 << 3;
        /// Slab and stair derivatives are generated for this base block.
        const SHAPEABLE = 1 << 4;
        const FLORA = 1 << 5;
    }
}

/// Immutable per-id descriptor. Built once at startup from the base
/// definitions plus generated slab/stair derivatives, read-only after.
#[derive(Debug, Clone, Copy)]
pub struct BlockData {
    pub name: &'static str,
    pub solid: bool,
    pub transparent: bool,
    /// Light emission, 0-15.
    pub light_level: u8,
    /// Base shape; orientation variants are applied through the shape
    /// registry's variant table.
    pub shape: ShapeId,
    pub flags: BlockFlags,
    /// Texture atlas tiles per face direction (down, up, n, s, e, w).
    pub textures: [u16; 6],
    /// False for ids outside the catalog; such blocks read as air-like.
    pub defined: bool,
}

struct BaseDef {
    id: u16,
    name: &'static str,
    light: u8,
    shape: Shape0,
    flags: BlockFlags,
    textures: [u16; 6],
}

#[derive(Clone, Copy)]
enum Shape0 {
    Cube,
    Flower,
    Lantern,
    Fence,
    Door,
}

pub mod block_ids {
    use crate::world::block_id::BlockId;

    pub const AIR: BlockId = BlockId(0);
    pub const STONE: BlockId = BlockId(1);
    pub const GRASS: BlockId = BlockId(2);
    pub const DIRT: BlockId = BlockId(3);
    pub const COBBLESTONE: BlockId = BlockId(4);
    pub const PLANKS: BlockId = BlockId(5);
    pub const SAND: BlockId = BlockId(6);
    pub const GRAVEL: BlockId = BlockId(7);
    pub const LOG: BlockId = BlockId(8);
    pub const LEAVES: BlockId = BlockId(9);
    pub const GLASS: BlockId = BlockId(10);
    pub const GLOWSTONE: BlockId = BlockId(11);
    pub const LANTERN: BlockId = BlockId(12);
    pub const ROSE: BlockId = BlockId(13);
    pub const DANDELION: BlockId = BlockId(14);
    pub const TALL_GRASS: BlockId = BlockId(15);
    pub const FENCE: BlockId = BlockId(16);
    pub const DOOR: BlockId = BlockId(17);
    pub const BEDROCK: BlockId = BlockId(18);
    pub const COAL_ORE: BlockId = BlockId(19);
    pub const IRON_ORE: BlockId = BlockId(20);
    pub const GOLD_ORE: BlockId = BlockId(21);
    pub const DIAMOND_ORE: BlockId = BlockId(22);
}

const S: BlockFlags = BlockFlags::SOLID;
const T: BlockFlags = BlockFlags::TRANSPARENT;

#[rustfmt::skip]
fn base_defs() -> Vec<BaseDef> {
    use Shape0::*;
    let st = S.union(BlockFlags::SHAPEABLE);
    let fl = T.union(BlockFlags::FLORA);
    vec![
        BaseDef { id: 1,  name: "stone",        light: 0,  shape: Cube,    flags: st, textures: [1; 6] },
        BaseDef { id: 2,  name: "grass",        light: 0,  shape: Cube,    flags: S,  textures: [2, 0, 3, 3, 3, 3] },
        BaseDef { id: 3,  name: "dirt",         light: 0,  shape: Cube,    flags: S,  textures: [2; 6] },
        BaseDef { id: 4,  name: "cobblestone",  light: 0,  shape: Cube,    flags: st, textures: [4; 6] },
        BaseDef { id: 5,  name: "planks",       light: 0,  shape: Cube,    flags: st, textures: [5; 6] },
        BaseDef { id: 6,  name: "sand",         light: 0,  shape: Cube,    flags: S,  textures: [6; 6] },
        BaseDef { id: 7,  name: "gravel",       light: 0,  shape: Cube,    flags: S,  textures: [7; 6] },
        BaseDef { id: 8,  name: "log",          light: 0,  shape: Cube,    flags: S.union(BlockFlags::ROTATES), textures: [9, 9, 8, 8, 8, 8] },
        BaseDef { id: 9,  name: "leaves",       light: 0,  shape: Cube,    flags: S.union(T), textures: [10; 6] },
        BaseDef { id: 10, name: "glass",        light: 0,  shape: Cube,    flags: S.union(T), textures: [11; 6] },
        BaseDef { id: 11, name: "glowstone",    light: 15, shape: Cube,    flags: S,  textures: [12; 6] },
        BaseDef { id: 12, name: "lantern",      light: 14, shape: Lantern, flags: T,  textures: [13; 6] },
        BaseDef { id: 13, name: "rose",         light: 0,  shape: Flower,  flags: fl, textures: [14; 6] },
        BaseDef { id: 14, name: "dandelion",    light: 0,  shape: Flower,  flags: fl, textures: [15; 6] },
        BaseDef { id: 15, name: "tall_grass",   light: 0,  shape: Flower,  flags: fl, textures: [16; 6] },
        BaseDef { id: 16, name: "fence",        light: 0,  shape: Fence,   flags: S.union(T), textures: [5; 6] },
        BaseDef { id: 17, name: "door",         light: 0,  shape: Door,    flags: T.union(BlockFlags::ROTATES), textures: [17; 6] },
        BaseDef { id: 18, name: "bedrock",      light: 0,  shape: Cube,    flags: S,  textures: [18; 6] },
        BaseDef { id: 19, name: "coal_ore",     light: 0,  shape: Cube,    flags: S,  textures: [19; 6] },
        BaseDef { id: 20, name: "iron_ore",     light: 0,  shape: Cube,    flags: S,  textures: [20; 6] },
        BaseDef { id: 21, name: "gold_ore",     light: 0,  shape: Cube,    flags: S,  textures: [21; 6] },
        BaseDef { id: 22, name: "diamond_ore",  light: 0,  shape: Cube,    flags: S,  textures: [22; 6] },
    ]
}

pub struct BlockRegistry {
    /// Indexed by `id & 0x3FF` (base id plus slab/stair bits); rotation and
    /// flip bits never change the descriptor, only the resolved shape.
    table: Vec<BlockData>,
}

/// Built once at startup, read-only thereafter.
pub static BLOCKS: Lazy<BlockRegistry> = Lazy::new(BlockRegistry::build);

impl BlockRegistry {
    fn build() -> Self {
        let shapes = &*SHAPES;
        let air = BlockData {
            name: "air",
            solid: false,
            transparent: true,
            light_level: 0,
            shape: shapes.cube,
            flags: BlockFlags::TRANSPARENT,
            textures: [0; 6],
            defined: false,
        };
        let mut table = vec![air; 0x400];
        table[0].defined = true;

        for def in base_defs() {
            let shape = match def.shape {
                Shape0::Cube => shapes.cube,
                Shape0::Flower => shapes.flower,
                Shape0::Lantern => shapes.lantern,
                Shape0::Fence => shapes.fence,
                Shape0::Door => shapes.door,
            };
            let data = BlockData {
                name: def.name,
                solid: def.flags.contains(BlockFlags::SOLID),
                transparent: def.flags.contains(BlockFlags::TRANSPARENT),
                light_level: def.light,
                shape,
                flags: def.flags,
                textures: def.textures,
                defined: true,
            };
            table[def.id as usize] = data;

            // Slab and stair derivatives keep the base textures but pass
            // light and gain rotation/flip eligibility.
            if def.flags.contains(BlockFlags::SHAPEABLE) {
                let mut slab = data;
                slab.shape = shapes.slab;
                slab.transparent = true;
                slab.flags = def.flags | BlockFlags::TRANSPARENT | BlockFlags::FLIPS;
                table[(def.id | SLAB) as usize] = slab;

                let mut stair = data;
                stair.shape = shapes.stair;
                stair.transparent = true;
                stair.flags =
                    def.flags | BlockFlags::TRANSPARENT | BlockFlags::FLIPS | BlockFlags::ROTATES;
                table[(def.id | STAIR) as usize] = stair;
            }
        }
        Self { table }
    }

    pub fn get(&self, id: BlockId) -> &BlockData {
        &self.table[(id.0 & 0x3FF) as usize]
    }

    /// Whether the id's base+shape combination exists in the catalog.
    pub fn is_valid(&self, id: BlockId) -> bool {
        self.get(id).defined
    }

    /// Resolved shape for a packed id: base shape plus the id's 3-bit
    /// orientation key through the variant table.
    pub fn shape_of(&self, id: BlockId) -> ShapeId {
        SHAPES.variant(self.get(id).shape, id.variant_key())
    }

    /// Ids placeable from the inventory: every defined base plus its
    /// generated derivatives.
    pub fn defined_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.table.iter().enumerate().filter_map(|(i, d)| {
            (d.defined && i != 0).then_some(BlockId(i as u16))
        })
    }
}

/// True when the block fully occludes the face of a neighboring block: a
/// solid, non-transparent full cube.
pub fn occludes(id: BlockId) -> bool {
    let data = BLOCKS.get(id);
    data.solid && !data.transparent && id.0 & SHAPE_MASK == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::block_id::Rotation;

    #[test]
    fn test_air_is_transparent_nonsolid() {
        let air = BLOCKS.get(BlockId::AIR);
        assert!(!air.solid);
        assert!(air.transparent);
        assert_eq!(air.light_level, 0);
    }

    #[test]
    fn test_emitters() {
        assert_eq!(BLOCKS.get(block_ids::GLOWSTONE).light_level, 15);
        assert_eq!(BLOCKS.get(block_ids::LANTERN).light_level, 14);
        assert_eq!(BLOCKS.get(block_ids::STONE).light_level, 0);
    }

    #[test]
    fn test_slab_and_stair_derivatives() {
        let slab = BlockId(block_ids::STONE.0 | SLAB);
        let stair = BlockId(block_ids::STONE.0 | STAIR);
        assert!(BLOCKS.is_valid(slab));
        assert!(BLOCKS.is_valid(stair));
        assert_eq!(BLOCKS.get(slab).shape, SHAPES.slab);
        assert_eq!(BLOCKS.get(stair).shape, SHAPES.stair);
        // Grass is not shapeable; no derivative exists.
        assert!(!BLOCKS.is_valid(BlockId(block_ids::GRASS.0 | SLAB)));
    }

    #[test]
    fn test_shape_of_applies_rotation() {
        let stair = BlockId(block_ids::STONE.0 | STAIR);
        let east = stair.with_rotation(Rotation::East);
        assert_ne!(BLOCKS.shape_of(stair), BLOCKS.shape_of(east));
        assert_eq!(BLOCKS.get(stair).name, BLOCKS.get(east).name);
    }

    #[test]
    fn test_occlusion() {
        assert!(occludes(block_ids::STONE));
        assert!(!occludes(BlockId::AIR));
        assert!(!occludes(block_ids::GLASS));
        assert!(!occludes(BlockId(block_ids::STONE.0 | SLAB)));
    }
}
