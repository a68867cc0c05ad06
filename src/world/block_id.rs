use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Packed block id: low 8 bits select the base block, the high bits carry
/// the shape and orientation. This compact form is what chunk storage and
/// the save format hold; everything else decodes it into [`BlockState`]
/// first and re-packs only at those boundaries.
///
/// Bit layout:
/// ```text
/// 15    13 12  11  10   9     8     7        0
/// +-------+------+----+-----+-----+----------+
/// | unused| rot  |flip|stair|slab | base id  |
/// +-------+------+----+-----+-----+----------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u16);

pub const SLAB: u16 = 0x100;
pub const STAIR: u16 = 0x200;
pub const FLIP: u16 = 0x400;
pub const SOUTH: u16 = 0x800;
pub const EAST: u16 = 0x1000;
pub const WEST: u16 = 0x1800;
pub const ROTATION_MASK: u16 = 0x1800;
pub const SHAPE_MASK: u16 = SLAB | STAIR;

/// Quarter-turn about the vertical axis, as stored in bits 11-12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    None,
    South,
    East,
    West,
}

impl Rotation {
    pub fn from_bits(bits: u16) -> Self {
        match bits & ROTATION_MASK {
            SOUTH => Self::South,
            EAST => Self::East,
            WEST => Self::West,
            _ => Self::None,
        }
    }

    pub fn to_bits(self) -> u16 {
        match self {
            Self::None => 0,
            Self::South => SOUTH,
            Self::East => EAST,
            Self::West => WEST,
        }
    }
}

/// Slab/stair sub-shape selector from bits 8-9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShapeSel {
    #[default]
    Full,
    Slab,
    Stair,
}

impl ShapeSel {
    pub fn from_bits(bits: u16) -> Self {
        if bits & STAIR != 0 {
            Self::Stair
        } else if bits & SLAB != 0 {
            Self::Slab
        } else {
            Self::Full
        }
    }

    pub fn to_bits(self) -> u16 {
        match self {
            Self::Full => 0,
            Self::Slab => SLAB,
            Self::Stair => STAIR,
        }
    }
}

/// Fully decoded block id for in-memory logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockState {
    pub base: u16,
    pub shape: ShapeSel,
    pub rotation: Rotation,
    pub flipped: bool,
}

impl BlockState {
    pub fn pack(self) -> BlockId {
        BlockId(
            (self.base & 0xFF)
                | self.shape.to_bits()
                | if self.flipped { FLIP } else { 0 }
                | self.rotation.to_bits(),
        )
    }

    /// 3-bit precomputed-variant key: bit 0 = flip, bits 1-2 = rotation.
    pub fn variant_key(self) -> u8 {
        let bits = self.rotation.to_bits() | if self.flipped { FLIP } else { 0 };
        ((bits >> 10) & 7) as u8
    }
}

impl BlockId {
    pub const AIR: BlockId = BlockId(0);

    pub fn base_id(self) -> u16 {
        self.0 & 0xFF
    }

    pub fn is_air(self) -> bool {
        self.0 == 0
    }

    pub fn variant_key(self) -> u8 {
        self.decode().variant_key()
    }

    pub fn decode(self) -> BlockState {
        BlockState {
            base: self.base_id(),
            shape: ShapeSel::from_bits(self.0),
            rotation: Rotation::from_bits(self.0),
            flipped: self.0 & FLIP != 0,
        }
    }

    pub fn with_shape(self, shape: ShapeSel) -> BlockId {
        BlockId((self.0 & !SHAPE_MASK) | shape.to_bits())
    }

    pub fn with_rotation(self, rotation: Rotation) -> BlockId {
        BlockId((self.0 & !ROTATION_MASK) | rotation.to_bits())
    }
}

impl Display for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self::AIR
    }
}

impl From<u16> for BlockId {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl From<BlockId> for u16 {
    fn from(id: BlockId) -> u16 {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_pack_round_trip() {
        for raw in [0u16, 1, 0x105, 0x203, 0x607, 0x1A02, 0x0F01] {
            let id = BlockId(raw & 0x1FFF);
            assert_eq!(id.decode().pack(), id);
        }
    }

    #[test]
    fn test_variant_key_matches_orientation_bits() {
        let id = BlockId(3).with_shape(ShapeSel::Stair);
        assert_eq!(id.variant_key(), 0);
        assert_eq!(id.with_rotation(Rotation::South).variant_key(), 2);
        assert_eq!(id.with_rotation(Rotation::East).variant_key(), 4);
        assert_eq!(id.with_rotation(Rotation::West).variant_key(), 6);
        let flipped = BlockId(id.0 | FLIP);
        assert_eq!(flipped.with_rotation(Rotation::East).variant_key(), 5);
    }

    #[test]
    fn test_orientation_independent_of_base() {
        let a = BlockId(7).with_rotation(Rotation::West);
        let b = BlockId(200).with_rotation(Rotation::West);
        assert_eq!(a.decode().rotation, b.decode().rotation);
        assert_eq!(a.base_id(), 7);
        assert_eq!(b.base_id(), 200);
    }

    #[test]
    fn test_air_is_zero() {
        assert!(BlockId::AIR.is_air());
        assert_eq!(BlockId::default(), BlockId::AIR);
    }
}
