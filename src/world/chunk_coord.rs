use glam::IVec2;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;

/// Chunk-grid coordinate of a full-height chunk column. World block
/// coordinate `(x, z)` maps here via arithmetic shift by 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkCoord(pub IVec2);

impl Serialize for ChunkCoord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (self.0.x, self.0.y).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ChunkCoord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (x, z) = <(i32, i32)>::deserialize(deserializer)?;
        Ok(ChunkCoord(IVec2::new(x, z)))
    }
}

impl PartialOrd for ChunkCoord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ChunkCoord {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.0.x.cmp(&other.0.x) {
            Ordering::Equal => self.0.y.cmp(&other.0.y),
            ord => ord,
        }
    }
}

impl ChunkCoord {
    pub fn new(x: i32, z: i32) -> Self {
        Self(IVec2::new(x, z))
    }

    /// Chunk containing the given world block coordinate.
    pub fn from_block(x: i32, z: i32) -> Self {
        Self::new(x >> 4, z >> 4)
    }

    pub fn x(&self) -> i32 {
        self.0.x
    }

    pub fn z(&self) -> i32 {
        self.0.y
    }

    /// World block coordinate of the chunk's minimum corner.
    pub fn block_x(&self) -> i32 {
        self.0.x * 16
    }

    pub fn block_z(&self) -> i32 {
        self.0.y * 16
    }

    pub fn dist_sq(&self, other: ChunkCoord) -> i32 {
        let d = self.0 - other.0;
        d.x * d.x + d.y * d.y
    }
}

impl From<IVec2> for ChunkCoord {
    fn from(vec: IVec2) -> Self {
        Self(vec)
    }
}

impl From<ChunkCoord> for IVec2 {
    fn from(coord: ChunkCoord) -> Self {
        coord.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_block_rounds_toward_negative() {
        assert_eq!(ChunkCoord::from_block(0, 0), ChunkCoord::new(0, 0));
        assert_eq!(ChunkCoord::from_block(15, 15), ChunkCoord::new(0, 0));
        assert_eq!(ChunkCoord::from_block(16, -1), ChunkCoord::new(1, -1));
        assert_eq!(ChunkCoord::from_block(-16, -17), ChunkCoord::new(-1, -2));
    }

    #[test]
    fn test_block_corner_round_trip() {
        let c = ChunkCoord::new(-3, 7);
        assert_eq!(ChunkCoord::from_block(c.block_x(), c.block_z()), c);
    }
}
