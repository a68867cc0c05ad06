use crate::world::block_data::BLOCKS;
use crate::world::block_id::BlockId;
use glam::Vec3;
use serde::{Deserialize, Serialize};

pub const INVENTORY_SIZE: usize = 36;
pub const HOTBAR_SIZE: u8 = 9;

/// One inventory slot: a block id and how many are stacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: BlockId,
    pub stack: u8,
}

#[derive(Debug, Clone)]
pub struct Inventory {
    pub items: [Option<Item>; INVENTORY_SIZE],
    pub hotbar_index: u8,
}

impl Default for Inventory {
    fn default() -> Self {
        Self {
            items: [None; INVENTORY_SIZE],
            hotbar_index: 0,
        }
    }
}

impl Inventory {
    /// Fills a slot from save data. Ids the catalog no longer knows are
    /// replaced with stone rather than dropped, so old saves stay usable.
    pub fn set_slot(&mut self, slot: usize, id: BlockId, stack: u8) {
        if slot >= INVENTORY_SIZE || id.is_air() {
            return;
        }
        let id = if BLOCKS.is_valid(id) {
            id
        } else {
            crate::world::block_data::block_ids::STONE
        };
        self.items[slot] = Some(Item { id, stack });
    }

    pub fn selected(&self) -> Option<Item> {
        self.items[self.hotbar_index as usize]
    }
}

/// The world-facing slice of player state: exactly what the save format
/// persists plus the chunk-window anchor.
#[derive(Debug, Clone)]
pub struct Player {
    pub name: String,
    pub pos: Vec3,
    /// Pitch, radians.
    pub rx: f32,
    /// Yaw, radians.
    pub ry: f32,
    pub flying: bool,
    pub spectator: bool,
    pub inventory: Inventory,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            name: "Player".into(),
            pos: Vec3::new(8.0, 80.0, 8.0),
            rx: 0.0,
            ry: 0.0,
            flying: false,
            spectator: false,
            inventory: Inventory::default(),
        }
    }
}

impl Player {
    pub fn chunk_x(&self) -> i32 {
        (self.pos.x.floor() as i32) >> 4
    }

    pub fn chunk_z(&self) -> i32 {
        (self.pos.z.floor() as i32) >> 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::block_data::block_ids;

    #[test]
    fn test_unknown_item_falls_back_to_stone() {
        let mut inv = Inventory::default();
        inv.set_slot(0, BlockId(0x3F7), 5);
        assert_eq!(inv.items[0].unwrap().id, block_ids::STONE);
        inv.set_slot(1, block_ids::LANTERN, 1);
        assert_eq!(inv.items[1].unwrap().id, block_ids::LANTERN);
    }

    #[test]
    fn test_chunk_anchor_floors_negatives() {
        let mut player = Player::default();
        player.pos = Vec3::new(-0.5, 64.0, 17.0);
        assert_eq!(player.chunk_x(), -1);
        assert_eq!(player.chunk_z(), 1);
    }
}
