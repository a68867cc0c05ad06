use crate::world::block_id::BlockId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One logged block change, the unit the history and undo commands work on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BlockEdit {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub new_id: BlockId,
    pub old_id: BlockId,
    pub tick: u32,
}

/// Append-only per-player edit histories. Remote and replayed edits are
/// never recorded; undo works backwards through a player's own list.
#[derive(Debug, Default)]
pub struct EditLog {
    logs: HashMap<String, Vec<BlockEdit>>,
}

impl EditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, player: &str, edit: BlockEdit) {
        self.logs.entry(player.to_string()).or_default().push(edit);
    }

    pub fn history(&self, player: &str) -> &[BlockEdit] {
        self.logs.get(player).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Removes and returns the player's most recent edit.
    pub fn pop_last(&mut self, player: &str) -> Option<BlockEdit> {
        self.logs.get_mut(player)?.pop()
    }

    pub fn player_count(&self) -> usize {
        self.logs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::block_data::block_ids;

    fn edit(y: i32) -> BlockEdit {
        BlockEdit {
            x: 1,
            y,
            z: 3,
            new_id: block_ids::STONE,
            old_id: BlockId::AIR,
            tick: 0,
        }
    }

    #[test]
    fn test_history_is_per_player() {
        let mut log = EditLog::new();
        log.record("alice", edit(1));
        log.record("bob", edit(2));
        log.record("alice", edit(3));
        assert_eq!(log.history("alice").len(), 2);
        assert_eq!(log.history("bob").len(), 1);
        assert!(log.history("nobody").is_empty());
    }

    #[test]
    fn test_pop_last_returns_newest() {
        let mut log = EditLog::new();
        log.record("alice", edit(1));
        log.record("alice", edit(2));
        assert_eq!(log.pop_last("alice").unwrap().y, 2);
        assert_eq!(log.history("alice").len(), 1);
        assert!(log.pop_last("nobody").is_none());
    }
}
