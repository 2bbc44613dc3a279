//! Replayable world edits.
//!
//! An [`Action`] is a self-contained description of one block mutation,
//! carrying a full snapshot of the block involved so it can be re-applied
//! (or inverted) without consulting the world that produced it.

use isoworld_world::block::Block;
use isoworld_world::coords::ChunkId;
use serde::{Deserialize, Serialize};

/// The two mutations the history knows how to replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Place,
    Remove,
}

impl ActionKind {
    pub fn inverse(self) -> Self {
        match self {
            ActionKind::Place => ActionKind::Remove,
            ActionKind::Remove => ActionKind::Place,
        }
    }
}

/// One block placement or removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    /// Full snapshot of the block placed or removed.
    pub block: Block,
    pub world_x: i32,
    pub world_y: i32,
    pub z: i32,
    pub chunk_id: ChunkId,
}

impl Action {
    pub fn place(block: Block, chunk_id: ChunkId) -> Self {
        Self::new(ActionKind::Place, block, chunk_id)
    }

    pub fn remove(block: Block, chunk_id: ChunkId) -> Self {
        Self::new(ActionKind::Remove, block, chunk_id)
    }

    fn new(kind: ActionKind, block: Block, chunk_id: ChunkId) -> Self {
        Self {
            kind,
            world_x: block.x,
            world_y: block.y,
            z: block.z,
            block,
            chunk_id,
        }
    }

    /// The action that cancels this one. Inverting twice yields the original.
    pub fn inverse(&self) -> Self {
        Self {
            kind: self.kind.inverse(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isoworld_world::block::BlockType;
    use isoworld_world::coords::ChunkCoord;

    fn sample() -> Action {
        Action::place(
            Block::new(BlockType::Brick, 17, -2, 3),
            ChunkId::new("w", ChunkCoord::new(1, -1)),
        )
    }

    #[test]
    fn constructor_copies_block_position() {
        let a = sample();
        assert_eq!((a.world_x, a.world_y, a.z), (17, -2, 3));
    }

    #[test]
    fn inverse_flips_kind_and_keeps_snapshot() {
        let a = sample();
        let inv = a.inverse();
        assert_eq!(inv.kind, ActionKind::Remove);
        assert_eq!(inv.block, a.block);
        assert_eq!(inv.inverse(), a);
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["type"], "place");
        assert_eq!(json["worldX"], 17);
        assert_eq!(json["block"]["type"], "brick");
    }
}
