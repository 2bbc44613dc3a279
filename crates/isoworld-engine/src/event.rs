//! The closed catalog of bus messages.
//!
//! Every message carried by the [`EventBus`](crate::bus::EventBus) is a
//! variant of [`Event`]. Subscriptions are keyed by the payload-free
//! discriminant [`EventKind`], so delivery order is defined per kind.

use std::fmt;

use isoworld_history::action::Action;
use isoworld_world::block::{Block, BlockType};
use isoworld_world::coords::{ChunkId, TilePos};

use crate::state_manager::Tool;

// ---------------------------------------------------------------------------
// Payload types
// ---------------------------------------------------------------------------

/// Pointer buttons understood by the interaction layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

/// Why a world mutation happened. Carried from request to result so that
/// history replay is never recorded as a new action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MutationOrigin {
    /// A user action or direct API call.
    #[default]
    Interaction,
    /// An undo/redo replay.
    Replay,
}

/// Payload of `BlockAdded` / `BlockRemoved`.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockChange {
    pub block: Block,
    pub world_x: i32,
    pub world_y: i32,
    pub z: i32,
    pub chunk_id: ChunkId,
    pub origin: MutationOrigin,
}

impl BlockChange {
    pub fn new(block: Block, chunk_id: ChunkId, origin: MutationOrigin) -> Self {
        Self {
            world_x: block.x,
            world_y: block.y,
            z: block.z,
            block,
            chunk_id,
            origin,
        }
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A bus message.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    InputKeyDown { key: String },
    InputKeyUp { key: String },
    InputMouseDown { button: MouseButton, world_x: f64, world_y: f64 },
    InputMouseUp { button: MouseButton, world_x: f64, world_y: f64 },
    InputMouseMove { world_x: f64, world_y: f64, screen_x: f64, screen_y: f64 },
    InputWheel { delta_y: f64 },

    CameraMoved { x: f64, y: f64 },

    TileHover { current: Option<TilePos>, previous: Option<TilePos> },
    TileSelected { tile: TilePos },
    TileRequestPlace { x: i32, y: i32, z: i32, block_type: BlockType, origin: MutationOrigin },
    TileRequestPlaceExact { block: Block, origin: MutationOrigin },
    TileRequestDelete { x: i32, y: i32, z: i32, origin: MutationOrigin },

    BlockAdded(BlockChange),
    BlockRemoved(BlockChange),

    ToolChanged { current: Tool, previous: Tool },
    ActionUndone { action: Action },
    ActionRedone { action: Action },

    EngineUpdate { dt: f64 },
    EngineFixedUpdate { dt: f64 },
    EngineLateUpdate { dt: f64 },
    EngineFps { fps: f64 },

    ChunkLoaded { chunk_id: ChunkId },
    ChunkUnloaded { chunk_id: ChunkId },
    /// A dirty chunk flushed before eviction: serialized form plus its
    /// BLAKE3 hex digest.
    ChunkSaved { chunk_id: ChunkId, version: u64, json: serde_json::Value, hash: String },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::InputKeyDown { .. } => EventKind::InputKeyDown,
            Event::InputKeyUp { .. } => EventKind::InputKeyUp,
            Event::InputMouseDown { .. } => EventKind::InputMouseDown,
            Event::InputMouseUp { .. } => EventKind::InputMouseUp,
            Event::InputMouseMove { .. } => EventKind::InputMouseMove,
            Event::InputWheel { .. } => EventKind::InputWheel,
            Event::CameraMoved { .. } => EventKind::CameraMoved,
            Event::TileHover { .. } => EventKind::TileHover,
            Event::TileSelected { .. } => EventKind::TileSelected,
            Event::TileRequestPlace { .. } => EventKind::TileRequestPlace,
            Event::TileRequestPlaceExact { .. } => EventKind::TileRequestPlaceExact,
            Event::TileRequestDelete { .. } => EventKind::TileRequestDelete,
            Event::BlockAdded(_) => EventKind::BlockAdded,
            Event::BlockRemoved(_) => EventKind::BlockRemoved,
            Event::ToolChanged { .. } => EventKind::ToolChanged,
            Event::ActionUndone { .. } => EventKind::ActionUndone,
            Event::ActionRedone { .. } => EventKind::ActionRedone,
            Event::EngineUpdate { .. } => EventKind::EngineUpdate,
            Event::EngineFixedUpdate { .. } => EventKind::EngineFixedUpdate,
            Event::EngineLateUpdate { .. } => EventKind::EngineLateUpdate,
            Event::EngineFps { .. } => EventKind::EngineFps,
            Event::ChunkLoaded { .. } => EventKind::ChunkLoaded,
            Event::ChunkUnloaded { .. } => EventKind::ChunkUnloaded,
            Event::ChunkSaved { .. } => EventKind::ChunkSaved,
        }
    }
}

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

/// Subscription key: the discriminant of an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    InputKeyDown,
    InputKeyUp,
    InputMouseDown,
    InputMouseUp,
    InputMouseMove,
    InputWheel,
    CameraMoved,
    TileHover,
    TileSelected,
    TileRequestPlace,
    TileRequestPlaceExact,
    TileRequestDelete,
    BlockAdded,
    BlockRemoved,
    ToolChanged,
    ActionUndone,
    ActionRedone,
    EngineUpdate,
    EngineFixedUpdate,
    EngineLateUpdate,
    EngineFps,
    ChunkLoaded,
    ChunkUnloaded,
    ChunkSaved,
}

impl EventKind {
    /// Wire-style name used in logs, e.g. `"block:added"`.
    pub fn name(self) -> &'static str {
        match self {
            EventKind::InputKeyDown => "input:keydown",
            EventKind::InputKeyUp => "input:keyup",
            EventKind::InputMouseDown => "input:mousedown",
            EventKind::InputMouseUp => "input:mouseup",
            EventKind::InputMouseMove => "input:mousemove",
            EventKind::InputWheel => "input:wheel",
            EventKind::CameraMoved => "camera:moved",
            EventKind::TileHover => "tile:hover",
            EventKind::TileSelected => "tile:selected",
            EventKind::TileRequestPlace => "tile:requestPlace",
            EventKind::TileRequestPlaceExact => "tile:requestPlaceExact",
            EventKind::TileRequestDelete => "tile:requestDelete",
            EventKind::BlockAdded => "block:added",
            EventKind::BlockRemoved => "block:removed",
            EventKind::ToolChanged => "tool:changed",
            EventKind::ActionUndone => "action:undone",
            EventKind::ActionRedone => "action:redone",
            EventKind::EngineUpdate => "engine:update",
            EventKind::EngineFixedUpdate => "engine:fixedUpdate",
            EventKind::EngineLateUpdate => "engine:lateUpdate",
            EventKind::EngineFps => "engine:fps",
            EventKind::ChunkLoaded => "chunk:loaded",
            EventKind::ChunkUnloaded => "chunk:unloaded",
            EventKind::ChunkSaved => "chunk:saved",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isoworld_world::coords::ChunkCoord;

    #[test]
    fn kind_matches_variant() {
        let change = BlockChange::new(
            Block::new(BlockType::Stone, 1, 2, 3),
            ChunkId::new("w", ChunkCoord::new(0, 0)),
            MutationOrigin::Interaction,
        );
        assert_eq!((change.world_x, change.world_y, change.z), (1, 2, 3));
        assert_eq!(Event::BlockAdded(change.clone()).kind(), EventKind::BlockAdded);
        assert_eq!(Event::BlockRemoved(change).kind(), EventKind::BlockRemoved);
        assert_eq!(Event::EngineFps { fps: 60.0 }.kind().name(), "engine:fps");
    }

    #[test]
    fn default_origin_is_interaction() {
        assert_eq!(MutationOrigin::default(), MutationOrigin::Interaction);
    }
}
