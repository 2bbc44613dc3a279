//! Isoworld spatial model -- chunked, stackable block worlds.
//!
//! The world is an unbounded grid of integer cells split into 16x16
//! [`Chunk`](chunk::Chunk)s. Each cell carries an optional ground
//! [`Tile`](tile::Tile) and a stack of [`Block`](block::Block)s indexed by
//! layer `z`. Free-moving [`Entity`](entity::Entity) values are owned by the
//! chunk under them. Every type round-trips through JSON.
//!
//! # Quick Start
//!
//! ```
//! use isoworld_world::prelude::*;
//!
//! let mut world = World::new("demo", TerrainConfig::empty());
//! world.place_block(5, 5, None, BlockType::Stone).unwrap();
//! world.place_block(5, 5, None, BlockType::Grass).unwrap();
//!
//! assert_eq!(world.highest_occupied_layer(5, 5), Some(1));
//! assert_eq!(world.block_at(5, 5, 1).unwrap().block_type, BlockType::Grass);
//! ```

#![deny(unsafe_code)]

pub mod block;
pub mod chunk;
pub mod color;
pub mod coords;
pub mod entity;
pub mod terrain;
pub mod tile;
pub mod world;

use coords::{ChunkCoord, MAX_LAYER};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by world mutations and deserialization.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorldError {
    /// The target cell already holds a block.
    #[error("cell ({x}, {y}, {z}) is already occupied")]
    Occupied { x: i32, y: i32, z: i32 },

    /// The owning chunk is static and rejects mutation.
    #[error("chunk {chunk} is static and cannot be modified")]
    StaticChunk { chunk: String },

    /// A position was handed to a chunk that does not contain it.
    #[error("cell ({x}, {y}) lies outside chunk {chunk}")]
    OutOfChunk { x: i32, y: i32, chunk: String },

    /// Block layers are limited to `0..=MAX_LAYER`.
    #[error("layer {z} is outside 0..={max}", max = MAX_LAYER)]
    LayerOutOfRange { z: i32 },

    /// No block at the addressed cell.
    #[error("no block at ({x}, {y}, {z})")]
    NoBlock { x: i32, y: i32, z: i32 },

    #[error("entity {id} already exists")]
    DuplicateEntity { id: u64 },

    /// The operation needs a chunk that is not loaded.
    #[error("chunk {coord} is not loaded")]
    ChunkNotLoaded { coord: ChunkCoord },

    #[error("invalid color '{value}'")]
    InvalidColor { value: String },

    /// JSON input did not describe a valid value.
    #[error("failed to deserialize {what}: {details}")]
    Deserialize { what: &'static str, details: String },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::block::{Block, BlockProperties, BlockType};
    pub use crate::chunk::Chunk;
    pub use crate::color::Color;
    pub use crate::coords::{
        local_to_world, world_to_local, ChunkCoord, ChunkId, LocalPos, TilePos, CHUNK_SIZE, MAX_LAYER,
    };
    pub use crate::entity::{Entity, EntityId, EntityProperties, EntityState, Vec3};
    pub use crate::terrain::{TerrainConfig, TerrainGenerator};
    pub use crate::tile::{Tile, TileProperties, TileType};
    pub use crate::world::World;
    pub use crate::WorldError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn generated_world_round_trips_through_json() {
        let mut world = World::new(
            "gen",
            TerrainConfig {
                decoration_density: 0.2,
                entity_density: 1.0,
                ..TerrainConfig::default()
            },
        );
        world.activate(ChunkCoord::new(0, 0));
        world.place_block(3, 3, None, BlockType::Brick).unwrap();

        let chunk = world.chunk(ChunkCoord::new(0, 0)).unwrap();
        let restored = Chunk::from_json(&chunk.to_json()).unwrap();
        assert_eq!(restored.version(), chunk.version());
        assert_eq!(restored.block_count(), chunk.block_count());
        assert_eq!(restored.entity_count(), chunk.entity_count());
        assert_eq!(
            restored.blocks().collect::<Vec<_>>(),
            chunk.blocks().collect::<Vec<_>>()
        );
    }

    #[test]
    fn saved_chunk_can_be_reinstalled() {
        let mut world = World::new("w", TerrainConfig::empty());
        world.place_block(-1, -1, None, BlockType::Glass).unwrap();
        let saved = world.unload_chunk(ChunkCoord::new(-1, -1)).unwrap();
        assert_eq!(world.highest_occupied_layer(-1, -1), None);

        world.insert_chunk(Chunk::from_json(&saved.to_json()).unwrap());
        assert_eq!(world.highest_occupied_layer(-1, -1), Some(0));
    }

    #[test]
    fn errors_render_readable_messages() {
        let err = WorldError::LayerOutOfRange { z: 99 };
        assert_eq!(err.to_string(), "layer 99 is outside 0..=63");
        let err = WorldError::ChunkNotLoaded {
            coord: ChunkCoord::new(1, -2),
        };
        assert_eq!(err.to_string(), "chunk 1,-2 is not loaded");
    }
}
