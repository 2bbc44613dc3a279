//! Fixed-size spatial partitions that own blocks, tiles and entities.
//!
//! A [`Chunk`] covers a [`CHUNK_SIZE`] x [`CHUNK_SIZE`] square of world cells.
//! It is the sole owner of every block in that square: blocks are keyed by a
//! structured [`LocalPos`] so a column lookup is an ordered range query, not
//! a string parse.
//!
//! Every successful mutation marks the chunk dirty and bumps its `version`,
//! which consumers use for change detection and caching. A chunk flagged
//! static rejects all mutations with [`WorldError::StaticChunk`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::coords::{layer_in_range, ChunkCoord, ChunkId, LocalPos, CHUNK_SIZE};
use crate::entity::{Entity, EntityId};
use crate::tile::Tile;
use crate::WorldError;

// ---------------------------------------------------------------------------
// Chunk
// ---------------------------------------------------------------------------

/// A 16x16 column-stack partition of the world.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    id: ChunkId,
    blocks: BTreeMap<LocalPos, Block>,
    tiles: BTreeMap<(u8, u8), Tile>,
    entities: BTreeMap<EntityId, Entity>,
    dirty: bool,
    version: u64,
    is_static: bool,
    metadata: serde_json::Map<String, serde_json::Value>,
}

impl Chunk {
    /// An empty, clean chunk.
    pub fn new(world_id: impl Into<String>, coord: ChunkCoord) -> Self {
        Self {
            id: ChunkId::new(world_id, coord),
            blocks: BTreeMap::new(),
            tiles: BTreeMap::new(),
            entities: BTreeMap::new(),
            dirty: false,
            version: 0,
            is_static: false,
            metadata: serde_json::Map::new(),
        }
    }

    // -- identity and change tracking ---------------------------------------

    pub fn id(&self) -> &ChunkId {
        &self.id
    }

    pub fn coord(&self) -> ChunkCoord {
        self.id.coord
    }

    pub fn world_id(&self) -> &str {
        &self.id.world_id
    }

    /// Monotonic change counter; bumped by every mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear the dirty flag after the chunk has been flushed.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Freeze or unfreeze the chunk. Freezing does not count as a content
    /// change and does not bump the version.
    pub fn set_static(&mut self, is_static: bool) {
        self.is_static = is_static;
    }

    pub fn metadata(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.metadata
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) -> Result<(), WorldError> {
        self.ensure_mutable()?;
        self.metadata.insert(key.into(), value);
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.dirty = true;
        self.version += 1;
    }

    fn ensure_mutable(&self) -> Result<(), WorldError> {
        if self.is_static {
            return Err(WorldError::StaticChunk {
                chunk: self.id.to_string(),
            });
        }
        Ok(())
    }

    // -- bounds ---------------------------------------------------------------

    /// Whether world cell `(x, y)` falls inside this chunk.
    pub fn contains_cell(&self, world_x: i32, world_y: i32) -> bool {
        ChunkCoord::containing(world_x, world_y) == self.id.coord
    }

    /// Whether a continuous world position falls inside this chunk.
    pub fn contains_point(&self, world_x: f64, world_y: f64) -> bool {
        ChunkCoord::containing_point(world_x, world_y) == self.id.coord
    }

    fn local(&self, world_x: i32, world_y: i32) -> Result<(u8, u8), WorldError> {
        if !self.contains_cell(world_x, world_y) {
            return Err(WorldError::OutOfChunk {
                x: world_x,
                y: world_y,
                chunk: self.id.to_string(),
            });
        }
        Ok((
            world_x.rem_euclid(CHUNK_SIZE) as u8,
            world_y.rem_euclid(CHUNK_SIZE) as u8,
        ))
    }

    fn key(&self, world_x: i32, world_y: i32, z: i32) -> Result<LocalPos, WorldError> {
        if !layer_in_range(z) {
            return Err(WorldError::LayerOutOfRange { z });
        }
        let (lx, ly) = self.local(world_x, world_y)?;
        Ok(LocalPos::new(lx, ly, z))
    }

    // -- blocks ---------------------------------------------------------------

    pub fn block(&self, world_x: i32, world_y: i32, z: i32) -> Option<&Block> {
        let key = self.key(world_x, world_y, z).ok()?;
        self.blocks.get(&key)
    }

    /// All blocks of one column, bottom to top.
    pub fn column(&self, world_x: i32, world_y: i32) -> impl Iterator<Item = &Block> {
        let range = self.local(world_x, world_y).ok().map(|(lx, ly)| {
            LocalPos::new(lx, ly, i32::MIN)..=LocalPos::new(lx, ly, i32::MAX)
        });
        range
            .into_iter()
            .flat_map(move |r| self.blocks.range(r).map(|(_, b)| b))
    }

    /// The highest occupied layer of a column, or `None` when it is empty.
    pub fn highest_layer(&self, world_x: i32, world_y: i32) -> Option<i32> {
        self.column(world_x, world_y).last().map(|b| b.z)
    }

    /// Insert a block into an empty cell.
    ///
    /// Fails with [`WorldError::Occupied`] if the exact cell already holds a
    /// block; the existing block is left untouched.
    pub fn insert_block(&mut self, block: Block) -> Result<(), WorldError> {
        self.ensure_mutable()?;
        let key = self.key(block.x, block.y, block.z)?;
        if self.blocks.contains_key(&key) {
            return Err(WorldError::Occupied {
                x: block.x,
                y: block.y,
                z: block.z,
            });
        }
        self.blocks.insert(key, block);
        self.touch();
        Ok(())
    }

    /// Insert or overwrite a block, returning the block it replaced.
    pub fn put_block(&mut self, block: Block) -> Result<Option<Block>, WorldError> {
        self.ensure_mutable()?;
        let key = self.key(block.x, block.y, block.z)?;
        let previous = self.blocks.insert(key, block);
        self.touch();
        Ok(previous)
    }

    /// Remove and return the block at a cell.
    pub fn remove_block(&mut self, world_x: i32, world_y: i32, z: i32) -> Result<Block, WorldError> {
        self.ensure_mutable()?;
        let key = self.key(world_x, world_y, z)?;
        let block = self.blocks.remove(&key).ok_or(WorldError::NoBlock {
            x: world_x,
            y: world_y,
            z,
        })?;
        self.touch();
        Ok(block)
    }

    /// Mutate the properties of an existing block in place.
    pub fn update_block<F>(&mut self, world_x: i32, world_y: i32, z: i32, f: F) -> Result<(), WorldError>
    where
        F: FnOnce(&mut Block),
    {
        self.ensure_mutable()?;
        let key = self.key(world_x, world_y, z)?;
        let block = self.blocks.get_mut(&key).ok_or(WorldError::NoBlock {
            x: world_x,
            y: world_y,
            z,
        })?;
        let block_type = block.block_type;
        f(block);
        // Identity is immutable: restore position and type if the closure changed them.
        block.block_type = block_type;
        block.x = world_x;
        block.y = world_y;
        block.z = z;
        self.touch();
        Ok(())
    }

    /// Every block in key order (column-major, bottom to top).
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    // -- tiles ----------------------------------------------------------------

    pub fn tile(&self, world_x: i32, world_y: i32) -> Option<&Tile> {
        let key = self.local(world_x, world_y).ok()?;
        self.tiles.get(&key)
    }

    /// Set the ground tile of a cell, returning the tile it replaced.
    pub fn set_tile(&mut self, tile: Tile) -> Result<Option<Tile>, WorldError> {
        self.ensure_mutable()?;
        let key = self.local(tile.x, tile.y)?;
        let previous = self.tiles.insert(key, tile);
        self.touch();
        Ok(previous)
    }

    pub fn remove_tile(&mut self, world_x: i32, world_y: i32) -> Result<Option<Tile>, WorldError> {
        self.ensure_mutable()?;
        let key = self.local(world_x, world_y)?;
        let previous = self.tiles.remove(&key);
        if previous.is_some() {
            self.touch();
        }
        Ok(previous)
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }

    // -- entities -------------------------------------------------------------

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Take ownership of an entity whose position lies inside this chunk.
    pub fn insert_entity(&mut self, entity: Entity) -> Result<(), WorldError> {
        self.ensure_mutable()?;
        if !self.contains_point(entity.x, entity.y) {
            return Err(WorldError::OutOfChunk {
                x: entity.x.floor() as i32,
                y: entity.y.floor() as i32,
                chunk: self.id.to_string(),
            });
        }
        if self.entities.contains_key(&entity.id) {
            return Err(WorldError::DuplicateEntity { id: entity.id.0 });
        }
        self.entities.insert(entity.id, entity);
        self.touch();
        Ok(())
    }

    pub fn remove_entity(&mut self, id: EntityId) -> Result<Option<Entity>, WorldError> {
        self.ensure_mutable()?;
        let removed = self.entities.remove(&id);
        if removed.is_some() {
            self.touch();
        }
        Ok(removed)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Run per-frame simulation on every owned entity and return the ids of
    /// those that left the chunk's bounds. Static chunks are frozen and
    /// report nothing.
    pub(crate) fn step_entities<F>(&mut self, mut step: F) -> Vec<EntityId>
    where
        F: FnMut(&mut Entity),
    {
        if self.is_static || self.entities.is_empty() {
            return Vec::new();
        }
        let coord = self.id.coord;
        let mut escaped = Vec::new();
        for entity in self.entities.values_mut() {
            step(entity);
            if ChunkCoord::containing_point(entity.x, entity.y) != coord {
                escaped.push(entity.id);
            }
        }
        // Motion within the chunk leaves the version alone; only migration
        // across a chunk boundary (evict/adopt) bumps it.
        escaped
    }

    /// Take an entity arriving from elsewhere in the world. Hands it back
    /// when the chunk is static, the id is taken, or it lies out of bounds.
    pub(crate) fn adopt_entity(&mut self, entity: Entity) -> Result<(), Entity> {
        if self.is_static
            || self.entities.contains_key(&entity.id)
            || !self.contains_point(entity.x, entity.y)
        {
            return Err(entity);
        }
        self.entities.insert(entity.id, entity);
        self.touch();
        Ok(())
    }

    /// Remove an entity regardless of the static flag (used when an entity
    /// migrates out during simulation).
    pub(crate) fn evict_entity(&mut self, id: EntityId) -> Option<Entity> {
        let removed = self.entities.remove(&id);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    // -- serialization --------------------------------------------------------

    /// Serialize to
    /// `{id, chunkX, chunkY, worldId, version, blocks, tiles, entities, metadata, isStatic}`.
    pub fn to_json(&self) -> serde_json::Value {
        let record = ChunkRecord {
            id: self.id.to_string(),
            chunk_x: self.id.coord.x,
            chunk_y: self.id.coord.y,
            world_id: self.id.world_id.clone(),
            version: self.version,
            blocks: self.blocks.values().cloned().collect(),
            tiles: self.tiles.values().cloned().collect(),
            entities: self.entities.values().cloned().collect(),
            metadata: self.metadata.clone(),
            is_static: self.is_static,
        };
        serde_json::to_value(record).expect("Chunk should always be JSON-serializable")
    }

    /// Inverse of [`to_json`](Self::to_json).
    ///
    /// Re-validates bounds: every block, tile and entity must lie inside the
    /// chunk, and no two blocks may share a cell. The result is clean.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, WorldError> {
        let record: ChunkRecord =
            serde_json::from_value(value.clone()).map_err(|e| WorldError::Deserialize {
                what: "chunk",
                details: e.to_string(),
            })?;

        let mut chunk = Chunk::new(
            record.world_id,
            ChunkCoord::new(record.chunk_x, record.chunk_y),
        );
        for block in record.blocks {
            chunk.insert_block(block)?;
        }
        for tile in record.tiles {
            chunk.set_tile(tile)?;
        }
        for entity in record.entities {
            chunk.insert_entity(entity)?;
        }
        chunk.metadata = record.metadata;
        chunk.version = record.version;
        chunk.is_static = record.is_static;
        chunk.dirty = false;
        Ok(chunk)
    }
}

/// Wire shape of a chunk.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChunkRecord {
    id: String,
    chunk_x: i32,
    chunk_y: i32,
    world_id: String,
    version: u64,
    blocks: Vec<Block>,
    #[serde(default)]
    tiles: Vec<Tile>,
    entities: Vec<Entity>,
    #[serde(default)]
    metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    is_static: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
