//! The loaded world: a sparse map of chunks plus overflow entities.
//!
//! [`World`] routes every cell-addressed operation to the chunk that owns the
//! cell. Chunks are created on demand through the [`TerrainGenerator`]; a
//! subset of loaded chunks is marked *active* (eligible for simulation and
//! rendering). The active set is always a subset of the loaded set.
//!
//! Entities whose position falls in an unloaded (or static) chunk live in a
//! global overflow set until a chunk able to own them is loaded.

use std::collections::{BTreeMap, BTreeSet};

use crate::block::{Block, BlockType};
use crate::chunk::Chunk;
use crate::coords::{layer_in_range, ChunkCoord};
use crate::entity::{Entity, EntityId, EntityProperties};
use crate::terrain::{TerrainConfig, TerrainGenerator};
use crate::tile::Tile;
use crate::WorldError;

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// All chunk and entity state of one world.
#[derive(Debug, Clone)]
pub struct World {
    id: String,
    chunks: BTreeMap<ChunkCoord, Chunk>,
    active: BTreeSet<ChunkCoord>,
    global_entities: BTreeMap<EntityId, Entity>,
    next_entity_id: u64,
    terrain: TerrainGenerator,
}

/// Rings larger than this grow on demand instead of preallocating.
const RING_PREALLOC_LIMIT: usize = 1 << 16;

impl World {
    /// An empty world. No chunks are loaded until first touched.
    pub fn new(id: impl Into<String>, terrain: TerrainConfig) -> Self {
        Self {
            id: id.into(),
            chunks: BTreeMap::new(),
            active: BTreeSet::new(),
            global_entities: BTreeMap::new(),
            next_entity_id: 1,
            terrain: TerrainGenerator::new(terrain),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn terrain(&self) -> &TerrainGenerator {
        &self.terrain
    }

    /// Drop every chunk and entity and start over under a new id.
    pub fn reset(&mut self, id: impl Into<String>) {
        self.id = id.into();
        self.chunks.clear();
        self.active.clear();
        self.global_entities.clear();
        self.next_entity_id = 1;
    }

    // -- chunk lifecycle ------------------------------------------------------

    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    pub fn chunk_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk> {
        self.chunks.get_mut(&coord)
    }

    /// The chunk owning world cell `(x, y)`, if loaded.
    pub fn chunk_at(&self, world_x: i32, world_y: i32) -> Option<&Chunk> {
        self.chunks.get(&ChunkCoord::containing(world_x, world_y))
    }

    pub fn is_loaded(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    pub fn is_active(&self, coord: ChunkCoord) -> bool {
        self.active.contains(&coord)
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    pub fn loaded_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn loaded_coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.chunks.keys().copied()
    }

    pub fn active_coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.active.iter().copied()
    }

    /// Active chunks in coordinate order.
    pub fn active_chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.active.iter().filter_map(|c| self.chunks.get(c))
    }

    /// Load `coord`, generating its content if it is not already present.
    /// Returns `true` when the chunk was newly created.
    pub fn load_chunk(&mut self, coord: ChunkCoord) -> bool {
        if self.chunks.contains_key(&coord) {
            return false;
        }
        let chunk = self.terrain.generate(&self.id, coord, &mut self.next_entity_id);
        tracing::debug!(chunk = %chunk.id(), blocks = chunk.block_count(), "generated chunk");
        self.install(chunk);
        true
    }

    /// Install a previously saved chunk, replacing any loaded chunk at the
    /// same coordinates. The replaced chunk is returned.
    pub fn insert_chunk(&mut self, chunk: Chunk) -> Option<Chunk> {
        let coord = chunk.coord();
        let previous = self.chunks.remove(&coord);
        for entity in chunk.entities() {
            self.next_entity_id = self.next_entity_id.max(entity.id.0 + 1);
        }
        self.install(chunk);
        previous
    }

    fn install(&mut self, chunk: Chunk) {
        let coord = chunk.coord();
        self.chunks.insert(coord, chunk);

        // Overflow entities standing on the new chunk move in.
        let arriving: Vec<EntityId> = self
            .global_entities
            .values()
            .filter(|e| ChunkCoord::containing_point(e.x, e.y) == coord)
            .map(|e| e.id)
            .collect();
        for id in arriving {
            if let Some(entity) = self.global_entities.remove(&id) {
                self.route_entity(entity);
            }
        }
    }

    /// Evict a chunk, deactivating it first. The chunk is handed back so the
    /// caller can flush it.
    pub fn unload_chunk(&mut self, coord: ChunkCoord) -> Option<Chunk> {
        self.active.remove(&coord);
        self.chunks.remove(&coord)
    }

    /// Mark a chunk active, loading it first if needed.
    pub fn activate(&mut self, coord: ChunkCoord) {
        self.load_chunk(coord);
        self.active.insert(coord);
    }

    pub fn deactivate(&mut self, coord: ChunkCoord) -> bool {
        self.active.remove(&coord)
    }

    /// Every chunk coordinate within Chebyshev `radius` of `center`.
    pub fn ring(center: ChunkCoord, radius: i32) -> Vec<ChunkCoord> {
        let r = radius.max(0);
        let side = 2 * r.unsigned_abs() as usize + 1;
        let mut coords = Vec::with_capacity(side.saturating_mul(side).min(RING_PREALLOC_LIMIT));
        for y in center.y.saturating_sub(r)..=center.y.saturating_add(r) {
            for x in center.x.saturating_sub(r)..=center.x.saturating_add(r) {
                coords.push(ChunkCoord::new(x, y));
            }
        }
        coords
    }

    pub fn set_chunk_static(&mut self, coord: ChunkCoord, is_static: bool) -> Result<(), WorldError> {
        let chunk = self
            .chunks
            .get_mut(&coord)
            .ok_or(WorldError::ChunkNotLoaded { coord })?;
        chunk.set_static(is_static);
        Ok(())
    }

    fn loaded_mut(&mut self, world_x: i32, world_y: i32) -> Result<&mut Chunk, WorldError> {
        let coord = ChunkCoord::containing(world_x, world_y);
        self.chunks
            .get_mut(&coord)
            .ok_or(WorldError::ChunkNotLoaded { coord })
    }

    fn loaded_or_created(&mut self, world_x: i32, world_y: i32) -> &mut Chunk {
        let coord = ChunkCoord::containing(world_x, world_y);
        self.load_chunk(coord);
        self.chunks
            .entry(coord)
            .or_insert_with(|| Chunk::new(self.id.clone(), coord))
    }

    // -- blocks ---------------------------------------------------------------

    pub fn block_at(&self, world_x: i32, world_y: i32, z: i32) -> Option<&Block> {
        self.chunk_at(world_x, world_y)?.block(world_x, world_y, z)
    }

    /// Highest occupied layer of a column; `None` for an empty column or an
    /// unloaded chunk.
    pub fn highest_occupied_layer(&self, world_x: i32, world_y: i32) -> Option<i32> {
        self.chunk_at(world_x, world_y)?.highest_layer(world_x, world_y)
    }

    /// Place a default block of `block_type`. Without an explicit `z` the
    /// block stacks on top of the column. The owning chunk is loaded if
    /// necessary. Returns the placed block.
    pub fn place_block(
        &mut self,
        world_x: i32,
        world_y: i32,
        z: Option<i32>,
        block_type: BlockType,
    ) -> Result<Block, WorldError> {
        let chunk = self.loaded_or_created(world_x, world_y);
        let z = match z {
            Some(z) => z,
            None => chunk.highest_layer(world_x, world_y).map_or(0, |top| top + 1),
        };
        if !layer_in_range(z) {
            return Err(WorldError::LayerOutOfRange { z });
        }
        let block = Block::new(block_type, world_x, world_y, z);
        chunk.insert_block(block.clone())?;
        Ok(block)
    }

    /// Place a copy of `template` at its own coordinates, keeping all of its
    /// properties.
    pub fn place_block_exact(&mut self, template: &Block) -> Result<Block, WorldError> {
        let chunk = self.loaded_or_created(template.x, template.y);
        chunk.insert_block(template.clone())?;
        Ok(template.clone())
    }

    /// Write a block unconditionally, returning the block it replaced.
    pub fn set_block_at(&mut self, block: Block) -> Result<Option<Block>, WorldError> {
        self.loaded_or_created(block.x, block.y).put_block(block)
    }

    /// Remove the block at a cell. The chunk must already be loaded.
    pub fn remove_block(&mut self, world_x: i32, world_y: i32, z: i32) -> Result<Block, WorldError> {
        self.loaded_mut(world_x, world_y)?.remove_block(world_x, world_y, z)
    }

    // -- tiles ----------------------------------------------------------------

    pub fn tile_at(&self, world_x: i32, world_y: i32) -> Option<&Tile> {
        self.chunk_at(world_x, world_y)?.tile(world_x, world_y)
    }

    pub fn set_tile(&mut self, tile: Tile) -> Result<Option<Tile>, WorldError> {
        self.loaded_or_created(tile.x, tile.y).set_tile(tile)
    }

    pub fn remove_tile(&mut self, world_x: i32, world_y: i32) -> Result<Option<Tile>, WorldError> {
        self.loaded_mut(world_x, world_y)?.remove_tile(world_x, world_y)
    }

    // -- entities -------------------------------------------------------------

    /// Allocate an id and place a new entity in the world.
    pub fn spawn_entity(
        &mut self,
        entity_type: impl Into<String>,
        x: f64,
        y: f64,
        z: f64,
        properties: EntityProperties,
    ) -> EntityId {
        let id = EntityId(self.next_entity_id);
        self.next_entity_id += 1;
        let entity = Entity::new(id, entity_type, x, y, z).with_properties(properties);
        self.route_entity(entity);
        id
    }

    /// Place an entity with a caller-chosen id.
    pub fn insert_entity(&mut self, entity: Entity) -> Result<(), WorldError> {
        if self.entity(entity.id).is_some() {
            return Err(WorldError::DuplicateEntity { id: entity.id.0 });
        }
        self.next_entity_id = self.next_entity_id.max(entity.id.0 + 1);
        self.route_entity(entity);
        Ok(())
    }

    /// Hand an entity to the chunk under it, or to the overflow set.
    fn route_entity(&mut self, entity: Entity) {
        let coord = ChunkCoord::containing_point(entity.x, entity.y);
        let entity = match self.chunks.get_mut(&coord) {
            Some(chunk) => match chunk.adopt_entity(entity) {
                Ok(()) => return,
                Err(entity) => entity,
            },
            None => entity,
        };
        self.global_entities.insert(entity.id, entity);
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.global_entities
            .get(&id)
            .or_else(|| self.chunks.values().find_map(|c| c.entity(id)))
    }

    pub fn remove_entity(&mut self, id: EntityId) -> Result<Option<Entity>, WorldError> {
        if let Some(entity) = self.global_entities.remove(&id) {
            return Ok(Some(entity));
        }
        for chunk in self.chunks.values_mut() {
            if chunk.entity(id).is_some() {
                return chunk.remove_entity(id);
            }
        }
        Ok(None)
    }

    /// Entities not owned by any loaded chunk.
    pub fn global_entities(&self) -> impl Iterator<Item = &Entity> {
        self.global_entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.global_entities.len() + self.chunks.values().map(Chunk::entity_count).sum::<usize>()
    }

    /// Entities within ground-plane distance `radius` of `(x, y)`, nearest
    /// first (ties broken by id).
    pub fn entities_in_radius(&self, x: f64, y: f64, radius: f64) -> Vec<&Entity> {
        let r_sq = radius * radius;
        let min = ChunkCoord::containing_point(x - radius, y - radius);
        let max = ChunkCoord::containing_point(x + radius, y + radius);

        let mut found: Vec<(f64, &Entity)> = self
            .chunks
            .range(ChunkCoord::new(min.x, i32::MIN)..=ChunkCoord::new(max.x, i32::MAX))
            .filter(|(c, _)| (min.y..=max.y).contains(&c.y))
            .flat_map(|(_, chunk)| chunk.entities())
            .chain(self.global_entities.values())
            .map(|e| (e.distance_sq_2d(x, y), e))
            .filter(|(d, _)| *d <= r_sq)
            .collect();
        found.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.id.cmp(&b.1.id)));
        found.into_iter().map(|(_, e)| e).collect()
    }

    /// Integrate entity motion for active chunks and the overflow set, then
    /// move every entity that crossed a chunk boundary to its new owner.
    /// Returns the number of migrated entities.
    pub fn step_entities(&mut self, dt: f64) -> usize {
        let mut migrating = Vec::new();
        for coord in &self.active {
            let Some(chunk) = self.chunks.get_mut(coord) else {
                continue;
            };
            for id in chunk.step_entities(|e| e.integrate(dt)) {
                if let Some(entity) = chunk.evict_entity(id) {
                    migrating.push(entity);
                }
            }
        }

        let mut settled = Vec::new();
        for entity in self.global_entities.values_mut() {
            entity.integrate(dt);
            if self
                .chunks
                .contains_key(&ChunkCoord::containing_point(entity.x, entity.y))
            {
                settled.push(entity.id);
            }
        }
        for id in settled {
            if let Some(entity) = self.global_entities.remove(&id) {
                migrating.push(entity);
            }
        }

        let moved = migrating.len();
        for entity in migrating {
            tracing::trace!(entity = %entity.id, x = entity.x, y = entity.y, "entity changed chunk");
            self.route_entity(entity);
        }
        moved
    }

    /// Advance the animation clock of every simulated entity.
    pub fn animate_entities(&mut self, dt: f64) {
        for coord in &self.active {
            if let Some(chunk) = self.chunks.get_mut(coord) {
                chunk.step_entities(|e| e.animate(dt));
            }
        }
        for entity in self.global_entities.values_mut() {
            entity.animate(dt);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Vec3;
    use crate::tile::TileType;

    fn empty_world() -> World {
        World::new("test", TerrainConfig::empty())
    }

    #[test]
    fn placement_without_z_stacks() {
        let mut w = empty_world();
        for expected in 0..4 {
            let b = w.place_block(5, 5, None, BlockType::Stone).unwrap();
            assert_eq!(b.z, expected);
        }
        assert_eq!(w.highest_occupied_layer(5, 5), Some(3));
        assert_eq!(w.highest_occupied_layer(6, 5), None);
    }

    #[test]
    fn exact_placement_into_occupied_cell_fails() {
        let mut w = empty_world();
        w.place_block(0, 0, Some(2), BlockType::Sand).unwrap();
        let err = w.place_block(0, 0, Some(2), BlockType::Brick).unwrap_err();
        assert!(matches!(err, WorldError::Occupied { z: 2, .. }));
        assert_eq!(w.block_at(0, 0, 2).unwrap().block_type, BlockType::Sand);
    }

    #[test]
    fn stacking_stops_at_max_layer() {
        let mut w = empty_world();
        w.place_block(1, 1, Some(crate::coords::MAX_LAYER), BlockType::Stone)
            .unwrap();
        assert!(matches!(
            w.place_block(1, 1, None, BlockType::Stone),
            Err(WorldError::LayerOutOfRange { .. })
        ));
    }

    #[test]
    fn place_exact_keeps_template_properties() {
        let mut w = empty_world();
        let mut template = Block::new(BlockType::Crystal, -3, 7, 4);
        template.properties.solid = false;
        template
            .properties
            .metadata
            .insert("owner".to_owned(), serde_json::json!("ada"));
        w.place_block_exact(&template).unwrap();
        assert_eq!(w.block_at(-3, 7, 4), Some(&template));
    }

    #[test]
    fn remove_requires_loaded_chunk() {
        let mut w = empty_world();
        assert!(matches!(
            w.remove_block(100, 100, 0),
            Err(WorldError::ChunkNotLoaded { .. })
        ));
        w.place_block(100, 100, None, BlockType::Dirt).unwrap();
        assert_eq!(w.remove_block(100, 100, 0).unwrap().block_type, BlockType::Dirt);
        assert!(matches!(
            w.remove_block(100, 100, 0),
            Err(WorldError::NoBlock { .. })
        ));
    }

    #[test]
    fn active_set_stays_within_loaded_set() {
        let mut w = empty_world();
        for coord in World::ring(ChunkCoord::new(0, 0), 1) {
            w.activate(coord);
        }
        assert_eq!(w.loaded_count(), 9);
        w.unload_chunk(ChunkCoord::new(1, 1));
        assert!(!w.is_active(ChunkCoord::new(1, 1)));
        assert!(w.active_coords().all(|c| w.is_loaded(c)));
    }

    #[test]
    fn static_chunk_blocks_world_mutation() {
        let mut w = empty_world();
        w.place_block(0, 0, None, BlockType::Stone).unwrap();
        w.set_chunk_static(ChunkCoord::new(0, 0), true).unwrap();
        assert!(matches!(
            w.place_block(0, 0, None, BlockType::Stone),
            Err(WorldError::StaticChunk { .. })
        ));
        assert!(w.set_tile(Tile::new(TileType::Sand, 1, 1)).is_err());
        assert!(w.set_chunk_static(ChunkCoord::new(9, 9), true).is_err());
    }

    #[test]
    fn entities_without_chunk_overflow_then_settle() {
        let mut w = empty_world();
        let id = w.spawn_entity("wisp", 40.5, 40.5, 0.0, EntityProperties::default());
        assert_eq!(w.global_entities().count(), 1);

        w.load_chunk(ChunkCoord::new(2, 2));
        assert_eq!(w.global_entities().count(), 0);
        assert!(w.chunk(ChunkCoord::new(2, 2)).unwrap().entity(id).is_some());
    }

    #[test]
    fn stepping_migrates_entities_across_chunks() {
        let mut w = empty_world();
        w.activate(ChunkCoord::new(0, 0));
        w.activate(ChunkCoord::new(1, 0));
        let runner = Entity::new(EntityId(1), "runner", 15.5, 3.0, 0.0)
            .with_velocity(Vec3::new(2.0, 0.0, 0.0));
        w.insert_entity(runner).unwrap();
        w.insert_entity(Entity::new(EntityId(2), "idle", 2.0, 2.0, 0.0))
            .unwrap();

        assert_eq!(w.step_entities(0.5), 1);
        assert!(w.chunk(ChunkCoord::new(1, 0)).unwrap().entity(EntityId(1)).is_some());
        assert!(w.chunk(ChunkCoord::new(0, 0)).unwrap().entity(EntityId(2)).is_some());
        assert_eq!(w.entity_count(), 2);
    }

    #[test]
    fn entities_leaving_loaded_area_overflow() {
        let mut w = empty_world();
        w.activate(ChunkCoord::new(0, 0));
        let runner = Entity::new(EntityId(1), "runner", 1.0, 1.0, 0.0)
            .with_velocity(Vec3::new(-4.0, 0.0, 0.0));
        w.insert_entity(runner).unwrap();
        w.step_entities(1.0);
        assert_eq!(w.global_entities().count(), 1);
        assert!(w.entity(EntityId(1)).is_some());
    }

    #[test]
    fn radius_query_orders_by_distance() {
        let mut w = empty_world();
        w.load_chunk(ChunkCoord::new(0, 0));
        let far = w.spawn_entity("a", 8.0, 0.5, 0.0, EntityProperties::default());
        let near = w.spawn_entity("b", 1.0, 0.5, 0.0, EntityProperties::default());
        w.spawn_entity("c", 30.0, 30.0, 0.0, EntityProperties::default());

        let ids: Vec<EntityId> = w
            .entities_in_radius(0.0, 0.5, 10.0)
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![near, far]);
    }

    #[test]
    fn reset_forgets_everything() {
        let mut w = empty_world();
        w.place_block(0, 0, None, BlockType::Stone).unwrap();
        w.spawn_entity("x", 90.0, 90.0, 0.0, EntityProperties::default());
        w.reset("fresh");
        assert_eq!(w.id(), "fresh");
        assert_eq!(w.loaded_count(), 0);
        assert_eq!(w.entity_count(), 0);
    }

    #[test]
    fn ring_covers_square() {
        assert_eq!(World::ring(ChunkCoord::new(3, -2), 2).len(), 25);
        assert_eq!(World::ring(ChunkCoord::new(0, 0), 0), vec![ChunkCoord::new(0, 0)]);
        // Rings at the edge of the coordinate space clamp instead of overflowing.
        assert_eq!(World::ring(ChunkCoord::new(i32::MAX, i32::MAX), 1).len(), 4);
    }
}
