//! The world module: owns the [`World`], answers mutation requests from the
//! bus and announces every change it makes.
//!
//! [`WorldManager`] is a cheap handle (`Rc` inside). The engine owns one
//! clone as a registered module; the composition root keeps another for
//! direct calls. Other modules only ever get a read-only [`WorldView`].
//!
//! Every successful mutation publishes `BlockAdded` or `BlockRemoved`.
//! Rejected mutations (occupied cell, static chunk, layer out of range) are
//! logged and return `None`. No borrow of the world is held while an event
//! is published, so handlers may freely query the world.

use std::cell::{Ref, RefCell};
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use isoworld_world::block::{Block, BlockType};
use isoworld_world::chunk::Chunk;
use isoworld_world::coords::{ChunkCoord, ChunkId};
use isoworld_world::entity::{Entity, EntityId, EntityProperties};
use isoworld_world::terrain::TerrainConfig;
use isoworld_world::tile::Tile;
use isoworld_world::world::World;

use crate::bus::{EventBus, Subscription};
use crate::event::{BlockChange, Event, EventKind, MutationOrigin};
use crate::module::Module;

// ---------------------------------------------------------------------------
// WorldConfig
// ---------------------------------------------------------------------------

/// World and chunk streaming settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorldConfig {
    pub world_id: String,
    /// Chebyshev radius, in chunks, kept active around the view.
    pub view_distance: i32,
    /// Radius activated by `create_world`.
    pub initial_radius: i32,
    /// Follow `CameraMoved` with `update_active_chunks`.
    pub dynamic_chunks: bool,
    pub terrain: TerrainConfig,
}

/// Largest accepted `view_distance` or `initial_radius`, in chunks.
pub const MAX_CHUNK_RADIUS: i32 = 64;

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            world_id: "default".to_owned(),
            view_distance: 2,
            initial_radius: 1,
            dynamic_chunks: false,
            terrain: TerrainConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct WorldInner {
    bus: EventBus,
    config: WorldConfig,
    world: RefCell<World>,
    subscriptions: RefCell<Vec<Subscription>>,
}

/// Read-only access to the world for other modules.
#[derive(Clone)]
pub struct WorldView {
    inner: Rc<WorldInner>,
}

impl std::fmt::Debug for WorldView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldView").finish_non_exhaustive()
    }
}

impl WorldView {
    /// Borrow the world. Do not hold the guard across a bus publish.
    pub fn read(&self) -> Ref<'_, World> {
        self.inner.world.borrow()
    }

    pub fn get_block_at(&self, world_x: i32, world_y: i32, z: i32) -> Option<Block> {
        self.read().block_at(world_x, world_y, z).cloned()
    }

    pub fn get_highest_occupied_layer(&self, world_x: i32, world_y: i32) -> Option<i32> {
        self.read().highest_occupied_layer(world_x, world_y)
    }

    pub fn get_tile_at(&self, world_x: i32, world_y: i32) -> Option<Tile> {
        self.read().tile_at(world_x, world_y).cloned()
    }
}

// ---------------------------------------------------------------------------
// WorldManager
// ---------------------------------------------------------------------------

/// Handle to the world module.
#[derive(Clone)]
pub struct WorldManager {
    inner: Rc<WorldInner>,
}

impl std::fmt::Debug for WorldManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = f.debug_struct("WorldManager");
        if let Ok(world) = self.inner.world.try_borrow() {
            out.field("world", &world.id()).field("loaded", &world.loaded_count());
        }
        out.finish()
    }
}

impl WorldManager {
    pub fn new(bus: EventBus, config: WorldConfig) -> Self {
        let world = World::new(config.world_id.clone(), config.terrain.clone());
        Self {
            inner: Rc::new(WorldInner {
                bus,
                config,
                world: RefCell::new(world),
                subscriptions: RefCell::new(Vec::new()),
            }),
        }
    }

    fn from_weak(weak: &Weak<WorldInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub fn view(&self) -> WorldView {
        WorldView {
            inner: Rc::clone(&self.inner),
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.inner.config
    }

    /// Borrow the world. Do not hold the guard across a bus publish.
    pub fn read(&self) -> Ref<'_, World> {
        self.inner.world.borrow()
    }

    fn publish(&self, event: Event) {
        self.inner.bus.publish(event);
    }

    fn chunk_id(&self, world_x: i32, world_y: i32) -> ChunkId {
        ChunkId::new(self.read().id(), ChunkCoord::containing(world_x, world_y))
    }

    /// Load the chunk owning a cell, announcing it if it was generated.
    fn ensure_loaded(&self, coord: ChunkCoord) {
        let created = self.inner.world.borrow_mut().load_chunk(coord);
        if created {
            let chunk_id = ChunkId::new(self.read().id(), coord);
            self.publish(Event::ChunkLoaded { chunk_id });
        }
    }

    // -- world lifecycle ------------------------------------------------------

    /// Drop all chunk and entity state, then activate the initial radius
    /// around the chunk containing `(center_x, center_y)`.
    pub fn create_world(&self, id: &str, center_x: i32, center_y: i32) {
        self.inner.world.borrow_mut().reset(id);
        let center = ChunkCoord::containing(center_x, center_y);
        for coord in World::ring(center, self.inner.config.initial_radius) {
            self.ensure_loaded(coord);
            self.inner.world.borrow_mut().activate(coord);
        }
        tracing::info!(world = id, %center, radius = self.inner.config.initial_radius, "world created");
    }

    /// The chunk owning `(x, y)`. With `create_if_missing` the chunk is
    /// generated when absent.
    pub fn get_chunk_at(&self, world_x: i32, world_y: i32, create_if_missing: bool) -> Option<Ref<'_, Chunk>> {
        if create_if_missing {
            self.ensure_loaded(ChunkCoord::containing(world_x, world_y));
        }
        Ref::filter_map(self.read(), |w| w.chunk_at(world_x, world_y)).ok()
    }

    // -- queries --------------------------------------------------------------

    pub fn get_block_at(&self, world_x: i32, world_y: i32, z: i32) -> Option<Block> {
        self.read().block_at(world_x, world_y, z).cloned()
    }

    /// Highest occupied layer of a column, `None` when it is empty.
    pub fn get_highest_occupied_layer(&self, world_x: i32, world_y: i32) -> Option<i32> {
        self.read().highest_occupied_layer(world_x, world_y)
    }

    pub fn get_tile_at(&self, world_x: i32, world_y: i32) -> Option<Tile> {
        self.read().tile_at(world_x, world_y).cloned()
    }

    /// Clones of the entities within `radius` of `(x, y)`, nearest first.
    pub fn entities_in_radius(&self, x: f64, y: f64, radius: f64) -> Vec<Entity> {
        self.read()
            .entities_in_radius(x, y, radius)
            .into_iter()
            .cloned()
            .collect()
    }

    // -- block mutation -------------------------------------------------------

    /// Write a block unconditionally. A replaced block is announced as
    /// removed before the new one is announced as added.
    pub fn set_block_at(&self, block: Block) -> Option<Block> {
        self.ensure_loaded(ChunkCoord::containing(block.x, block.y));
        let result = self.inner.world.borrow_mut().set_block_at(block.clone());
        match result {
            Ok(replaced) => {
                let chunk_id = self.chunk_id(block.x, block.y);
                if let Some(old) = &replaced {
                    self.publish(Event::BlockRemoved(BlockChange::new(
                        old.clone(),
                        chunk_id.clone(),
                        MutationOrigin::Interaction,
                    )));
                }
                self.publish(Event::BlockAdded(BlockChange::new(
                    block,
                    chunk_id,
                    MutationOrigin::Interaction,
                )));
                replaced
            }
            Err(e) => {
                tracing::warn!(x = block.x, y = block.y, z = block.z, error = %e, "set block rejected");
                None
            }
        }
    }

    /// Place a default block of `block_type`, stacking on the column when
    /// `z` is omitted.
    pub fn place_block(&self, world_x: i32, world_y: i32, z: Option<i32>, block_type: BlockType) -> Option<Block> {
        self.place_block_with(world_x, world_y, z, block_type, MutationOrigin::Interaction)
    }

    pub(crate) fn place_block_with(
        &self,
        world_x: i32,
        world_y: i32,
        z: Option<i32>,
        block_type: BlockType,
        origin: MutationOrigin,
    ) -> Option<Block> {
        self.ensure_loaded(ChunkCoord::containing(world_x, world_y));
        let result = self
            .inner
            .world
            .borrow_mut()
            .place_block(world_x, world_y, z, block_type);
        match result {
            Ok(block) => {
                let chunk_id = self.chunk_id(world_x, world_y);
                self.publish(Event::BlockAdded(BlockChange::new(block.clone(), chunk_id, origin)));
                Some(block)
            }
            Err(e) => {
                tracing::warn!(x = world_x, y = world_y, ?z, error = %e, "block placement rejected");
                None
            }
        }
    }

    /// Place a copy of `template` at its own coordinates, keeping every
    /// property.
    pub fn place_block_exact(&self, template: &Block) -> Option<Block> {
        self.place_block_exact_with(template, MutationOrigin::Interaction)
    }

    pub(crate) fn place_block_exact_with(&self, template: &Block, origin: MutationOrigin) -> Option<Block> {
        self.ensure_loaded(ChunkCoord::containing(template.x, template.y));
        let result = self.inner.world.borrow_mut().place_block_exact(template);
        match result {
            Ok(block) => {
                let chunk_id = self.chunk_id(block.x, block.y);
                self.publish(Event::BlockAdded(BlockChange::new(block.clone(), chunk_id, origin)));
                Some(block)
            }
            Err(e) => {
                tracing::warn!(x = template.x, y = template.y, z = template.z, error = %e, "exact placement rejected");
                None
            }
        }
    }

    pub fn remove_block(&self, world_x: i32, world_y: i32, z: i32) -> Option<Block> {
        self.remove_block_with(world_x, world_y, z, MutationOrigin::Interaction)
    }

    pub(crate) fn remove_block_with(&self, world_x: i32, world_y: i32, z: i32, origin: MutationOrigin) -> Option<Block> {
        let result = self.inner.world.borrow_mut().remove_block(world_x, world_y, z);
        match result {
            Ok(block) => {
                let chunk_id = self.chunk_id(world_x, world_y);
                self.publish(Event::BlockRemoved(BlockChange::new(block.clone(), chunk_id, origin)));
                Some(block)
            }
            Err(e) => {
                tracing::warn!(x = world_x, y = world_y, z, error = %e, "block removal rejected");
                None
            }
        }
    }

    // -- tiles ----------------------------------------------------------------

    /// Set the ground tile of a cell, returning the replaced tile.
    pub fn set_tile_at(&self, tile: Tile) -> Option<Tile> {
        self.ensure_loaded(ChunkCoord::containing(tile.x, tile.y));
        let (x, y) = (tile.x, tile.y);
        let result = self.inner.world.borrow_mut().set_tile(tile);
        result.unwrap_or_else(|e| {
            tracing::warn!(x, y, error = %e, "tile write rejected");
            None
        })
    }

    pub fn remove_tile(&self, world_x: i32, world_y: i32) -> Option<Tile> {
        let result = self.inner.world.borrow_mut().remove_tile(world_x, world_y);
        result.unwrap_or_else(|e| {
            tracing::warn!(x = world_x, y = world_y, error = %e, "tile removal rejected");
            None
        })
    }

    // -- entities -------------------------------------------------------------

    pub fn spawn_entity(
        &self,
        entity_type: &str,
        x: f64,
        y: f64,
        z: f64,
        properties: EntityProperties,
    ) -> EntityId {
        self.inner
            .world
            .borrow_mut()
            .spawn_entity(entity_type, x, y, z, properties)
    }

    pub fn insert_entity(&self, entity: Entity) -> bool {
        let id = entity.id;
        let result = self.inner.world.borrow_mut().insert_entity(entity);
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(entity = %id, error = %e, "entity insert rejected");
                false
            }
        }
    }

    // -- chunk streaming ------------------------------------------------------

    /// Freeze or unfreeze a loaded chunk.
    pub fn set_chunk_static(&self, coord: ChunkCoord, is_static: bool) -> bool {
        let result = self.inner.world.borrow_mut().set_chunk_static(coord, is_static);
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%coord, error = %e, "cannot change static flag");
                false
            }
        }
    }

    /// Keep the chunks within `view_distance` of the view position active.
    /// Chunks that leave that radius are deactivated; chunks more than one
    /// ring further out are unloaded.
    pub fn update_active_chunks(&self, view_x: f64, view_y: f64) {
        let center = ChunkCoord::containing_point(view_x, view_y);
        let radius = self.inner.config.view_distance;

        for coord in World::ring(center, radius) {
            self.ensure_loaded(coord);
            self.inner.world.borrow_mut().activate(coord);
        }

        let (stale, distant): (Vec<ChunkCoord>, Vec<ChunkCoord>) = {
            let world = self.read();
            let stale = world
                .active_coords()
                .filter(|c| c.chebyshev_distance(center) > radius)
                .collect();
            let distant = world
                .loaded_coords()
                .filter(|c| c.chebyshev_distance(center) > radius + 1)
                .collect();
            (stale, distant)
        };
        {
            let mut world = self.inner.world.borrow_mut();
            for coord in &stale {
                world.deactivate(*coord);
            }
        }
        for coord in distant {
            self.unload_chunk(coord);
        }
        tracing::debug!(%center, radius, deactivated = stale.len(), "active chunks updated");
    }

    /// Evict a chunk. A dirty chunk is flushed first as `ChunkSaved`, then
    /// `ChunkUnloaded` follows. Returns `false` when it was not loaded.
    pub fn unload_chunk(&self, coord: ChunkCoord) -> bool {
        let (chunk_id, saved) = {
            let world = self.read();
            let Some(chunk) = world.chunk(coord) else {
                return false;
            };
            let saved = chunk.is_dirty().then(|| {
                let json = chunk.to_json();
                let hash = blake3::hash(json.to_string().as_bytes()).to_hex().to_string();
                Event::ChunkSaved {
                    chunk_id: chunk.id().clone(),
                    version: chunk.version(),
                    json,
                    hash,
                }
            });
            (chunk.id().clone(), saved)
        };
        if let Some(event) = saved {
            tracing::debug!(chunk = %chunk_id, "flushing dirty chunk");
            self.publish(event);
        }
        self.inner.world.borrow_mut().unload_chunk(coord);
        self.publish(Event::ChunkUnloaded { chunk_id });
        true
    }

    // -- request handlers -----------------------------------------------------

    fn handle_request(&self, event: &Event) {
        match event {
            Event::TileRequestPlace {
                x,
                y,
                z,
                block_type,
                origin,
            } => {
                self.place_block_with(*x, *y, Some(*z), *block_type, *origin);
            }
            Event::TileRequestPlaceExact { block, origin } => {
                self.place_block_exact_with(block, *origin);
            }
            Event::TileRequestDelete { x, y, z, origin } => {
                self.remove_block_with(*x, *y, *z, *origin);
            }
            Event::CameraMoved { x, y } => self.update_active_chunks(*x, *y),
            _ => {}
        }
    }
}

impl Module for WorldManager {
    fn name(&self) -> &str {
        "world"
    }

    fn on_initialize(&mut self) -> anyhow::Result<()> {
        let mut kinds = vec![
            EventKind::TileRequestPlace,
            EventKind::TileRequestPlaceExact,
            EventKind::TileRequestDelete,
        ];
        if self.inner.config.dynamic_chunks {
            kinds.push(EventKind::CameraMoved);
        }
        let mut subscriptions = self.inner.subscriptions.borrow_mut();
        for kind in kinds {
            let weak = Rc::downgrade(&self.inner);
            subscriptions.push(self.inner.bus.subscribe(kind, move |event| {
                if let Some(manager) = WorldManager::from_weak(&weak) {
                    manager.handle_request(event);
                }
                Ok(())
            }));
        }
        Ok(())
    }

    fn on_fixed_update(&mut self, dt: f64) -> anyhow::Result<()> {
        let migrated = self.inner.world.borrow_mut().step_entities(dt);
        if migrated > 0 {
            tracing::trace!(migrated, "entities changed chunk");
        }
        Ok(())
    }

    fn on_update(&mut self, dt: f64) -> anyhow::Result<()> {
        self.inner.world.borrow_mut().animate_entities(dt);
        Ok(())
    }

    fn on_destroy(&mut self) {
        for subscription in self.inner.subscriptions.borrow_mut().drain(..) {
            subscription.unsubscribe();
        }
    }
}
