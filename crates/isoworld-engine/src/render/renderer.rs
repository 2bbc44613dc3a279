//! The isometric renderer module.
//!
//! Each `late_update` draws one frame onto the shared [`DrawSurface`]:
//!
//! 1. clear to the background color and save the surface state;
//! 2. draw the ground tiles of the active chunks as flat diamonds in their
//!    tile color, or as sprites when cached;
//! 3. gather blocks and entities of the active chunks (plus overflow
//!    entities) and depth-sort them back to front;
//! 4. draw blocks as three-faced prisms of their own height, or as sprites
//!    when the asset cache holds the block's sprite; draw entities as small
//!    cubes with an optional glow and a health bar when damaged;
//! 5. draw overlays: grid, chunk borders and the hovered-cell highlight;
//! 6. restore the surface state.
//!
//! The hover highlight sits on the top face of the topmost block of the
//! hovered column, so it carries the same layer offset as that block.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use isoworld_world::block::Block;
use isoworld_world::color::Color;
use isoworld_world::coords::{TilePos, CHUNK_SIZE};
use isoworld_world::entity::Entity;
use isoworld_world::tile::Tile;

use super::pipeline::{depth_sort, gather, gather_tiles, PrismFaces, Projector, RenderItem, RenderKey, FACE_SHADES};
use super::projection::{Camera, IsoProjection, Viewport};
use super::surface::{DrawSurface, Point, SharedSurface};
use crate::assets::AssetManager;
use crate::bus::{EventBus, Subscription};
use crate::event::{Event, EventKind};
use crate::module::Module;
use crate::world_manager::WorldView;
use crate::EngineError;

const GRID_COLOR: Color = Color::rgba(0xff, 0xff, 0xff, 0x30);
const BORDER_COLOR: Color = Color::rgba(0xff, 0xd0, 0x40, 0xa0);
const HOVER_COLOR: Color = Color::rgba(0xff, 0xff, 0xff, 0xd0);
const HOVER_FILL: Color = Color::rgba(0xff, 0xff, 0xff, 0x40);
const HEALTH_BACK: Color = Color::rgb(0x40, 0x10, 0x10);
const HEALTH_FRONT: Color = Color::rgb(0x40, 0xe0, 0x40);

// ---------------------------------------------------------------------------
// RenderConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderConfig {
    pub tile_width: f64,
    pub tile_height: f64,
    pub tile_depth: f64,
    /// Initial window size for windowed hosts.
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub background: Color,
    pub show_grid: bool,
    pub show_chunk_borders: bool,
    /// Camera pan per key press, in world cells.
    pub pan_step: f64,
    /// Relative zoom change per wheel notch.
    pub zoom_step: f64,
    pub initial_zoom: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            tile_width: 64.0,
            tile_height: 32.0,
            tile_depth: 32.0,
            viewport_width: 1280,
            viewport_height: 720,
            background: Color::rgb(0x1a, 0x1a, 0x2e),
            show_grid: false,
            show_chunk_borders: false,
            pan_step: 1.0,
            zoom_step: 0.1,
            initial_zoom: 1.0,
        }
    }
}

impl RenderConfig {
    pub fn projection(&self) -> IsoProjection {
        IsoProjection::new(self.tile_width, self.tile_height, self.tile_depth)
    }
}

/// What the last frame drew.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    pub tiles: usize,
    pub blocks: usize,
    pub entities: usize,
    pub sprites: usize,
    /// Draw order of the frame's renderables.
    pub order: Vec<RenderKey>,
}

// ---------------------------------------------------------------------------
// IsometricRenderer
// ---------------------------------------------------------------------------

struct RendererInner {
    bus: EventBus,
    world: WorldView,
    assets: AssetManager,
    config: RenderConfig,
    surface: Option<SharedSurface>,
    camera: Cell<Camera>,
    hovered: Cell<Option<TilePos>>,
    show_grid: Cell<bool>,
    show_chunk_borders: Cell<bool>,
    last_stats: RefCell<FrameStats>,
    subscriptions: RefCell<Vec<Subscription>>,
}

/// Handle to the renderer module.
#[derive(Clone)]
pub struct IsometricRenderer {
    inner: Rc<RendererInner>,
}

impl std::fmt::Debug for IsometricRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsometricRenderer")
            .field("camera", &self.inner.camera.get())
            .field("has_surface", &self.inner.surface.is_some())
            .finish_non_exhaustive()
    }
}

impl IsometricRenderer {
    pub fn new(
        bus: EventBus,
        world: WorldView,
        assets: AssetManager,
        config: RenderConfig,
        surface: Option<SharedSurface>,
    ) -> Self {
        let camera = Camera::new(0.0, 0.0, config.initial_zoom);
        Self {
            inner: Rc::new(RendererInner {
                bus,
                world,
                assets,
                show_grid: Cell::new(config.show_grid),
                show_chunk_borders: Cell::new(config.show_chunk_borders),
                config,
                surface,
                camera: Cell::new(camera),
                hovered: Cell::new(None),
                last_stats: RefCell::new(FrameStats::default()),
                subscriptions: RefCell::new(Vec::new()),
            }),
        }
    }

    fn from_weak(weak: &Weak<RendererInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    // -- camera ---------------------------------------------------------------

    pub fn camera(&self) -> Camera {
        self.inner.camera.get()
    }

    /// Move the camera focus and announce it.
    pub fn look_at(&self, x: f64, y: f64) {
        let mut camera = self.inner.camera.get();
        camera.x = x;
        camera.y = y;
        self.inner.camera.set(camera);
        self.inner.bus.publish(Event::CameraMoved { x, y });
    }

    pub fn pan(&self, dx: f64, dy: f64) {
        let camera = self.inner.camera.get();
        self.look_at(camera.x + dx, camera.y + dy);
    }

    pub fn set_zoom(&self, zoom: f64) {
        let mut camera = self.inner.camera.get();
        camera.set_zoom(zoom);
        self.inner.camera.set(camera);
    }

    /// Zoom in for negative wheel deltas, out for positive ones.
    pub fn wheel(&self, delta_y: f64) {
        let step = 1.0 + self.inner.config.zoom_step;
        let factor = if delta_y < 0.0 {
            step
        } else if delta_y > 0.0 {
            1.0 / step
        } else {
            return;
        };
        let mut camera = self.inner.camera.get();
        camera.zoom_by(factor);
        self.inner.camera.set(camera);
    }

    fn viewport(&self) -> Viewport {
        self.inner
            .surface
            .as_ref()
            .and_then(|s| s.try_borrow().ok().map(|s| s.size()))
            .unwrap_or(Viewport::new(0, 0))
    }

    pub fn projector(&self) -> Projector {
        Projector {
            projection: self.inner.config.projection(),
            camera: self.inner.camera.get(),
            viewport: self.viewport(),
        }
    }

    /// Ground-plane world position under a screen pixel.
    pub fn screen_to_world(&self, screen_x: f64, screen_y: f64) -> (f64, f64) {
        let p = self.projector();
        super::projection::screen_to_world(&p.projection, &p.camera, p.viewport, screen_x, screen_y)
    }

    // -- overlays -------------------------------------------------------------

    pub fn set_show_grid(&self, show: bool) {
        self.inner.show_grid.set(show);
    }

    pub fn set_show_chunk_borders(&self, show: bool) {
        self.inner.show_chunk_borders.set(show);
    }

    pub fn hovered_tile(&self) -> Option<TilePos> {
        self.inner.hovered.get()
    }

    /// Elevation of the hover highlight: the top face of the column's
    /// topmost block, or the ground for an empty column.
    pub fn hover_elevation(&self, tile: TilePos) -> f64 {
        let world = self.inner.world.read();
        world
            .highest_occupied_layer(tile.x, tile.y)
            .and_then(|z| world.block_at(tile.x, tile.y, z))
            .map_or(0.0, |b| f64::from(b.z) + f64::from(b.properties.height))
    }

    /// Screen outline of the hover highlight.
    pub fn hover_outline(&self, tile: TilePos) -> [Point; 4] {
        let elevation = self.hover_elevation(tile);
        self.projector()
            .cell_outline(f64::from(tile.x), f64::from(tile.y), elevation)
    }

    pub fn last_stats(&self) -> FrameStats {
        self.inner.last_stats.borrow().clone()
    }

    // -- frame ----------------------------------------------------------------

    /// Draw one frame.
    pub fn render_frame(&self) -> Result<FrameStats, EngineError> {
        let shared = self.inner.surface.as_ref().ok_or(EngineError::MissingSurface)?;
        let projector = self.projector();
        let mut surface = shared.try_borrow_mut().map_err(|_| EngineError::ModuleFailed {
            module: "renderer".to_owned(),
            source: anyhow::anyhow!("drawing surface is borrowed elsewhere"),
        })?;

        surface.clear(self.inner.config.background);
        surface.save();

        let mut stats = FrameStats::default();
        {
            let world = self.inner.world.read();
            for tile in gather_tiles(&world) {
                stats.tiles += 1;
                if self.draw_tile(&mut *surface, &projector, tile) {
                    stats.sprites += 1;
                }
            }

            let mut items = gather(&world);
            depth_sort(&mut items);
            for item in &items {
                stats.order.push(item.key());
                match &item.item {
                    RenderItem::Block(block) => {
                        stats.blocks += 1;
                        if self.draw_block(&mut *surface, &projector, block) {
                            stats.sprites += 1;
                        }
                    }
                    RenderItem::Entity(entity) => {
                        stats.entities += 1;
                        if self.draw_entity(&mut *surface, &projector, entity) {
                            stats.sprites += 1;
                        }
                    }
                }
            }

            if self.inner.show_grid.get() {
                for chunk in world.active_chunks() {
                    let (ox, oy) = chunk.coord().origin();
                    for dy in 0..CHUNK_SIZE {
                        for dx in 0..CHUNK_SIZE {
                            let outline = projector.cell_outline(f64::from(ox + dx), f64::from(oy + dy), 0.0);
                            surface.stroke_polygon(&outline, GRID_COLOR, 1.0);
                        }
                    }
                }
            }
            if self.inner.show_chunk_borders.get() {
                let size = f64::from(CHUNK_SIZE);
                for chunk in world.active_chunks() {
                    let (ox, oy) = chunk.coord().origin();
                    let (x, y) = (f64::from(ox), f64::from(oy));
                    let border = [
                        projector.project(x, y, 0.0),
                        projector.project(x + size, y, 0.0),
                        projector.project(x + size, y + size, 0.0),
                        projector.project(x, y + size, 0.0),
                    ];
                    surface.stroke_polygon(&border, BORDER_COLOR, 2.0);
                }
            }
        }

        if let Some(tile) = self.inner.hovered.get() {
            let elevation = self.hover_elevation(tile);
            let outline = projector.cell_outline(f64::from(tile.x), f64::from(tile.y), elevation);
            surface.fill_polygon(&outline, HOVER_FILL);
            surface.stroke_polygon(&outline, HOVER_COLOR, 2.0);
        }

        surface.restore();
        tracing::trace!(tiles = stats.tiles, blocks = stats.blocks, entities = stats.entities, "frame rendered");
        *self.inner.last_stats.borrow_mut() = stats.clone();
        Ok(stats)
    }

    fn fill_faces(surface: &mut dyn DrawSurface, faces: &PrismFaces, color: Color) {
        surface.fill_polygon(&faces.left, color.shade(FACE_SHADES[1]));
        surface.fill_polygon(&faces.right, color.shade(FACE_SHADES[2]));
        surface.fill_polygon(&faces.top, color.shade(FACE_SHADES[0]));
    }

    /// Returns `true` when a sprite was drawn.
    fn draw_sprite_at(
        &self,
        surface: &mut dyn DrawSurface,
        projector: &Projector,
        sprite_id: Option<&str>,
        (x, y, z): (f64, f64, f64),
        height: f64,
    ) -> bool {
        let Some(sprite_id) = sprite_id.filter(|id| self.inner.assets.has(id)) else {
            return false;
        };
        let zoom = projector.camera.zoom();
        let top = projector.project(x, y, z + height);
        let width = projector.projection.tile_width * zoom;
        let full = (projector.projection.tile_height + projector.projection.tile_depth * height) * zoom;
        surface.draw_sprite(sprite_id, top.x - width / 2.0, top.y, width, full);
        true
    }

    fn draw_tile(&self, surface: &mut dyn DrawSurface, projector: &Projector, tile: &Tile) -> bool {
        let (x, y) = (f64::from(tile.x), f64::from(tile.y));
        let props = &tile.properties;
        if self.draw_sprite_at(surface, projector, props.sprite_id.as_deref(), (x, y, 0.0), 0.0) {
            return true;
        }
        surface.fill_polygon(&projector.cell_outline(x, y, 0.0), props.color);
        false
    }

    fn draw_block(&self, surface: &mut dyn DrawSurface, projector: &Projector, block: &Block) -> bool {
        let props = &block.properties;
        let (x, y, z) = (f64::from(block.x), f64::from(block.y), f64::from(block.z));
        let height = f64::from(props.height);
        if self.draw_sprite_at(surface, projector, props.sprite_id.as_deref(), (x, y, z), height) {
            return true;
        }
        let faces = projector.prism(x, y, z, 1.0, height);
        Self::fill_faces(surface, &faces, props.color);
        false
    }

    fn draw_entity(&self, surface: &mut dyn DrawSurface, projector: &Projector, entity: &Entity) -> bool {
        let props = &entity.properties;
        let size = props.size;
        let half = size / 2.0;
        let (x, y, z) = (entity.x, entity.y, entity.z);

        if let Some(glow) = props.glow {
            let halo = [
                projector.project(x - size, y, z),
                projector.project(x, y - size, z),
                projector.project(x + size, y, z),
                projector.project(x, y + size, z),
            ];
            surface.fill_polygon(&halo, glow.with_alpha(0x60));
        }

        let sprite = self.draw_sprite_at(surface, projector, props.sprite_id.as_deref(), (x, y, z), size);
        if !sprite {
            let faces = projector.prism(x - half, y - half, z, size, size);
            Self::fill_faces(surface, &faces, props.color);
        }

        if entity.is_damaged() {
            let zoom = projector.camera.zoom();
            let anchor = projector.project(x, y, z + size);
            let width = projector.projection.tile_width * 0.5 * zoom;
            let bar = 4.0 * zoom;
            let (left, top) = (anchor.x - width / 2.0, anchor.y - bar * 2.0);
            surface.fill_rect(left, top, width, bar, HEALTH_BACK);
            surface.fill_rect(left, top, width * entity.health_fraction(), bar, HEALTH_FRONT);
        }
        sprite
    }

    // -- input ----------------------------------------------------------------

    fn key_pressed(&self, key: &str) {
        let s = self.inner.config.pan_step;
        match key {
            "ArrowUp" | "w" | "W" => self.pan(-s, -s),
            "ArrowDown" | "s" | "S" => self.pan(s, s),
            "ArrowLeft" | "a" | "A" => self.pan(-s, s),
            "ArrowRight" | "d" | "D" => self.pan(s, -s),
            "g" | "G" => self.set_show_grid(!self.inner.show_grid.get()),
            "b" | "B" => self.set_show_chunk_borders(!self.inner.show_chunk_borders.get()),
            _ => {}
        }
    }

    fn handle_event(&self, event: &Event) {
        match event {
            Event::InputWheel { delta_y } => self.wheel(*delta_y),
            Event::InputKeyDown { key } => self.key_pressed(key),
            Event::TileHover { current, .. } => self.inner.hovered.set(*current),
            _ => {}
        }
    }
}

impl Module for IsometricRenderer {
    fn name(&self) -> &str {
        "renderer"
    }

    fn on_initialize(&mut self) -> anyhow::Result<()> {
        if self.inner.surface.is_none() {
            return Err(EngineError::MissingSurface.into());
        }
        let mut subscriptions = self.inner.subscriptions.borrow_mut();
        for kind in [EventKind::InputWheel, EventKind::InputKeyDown, EventKind::TileHover] {
            let weak = Rc::downgrade(&self.inner);
            subscriptions.push(self.inner.bus.subscribe(kind, move |event| {
                if let Some(renderer) = IsometricRenderer::from_weak(&weak) {
                    renderer.handle_event(event);
                }
                Ok(())
            }));
        }
        Ok(())
    }

    fn on_late_update(&mut self, _dt: f64) -> anyhow::Result<()> {
        self.render_frame()?;
        Ok(())
    }

    fn on_destroy(&mut self) {
        for subscription in self.inner.subscriptions.borrow_mut().drain(..) {
            subscription.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::surface::{DrawOp, RecordingSurface};
    use crate::world_manager::{WorldConfig, WorldManager};
    use isoworld_world::terrain::TerrainConfig;

    fn rig() -> (WorldManager, IsometricRenderer, Rc<RefCell<RecordingSurface>>) {
        let bus = EventBus::new();
        let world = WorldManager::new(
            bus.clone(),
            WorldConfig {
                terrain: TerrainConfig::empty(),
                ..Default::default()
            },
        );
        world.create_world("r", 0, 0);
        let surface = RecordingSurface::shared(800, 600);
        let shared: SharedSurface = surface.clone();
        let mut renderer = IsometricRenderer::new(
            bus,
            world.view(),
            AssetManager::new(),
            RenderConfig::default(),
            Some(shared),
        );
        renderer.on_initialize().unwrap();
        (world, renderer, surface)
    }

    #[test]
    fn missing_surface_fails_initialize() {
        let bus = EventBus::new();
        let world = WorldManager::new(bus.clone(), WorldConfig::default());
        let mut renderer =
            IsometricRenderer::new(bus, world.view(), AssetManager::new(), RenderConfig::default(), None);
        let err = renderer.on_initialize().unwrap_err();
        assert!(matches!(err.downcast_ref::<EngineError>(), Some(EngineError::MissingSurface)));
    }

    #[test]
    fn frame_is_balanced_and_counts_blocks() {
        let (world, renderer, surface) = rig();
        world.place_block(1, 1, None, isoworld_world::block::BlockType::Stone);
        world.place_block(1, 1, None, isoworld_world::block::BlockType::Stone);
        let stats = renderer.render_frame().unwrap();
        assert_eq!(stats.blocks, 2);
        let surface = surface.borrow();
        assert_eq!(surface.save_depth(), 0);
        // clear, save, 2 x 3 faces, restore
        assert_eq!(surface.ops().len(), 9);
    }

    #[test]
    fn ground_tiles_draw_before_blocks() {
        let (world, renderer, surface) = rig();
        world.set_tile_at(Tile::new(isoworld_world::tile::TileType::Grass, 1, 1));
        world.place_block(1, 1, None, isoworld_world::block::BlockType::Stone);
        let stats = renderer.render_frame().unwrap();
        assert_eq!((stats.tiles, stats.blocks), (1, 1));

        let surface = surface.borrow();
        let grass = isoworld_world::tile::TileType::Grass.default_color();
        // clear, save, then the tile precedes the three block faces.
        assert!(matches!(
            surface.ops().get(2),
            Some(DrawOp::FillPolygon { color, .. }) if *color == grass
        ));
    }

    #[test]
    fn hover_elevation_tracks_stack_height() {
        let (world, renderer, _surface) = rig();
        let tile = TilePos::new(2, 2);
        assert_eq!(renderer.hover_elevation(tile), 0.0);
        world.place_block(2, 2, None, isoworld_world::block::BlockType::Dirt);
        world.place_block(2, 2, None, isoworld_world::block::BlockType::Dirt);
        assert_eq!(renderer.hover_elevation(tile), 2.0);
    }

    #[test]
    fn wheel_zooms_within_bounds() {
        let (_world, renderer, _surface) = rig();
        for _ in 0..200 {
            renderer.wheel(-1.0);
        }
        assert_eq!(renderer.camera().zoom(), Camera::MAX_ZOOM);
        for _ in 0..200 {
            renderer.wheel(1.0);
        }
        assert_eq!(renderer.camera().zoom(), Camera::MIN_ZOOM);
    }
}
