//! Renderable extraction, depth ordering and prism geometry.
//!
//! This is the pure half of the renderer: nothing here touches a surface,
//! so ordering and geometry are testable without drawing.
//!
//! Painter's order sorts by `x + y + z * DEPTH_LAYER_WEIGHT` ascending. The
//! layer weight dominates any in-layer diagonal of a loaded area, so a
//! higher layer is always drawn after every lower one. Equal depths break
//! ties by kind (blocks before entities), then position, then entity id, so
//! the order is total and independent of map iteration order.

use std::cmp::Ordering;

use isoworld_world::block::Block;
use isoworld_world::entity::{Entity, EntityId};
use isoworld_world::tile::Tile;
use isoworld_world::world::World;

use super::projection::{world_to_screen, Camera, IsoProjection, Viewport};
use super::surface::Point;

/// Weight of one layer in the depth key.
pub const DEPTH_LAYER_WEIGHT: f64 = 100.0;

/// Brightness of the top, left and right prism faces.
pub const FACE_SHADES: [f32; 3] = [1.0, 0.8, 0.6];

// ---------------------------------------------------------------------------
// Renderable
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum RenderItem {
    Block(Block),
    Entity(Entity),
}

/// Stable identity of a renderable, used to compare draw orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderKey {
    Block { x: i32, y: i32, z: i32 },
    Entity(EntityId),
}

/// One item of the draw list, positioned in world space.
#[derive(Debug, Clone, PartialEq)]
pub struct Renderable {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub item: RenderItem,
}

impl Renderable {
    pub fn block(block: &Block) -> Self {
        Self {
            x: f64::from(block.x),
            y: f64::from(block.y),
            z: f64::from(block.z),
            item: RenderItem::Block(block.clone()),
        }
    }

    pub fn entity(entity: &Entity) -> Self {
        Self {
            x: entity.x,
            y: entity.y,
            z: entity.z,
            item: RenderItem::Entity(entity.clone()),
        }
    }

    pub fn depth(&self) -> f64 {
        self.x + self.y + self.z * DEPTH_LAYER_WEIGHT
    }

    pub fn key(&self) -> RenderKey {
        match &self.item {
            RenderItem::Block(b) => RenderKey::Block { x: b.x, y: b.y, z: b.z },
            RenderItem::Entity(e) => RenderKey::Entity(e.id),
        }
    }

    fn rank(&self) -> (u8, u64) {
        match &self.item {
            RenderItem::Block(_) => (0, 0),
            RenderItem::Entity(e) => (1, e.id.0),
        }
    }

    /// Painter's order.
    pub fn draw_order(&self, other: &Self) -> Ordering {
        self.depth()
            .total_cmp(&other.depth())
            .then_with(|| self.rank().0.cmp(&other.rank().0))
            .then_with(|| self.x.total_cmp(&other.x))
            .then_with(|| self.y.total_cmp(&other.y))
            .then_with(|| self.z.total_cmp(&other.z))
            .then_with(|| self.rank().1.cmp(&other.rank().1))
    }
}

/// Visible blocks and active entities of every active chunk, plus the
/// overflow entities.
pub fn gather(world: &World) -> Vec<Renderable> {
    let mut items = Vec::new();
    for chunk in world.active_chunks() {
        items.extend(
            chunk
                .blocks()
                .filter(|b| b.properties.visible)
                .map(Renderable::block),
        );
        items.extend(
            chunk
                .entities()
                .filter(|e| e.state.active)
                .map(Renderable::entity),
        );
    }
    items.extend(
        world
            .global_entities()
            .filter(|e| e.state.active)
            .map(Renderable::entity),
    );
    items
}

/// Ground tiles of every active chunk, back to front. Tiles form the floor
/// under every renderable, so they are drawn as a separate pass.
pub fn gather_tiles(world: &World) -> Vec<&Tile> {
    let mut tiles: Vec<&Tile> = world.active_chunks().flat_map(|chunk| chunk.tiles()).collect();
    tiles.sort_by_key(|t| (t.x + t.y, t.x, t.y));
    tiles
}

pub fn depth_sort(items: &mut [Renderable]) {
    items.sort_by(Renderable::draw_order);
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Projection, camera and viewport bundled for one frame.
#[derive(Debug, Clone, Copy)]
pub struct Projector {
    pub projection: IsoProjection,
    pub camera: Camera,
    pub viewport: Viewport,
}

impl Projector {
    pub fn project(&self, x: f64, y: f64, z: f64) -> Point {
        world_to_screen(&self.projection, &self.camera, self.viewport, x, y, z).into()
    }

    /// Ground-plane diamond of cell `(x, y)` raised to elevation `z`.
    pub fn cell_outline(&self, x: f64, y: f64, z: f64) -> [Point; 4] {
        [
            self.project(x, y, z),
            self.project(x + 1.0, y, z),
            self.project(x + 1.0, y + 1.0, z),
            self.project(x, y + 1.0, z),
        ]
    }

    /// The three visible faces of a box with footprint `size` x `size`
    /// whose near corner is `(x, y)`, spanning elevations `z..z + height`.
    pub fn prism(&self, x: f64, y: f64, z: f64, size: f64, height: f64) -> PrismFaces {
        let (x1, y1, top) = (x + size, y + size, z + height);
        PrismFaces {
            top: [
                self.project(x, y, top),
                self.project(x1, y, top),
                self.project(x1, y1, top),
                self.project(x, y1, top),
            ],
            left: [
                self.project(x, y1, top),
                self.project(x1, y1, top),
                self.project(x1, y1, z),
                self.project(x, y1, z),
            ],
            right: [
                self.project(x1, y, top),
                self.project(x1, y1, top),
                self.project(x1, y1, z),
                self.project(x1, y, z),
            ],
        }
    }
}

/// Screen polygons of a prism, in draw order.
#[derive(Debug, Clone, PartialEq)]
pub struct PrismFaces {
    pub top: [Point; 4],
    pub left: [Point; 4],
    pub right: [Point; 4],
}

#[cfg(test)]
mod tests {
    use super::*;
    use isoworld_world::block::BlockType;

    fn block(x: i32, y: i32, z: i32) -> Renderable {
        Renderable::block(&Block::new(BlockType::Stone, x, y, z))
    }

    #[test]
    fn higher_layers_draw_last() {
        let mut items = vec![block(0, 0, 1), block(30, 30, 0), block(0, 0, 0)];
        depth_sort(&mut items);
        let keys: Vec<RenderKey> = items.iter().map(Renderable::key).collect();
        assert_eq!(
            keys,
            vec![
                RenderKey::Block { x: 0, y: 0, z: 0 },
                RenderKey::Block { x: 30, y: 30, z: 0 },
                RenderKey::Block { x: 0, y: 0, z: 1 },
            ]
        );
    }

    #[test]
    fn equal_depth_orders_by_position() {
        let mut items = vec![block(2, 0, 0), block(0, 2, 0), block(1, 1, 0)];
        depth_sort(&mut items);
        let xs: Vec<f64> = items.iter().map(|r| r.x).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn tiles_gather_back_to_front() {
        use isoworld_world::coords::ChunkCoord;
        use isoworld_world::terrain::TerrainConfig;
        use isoworld_world::tile::TileType;

        let mut world = World::new("t", TerrainConfig::empty());
        world.activate(ChunkCoord::new(0, 0));
        for (x, y) in [(2, 2), (0, 1), (1, 0), (0, 0)] {
            world.set_tile(Tile::new(TileType::Sand, x, y)).unwrap();
        }
        let cells: Vec<(i32, i32)> = gather_tiles(&world).iter().map(|t| (t.x, t.y)).collect();
        assert_eq!(cells, vec![(0, 0), (0, 1), (1, 0), (2, 2)]);
    }

    #[test]
    fn prism_top_sits_above_base() {
        let projector = Projector {
            projection: IsoProjection::default(),
            camera: Camera::default(),
            viewport: Viewport::new(0, 0),
        };
        let faces = projector.prism(0.0, 0.0, 0.0, 1.0, 1.0);
        assert_eq!(faces.top[0], Point::new(0.0, -32.0));
        assert_eq!(faces.left[3], Point::new(-32.0, 16.0));
        assert_eq!(faces.right[3], Point::new(32.0, 16.0));
    }
}
