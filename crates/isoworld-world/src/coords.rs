//! Coordinate types and world <-> chunk conversion.
//!
//! The world is an unbounded integer grid of `(x, y)` cells partitioned into
//! [`CHUNK_SIZE`] x [`CHUNK_SIZE`] chunks. Every cell holds a stack of layers
//! indexed by `z`, where `z = 0` sits directly on the ground.
//!
//! Conversions use Euclidean division so negative coordinates map to the
//! correct chunk: cell `-1` lives in chunk `-1` at local index `15`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Width and depth of a chunk in cells.
pub const CHUNK_SIZE: i32 = 16;

/// Highest layer index a block may occupy.
pub const MAX_LAYER: i32 = 63;

// ---------------------------------------------------------------------------
// ChunkCoord
// ---------------------------------------------------------------------------

/// Chunk-grid coordinates (world cell coordinates divided by [`CHUNK_SIZE`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The chunk containing world cell `(world_x, world_y)`.
    pub fn containing(world_x: i32, world_y: i32) -> Self {
        Self {
            x: world_x.div_euclid(CHUNK_SIZE),
            y: world_y.div_euclid(CHUNK_SIZE),
        }
    }

    /// The chunk containing a continuous world position.
    pub fn containing_point(world_x: f64, world_y: f64) -> Self {
        Self::containing(world_x.floor() as i32, world_y.floor() as i32)
    }

    /// World cell coordinates of this chunk's `(0, 0)` corner.
    pub fn origin(self) -> (i32, i32) {
        (self.x * CHUNK_SIZE, self.y * CHUNK_SIZE)
    }

    /// Chebyshev distance in chunks, used for view-distance rings.
    pub fn chebyshev_distance(self, other: ChunkCoord) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// ChunkId
// ---------------------------------------------------------------------------

/// Globally unique chunk identity: `(world_id, chunk_x, chunk_y)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId {
    pub world_id: String,
    pub coord: ChunkCoord,
}

impl ChunkId {
    pub fn new(world_id: impl Into<String>, coord: ChunkCoord) -> Self {
        Self {
            world_id: world_id.into(),
            coord,
        }
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.world_id, self.coord)
    }
}

// ---------------------------------------------------------------------------
// LocalPos
// ---------------------------------------------------------------------------

/// Composite block key inside a chunk: local column plus layer.
///
/// Ordering is `(x, y, z)` lexicographic, so all layers of one column are
/// adjacent in an ordered map and a column scan is a range query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalPos {
    pub x: u8,
    pub y: u8,
    pub z: i32,
}

impl LocalPos {
    pub fn new(x: u8, y: u8, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// Split a world cell into its chunk and chunk-local column.
pub fn world_to_local(world_x: i32, world_y: i32) -> (ChunkCoord, u8, u8) {
    let coord = ChunkCoord::containing(world_x, world_y);
    let lx = world_x.rem_euclid(CHUNK_SIZE) as u8;
    let ly = world_y.rem_euclid(CHUNK_SIZE) as u8;
    (coord, lx, ly)
}

/// Inverse of [`world_to_local`].
pub fn local_to_world(coord: ChunkCoord, local_x: u8, local_y: u8) -> (i32, i32) {
    let (ox, oy) = coord.origin();
    (ox + i32::from(local_x), oy + i32::from(local_y))
}

/// Whether `z` is a valid block layer.
pub fn layer_in_range(z: i32) -> bool {
    (0..=MAX_LAYER).contains(&z)
}

// ---------------------------------------------------------------------------
// TilePos
// ---------------------------------------------------------------------------

/// An integer ground cell, used for hover and selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Floor a continuous world position to the cell containing it.
    pub fn from_world(world_x: f64, world_y: f64) -> Self {
        Self {
            x: world_x.floor() as i32,
            y: world_y.floor() as i32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_cells_map_to_expected_chunk() {
        assert_eq!(world_to_local(0, 0), (ChunkCoord::new(0, 0), 0, 0));
        assert_eq!(world_to_local(15, 15), (ChunkCoord::new(0, 0), 15, 15));
        assert_eq!(world_to_local(16, 33), (ChunkCoord::new(1, 2), 0, 1));
    }

    #[test]
    fn negative_cells_use_euclidean_division() {
        assert_eq!(world_to_local(-1, -1), (ChunkCoord::new(-1, -1), 15, 15));
        assert_eq!(world_to_local(-16, -17), (ChunkCoord::new(-1, -2), 0, 15));
    }

    #[test]
    fn local_round_trip() {
        for (x, y) in [(0, 0), (5, -3), (-40, 77), (1023, -1024)] {
            let (coord, lx, ly) = world_to_local(x, y);
            assert_eq!(local_to_world(coord, lx, ly), (x, y));
        }
    }

    #[test]
    fn tile_pos_floors_negative_fractions() {
        assert_eq!(TilePos::from_world(-0.25, 2.9), TilePos::new(-1, 2));
    }

    #[test]
    fn chunk_id_display() {
        let id = ChunkId::new("overworld", ChunkCoord::new(-2, 3));
        assert_eq!(id.to_string(), "overworld:-2,3");
    }

    #[test]
    fn layer_range() {
        assert!(layer_in_range(0));
        assert!(layer_in_range(MAX_LAYER));
        assert!(!layer_in_range(-1));
        assert!(!layer_in_range(MAX_LAYER + 1));
    }
}
