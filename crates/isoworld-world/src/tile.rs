//! Ground tiles: the 2D layer under every block stack.
//!
//! A [`Tile`] always sits at layer 0 and is independent of block occupancy:
//! a cell may carry a tile and a block stack at the same time. A chunk holds
//! at most one tile per `(x, y)`.

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::WorldError;

/// The kind of ground a tile represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileType {
    Grass,
    Dirt,
    Sand,
    Water,
    Stone,
    Snow,
}

impl TileType {
    pub fn default_color(self) -> Color {
        match self {
            TileType::Grass => Color::rgb(0x6a, 0xb0, 0x4c),
            TileType::Dirt => Color::rgb(0x96, 0x6c, 0x3b),
            TileType::Sand => Color::rgb(0xe6, 0xd2, 0x8e),
            TileType::Water => Color::rgb(0x3f, 0x86, 0xd9),
            TileType::Stone => Color::rgb(0x8d, 0x8d, 0x92),
            TileType::Snow => Color::rgb(0xf2, 0xf5, 0xfa),
        }
    }

    pub fn walkable(self) -> bool {
        !matches!(self, TileType::Water)
    }
}

/// Properties of a ground tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileProperties {
    #[serde(default)]
    pub sprite_id: Option<String>,
    pub color: Color,
    pub walkable: bool,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// A ground tile at world cell `(x, y)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub x: i32,
    pub y: i32,
    #[serde(rename = "type")]
    pub tile_type: TileType,
    pub properties: TileProperties,
}

impl Tile {
    pub fn new(tile_type: TileType, x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            tile_type,
            properties: TileProperties {
                sprite_id: None,
                color: tile_type.default_color(),
                walkable: tile_type.walkable(),
                metadata: serde_json::Map::new(),
            },
        }
    }

    /// Tiles are fixed at the ground layer.
    pub fn z(&self) -> i32 {
        0
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("Tile should always be JSON-serializable")
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self, WorldError> {
        serde_json::from_value(value.clone()).map_err(|e| WorldError::Deserialize {
            what: "tile",
            details: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn water_is_not_walkable() {
        assert!(!Tile::new(TileType::Water, 0, 0).properties.walkable);
        assert!(Tile::new(TileType::Sand, 0, 0).properties.walkable);
    }

    #[test]
    fn json_round_trip() {
        let mut tile = Tile::new(TileType::Snow, -3, 9);
        tile.properties.sprite_id = Some("snow_1".to_owned());
        let json = tile.to_json();
        assert_eq!(json["type"], "snow");
        assert_eq!(json["properties"]["spriteId"], "snow_1");
        assert_eq!(Tile::from_json(&json).unwrap(), tile);
    }
}
