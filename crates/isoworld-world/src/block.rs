//! Stackable world blocks.
//!
//! A [`Block`] occupies one integer cell `(x, y)` at one layer `z`. Identity
//! (position and type) is fixed once placed; [`BlockProperties`] are mutable.
//! Blocks are owned by the chunk that contains their column.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::WorldError;

// ---------------------------------------------------------------------------
// BlockType
// ---------------------------------------------------------------------------

/// The kind of a block. Drives default visual and gameplay properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Grass,
    Dirt,
    Stone,
    Sand,
    Wood,
    Leaves,
    Brick,
    Glass,
    Water,
    Crystal,
}

impl BlockType {
    /// Every block type, in palette order.
    pub const ALL: [BlockType; 10] = [
        BlockType::Grass,
        BlockType::Dirt,
        BlockType::Stone,
        BlockType::Sand,
        BlockType::Wood,
        BlockType::Leaves,
        BlockType::Brick,
        BlockType::Glass,
        BlockType::Water,
        BlockType::Crystal,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BlockType::Grass => "grass",
            BlockType::Dirt => "dirt",
            BlockType::Stone => "stone",
            BlockType::Sand => "sand",
            BlockType::Wood => "wood",
            BlockType::Leaves => "leaves",
            BlockType::Brick => "brick",
            BlockType::Glass => "glass",
            BlockType::Water => "water",
            BlockType::Crystal => "crystal",
        }
    }

    /// Palette color used when no explicit color is given.
    pub fn default_color(self) -> Color {
        match self {
            BlockType::Grass => Color::rgb(0x5f, 0xa8, 0x3c),
            BlockType::Dirt => Color::rgb(0x8b, 0x5a, 0x2b),
            BlockType::Stone => Color::rgb(0x80, 0x80, 0x86),
            BlockType::Sand => Color::rgb(0xe0, 0xc9, 0x7f),
            BlockType::Wood => Color::rgb(0x9c, 0x6b, 0x3a),
            BlockType::Leaves => Color::rgb(0x2f, 0x7d, 0x32),
            BlockType::Brick => Color::rgb(0xb0, 0x4a, 0x3a),
            BlockType::Glass => Color::rgba(0xbf, 0xe6, 0xff, 0x99),
            BlockType::Water => Color::rgba(0x3a, 0x7b, 0xd5, 0xcc),
            BlockType::Crystal => Color::rgb(0xb3, 0x6b, 0xff),
        }
    }

    /// Default properties for a freshly placed block of this type.
    pub fn default_properties(self) -> BlockProperties {
        let liquid = matches!(self, BlockType::Water);
        BlockProperties {
            sprite_id: None,
            color: self.default_color(),
            solid: !liquid,
            visible: true,
            walkable: !liquid && !matches!(self, BlockType::Leaves),
            interactable: matches!(self, BlockType::Crystal),
            height: if liquid { 0.8 } else { 1.0 },
            metadata: serde_json::Map::new(),
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// BlockProperties
// ---------------------------------------------------------------------------

/// Mutable visual and gameplay properties of a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockProperties {
    /// Optional sprite key looked up in the asset cache.
    #[serde(default)]
    pub sprite_id: Option<String>,
    pub color: Color,
    pub solid: bool,
    #[serde(default = "default_true")]
    pub visible: bool,
    pub walkable: bool,
    #[serde(default)]
    pub interactable: bool,
    /// Prism height in layers (1.0 = one full layer).
    #[serde(default = "default_height")]
    pub height: f32,
    /// Free-form gameplay data.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

fn default_true() -> bool {
    true
}

fn default_height() -> f32 {
    1.0
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// A placed block at world cell `(x, y)`, layer `z`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub properties: BlockProperties,
}

impl Block {
    /// A block with the default properties of its type.
    pub fn new(block_type: BlockType, x: i32, y: i32, z: i32) -> Self {
        Self {
            x,
            y,
            z,
            block_type,
            properties: block_type.default_properties(),
        }
    }

    pub fn with_properties(mut self, properties: BlockProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.properties.color = color;
        self
    }

    /// Copy of this block moved to another cell, keeping every property.
    pub fn relocated(&self, x: i32, y: i32, z: i32) -> Self {
        Self {
            x,
            y,
            z,
            block_type: self.block_type,
            properties: self.properties.clone(),
        }
    }

    /// Serialize to the wire shape
    /// `{x, y, z, type, properties: {spriteId, color, solid, ...}}`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("Block should always be JSON-serializable")
    }

    /// Inverse of [`to_json`](Self::to_json).
    pub fn from_json(value: &serde_json::Value) -> Result<Self, WorldError> {
        serde_json::from_value(value.clone()).map_err(|e| WorldError::Deserialize {
            what: "block",
            details: e.to_string(),
        })
    }
}
