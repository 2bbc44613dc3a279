//! Procedural terrain for chunks that are loaded without saved content.
//!
//! Ground tiles come from two octaves of value noise sampled per cell; a
//! seeded [`Pcg32`] per chunk scatters decorative block stacks (trees, rocks)
//! and the occasional wandering entity. Output is a pure function of
//! `(seed, chunk coordinates)`.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::block::{Block, BlockType};
use crate::chunk::Chunk;
use crate::color::Color;
use crate::coords::{local_to_world, ChunkCoord, CHUNK_SIZE};
use crate::entity::{Entity, EntityId, EntityProperties, Vec3};
use crate::tile::{Tile, TileType};

// ---------------------------------------------------------------------------
// TerrainConfig
// ---------------------------------------------------------------------------

/// Terrain generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TerrainConfig {
    /// Master seed.
    pub seed: u64,
    /// Generate ground tiles. When `false`, new chunks start empty.
    pub enabled: bool,
    /// Noise frequency in cycles per cell.
    pub noise_scale: f64,
    /// Probability that a grass cell grows a tree or rock.
    pub decoration_density: f64,
    /// Probability that a chunk spawns one wandering entity.
    pub entity_density: f64,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            seed: 0x1505_0a7d,
            enabled: true,
            noise_scale: 0.08,
            decoration_density: 0.03,
            entity_density: 0.35,
        }
    }
}

impl TerrainConfig {
    /// Flat, empty terrain: no tiles, decorations or entities.
    pub fn empty() -> Self {
        Self {
            enabled: false,
            decoration_density: 0.0,
            entity_density: 0.0,
            ..Self::default()
        }
    }

    /// Ground tiles only, no decorations or entities.
    pub fn ground_only() -> Self {
        Self {
            decoration_density: 0.0,
            entity_density: 0.0,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// TerrainGenerator
// ---------------------------------------------------------------------------

/// Fills freshly created chunks.
#[derive(Debug, Clone)]
pub struct TerrainGenerator {
    config: TerrainConfig,
}

impl TerrainGenerator {
    pub fn new(config: TerrainConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// Generate the content of one chunk. Entity ids are drawn from
    /// `next_entity_id`, which is advanced past every id used.
    pub fn generate(&self, world_id: &str, coord: ChunkCoord, next_entity_id: &mut u64) -> Chunk {
        let mut chunk = Chunk::new(world_id, coord);
        if !self.config.enabled {
            return chunk;
        }

        let mut rng = Pcg32::seed_from_u64(mix(self.config.seed, coord.x, coord.y));
        let decoration = self.config.decoration_density.clamp(0.0, 1.0);

        for ly in 0..CHUNK_SIZE as u8 {
            for lx in 0..CHUNK_SIZE as u8 {
                let (x, y) = local_to_world(coord, lx, ly);
                let height = self.height_at(x, y);
                let tile_type = tile_for_height(height);
                insert_generated(chunk.set_tile(Tile::new(tile_type, x, y)).map(|_| ()));

                if tile_type == TileType::Grass && rng.gen_bool(decoration) {
                    if rng.gen_bool(0.7) {
                        let trunk = rng.gen_range(1..=2);
                        for z in 0..trunk {
                            insert_generated(chunk.insert_block(Block::new(BlockType::Wood, x, y, z)));
                        }
                        insert_generated(chunk.insert_block(Block::new(BlockType::Leaves, x, y, trunk)));
                    } else {
                        insert_generated(chunk.insert_block(Block::new(BlockType::Stone, x, y, 0)));
                    }
                }
            }
        }

        if rng.gen_bool(self.config.entity_density.clamp(0.0, 1.0)) {
            let (ox, oy) = coord.origin();
            let x = f64::from(ox) + rng.gen_range(0.0..f64::from(CHUNK_SIZE));
            let y = f64::from(oy) + rng.gen_range(0.0..f64::from(CHUNK_SIZE));
            let id = EntityId(*next_entity_id);
            *next_entity_id += 1;
            let wisp = Entity::new(id, "wisp", x, y, 0.5)
                .with_properties(EntityProperties {
                    color: Color::rgb(0xff, 0xf2, 0xa8),
                    size: 0.35,
                    glow: Some(Color::rgba(0xff, 0xf2, 0xa8, 0x60)),
                    animation_fps: 6.0,
                    animation_frames: 4,
                    ..EntityProperties::default()
                })
                .with_velocity(Vec3::new(
                    rng.gen_range(-0.4..0.4),
                    rng.gen_range(-0.4..0.4),
                    0.0,
                ));
            insert_generated(chunk.insert_entity(wisp));
        }

        // Generated content is the chunk's pristine state: nothing to flush.
        chunk.mark_clean();
        chunk
    }

    /// Terrain height in `0.0..1.0` at a world cell.
    pub fn height_at(&self, x: i32, y: i32) -> f64 {
        let s = self.config.noise_scale;
        let fx = f64::from(x) * s;
        let fy = f64::from(y) * s;
        let coarse = value_noise(self.config.seed, fx, fy);
        let fine = value_noise(self.config.seed.wrapping_add(1), fx * 2.0, fy * 2.0);
        (coarse * 0.7 + fine * 0.3).clamp(0.0, 1.0)
    }
}

fn insert_generated(result: Result<(), crate::WorldError>) {
    if let Err(e) = result {
        tracing::debug!(error = %e, "terrain generator skipped an insert");
    }
}

fn tile_for_height(h: f64) -> TileType {
    match h {
        h if h < 0.30 => TileType::Water,
        h if h < 0.36 => TileType::Sand,
        h if h < 0.68 => TileType::Grass,
        h if h < 0.80 => TileType::Dirt,
        h if h < 0.90 => TileType::Stone,
        _ => TileType::Snow,
    }
}

// ---------------------------------------------------------------------------
// Noise helpers
// ---------------------------------------------------------------------------

/// SplitMix64 finalizer over a seed and an integer lattice point.
fn mix(seed: u64, x: i32, y: i32) -> u64 {
    let mut z = seed
        ^ (x as i64 as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15)
        ^ (y as i64 as u64).wrapping_mul(0xc2b2_ae3d_27d4_eb4f);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Lattice value in `0.0..1.0`.
fn lattice(seed: u64, x: i32, y: i32) -> f64 {
    (mix(seed, x, y) >> 11) as f64 / (1u64 << 53) as f64
}

fn smoothstep(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

/// Bilinearly interpolated value noise with smoothstep easing.
fn value_noise(seed: u64, x: f64, y: f64) -> f64 {
    let x0 = x.floor();
    let y0 = y.floor();
    let tx = smoothstep(x - x0);
    let ty = smoothstep(y - y0);
    let (ix, iy) = (x0 as i32, y0 as i32);

    let a = lattice(seed, ix, iy);
    let b = lattice(seed, ix + 1, iy);
    let c = lattice(seed, ix, iy + 1);
    let d = lattice(seed, ix + 1, iy + 1);

    let top = a + (b - a) * tx;
    let bottom = c + (d - c) * tx;
    top + (bottom - top) * ty
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_generator_yields_empty_chunk() {
        let generator = TerrainGenerator::new(TerrainConfig::empty());
        let mut next = 1;
        let chunk = generator.generate("w", ChunkCoord::new(3, 4), &mut next);
        assert_eq!(chunk.block_count(), 0);
        assert_eq!(chunk.tiles().count(), 0);
        assert_eq!(chunk.entity_count(), 0);
        assert_eq!(next, 1);
    }

    #[test]
    fn ground_only_covers_every_cell_with_a_tile() {
        let generator = TerrainGenerator::new(TerrainConfig::ground_only());
        let mut next = 1;
        let chunk = generator.generate("w", ChunkCoord::new(-1, 2), &mut next);
        assert_eq!(chunk.tiles().count(), (CHUNK_SIZE * CHUNK_SIZE) as usize);
        assert_eq!(chunk.block_count(), 0);
        assert!(!chunk.is_dirty());
    }

    #[test]
    fn generation_is_repeatable_for_a_seed() {
        let config = TerrainConfig {
            decoration_density: 0.5,
            entity_density: 1.0,
            ..TerrainConfig::default()
        };
        let generator = TerrainGenerator::new(config);
        let (mut n1, mut n2) = (1, 1);
        let a = generator.generate("w", ChunkCoord::new(5, -7), &mut n1);
        let b = generator.generate("w", ChunkCoord::new(5, -7), &mut n2);
        assert_eq!(a, b);
        assert_eq!(n1, 2, "full entity density spawns exactly one entity");
    }

    #[test]
    fn decorations_are_stacked_from_layer_zero() {
        let generator = TerrainGenerator::new(TerrainConfig {
            decoration_density: 1.0,
            entity_density: 0.0,
            ..TerrainConfig::default()
        });
        let mut next = 1;
        let chunk = generator.generate("w", ChunkCoord::new(0, 0), &mut next);
        for tile in chunk.tiles() {
            if let Some(top) = chunk.highest_layer(tile.x, tile.y) {
                assert_eq!(chunk.column(tile.x, tile.y).count() as i32, top + 1);
            }
        }
    }

    #[test]
    fn height_stays_in_unit_range() {
        let generator = TerrainGenerator::new(TerrainConfig::default());
        for x in -50..50 {
            for y in [-33, 0, 17] {
                let h = generator.height_at(x, y);
                assert!((0.0..=1.0).contains(&h), "height {h} out of range");
            }
        }
    }
}
