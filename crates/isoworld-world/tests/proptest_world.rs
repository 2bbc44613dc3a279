//! Property tests for the spatial model.
//!
//! Random blocks, entities and chunks must survive a JSON round trip, and
//! unanchored placement must always stack.

use isoworld_world::prelude::*;
use proptest::prelude::*;

fn block_type() -> impl Strategy<Value = BlockType> {
    prop::sample::select(BlockType::ALL.to_vec())
}

fn color() -> impl Strategy<Value = Color> {
    (any::<u8>(), any::<u8>(), any::<u8>(), any::<u8>()).prop_map(|(r, g, b, a)| Color::rgba(r, g, b, a))
}

/// Finite coordinates with a fixed number of decimals so JSON stays exact.
fn coord_f64() -> impl Strategy<Value = f64> {
    (-100_000i32..100_000i32).prop_map(|v| f64::from(v) * 0.25)
}

fn block() -> impl Strategy<Value = Block> {
    (
        block_type(),
        -500i32..500,
        -500i32..500,
        0..=MAX_LAYER,
        color(),
        any::<bool>(),
        any::<bool>(),
        prop::option::of("[a-z]{1,8}"),
    )
        .prop_map(|(t, x, y, z, color, solid, interactable, sprite)| {
            let mut b = Block::new(t, x, y, z).with_color(color);
            b.properties.solid = solid;
            b.properties.interactable = interactable;
            b.properties.sprite_id = sprite;
            b
        })
}

fn entity() -> impl Strategy<Value = Entity> {
    (
        1u64..10_000,
        "[a-z]{1,6}",
        coord_f64(),
        coord_f64(),
        (0i32..64).prop_map(|z| f64::from(z) * 0.5),
        (0i32..400).prop_map(|h| f64::from(h) * 0.5),
        any::<bool>(),
        0u32..8,
    )
        .prop_map(|(id, kind, x, y, z, health, active, frame)| {
            let mut e = Entity::new(EntityId(id), kind, x, y, z);
            e.properties.health = health;
            e.state.active = active;
            e.state.animation_frame = frame;
            e.state.velocity = Vec3::new(x * 0.5, -y * 0.25, 0.0);
            e
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn block_json_round_trip(b in block()) {
        prop_assert_eq!(Block::from_json(&b.to_json()).unwrap(), b);
    }

    #[test]
    fn entity_json_round_trip(e in entity()) {
        prop_assert_eq!(Entity::from_json(&e.to_json()).unwrap(), e);
    }

    #[test]
    fn chunk_json_round_trip(
        cx in -20i32..20,
        cy in -20i32..20,
        cells in prop::collection::btree_set((0u8..16, 0u8..16, 0..=MAX_LAYER), 0..40),
        kinds in prop::collection::vec(block_type(), 40),
        mark_static in any::<bool>(),
    ) {
        let coord = ChunkCoord::new(cx, cy);
        let mut chunk = Chunk::new("prop", coord);
        for ((lx, ly, z), kind) in cells.iter().zip(kinds) {
            let (x, y) = local_to_world(coord, *lx, *ly);
            chunk.insert_block(Block::new(kind, x, y, *z)).unwrap();
        }
        chunk.set_static(mark_static);
        chunk.mark_clean();

        let restored = Chunk::from_json(&chunk.to_json()).unwrap();
        prop_assert_eq!(restored, chunk);
    }

    #[test]
    fn unanchored_placement_stacks(x in -200i32..200, y in -200i32..200, n in 1usize..20) {
        let mut world = World::new("prop", TerrainConfig::empty());
        for i in 0..n {
            let placed = world.place_block(x, y, None, BlockType::Stone).unwrap();
            prop_assert_eq!(placed.z, i as i32);
        }
        prop_assert_eq!(world.highest_occupied_layer(x, y), Some(n as i32 - 1));
    }

    #[test]
    fn world_to_local_round_trips(x in any::<i32>().prop_map(|v| v / 32), y in any::<i32>().prop_map(|v| v / 32)) {
        let (coord, lx, ly) = world_to_local(x, y);
        prop_assert!(i32::from(lx) < CHUNK_SIZE && i32::from(ly) < CHUNK_SIZE);
        prop_assert_eq!(local_to_world(coord, lx, ly), (x, y));
    }
}
