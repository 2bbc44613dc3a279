//! Property tests for the undo/redo log.
//!
//! Random sequences of record / step operations are applied both to a
//! [`CommandHistory`] and to a naive reference model; cursor, length and
//! entry order must agree after every step.

use isoworld_history::prelude::*;
use isoworld_world::block::{Block, BlockType};
use isoworld_world::coords::{ChunkCoord, ChunkId};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum HistoryOp {
    Record(i32),
    Back,
    Forward,
}

fn op_strategy() -> impl Strategy<Value = HistoryOp> {
    prop_oneof![
        3 => (0i32..64).prop_map(HistoryOp::Record),
        2 => Just(HistoryOp::Back),
        1 => Just(HistoryOp::Forward),
    ]
}

fn action(z: i32) -> Action {
    Action::place(
        Block::new(BlockType::Dirt, 1, 1, z),
        ChunkId::new("prop", ChunkCoord::new(0, 0)),
    )
}

/// Reference implementation using plain vector slicing.
struct Model {
    entries: Vec<i32>,
    index: isize,
    capacity: usize,
}

impl Model {
    fn record(&mut self, z: i32) {
        self.entries.truncate((self.index + 1) as usize);
        self.entries.push(z);
        if self.entries.len() > self.capacity {
            self.entries.remove(0);
        } else {
            self.index += 1;
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    #[test]
    fn history_matches_reference_model(
        capacity in 1usize..8,
        ops in prop::collection::vec(op_strategy(), 1..60),
    ) {
        let mut history = CommandHistory::with_capacity(capacity).unwrap();
        let mut model = Model { entries: Vec::new(), index: -1, capacity };

        for op in ops {
            match op {
                HistoryOp::Record(z) => {
                    history.record_entry(HistoryEntry::new(action(z), 0));
                    model.record(z);
                }
                HistoryOp::Back => {
                    let res = history.step_back();
                    if model.index >= 0 {
                        model.index -= 1;
                        prop_assert_eq!(res, Ok(model.index));
                    } else {
                        prop_assert_eq!(res, Err(HistoryError::NothingToUndo));
                    }
                }
                HistoryOp::Forward => {
                    let res = history.step_forward();
                    if model.index + 1 < model.entries.len() as isize {
                        model.index += 1;
                        prop_assert_eq!(res, Ok(model.index));
                    } else {
                        prop_assert_eq!(res, Err(HistoryError::NothingToRedo));
                    }
                }
            }

            prop_assert!(history.index() >= -1);
            prop_assert!(history.index() < history.len() as isize);
            prop_assert!(history.len() <= capacity);
            prop_assert_eq!(history.index(), model.index);
            let zs: Vec<i32> = history.entries().map(|e| e.action.z).collect();
            prop_assert_eq!(&zs, &model.entries);
        }
    }

    #[test]
    fn record_after_undo_leaves_nothing_to_redo(n in 2usize..10, undos in 1usize..10) {
        let mut history = CommandHistory::new();
        for z in 0..n {
            history.record(action(z as i32));
        }
        for _ in 0..undos.min(n) {
            history.step_back().unwrap();
        }
        history.record(action(99));
        prop_assert!(!history.can_redo());
        prop_assert_eq!(history.redo_target(), None);
    }
}
