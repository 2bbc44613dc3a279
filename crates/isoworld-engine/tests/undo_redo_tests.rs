//! Interaction and undo/redo scenarios driven through the bus, the way a
//! host drives them.

use std::cell::RefCell;
use std::rc::Rc;

use isoworld_engine::prelude::*;

fn sandbox() -> Sandbox {
    let mut config = AppConfig::default();
    config.world.terrain = TerrainConfig::empty();
    let surface = RecordingSurface::shared(800, 600);
    Sandbox::new(config, surface).unwrap()
}

/// Record every event of `kind` published from now on.
fn spy(bus: &EventBus, kind: EventKind) -> Rc<RefCell<Vec<Event>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    bus.subscribe(kind, move |event| {
        sink.borrow_mut().push(event.clone());
        Ok(())
    });
    seen
}

fn click_at(sandbox: &mut Sandbox, button: MouseButton, x: f64, y: f64) {
    sandbox.pointer_move(x, y);
    sandbox.click(button);
}

#[test]
fn stacking_undo_redo_scenario() {
    let mut sandbox = sandbox();

    click_at(&mut sandbox, MouseButton::Left, 5.5, 5.5);
    assert_eq!(sandbox.world().get_highest_occupied_layer(5, 5), Some(0));
    click_at(&mut sandbox, MouseButton::Left, 5.5, 5.5);
    assert_eq!(sandbox.world().get_highest_occupied_layer(5, 5), Some(1));

    assert!(sandbox.state().undo());
    assert_eq!(sandbox.world().get_highest_occupied_layer(5, 5), Some(0));
    assert!(sandbox.state().undo());
    assert_eq!(sandbox.world().get_highest_occupied_layer(5, 5), None);

    // Nothing left: a no-op that keeps the cursor at -1.
    assert!(!sandbox.state().undo());
    assert_eq!(sandbox.state().history_index(), -1);

    assert!(sandbox.state().redo());
    assert!(sandbox.state().redo());
    assert_eq!(sandbox.world().get_highest_occupied_layer(5, 5), Some(1));
    assert_eq!(sandbox.state().history_len(), 2);
}

#[test]
fn new_action_after_undo_truncates_redo_tail() {
    let mut sandbox = sandbox();
    for x in 0..3 {
        click_at(&mut sandbox, MouseButton::Left, f64::from(x) + 0.5, 0.5);
    }
    assert!(sandbox.state().undo());
    assert!(sandbox.state().undo());
    click_at(&mut sandbox, MouseButton::Left, 7.5, 7.5);

    assert!(!sandbox.state().can_redo());
    assert!(!sandbox.state().redo());
    assert_eq!(sandbox.state().history_len(), 2);
    assert!(sandbox.world().get_block_at(1, 0, 0).is_none());
    assert!(sandbox.world().get_block_at(7, 7, 0).is_some());
}

#[test]
fn undo_of_removal_restores_properties() {
    let mut sandbox = sandbox();
    sandbox.state().set_block_type(BlockType::Crystal);
    click_at(&mut sandbox, MouseButton::Left, 2.5, 2.5);
    let placed = sandbox.world().get_block_at(2, 2, 0).unwrap();

    click_at(&mut sandbox, MouseButton::Right, 2.5, 2.5);
    assert!(sandbox.world().get_block_at(2, 2, 0).is_none());

    assert!(sandbox.state().undo());
    assert_eq!(sandbox.world().get_block_at(2, 2, 0), Some(placed));
}

#[test]
fn replay_is_never_recorded() {
    let mut sandbox = sandbox();
    for _ in 0..4 {
        click_at(&mut sandbox, MouseButton::Left, 1.5, 1.5);
    }
    let len = sandbox.state().history_len();
    while sandbox.state().undo() {}
    assert_eq!(sandbox.state().history_len(), len);
    while sandbox.state().redo() {}
    assert_eq!(sandbox.state().history_len(), len);
    assert_eq!(sandbox.world().get_highest_occupied_layer(1, 1), Some(3));
}

#[test]
fn undo_and_redo_announce_their_actions() {
    let mut sandbox = sandbox();
    let undone = spy(sandbox.bus(), EventKind::ActionUndone);
    let redone = spy(sandbox.bus(), EventKind::ActionRedone);

    click_at(&mut sandbox, MouseButton::Left, 0.5, 0.5);
    sandbox.state().undo();
    sandbox.state().redo();

    assert_eq!(undone.borrow().len(), 1);
    assert_eq!(redone.borrow().len(), 1);
}

#[test]
fn failed_undo_holds_the_cursor() {
    let mut sandbox = sandbox();
    click_at(&mut sandbox, MouseButton::Left, 3.5, 3.5);
    // A frozen chunk rejects the inverse removal.
    assert!(sandbox.world().set_chunk_static(ChunkCoord::new(0, 0), true));
    let index = sandbox.state().history_index();

    assert!(!sandbox.state().undo());
    assert_eq!(sandbox.state().history_index(), index);
    assert!(sandbox.world().get_block_at(3, 3, 0).is_some());

    assert!(sandbox.world().set_chunk_static(ChunkCoord::new(0, 0), false));
    assert!(sandbox.state().undo());
    assert!(sandbox.world().get_block_at(3, 3, 0).is_none());
}

#[test]
fn failed_redo_rolls_the_cursor_back() {
    let mut sandbox = sandbox();
    click_at(&mut sandbox, MouseButton::Left, 3.5, 3.5);
    assert!(sandbox.state().undo());
    let index = sandbox.state().history_index();
    assert_eq!(index, -1);

    // The frozen chunk rejects the replayed placement.
    assert!(sandbox.world().set_chunk_static(ChunkCoord::new(0, 0), true));
    assert!(!sandbox.state().redo());
    assert_eq!(sandbox.state().history_index(), index);
    assert!(sandbox.world().get_block_at(3, 3, 0).is_none());
    assert!(sandbox.state().can_redo());

    assert!(sandbox.world().set_chunk_static(ChunkCoord::new(0, 0), false));
    assert!(sandbox.state().redo());
    assert_eq!(sandbox.state().history_index(), 0);
    assert!(sandbox.world().get_block_at(3, 3, 0).is_some());
}

#[test]
fn delete_tool_scenario() {
    let mut sandbox = sandbox();
    sandbox.state().set_tool(Tool::Delete);
    let deletes = spy(sandbox.bus(), EventKind::TileRequestDelete);

    // Empty cell: nothing is requested.
    click_at(&mut sandbox, MouseButton::Right, 6.5, 6.5);
    assert!(deletes.borrow().is_empty());

    for _ in 0..3 {
        sandbox.world().place_block(4, 4, None, BlockType::Stone);
    }
    click_at(&mut sandbox, MouseButton::Left, 4.5, 4.5);
    let seen = deletes.borrow();
    assert_eq!(seen.len(), 1);
    assert!(matches!(seen[0], Event::TileRequestDelete { x: 4, y: 4, z: 2, .. }));
}

#[test]
fn tool_changes_are_announced_once() {
    let sandbox = sandbox();
    let changes = spy(sandbox.bus(), EventKind::ToolChanged);
    sandbox.state().set_tool(Tool::Select);
    sandbox.state().set_tool(Tool::Select);
    assert_eq!(
        *changes.borrow(),
        vec![Event::ToolChanged {
            current: Tool::Select,
            previous: Tool::Place,
        }]
    );
}

#[test]
fn hover_fires_only_on_cell_change() {
    let mut sandbox = sandbox();
    let hovers = spy(sandbox.bus(), EventKind::TileHover);
    sandbox.pointer_move(1.1, 1.1);
    sandbox.pointer_move(1.9, 1.4);
    sandbox.pointer_move(2.1, 1.4);
    assert_eq!(hovers.borrow().len(), 2);
    assert_eq!(sandbox.state().hovered_tile(), Some(TilePos::new(2, 1)));
}
