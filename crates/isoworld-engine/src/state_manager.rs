//! Interaction state and the undo/redo state machine.
//!
//! [`StateManager`] turns pointer and keyboard input into world mutation
//! *requests* on the bus. It learns about applied mutations only from
//! `BlockAdded` / `BlockRemoved` and records each one in a
//! [`CommandHistory`].
//!
//! Undo and redo replay history entries through the same request events,
//! tagged [`MutationOrigin::Replay`]. While a replay runs the `replaying`
//! flag is set by a [`ReplayGuard`], so the resulting block events are never
//! recorded as new history. The world answers synchronously within the
//! request publish; a replay-tagged block event arriving during that
//! publish is the acknowledgement that the replay took effect. Without it
//! the history cursor is held at its pre-attempt position.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use isoworld_history::action::{Action, ActionKind};
use isoworld_history::history::{CommandHistory, DEFAULT_CAPACITY};
use isoworld_world::block::BlockType;
use isoworld_world::coords::TilePos;

use crate::bus::{EventBus, Subscription};
use crate::event::{Event, EventKind, MouseButton, MutationOrigin};
use crate::module::Module;
use crate::world_manager::WorldView;

// ---------------------------------------------------------------------------
// Tool
// ---------------------------------------------------------------------------

/// The active pointer tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Select,
    #[default]
    Place,
    Delete,
}

// ---------------------------------------------------------------------------
// InteractionConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InteractionConfig {
    /// Maximum number of history entries kept.
    pub history_capacity: usize,
    pub default_tool: Tool,
    pub default_block: BlockType,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_CAPACITY,
            default_tool: Tool::Place,
            default_block: BlockType::Grass,
        }
    }
}

// ---------------------------------------------------------------------------
// ReplayGuard
// ---------------------------------------------------------------------------

/// Holds the `replaying` flag for the duration of one undo/redo replay and
/// clears it on every exit path, unwinding included.
struct ReplayGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> ReplayGuard<'a> {
    fn engage(flag: &'a Cell<bool>, ack: &Cell<bool>) -> Self {
        flag.set(true);
        ack.set(false);
        Self { flag }
    }
}

impl Drop for ReplayGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

// ---------------------------------------------------------------------------
// StateManager
// ---------------------------------------------------------------------------

struct StateInner {
    bus: EventBus,
    world: WorldView,
    tool: Cell<Tool>,
    block_type: Cell<BlockType>,
    hovered: Cell<Option<TilePos>>,
    selected: Cell<Option<TilePos>>,
    history: RefCell<CommandHistory>,
    replaying: Cell<bool>,
    replay_ack: Cell<bool>,
    subscriptions: RefCell<Vec<Subscription>>,
}

/// Handle to the interaction module.
#[derive(Clone)]
pub struct StateManager {
    inner: Rc<StateInner>,
}

impl std::fmt::Debug for StateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateManager")
            .field("tool", &self.inner.tool.get())
            .field("hovered", &self.inner.hovered.get())
            .field("history_index", &self.history_index())
            .finish_non_exhaustive()
    }
}

impl StateManager {
    pub fn new(bus: EventBus, world: WorldView, config: &InteractionConfig) -> Self {
        let history = CommandHistory::with_capacity(config.history_capacity).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "invalid history capacity; using default");
            CommandHistory::new()
        });
        Self {
            inner: Rc::new(StateInner {
                bus,
                world,
                tool: Cell::new(config.default_tool),
                block_type: Cell::new(config.default_block),
                hovered: Cell::new(None),
                selected: Cell::new(None),
                history: RefCell::new(history),
                replaying: Cell::new(false),
                replay_ack: Cell::new(false),
                subscriptions: RefCell::new(Vec::new()),
            }),
        }
    }

    fn from_weak(weak: &Weak<StateInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    fn publish(&self, event: Event) {
        self.inner.bus.publish(event);
    }

    // -- tool and selection ---------------------------------------------------

    pub fn tool(&self) -> Tool {
        self.inner.tool.get()
    }

    /// Switch tools. `ToolChanged` is published only on an actual change.
    pub fn set_tool(&self, tool: Tool) {
        let previous = self.inner.tool.replace(tool);
        if previous != tool {
            tracing::debug!(?previous, current = ?tool, "tool changed");
            self.publish(Event::ToolChanged {
                current: tool,
                previous,
            });
        }
    }

    pub fn block_type(&self) -> BlockType {
        self.inner.block_type.get()
    }

    pub fn set_block_type(&self, block_type: BlockType) {
        self.inner.block_type.set(block_type);
    }

    pub fn hovered_tile(&self) -> Option<TilePos> {
        self.inner.hovered.get()
    }

    pub fn selected_tile(&self) -> Option<TilePos> {
        self.inner.selected.get()
    }

    pub fn clear_selection(&self) {
        self.inner.selected.set(None);
    }

    // -- pointer input --------------------------------------------------------

    /// Track the cell under the pointer; `TileHover` fires only when it
    /// changes.
    pub fn pointer_moved(&self, world_x: f64, world_y: f64) {
        let current = TilePos::from_world(world_x, world_y);
        let previous = self.inner.hovered.get();
        if previous == Some(current) {
            return;
        }
        self.inner.hovered.set(Some(current));
        self.publish(Event::TileHover {
            current: Some(current),
            previous,
        });
    }

    /// Pointer left the world view.
    pub fn clear_hover(&self) {
        if let Some(previous) = self.inner.hovered.take() {
            self.publish(Event::TileHover {
                current: None,
                previous: Some(previous),
            });
        }
    }

    /// Translate a button press at a world position into a request.
    pub fn pointer_pressed(&self, button: MouseButton, world_x: f64, world_y: f64) {
        let tile = TilePos::from_world(world_x, world_y);
        let highest = self.inner.world.get_highest_occupied_layer(tile.x, tile.y);
        let tool = self.tool();

        let deleting = button == MouseButton::Right || (button == MouseButton::Left && tool == Tool::Delete);
        if deleting {
            if let Some(z) = highest {
                self.publish(Event::TileRequestDelete {
                    x: tile.x,
                    y: tile.y,
                    z,
                    origin: MutationOrigin::Interaction,
                });
            }
            return;
        }
        if button != MouseButton::Left {
            return;
        }

        if tool == Tool::Select {
            let actionable = highest.is_some() || self.inner.world.get_tile_at(tile.x, tile.y).is_some();
            if !actionable {
                self.inner.selected.set(Some(tile));
                self.publish(Event::TileSelected { tile });
                return;
            }
        }
        self.publish(Event::TileRequestPlace {
            x: tile.x,
            y: tile.y,
            z: highest.map_or(0, |top| top + 1),
            block_type: self.block_type(),
            origin: MutationOrigin::Interaction,
        });
    }

    fn key_pressed(&self, key: &str) {
        match key {
            "z" | "Z" => {
                self.undo();
            }
            "y" | "Y" => {
                self.redo();
            }
            "1" => self.set_tool(Tool::Select),
            "2" => self.set_tool(Tool::Place),
            "3" => self.set_tool(Tool::Delete),
            "Escape" => self.clear_selection(),
            _ => {}
        }
    }

    // -- history --------------------------------------------------------------

    pub fn history_len(&self) -> usize {
        self.inner.history.borrow().len()
    }

    /// Cursor of the last applied entry, `-1` when nothing is applied.
    pub fn history_index(&self) -> isize {
        self.inner.history.borrow().index()
    }

    pub fn can_undo(&self) -> bool {
        self.inner.history.borrow().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.inner.history.borrow().can_redo()
    }

    pub fn clear_history(&self) {
        self.inner.history.borrow_mut().clear();
    }

    fn record_change(&self, event: &Event) {
        let (change, placed) = match event {
            Event::BlockAdded(change) => (change, true),
            Event::BlockRemoved(change) => (change, false),
            _ => return,
        };
        if change.origin == MutationOrigin::Replay {
            if self.inner.replaying.get() {
                self.inner.replay_ack.set(true);
            }
            return;
        }
        if self.inner.replaying.get() {
            return;
        }
        let action = if placed {
            Action::place(change.block.clone(), change.chunk_id.clone())
        } else {
            Action::remove(change.block.clone(), change.chunk_id.clone())
        };
        self.inner.history.borrow_mut().record(action);
    }

    /// Request the world to apply `action` and report whether it did.
    fn replay(&self, action: &Action) -> bool {
        let _guard = ReplayGuard::engage(&self.inner.replaying, &self.inner.replay_ack);
        let request = match action.kind {
            ActionKind::Place => Event::TileRequestPlaceExact {
                block: action.block.clone(),
                origin: MutationOrigin::Replay,
            },
            ActionKind::Remove => Event::TileRequestDelete {
                x: action.world_x,
                y: action.world_y,
                z: action.z,
                origin: MutationOrigin::Replay,
            },
        };
        self.publish(request);
        self.inner.replay_ack.get()
    }

    /// Revert the entry at the cursor. Returns `false` when there is
    /// nothing to undo or the world rejected the inverse.
    pub fn undo(&self) -> bool {
        if self.inner.replaying.get() {
            tracing::warn!("undo requested during replay; ignored");
            return false;
        }
        let Some(entry) = self.inner.history.borrow().undo_target().cloned() else {
            tracing::debug!("nothing to undo");
            return false;
        };
        if !self.replay(&entry.undo) {
            tracing::warn!(
                kind = ?entry.undo.kind,
                x = entry.undo.world_x,
                y = entry.undo.world_y,
                z = entry.undo.z,
                "undo was not applied; history cursor held"
            );
            return false;
        }
        if let Err(e) = self.inner.history.borrow_mut().step_back() {
            tracing::error!(error = %e, "history cursor out of sync");
            return false;
        }
        self.publish(Event::ActionUndone {
            action: entry.action,
        });
        true
    }

    /// Re-apply the entry after the cursor. On failure the cursor is rolled
    /// back.
    pub fn redo(&self) -> bool {
        if self.inner.replaying.get() {
            tracing::warn!("redo requested during replay; ignored");
            return false;
        }
        let entry = {
            let mut history = self.inner.history.borrow_mut();
            if history.step_forward().is_err() {
                tracing::debug!("nothing to redo");
                return false;
            }
            history.undo_target().cloned()
        };
        let Some(entry) = entry else {
            return false;
        };
        if !self.replay(&entry.action) {
            let _ = self.inner.history.borrow_mut().step_back();
            tracing::warn!(
                kind = ?entry.action.kind,
                x = entry.action.world_x,
                y = entry.action.world_y,
                z = entry.action.z,
                "redo was not applied; history cursor rolled back"
            );
            return false;
        }
        self.publish(Event::ActionRedone {
            action: entry.action,
        });
        true
    }

    fn handle_event(&self, event: &Event) {
        match event {
            Event::InputMouseMove { world_x, world_y, .. } => self.pointer_moved(*world_x, *world_y),
            Event::InputMouseDown {
                button,
                world_x,
                world_y,
            } => self.pointer_pressed(*button, *world_x, *world_y),
            Event::InputKeyDown { key } => self.key_pressed(key),
            Event::BlockAdded(_) | Event::BlockRemoved(_) => self.record_change(event),
            _ => {}
        }
    }
}

impl Module for StateManager {
    fn name(&self) -> &str {
        "state"
    }

    fn on_initialize(&mut self) -> anyhow::Result<()> {
        let kinds = [
            EventKind::InputMouseMove,
            EventKind::InputMouseDown,
            EventKind::InputKeyDown,
            EventKind::BlockAdded,
            EventKind::BlockRemoved,
        ];
        let mut subscriptions = self.inner.subscriptions.borrow_mut();
        for kind in kinds {
            let weak = Rc::downgrade(&self.inner);
            subscriptions.push(self.inner.bus.subscribe(kind, move |event| {
                if let Some(state) = StateManager::from_weak(&weak) {
                    state.handle_event(event);
                }
                Ok(())
            }));
        }
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
    use crate::world_manager::{WorldConfig, WorldManager};
    use isoworld_world::terrain::TerrainConfig;

    fn rig() -> (WorldManager, StateManager) {
        let bus = EventBus::new();
        let mut world = WorldManager::new(
            bus.clone(),
            WorldConfig {
                terrain: TerrainConfig::empty(),
                ..Default::default()
            },
        );
        let mut state = StateManager::new(bus, world.view(), &InteractionConfig::default());
        world.on_initialize().unwrap();
        state.on_initialize().unwrap();
        world.create_world("test", 0, 0);
        (world, state)
    }

    #[test]
    fn guard_clears_flag_on_drop() {
        let flag = Cell::new(false);
        let ack = Cell::new(true);
        {
            let _guard = ReplayGuard::engage(&flag, &ack);
            assert!(flag.get());
            assert!(!ack.get());
        }
        assert!(!flag.get());
    }

    #[test]
    fn click_places_on_top_of_column() {
        let (world, state) = rig();
        state.pointer_pressed(MouseButton::Left, 1.2, 1.8);
        state.pointer_pressed(MouseButton::Left, 1.9, 1.1);
        assert_eq!(world.get_highest_occupied_layer(1, 1), Some(1));
        assert_eq!(state.history_len(), 2);
    }

    #[test]
    fn right_click_deletes_topmost() {
        let (world, state) = rig();
        world.place_block(4, 4, None, BlockType::Stone);
        world.place_block(4, 4, None, BlockType::Dirt);
        state.pointer_pressed(MouseButton::Right, 4.5, 4.5);
        assert_eq!(world.get_highest_occupied_layer(4, 4), Some(0));
        // Right-click on an empty cell publishes nothing.
        state.pointer_pressed(MouseButton::Right, 9.5, 9.5);
        assert_eq!(state.history_len(), 3);
    }

    #[test]
    fn select_on_empty_cell_selects() {
        let (world, state) = rig();
        state.set_tool(Tool::Select);
        state.pointer_pressed(MouseButton::Left, 2.5, 3.5);
        assert_eq!(state.selected_tile(), Some(TilePos::new(2, 3)));
        assert_eq!(world.get_highest_occupied_layer(2, 3), None);
        state.key_pressed("Escape");
        assert_eq!(state.selected_tile(), None);
    }

    #[test]
    fn undo_redo_does_not_grow_history() {
        let (world, state) = rig();
        world.place_block(0, 0, None, BlockType::Stone);
        assert!(state.undo());
        assert!(!state.undo());
        assert!(state.redo());
        assert!(!state.redo());
        assert_eq!(state.history_len(), 1);
        assert_eq!(state.history_index(), 0);
    }

    #[test]
    fn keys_switch_tools() {
        let (_world, state) = rig();
        state.key_pressed("3");
        assert_eq!(state.tool(), Tool::Delete);
        state.key_pressed("1");
        assert_eq!(state.tool(), Tool::Select);
    }
}
