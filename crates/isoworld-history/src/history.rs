//! Bounded undo/redo log with a cursor.
//!
//! [`CommandHistory`] keeps at most `capacity` entries. The cursor
//! ([`index`](CommandHistory::index)) names the last applied entry and ranges
//! over `-1..len`; entries after it form the redo tail. Recording a new
//! action discards that tail. When the log is full the oldest entry is
//! dropped and the cursor stays on the newest entry.
//!
//! The log itself never touches the world: callers replay
//! [`HistoryEntry::undo`] / [`HistoryEntry::action`] and move the cursor with
//! [`step_back`](CommandHistory::step_back) /
//! [`step_forward`](CommandHistory::step_forward) only once the replay has
//! succeeded.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::HistoryError;

/// Default number of entries kept.
pub const DEFAULT_CAPACITY: usize = 50;

// ---------------------------------------------------------------------------
// HistoryEntry
// ---------------------------------------------------------------------------

/// A recorded action together with its precomputed inverse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: Action,
    pub undo: Action,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl HistoryEntry {
    pub fn new(action: Action, timestamp: u64) -> Self {
        Self {
            undo: action.inverse(),
            action,
            timestamp,
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// CommandHistory
// ---------------------------------------------------------------------------

/// Bounded undo/redo history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandHistory {
    entries: VecDeque<HistoryEntry>,
    /// Number of applied entries (`index + 1`).
    applied: usize,
    capacity: usize,
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self {
            entries: VecDeque::with_capacity(DEFAULT_CAPACITY),
            applied: 0,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl CommandHistory {
    /// A history holding [`DEFAULT_CAPACITY`] entries.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Result<Self, HistoryError> {
        if capacity == 0 {
            return Err(HistoryError::ZeroCapacity);
        }
        Ok(Self {
            entries: VecDeque::with_capacity(capacity),
            applied: 0,
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cursor position: index of the last applied entry, `-1` when nothing
    /// is applied.
    pub fn index(&self) -> isize {
        self.applied as isize - 1
    }

    pub fn can_undo(&self) -> bool {
        self.applied > 0
    }

    pub fn can_redo(&self) -> bool {
        self.applied < self.entries.len()
    }

    /// Number of entries in the redo tail.
    pub fn redo_len(&self) -> usize {
        self.entries.len() - self.applied
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Record a freshly applied action, stamped with the current time.
    pub fn record(&mut self, action: Action) {
        self.record_entry(HistoryEntry::new(action, now_millis()));
    }

    /// Record a prepared entry: truncate the redo tail, append, and drop the
    /// oldest entry when over capacity.
    pub fn record_entry(&mut self, entry: HistoryEntry) {
        let discarded = self.entries.len() - self.applied;
        if discarded > 0 {
            tracing::debug!(discarded, "recording truncates redo tail");
            self.entries.truncate(self.applied);
        }
        self.entries.push_back(entry);
        if self.entries.len() > self.capacity {
            self.entries.pop_front();
        } else {
            self.applied += 1;
        }
    }

    /// The entry an undo would revert.
    pub fn undo_target(&self) -> Option<&HistoryEntry> {
        self.applied.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    /// The entry a redo would re-apply.
    pub fn redo_target(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.applied)
    }

    /// Move the cursor back one entry after a successful undo replay.
    pub fn step_back(&mut self) -> Result<isize, HistoryError> {
        if self.applied == 0 {
            return Err(HistoryError::NothingToUndo);
        }
        self.applied -= 1;
        Ok(self.index())
    }

    /// Move the cursor forward one entry. Pair with
    /// [`step_back`](Self::step_back) to roll back a failed redo.
    pub fn step_forward(&mut self) -> Result<isize, HistoryError> {
        if self.applied >= self.entries.len() {
            return Err(HistoryError::NothingToRedo);
        }
        self.applied += 1;
        Ok(self.index())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.applied = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isoworld_world::block::{Block, BlockType};
    use isoworld_world::coords::{ChunkCoord, ChunkId};

    fn place(z: i32) -> Action {
        Action::place(
            Block::new(BlockType::Stone, 0, 0, z),
            ChunkId::new("w", ChunkCoord::new(0, 0)),
        )
    }

    #[test]
    fn empty_history_has_cursor_at_minus_one() {
        let h = CommandHistory::new();
        assert_eq!(h.index(), -1);
        assert!(!h.can_undo());
        assert!(!h.can_redo());
        assert!(h.undo_target().is_none());
        assert_eq!(h.capacity(), DEFAULT_CAPACITY);
    }

    #[test]
    fn record_advances_cursor() {
        let mut h = CommandHistory::new();
        h.record(place(0));
        h.record(place(1));
        assert_eq!(h.index(), 1);
        assert_eq!(h.undo_target().unwrap().action.z, 1);
        assert_eq!(h.undo_target().unwrap().undo, place(1).inverse());
    }

    #[test]
    fn step_back_and_forward_move_cursor() {
        let mut h = CommandHistory::new();
        h.record(place(0));
        assert_eq!(h.step_back(), Ok(-1));
        assert_eq!(h.step_back(), Err(HistoryError::NothingToUndo));
        assert_eq!(h.redo_target().unwrap().action.z, 0);
        assert_eq!(h.step_forward(), Ok(0));
        assert_eq!(h.step_forward(), Err(HistoryError::NothingToRedo));
    }

    #[test]
    fn recording_after_undo_discards_redo_tail() {
        let mut h = CommandHistory::new();
        h.record(place(0));
        h.record(place(1));
        h.record(place(2));
        h.step_back().unwrap();
        h.step_back().unwrap();
        assert_eq!(h.redo_len(), 2);

        h.record(place(7));
        assert_eq!(h.len(), 2);
        assert_eq!(h.index(), 1);
        assert!(!h.can_redo());
        assert_eq!(h.undo_target().unwrap().action.z, 7);
    }

    #[test]
    fn overflow_drops_oldest_and_keeps_cursor_on_newest() {
        let mut h = CommandHistory::with_capacity(3).unwrap();
        for z in 0..5 {
            h.record(place(z));
        }
        assert_eq!(h.len(), 3);
        assert_eq!(h.index(), 2);
        let zs: Vec<i32> = h.entries().map(|e| e.action.z).collect();
        assert_eq!(zs, vec![2, 3, 4]);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(
            CommandHistory::with_capacity(0).unwrap_err(),
            HistoryError::ZeroCapacity
        );
    }

    #[test]
    fn clear_resets_everything() {
        let mut h = CommandHistory::new();
        h.record(place(0));
        h.clear();
        assert!(h.is_empty());
        assert_eq!(h.index(), -1);
    }
}
