//! Isoworld history -- bounded undo/redo for world edits.
//!
//! # Modules
//!
//! - [`action`]: replayable place/remove actions carrying full block
//!   snapshots, with their inverses.
//! - [`history`]: the bounded log and its cursor.
//!
//! The crate is a pure data structure. Applying actions to a world, and the
//! guard that keeps replays from being recorded again, live with the caller.

#![deny(unsafe_code)]

pub mod action;
pub mod history;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by history cursor operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    /// The cursor is already before the first entry.
    #[error("nothing to undo")]
    NothingToUndo,

    /// The cursor is already on the newest entry.
    #[error("nothing to redo")]
    NothingToRedo,

    #[error("history capacity must be at least 1")]
    ZeroCapacity,
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::action::{Action, ActionKind};
    pub use crate::history::{CommandHistory, HistoryEntry, DEFAULT_CAPACITY};
    pub use crate::HistoryError;
}
