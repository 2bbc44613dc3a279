//! In-memory asset cache.
//!
//! Fetching and decoding are the host's business. The cache only tracks what
//! is available and what is in flight: a load is opened with
//! [`AssetManager::begin_load`] and later completed with the returned
//! [`LoadTicket`]. After [`shutdown`](AssetManager::shutdown) late
//! completions are rejected instead of touching a torn-down cache.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Sprite,
    Sound,
    Data,
}

/// A loaded asset.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub kind: AssetKind,
    /// Pixel size for sprites, `(0, 0)` otherwise.
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

impl Asset {
    pub fn sprite(width: u32, height: u32, bytes: Vec<u8>) -> Self {
        Self {
            kind: AssetKind::Sprite,
            width,
            height,
            bytes,
        }
    }
}

/// Receipt for an in-flight load.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadTicket {
    id: u64,
    key: String,
}

impl LoadTicket {
    pub fn key(&self) -> &str {
        &self.key
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssetError {
    #[error("asset cache has shut down")]
    ShutDown,
    #[error("no pending load for ticket {id}")]
    UnknownTicket { id: u64 },
}

#[derive(Debug, Default)]
struct AssetsInner {
    loaded: RefCell<HashMap<String, Rc<Asset>>>,
    pending: RefCell<BTreeMap<u64, (String, AssetKind)>>,
    next_ticket: Cell<u64>,
    shut_down: Cell<bool>,
}

/// Shared handle to the cache.
#[derive(Debug, Clone, Default)]
pub struct AssetManager {
    inner: Rc<AssetsInner>,
}

impl AssetManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, asset: Asset) -> Result<(), AssetError> {
        if self.inner.shut_down.get() {
            return Err(AssetError::ShutDown);
        }
        self.inner.loaded.borrow_mut().insert(key.into(), Rc::new(asset));
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<Rc<Asset>> {
        self.inner.loaded.borrow().get(key).cloned()
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.loaded.borrow().contains_key(key)
    }

    pub fn begin_load(&self, key: impl Into<String>, kind: AssetKind) -> Result<LoadTicket, AssetError> {
        if self.inner.shut_down.get() {
            return Err(AssetError::ShutDown);
        }
        let id = self.inner.next_ticket.get();
        self.inner.next_ticket.set(id + 1);
        let key = key.into();
        self.inner.pending.borrow_mut().insert(id, (key.clone(), kind));
        Ok(LoadTicket { id, key })
    }

    /// Finish a load. Rejected once the cache has shut down.
    pub fn complete(&self, ticket: LoadTicket, asset: Asset) -> Result<(), AssetError> {
        if self.inner.shut_down.get() {
            tracing::debug!(key = %ticket.key, "late asset completion dropped");
            return Err(AssetError::ShutDown);
        }
        let Some((key, kind)) = self.inner.pending.borrow_mut().remove(&ticket.id) else {
            return Err(AssetError::UnknownTicket { id: ticket.id });
        };
        if kind != asset.kind {
            tracing::warn!(%key, expected = ?kind, actual = ?asset.kind, "asset kind mismatch");
        }
        self.inner.loaded.borrow_mut().insert(key, Rc::new(asset));
        Ok(())
    }

    /// Abandon a load.
    pub fn fail(&self, ticket: LoadTicket, reason: &str) {
        if self.inner.pending.borrow_mut().remove(&ticket.id).is_some() {
            tracing::warn!(key = %ticket.key, reason, "asset load failed");
        }
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    pub fn is_alive(&self) -> bool {
        !self.inner.shut_down.get()
    }

    /// Drop every asset and refuse further work.
    pub fn shutdown(&self) {
        self.inner.shut_down.set(true);
        self.inner.pending.borrow_mut().clear();
        self.inner.loaded.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_round_trip() {
        let assets = AssetManager::new();
        let ticket = assets.begin_load("grass", AssetKind::Sprite).unwrap();
        assert_eq!(assets.pending_count(), 1);
        assets.complete(ticket, Asset::sprite(64, 64, vec![0; 4])).unwrap();
        assert!(assets.has("grass"));
        assert_eq!(assets.get("grass").map(|a| a.width), Some(64));
        assert_eq!(assets.pending_count(), 0);
    }

    #[test]
    fn completion_after_shutdown_is_rejected() {
        let assets = AssetManager::new();
        let ticket = assets.begin_load("late", AssetKind::Sprite).unwrap();
        assets.shutdown();
        assert_eq!(
            assets.complete(ticket, Asset::sprite(1, 1, Vec::new())),
            Err(AssetError::ShutDown)
        );
        assert!(!assets.has("late"));
        assert!(!assets.is_alive());
    }

    #[test]
    fn unknown_ticket_is_rejected() {
        let assets = AssetManager::new();
        let ticket = assets.begin_load("a", AssetKind::Data).unwrap();
        assets.fail(ticket.clone(), "404");
        assert!(matches!(
            assets.complete(ticket, Asset::sprite(1, 1, Vec::new())),
            Err(AssetError::UnknownTicket { .. })
        ));
    }
}
