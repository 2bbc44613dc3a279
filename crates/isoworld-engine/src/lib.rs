//! isoworld engine -- event bus, module scheduler and the interactive
//! subsystems built on [`isoworld_world`] and [`isoworld_history`].
//!
//! Subsystems are [`Module`](module::Module)s registered with the
//! [`Engine`](engine::Engine). They never call each other directly: the
//! interaction layer publishes *requests* on the [`EventBus`](bus::EventBus),
//! the world manager answers with *results*, and the renderer reads the world
//! through a read-only view.
//!
//! # Quick Start
//!
//! ```
//! use isoworld_engine::prelude::*;
//!
//! let mut config = AppConfig::default();
//! config.world.terrain = TerrainConfig::empty();
//!
//! let surface = RecordingSurface::shared(800, 600);
//! let mut sandbox = Sandbox::new(config, surface).unwrap();
//! sandbox.start().unwrap();
//!
//! sandbox.pointer_move(3.5, 4.5);
//! sandbox.click(MouseButton::Left);
//! assert!(sandbox.world().get_block_at(3, 4, 0).is_some());
//!
//! assert!(sandbox.state().undo());
//! assert!(sandbox.world().get_block_at(3, 4, 0).is_none());
//! ```

#![deny(unsafe_code)]

pub mod assets;
pub mod bus;
pub mod config;
pub mod engine;
pub mod event;
pub mod frame;
pub mod module;
pub mod render;
pub mod sandbox;
pub mod state_manager;
pub mod world_manager;

pub use isoworld_history;
pub use isoworld_world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors surfaced by the engine and its modules.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("a module named `{name}` is already registered")]
    DuplicateModule { name: String },

    #[error("no module named `{name}`")]
    UnknownModule { name: String },

    #[error("module `{module}` started before it was initialized")]
    NotInitialized { module: String },

    #[error("module `{module}` is already initialized")]
    AlreadyInitialized { module: String },

    #[error("module `{module}` failed: {source}")]
    ModuleFailed {
        module: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("renderer has no drawing surface")]
    MissingSurface,

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("cannot read config file {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config: {details}")]
    ConfigParse { details: String },
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Install a `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter`. Meant for binaries and demos; does nothing if a global
/// subscriber is already set.
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for hosts and tests.
pub mod prelude {
    pub use isoworld_history::prelude::*;
    pub use isoworld_world::prelude::*;

    pub use crate::assets::{Asset, AssetError, AssetKind, AssetManager, LoadTicket};
    pub use crate::bus::{EventBus, Subscription, SubscriptionId};
    pub use crate::config::AppConfig;
    pub use crate::engine::{Engine, EngineConfig};
    pub use crate::event::{BlockChange, Event, EventKind, MouseButton, MutationOrigin};
    pub use crate::frame::{FrameRequest, FrameScheduler, HeadlessFrames};
    pub use crate::module::{ManagedModule, Module};
    pub use crate::render::pipeline::{RenderKey, Renderable};
    pub use crate::render::projection::{Camera, IsoProjection, Viewport};
    pub use crate::render::renderer::{FrameStats, IsometricRenderer, RenderConfig};
    pub use crate::render::surface::{DrawOp, DrawSurface, Point, RecordingSurface, SharedSurface};
    pub use crate::sandbox::Sandbox;
    pub use crate::state_manager::{InteractionConfig, StateManager, Tool};
    pub use crate::world_manager::{WorldConfig, WorldManager, WorldView};
    pub use crate::EngineError;
}
