//! Composition root.
//!
//! [`Sandbox`] builds one of each subsystem, hands every module exactly the
//! collaborators it needs, and registers them with the engine in dependency
//! order: world, state, renderer. Hosts (the winit app, the headless demo,
//! tests) then feed input through the helpers here, which publish the same
//! `Input*` events a window would.

use crate::assets::AssetManager;
use crate::bus::EventBus;
use crate::config::AppConfig;
use crate::engine::Engine;
use crate::event::{Event, MouseButton};
use crate::frame::{FrameScheduler, HeadlessFrames};
use crate::render::renderer::IsometricRenderer;
use crate::render::surface::SharedSurface;
use crate::state_manager::StateManager;
use crate::world_manager::WorldManager;
use crate::EngineError;

/// A fully wired engine with its subsystem handles.
#[derive(Debug)]
pub struct Sandbox {
    config: AppConfig,
    engine: Engine,
    world: WorldManager,
    state: StateManager,
    renderer: IsometricRenderer,
    assets: AssetManager,
    pointer: (f64, f64),
}

impl Sandbox {
    /// Build, register, initialize and create the configured world. The
    /// engine is not started.
    pub fn new(config: AppConfig, surface: SharedSurface) -> Result<Self, EngineError> {
        Self::with_scheduler(config, surface, Box::new(HeadlessFrames::new()))
    }

    pub fn with_scheduler(
        config: AppConfig,
        surface: SharedSurface,
        scheduler: Box<dyn FrameScheduler>,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let bus = EventBus::new();
        let mut engine = Engine::new(config.engine.clone(), bus.clone(), scheduler);
        let world = WorldManager::new(bus.clone(), config.world.clone());
        let state = StateManager::new(bus.clone(), world.view(), &config.interaction);
        let assets = AssetManager::new();
        let renderer = IsometricRenderer::new(
            bus,
            world.view(),
            assets.clone(),
            config.render.clone(),
            Some(surface),
        );

        engine.register(Box::new(world.clone()))?;
        engine.register(Box::new(state.clone()))?;
        engine.register(Box::new(renderer.clone()))?;
        engine.initialize()?;

        world.create_world(&config.world.world_id, 0, 0);
        tracing::info!(world = %config.world.world_id, "sandbox ready");

        Ok(Self {
            config,
            engine,
            world,
            state,
            renderer,
            assets,
            pointer: (0.0, 0.0),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn world(&self) -> &WorldManager {
        &self.world
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    pub fn renderer(&self) -> &IsometricRenderer {
        &self.renderer
    }

    pub fn assets(&self) -> &AssetManager {
        &self.assets
    }

    pub fn bus(&self) -> &EventBus {
        self.engine.bus()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    // -- lifecycle ------------------------------------------------------------

    pub fn start(&mut self) -> Result<(), EngineError> {
        self.engine.start()
    }

    /// Pump frames at `frame_dt` seconds apart.
    pub fn run_frames(&mut self, frames: u64, frame_dt: f64) -> u64 {
        self.engine.run_headless(frames, frame_dt)
    }

    /// Tear everything down. Late asset completions are rejected afterwards.
    pub fn shutdown(&mut self) {
        self.engine.destroy();
        self.assets.shutdown();
    }

    // -- input ----------------------------------------------------------------

    /// Pointer moved to a ground-plane world position.
    pub fn pointer_move(&mut self, world_x: f64, world_y: f64) {
        self.pointer = (world_x, world_y);
        let screen = self.renderer.projector().project(world_x, world_y, 0.0);
        self.bus().publish(Event::InputMouseMove {
            world_x,
            world_y,
            screen_x: screen.x,
            screen_y: screen.y,
        });
    }

    /// Pointer moved to a screen pixel.
    pub fn pointer_move_screen(&mut self, screen_x: f64, screen_y: f64) {
        let (world_x, world_y) = self.renderer.screen_to_world(screen_x, screen_y);
        self.pointer = (world_x, world_y);
        self.bus().publish(Event::InputMouseMove {
            world_x,
            world_y,
            screen_x,
            screen_y,
        });
    }

    /// Press and release `button` over the hovered cell, or at the last
    /// pointer position when nothing is hovered.
    pub fn click(&mut self, button: MouseButton) {
        let (world_x, world_y) = match self.state.hovered_tile() {
            Some(tile) => (f64::from(tile.x) + 0.5, f64::from(tile.y) + 0.5),
            None => self.pointer,
        };
        let bus = self.bus().clone();
        bus.publish(Event::InputMouseDown {
            button,
            world_x,
            world_y,
        });
        bus.publish(Event::InputMouseUp {
            button,
            world_x,
            world_y,
        });
    }

    pub fn key(&mut self, key: &str) {
        let bus = self.bus().clone();
        bus.publish(Event::InputKeyDown { key: key.to_owned() });
        bus.publish(Event::InputKeyUp { key: key.to_owned() });
    }

    pub fn wheel(&mut self, delta_y: f64) {
        self.bus().publish(Event::InputWheel { delta_y });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::surface::RecordingSurface;
    use crate::state_manager::Tool;
    use isoworld_world::terrain::TerrainConfig;

    fn sandbox() -> (Sandbox, std::rc::Rc<std::cell::RefCell<RecordingSurface>>) {
        let mut config = AppConfig::default();
        config.world.terrain = TerrainConfig::empty();
        let surface = RecordingSurface::shared(640, 480);
        let sandbox = Sandbox::new(config, surface.clone()).unwrap();
        (sandbox, surface)
    }

    #[test]
    fn modules_register_in_dependency_order() {
        let (sandbox, _) = sandbox();
        assert_eq!(sandbox.engine().module_names(), vec!["world", "state", "renderer"]);
    }

    #[test]
    fn invalid_config_is_rejected_before_wiring() {
        let mut config = AppConfig::default();
        config.render.tile_width = 0.0;
        let surface = RecordingSurface::shared(1, 1);
        assert!(matches!(
            Sandbox::new(config, surface),
            Err(EngineError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn frames_render_onto_the_surface() {
        let (mut sandbox, surface) = sandbox();
        sandbox.start().unwrap();
        sandbox.pointer_move(1.5, 1.5);
        sandbox.click(MouseButton::Left);
        assert_eq!(sandbox.run_frames(2, 0.5), 2);
        assert_eq!(surface.borrow().frames(), 2);
        assert_eq!(sandbox.renderer().last_stats().blocks, 1);
    }

    #[test]
    fn keys_reach_the_state_manager() {
        let (mut sandbox, _) = sandbox();
        sandbox.key("3");
        assert_eq!(sandbox.state().tool(), Tool::Delete);
    }

    #[test]
    fn shutdown_drops_handlers_and_assets() {
        let (mut sandbox, _) = sandbox();
        sandbox.start().unwrap();
        sandbox.shutdown();
        assert!(!sandbox.engine().is_running());
        assert!(!sandbox.assets().is_alive());
        sandbox.pointer_move(0.5, 0.5);
        assert_eq!(sandbox.state().hovered_tile(), None);
    }
}
