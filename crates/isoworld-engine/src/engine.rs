//! Module registry and the variable-rate frame loop with a fixed-step
//! accumulator.
//!
//! Each host frame callback runs three phases over every registered module,
//! in registration order:
//!
//! 1. `fixed_update(fixed_step)` zero or more times, draining the time
//!    accumulator.
//! 2. `update(dt)` once.
//! 3. `late_update(dt)` once.
//!
//! Every phase is also broadcast on the bus (`EngineFixedUpdate`,
//! `EngineUpdate`, `EngineLateUpdate`). Frame delta is clamped to
//! `[0, max_delta]` so a stalled host cannot trigger an unbounded burst of
//! fixed steps. Timestamps are seconds on the host's monotonic clock.
//!
//! # Example
//!
//! ```
//! use isoworld_engine::prelude::*;
//!
//! let config = EngineConfig { fixed_step: 0.25, max_delta: 1.0, ..Default::default() };
//! let mut engine = Engine::headless(config, EventBus::new());
//! engine.initialize().unwrap();
//! engine.start().unwrap();
//!
//! // First frame has dt = 0; the next three advance 0.5s each.
//! engine.run_headless(4, 0.5);
//! assert_eq!(engine.frame_count(), 4);
//! assert_eq!(engine.fixed_step_count(), 6);
//! ```

use serde::{Deserialize, Serialize};

use crate::bus::EventBus;
use crate::event::Event;
use crate::frame::{FrameRequest, FrameScheduler, HeadlessFrames};
use crate::module::{ManagedModule, Module};
use crate::EngineError;

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Frame loop timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Seconds per fixed step. Must be positive and finite.
    pub fixed_step: f64,
    /// Upper bound on one frame's delta, in seconds.
    pub max_delta: f64,
    /// Length of the FPS sampling window, in seconds.
    pub fps_window: f64,
}

impl Default for EngineConfig {
    /// 60 Hz fixed step, deltas capped at a quarter second, one-second FPS
    /// window.
    fn default() -> Self {
        Self {
            fixed_step: 1.0 / 60.0,
            max_delta: 0.25,
            fps_window: 1.0,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.fixed_step.is_finite() && self.fixed_step > 0.0) {
            return Err(EngineError::InvalidConfig {
                reason: format!("fixed step must be positive, got {}", self.fixed_step),
            });
        }
        if !(self.max_delta >= self.fixed_step) {
            return Err(EngineError::InvalidConfig {
                reason: format!(
                    "max delta {} is smaller than the fixed step {}",
                    self.max_delta, self.fixed_step
                ),
            });
        }
        if !(self.fps_window > 0.0) {
            return Err(EngineError::InvalidConfig {
                reason: format!("fps window must be positive, got {}", self.fps_window),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The scheduler: owns the modules, drives their lifecycle and pumps frames.
pub struct Engine {
    config: EngineConfig,
    bus: EventBus,
    scheduler: Box<dyn FrameScheduler>,
    modules: Vec<ManagedModule>,
    running: bool,
    pending: Option<FrameRequest>,
    last_timestamp: Option<f64>,
    accumulator: f64,
    frame_count: u64,
    fixed_step_count: u64,
    fps: f64,
    fps_frames: u32,
    fps_window_start: Option<f64>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("modules", &self.modules)
            .field("running", &self.running)
            .field("frame_count", &self.frame_count)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(config: EngineConfig, bus: EventBus, scheduler: Box<dyn FrameScheduler>) -> Self {
        Self {
            config,
            bus,
            scheduler,
            modules: Vec::new(),
            running: false,
            pending: None,
            last_timestamp: None,
            accumulator: 0.0,
            frame_count: 0,
            fixed_step_count: 0,
            fps: 0.0,
            fps_frames: 0,
            fps_window_start: None,
        }
    }

    /// An engine pumped manually through [`frame`](Self::frame) or
    /// [`run_headless`](Self::run_headless).
    pub fn headless(config: EngineConfig, bus: EventBus) -> Self {
        Self::new(config, bus, Box::new(HeadlessFrames::new()))
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -- registry -------------------------------------------------------------

    /// Add a module. Names must be unique.
    pub fn register(&mut self, module: Box<dyn Module>) -> Result<(), EngineError> {
        let name = module.name().to_owned();
        if self.modules.iter().any(|m| m.name() == name) {
            return Err(EngineError::DuplicateModule { name });
        }
        tracing::debug!(module = %name, "module registered");
        self.modules.push(ManagedModule::new(module));
        Ok(())
    }

    /// Module names in registration order.
    pub fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(ManagedModule::name).collect()
    }

    pub fn module(&self, name: &str) -> Option<&ManagedModule> {
        self.modules.iter().find(|m| m.name() == name)
    }

    pub fn set_module_enabled(&mut self, name: &str, enabled: bool) -> Result<(), EngineError> {
        let module = self
            .modules
            .iter_mut()
            .find(|m| m.name() == name)
            .ok_or_else(|| EngineError::UnknownModule {
                name: name.to_owned(),
            })?;
        if enabled {
            module.enable();
        } else {
            module.disable();
        }
        Ok(())
    }

    // -- lifecycle ------------------------------------------------------------

    /// Initialize every module in registration order. The first failure
    /// aborts and is returned; later modules stay uninitialized.
    pub fn initialize(&mut self) -> Result<(), EngineError> {
        for module in &mut self.modules {
            module.initialize()?;
        }
        tracing::info!(modules = self.modules.len(), "engine initialized");
        Ok(())
    }

    /// Start every module and request the first frame.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.running {
            tracing::warn!("engine already running; start ignored");
            return Ok(());
        }
        for module in &mut self.modules {
            module.start()?;
        }
        self.running = true;
        self.last_timestamp = None;
        self.accumulator = 0.0;
        self.fps_frames = 0;
        self.fps_window_start = None;
        self.pending = Some(self.scheduler.request_frame());
        tracing::info!("engine started");
        Ok(())
    }

    /// Cancel the pending frame and stop modules in reverse order.
    pub fn stop(&mut self) {
        if !self.running {
            tracing::warn!("engine not running; stop ignored");
            return;
        }
        if let Some(request) = self.pending.take() {
            self.scheduler.cancel_frame(request);
        }
        for module in self.modules.iter_mut().rev() {
            module.stop();
        }
        self.running = false;
        tracing::info!(frames = self.frame_count, "engine stopped");
    }

    /// Stop if running, destroy every module and drop all bus handlers.
    pub fn destroy(&mut self) {
        if self.running {
            self.stop();
        }
        for module in &mut self.modules {
            module.destroy();
        }
        self.bus.clear(None);
        tracing::info!("engine destroyed");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    // -- frame loop -----------------------------------------------------------

    /// Host frame callback. Returns `false` when no frame was pending (the
    /// engine is stopped) and the call was ignored.
    pub fn frame(&mut self, timestamp: f64) -> bool {
        if self.pending.take().is_none() {
            tracing::trace!(timestamp, "frame without pending request ignored");
            return false;
        }

        let dt = match self.last_timestamp {
            Some(last) => {
                let raw = timestamp - last;
                if raw.is_finite() {
                    raw.clamp(0.0, self.config.max_delta)
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        self.last_timestamp = Some(timestamp);

        let step = self.config.fixed_step;
        self.accumulator += dt;
        while self.accumulator >= step {
            for module in &mut self.modules {
                report(module.fixed_update(step));
            }
            self.bus.publish(Event::EngineFixedUpdate { dt: step });
            self.accumulator -= step;
            self.fixed_step_count += 1;
        }

        for module in &mut self.modules {
            report(module.update(dt));
        }
        self.bus.publish(Event::EngineUpdate { dt });

        for module in &mut self.modules {
            report(module.late_update(dt));
        }
        self.bus.publish(Event::EngineLateUpdate { dt });

        self.sample_fps(timestamp);
        self.frame_count += 1;
        tracing::trace!(frame = self.frame_count, dt, "frame complete");

        if self.running {
            self.pending = Some(self.scheduler.request_frame());
        }
        true
    }

    /// Sampled on host timestamps, not on the clamped delta, so a host
    /// slower than `1 / max_delta` is reported at its real rate.
    fn sample_fps(&mut self, timestamp: f64) {
        if !timestamp.is_finite() {
            return;
        }
        let start = match self.fps_window_start {
            Some(start) if timestamp >= start => start,
            _ => {
                self.fps_window_start = Some(timestamp);
                self.fps_frames = 0;
                return;
            }
        };
        self.fps_frames += 1;
        let elapsed = timestamp - start;
        if elapsed >= self.config.fps_window {
            self.fps = f64::from(self.fps_frames) / elapsed;
            self.fps_frames = 0;
            self.fps_window_start = Some(timestamp);
            self.bus.publish(Event::EngineFps { fps: self.fps });
        }
    }

    /// Pump `frames` frames spaced `frame_dt` seconds apart, continuing from
    /// the last timestamp. Returns how many frames actually ran.
    pub fn run_headless(&mut self, frames: u64, frame_dt: f64) -> u64 {
        let mut timestamp = match self.last_timestamp {
            Some(last) => last + frame_dt,
            None => 0.0,
        };
        let mut ran = 0;
        for _ in 0..frames {
            if !self.frame(timestamp) {
                break;
            }
            ran += 1;
            timestamp += frame_dt;
        }
        ran
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn fixed_step_count(&self) -> u64 {
        self.fixed_step_count
    }

    /// Frames per second over the last complete sampling window.
    pub fn fps(&self) -> f64 {
        self.fps
    }
}

fn report(result: Result<(), EngineError>) {
    if let Err(e) = result {
        tracing::error!(error = %e, "module hook failed");
    }
}
