//! Windowed host for the sandbox.
//!
//! [`run_windowed`] opens a window, wires a [`GpuSurface`] into a
//! [`Sandbox`] and drives the engine's frame callback from
//! `RedrawRequested`. Window input is translated into the same bus events
//! headless hosts publish.
//!
//! This module is feature-gated behind `renderer`.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowAttributes, WindowId};

use super::gpu::GpuSurface;
use crate::config::AppConfig;
use crate::event::MouseButton;
use crate::frame::{FrameRequest, FrameScheduler};
use crate::sandbox::Sandbox;

/// Hook run once on the freshly built sandbox, before the engine starts.
pub type Setup = Box<dyn FnOnce(&mut Sandbox)>;

/// Run the sandbox in a window until it is closed.
///
/// # Errors
///
/// Returns an error if the event loop cannot be created or if the window,
/// GPU surface or sandbox fail to initialize.
pub fn run_windowed(config: AppConfig, window_title: &str, setup: Option<Setup>) -> Result<(), anyhow::Error> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(winit::event_loop::ControlFlow::Wait);

    let mut app = App {
        state: AppState::Pending {
            config,
            title: window_title.to_owned(),
            setup,
        },
        init_failed: false,
    };

    event_loop.run_app(&mut app)?;

    if app.init_failed {
        return Err(anyhow::anyhow!(
            "failed to initialize windowed sandbox (see logs for details)"
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Frame scheduling
// ---------------------------------------------------------------------------

/// Maps engine frame requests onto window redraw requests.
struct RedrawFrames {
    window: Arc<Window>,
    next: u64,
}

impl FrameScheduler for RedrawFrames {
    fn request_frame(&mut self) -> FrameRequest {
        self.next += 1;
        self.window.request_redraw();
        FrameRequest(self.next)
    }

    // A redraw cannot be withdrawn; the engine ignores frames it did not ask for.
    fn cancel_frame(&mut self, _request: FrameRequest) {}
}

// ---------------------------------------------------------------------------
// Internal state machine
// ---------------------------------------------------------------------------

/// Winit 0.30 creates windows inside `resumed`, so the sandbox is built
/// there too.
enum AppState {
    Pending {
        config: AppConfig,
        title: String,
        setup: Option<Setup>,
    },
    Running {
        sandbox: Sandbox,
        gpu: Rc<RefCell<GpuSurface>>,
        epoch: Instant,
    },
    Transitioning,
}

struct App {
    state: AppState,
    init_failed: bool,
}

impl App {
    fn launch(
        event_loop: &ActiveEventLoop,
        config: AppConfig,
        title: String,
        setup: Option<Setup>,
    ) -> Result<AppState, anyhow::Error> {
        let (width, height) = (
            config.render.viewport_width.max(1),
            config.render.viewport_height.max(1),
        );
        let attrs = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(winit::dpi::PhysicalSize::new(width, height));
        let window = Arc::new(event_loop.create_window(attrs)?);
        let gpu = Rc::new(RefCell::new(pollster::block_on(GpuSurface::new(window.clone()))?));

        let scheduler = Box::new(RedrawFrames {
            window: window.clone(),
            next: 0,
        });
        let mut sandbox = Sandbox::with_scheduler(config, gpu.clone(), scheduler)?;
        if let Some(setup) = setup {
            setup(&mut sandbox);
        }
        sandbox.start()?;
        tracing::info!(width, height, "sandbox window created");

        Ok(AppState::Running {
            sandbox,
            gpu,
            epoch: Instant::now(),
        })
    }
}

fn key_name(key: &Key) -> Option<&str> {
    match key {
        Key::Named(NamedKey::ArrowUp) => Some("ArrowUp"),
        Key::Named(NamedKey::ArrowDown) => Some("ArrowDown"),
        Key::Named(NamedKey::ArrowLeft) => Some("ArrowLeft"),
        Key::Named(NamedKey::ArrowRight) => Some("ArrowRight"),
        Key::Named(NamedKey::Escape) => Some("Escape"),
        Key::Character(text) => Some(text.as_str()),
        _ => None,
    }
}

fn mouse_button(button: winit::event::MouseButton) -> Option<MouseButton> {
    match button {
        winit::event::MouseButton::Left => Some(MouseButton::Left),
        winit::event::MouseButton::Middle => Some(MouseButton::Middle),
        winit::event::MouseButton::Right => Some(MouseButton::Right),
        _ => None,
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let state = std::mem::replace(&mut self.state, AppState::Transitioning);
        match state {
            AppState::Pending { config, title, setup } => match Self::launch(event_loop, config, title, setup) {
                Ok(running) => self.state = running,
                Err(e) => {
                    tracing::error!(error = %e, "failed to start windowed sandbox -- exiting");
                    self.init_failed = true;
                    event_loop.exit();
                }
            },
            running @ AppState::Running { .. } => self.state = running,
            AppState::Transitioning => tracing::warn!("resumed called during state transition"),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let AppState::Running { sandbox, gpu, epoch } = &mut self.state else {
            return;
        };
        match event {
            WindowEvent::CloseRequested => {
                tracing::info!(frames = sandbox.engine().frame_count(), "window close requested -- shutting down");
                sandbox.shutdown();
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                tracing::debug!(width = new_size.width, height = new_size.height, "window resized");
                gpu.borrow_mut().resize(new_size);
            }
            WindowEvent::CursorMoved { position, .. } => sandbox.pointer_move_screen(position.x, position.y),
            WindowEvent::CursorLeft { .. } => sandbox.state().clear_hover(),
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button,
                ..
            } => {
                if let Some(button) = mouse_button(button) {
                    sandbox.click(button);
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                // Winit reports scrolling up as positive; the bus zooms in on negative deltas.
                let delta_y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => -f64::from(y),
                    MouseScrollDelta::PixelDelta(p) => -p.y,
                };
                sandbox.wheel(delta_y);
            }
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                if let Some(key) = key_name(&event.logical_key) {
                    sandbox.key(key);
                }
            }
            WindowEvent::RedrawRequested => {
                if !sandbox.engine_mut().frame(epoch.elapsed().as_secs_f64()) {
                    return;
                }
                let result = gpu.borrow_mut().present();
                match result {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost) => {
                        let mut gpu = gpu.borrow_mut();
                        let size = gpu.window().inner_size();
                        gpu.resize(size);
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        tracing::error!("GPU out of memory -- exiting");
                        event_loop.exit();
                    }
                    Err(e) => tracing::warn!(error = %e, "surface error during present"),
                }
            }
            _ => {}
        }
    }
}
