//! Isometric rendering.
//!
//! The pure parts (projection, depth ordering, prism geometry) live in
//! [`projection`] and [`pipeline`]; [`renderer`] is the engine module that
//! draws onto any [`DrawSurface`](surface::DrawSurface). With the `renderer`
//! feature, [`gpu`] provides a wgpu-backed surface and [`app`] a winit host.

pub mod pipeline;
pub mod projection;
pub mod renderer;
pub mod surface;

#[cfg(feature = "renderer")]
pub mod app;
#[cfg(feature = "renderer")]
pub mod gpu;

#[cfg(feature = "renderer")]
pub use app::run_windowed;
#[cfg(feature = "renderer")]
pub use gpu::GpuSurface;
