//! wgpu-backed [`DrawSurface`].
//!
//! Draw calls are tessellated on the CPU into one colored triangle list per
//! frame and submitted by [`GpuSurface::present`]. Polygons are assumed
//! convex (every shape the isometric renderer emits is) and filled as
//! fans; strokes become one quad per edge. Sprites have no texture path yet
//! and are drawn as a translucent placeholder quad.
//!
//! This module is feature-gated behind `renderer`.

use std::sync::Arc;

use isoworld_world::color::Color;
use wgpu::util::DeviceExt;

use super::projection::Viewport;
use super::surface::{DrawSurface, Point};

const SPRITE_PLACEHOLDER: Color = Color::rgba(0xff, 0x00, 0xff, 0x80);

/// Initial vertex capacity; the buffer grows on demand.
const INITIAL_VERTICES: usize = 16 * 1024;

// ---------------------------------------------------------------------------
// Vertex
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck_derive::Pod, bytemuck_derive::Zeroable)]
struct Vertex {
    position: [f32; 2],
    color: [f32; 4],
}

impl Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

/// Column-major transform from pixels (origin top-left, y down) to clip
/// space.
fn pixel_transform(width: u32, height: u32) -> [f32; 16] {
    let sx = 2.0 / width.max(1) as f32;
    let sy = -2.0 / height.max(1) as f32;
    [
        sx, 0.0, 0.0, 0.0, //
        0.0, sy, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        -1.0, 1.0, 0.0, 1.0, //
    ]
}

// ---------------------------------------------------------------------------
// Tessellation
// ---------------------------------------------------------------------------

/// CPU-side triangle list builder. Independent of the GPU so it can be
/// exercised without a device.
#[derive(Debug, Default)]
struct Tessellator {
    vertices: Vec<Vertex>,
}

impl Tessellator {
    fn push(&mut self, p: Point, color: [f32; 4]) {
        self.vertices.push(Vertex {
            position: [p.x as f32, p.y as f32],
            color,
        });
    }

    fn fan(&mut self, points: &[Point], color: Color) {
        if points.len() < 3 {
            return;
        }
        let c = color.to_f32_array();
        for pair in points[1..].windows(2) {
            self.push(points[0], c);
            self.push(pair[0], c);
            self.push(pair[1], c);
        }
    }

    fn segment(&mut self, from: Point, to: Point, color: Color, width: f64) {
        let (dx, dy) = (to.x - from.x, to.y - from.y);
        let len = (dx * dx + dy * dy).sqrt();
        if len <= f64::EPSILON {
            return;
        }
        let (nx, ny) = (-dy / len * width / 2.0, dx / len * width / 2.0);
        let quad = [
            Point::new(from.x + nx, from.y + ny),
            Point::new(to.x + nx, to.y + ny),
            Point::new(to.x - nx, to.y - ny),
            Point::new(from.x - nx, from.y - ny),
        ];
        self.fan(&quad, color);
    }

    fn rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Color) {
        let quad = [
            Point::new(x, y),
            Point::new(x + width, y),
            Point::new(x + width, y + height),
            Point::new(x, y + height),
        ];
        self.fan(&quad, color);
    }
}

// ---------------------------------------------------------------------------
// GpuSurface
// ---------------------------------------------------------------------------

/// A window surface the isometric renderer can draw on.
///
/// Create with [`GpuSurface::new`] inside winit's `resumed`, share it with
/// the renderer, and call [`present`](Self::present) after each engine
/// frame.
pub struct GpuSurface {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    render_pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    vertex_capacity: usize,
    screen_buffer: wgpu::Buffer,
    screen_bind_group: wgpu::BindGroup,
    window: Arc<winit::window::Window>,
    clear_color: Color,
    depth: usize,
    frame: Tessellator,
}

impl GpuSurface {
    /// Pick an adapter, configure the window surface and build the
    /// pipeline. Call through `pollster::block_on`.
    ///
    /// # Errors
    ///
    /// Returns an error if no suitable GPU adapter or device is available.
    pub async fn new(window: Arc<winit::window::Window>) -> Result<Self, anyhow::Error> {
        let size = window.inner_size();
        let width = size.width.max(1);
        let height = size.height.max(1);

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("no suitable GPU adapter found"))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("isoworld_gpu_surface"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .ok_or_else(|| anyhow::anyhow!("surface reports no texture formats"))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("isometric_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders.wgsl").into()),
        });

        let screen_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("screen_uniform"),
            contents: bytemuck::cast_slice(&pixel_transform(width, height)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let screen_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("screen_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let screen_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("screen_bind_group"),
            layout: &screen_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: screen_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("isometric_pipeline_layout"),
            bind_group_layouts: &[&screen_layout],
            push_constant_ranges: &[],
        });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("isometric_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::desc()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    // Glass, water and glow halos are translucent.
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        let vertex_buffer = Self::create_vertex_buffer(&device, INITIAL_VERTICES);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            render_pipeline,
            vertex_buffer,
            vertex_capacity: INITIAL_VERTICES,
            screen_buffer,
            screen_bind_group,
            window,
            clear_color: Color::BLACK,
            depth: 0,
            frame: Tessellator::default(),
        })
    }

    fn create_vertex_buffer(device: &wgpu::Device, vertices: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("vertex_buffer"),
            size: (vertices * std::mem::size_of::<Vertex>()) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Submit the triangles drawn since the last `clear` and present.
    ///
    /// # Errors
    ///
    /// Returns a [`wgpu::SurfaceError`] if the surface cannot provide an
    /// output texture (e.g., window minimized, surface lost).
    pub fn present(&mut self) -> Result<(), wgpu::SurfaceError> {
        let vertices = &self.frame.vertices;
        if vertices.len() > self.vertex_capacity {
            let capacity = vertices.len().next_power_of_two();
            tracing::debug!(capacity, "growing vertex buffer");
            self.vertex_buffer = Self::create_vertex_buffer(&self.device, capacity);
            self.vertex_capacity = capacity;
        }
        if !vertices.is_empty() {
            self.queue
                .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(vertices));
        }

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("isometric_encoder"),
            });

        let [r, g, b, a] = self.clear_color.to_f32_array();
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("isometric_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: f64::from(r),
                            g: f64::from(g),
                            b: f64::from(b),
                            a: f64::from(a),
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&self.render_pipeline);
            pass.set_bind_group(0, &self.screen_bind_group, &[]);
            pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            let count = vertices.len() as u32;
            if count > 0 {
                pass.draw(0..count, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    /// Reconfigure after a window resize. Zero-sized windows are ignored.
    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.queue.write_buffer(
                &self.screen_buffer,
                0,
                bytemuck::cast_slice(&pixel_transform(new_size.width, new_size.height)),
            );
        }
    }

    pub fn window(&self) -> &winit::window::Window {
        &self.window
    }
}

impl DrawSurface for GpuSurface {
    fn size(&self) -> Viewport {
        Viewport::new(self.config.width, self.config.height)
    }

    fn clear(&mut self, color: Color) {
        self.clear_color = color;
        self.frame.vertices.clear();
        self.depth = 0;
    }

    fn save(&mut self) {
        self.depth += 1;
    }

    fn restore(&mut self) {
        if self.depth == 0 {
            tracing::warn!("restore without matching save");
            return;
        }
        self.depth -= 1;
    }

    fn fill_polygon(&mut self, points: &[Point], color: Color) {
        self.frame.fan(points, color);
    }

    fn stroke_polygon(&mut self, points: &[Point], color: Color, width: f64) {
        if points.len() < 2 {
            return;
        }
        for (i, from) in points.iter().enumerate() {
            let to = points[(i + 1) % points.len()];
            self.frame.segment(*from, to, color, width);
        }
    }

    fn stroke_line(&mut self, from: Point, to: Point, color: Color, width: f64) {
        self.frame.segment(from, to, color, width);
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Color) {
        self.frame.rect(x, y, width, height, color);
    }

    fn draw_sprite(&mut self, sprite_id: &str, x: f64, y: f64, width: f64, height: f64) {
        tracing::trace!(sprite_id, "sprite drawn as placeholder");
        self.frame.rect(x, y, width, height, SPRITE_PLACEHOLDER);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_fans_into_two_triangles() {
        let mut t = Tessellator::default();
        t.rect(0.0, 0.0, 2.0, 1.0, Color::WHITE);
        assert_eq!(t.vertices.len(), 6);
        assert_eq!(t.vertices[0].position, [0.0, 0.0]);
    }

    #[test]
    fn degenerate_shapes_emit_nothing() {
        let mut t = Tessellator::default();
        t.fan(&[Point::new(0.0, 0.0), Point::new(1.0, 1.0)], Color::WHITE);
        t.segment(Point::new(3.0, 3.0), Point::new(3.0, 3.0), Color::WHITE, 2.0);
        assert!(t.vertices.is_empty());
    }

    #[test]
    fn pixel_transform_maps_corners_to_clip() {
        let m = pixel_transform(512, 256);
        let clip = |x: f32, y: f32| (m[0] * x + m[12], m[5] * y + m[13]);
        assert_eq!(clip(0.0, 0.0), (-1.0, 1.0));
        assert_eq!(clip(512.0, 256.0), (1.0, -1.0));
    }
}
