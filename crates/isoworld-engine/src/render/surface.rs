//! The drawing target abstraction.
//!
//! [`DrawSurface`] is a minimal immediate-mode 2D canvas: filled and stroked
//! polygons, lines, rectangles and named sprites, with a save/restore stack.
//! [`RecordingSurface`] keeps the operations of the current frame so headless
//! hosts and tests can inspect exactly what was drawn; the GPU backend
//! replays the same [`DrawOp`]s.

use std::cell::RefCell;
use std::rc::Rc;

use isoworld_world::color::Color;

use super::projection::Viewport;

/// A point in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// A canvas-like drawing target.
pub trait DrawSurface {
    fn size(&self) -> Viewport;

    /// Start a new frame filled with `color`.
    fn clear(&mut self, color: Color);

    fn save(&mut self);

    fn restore(&mut self);

    fn fill_polygon(&mut self, points: &[Point], color: Color);

    fn stroke_polygon(&mut self, points: &[Point], color: Color, width: f64);

    fn stroke_line(&mut self, from: Point, to: Point, color: Color, width: f64);

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Color);

    fn draw_sprite(&mut self, sprite_id: &str, x: f64, y: f64, width: f64, height: f64);
}

/// Shared handle the renderer draws through.
pub type SharedSurface = Rc<RefCell<dyn DrawSurface>>;

/// One recorded drawing call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Clear(Color),
    Save,
    Restore,
    FillPolygon { points: Vec<Point>, color: Color },
    StrokePolygon { points: Vec<Point>, color: Color, width: f64 },
    Line { from: Point, to: Point, color: Color, width: f64 },
    FillRect { x: f64, y: f64, width: f64, height: f64, color: Color },
    Sprite { sprite_id: String, x: f64, y: f64, width: f64, height: f64 },
}

// ---------------------------------------------------------------------------
// RecordingSurface
// ---------------------------------------------------------------------------

/// A surface that records the draw calls of the latest frame.
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    viewport: Viewport,
    ops: Vec<DrawOp>,
    depth: usize,
    frames: u64,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            viewport: Viewport::new(width, height),
            ops: Vec::new(),
            depth: 0,
            frames: 0,
        }
    }

    /// A new surface wrapped for sharing with the renderer.
    pub fn shared(width: u32, height: u32) -> Rc<RefCell<RecordingSurface>> {
        Rc::new(RefCell::new(Self::new(width, height)))
    }

    /// Operations since the last [`clear`](DrawSurface::clear).
    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Number of frames begun.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Current save-stack depth; zero between balanced frames.
    pub fn save_depth(&self) -> usize {
        self.depth
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = Viewport::new(width, height);
    }

    pub fn sprites(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Sprite { sprite_id, .. } => Some(sprite_id.as_str()),
            _ => None,
        })
    }
}

impl DrawSurface for RecordingSurface {
    fn size(&self) -> Viewport {
        self.viewport
    }

    fn clear(&mut self, color: Color) {
        self.ops.clear();
        self.frames += 1;
        self.ops.push(DrawOp::Clear(color));
    }

    fn save(&mut self) {
        self.depth += 1;
        self.ops.push(DrawOp::Save);
    }

    fn restore(&mut self) {
        if self.depth == 0 {
            tracing::warn!("restore without matching save");
            return;
        }
        self.depth -= 1;
        self.ops.push(DrawOp::Restore);
    }

    fn fill_polygon(&mut self, points: &[Point], color: Color) {
        self.ops.push(DrawOp::FillPolygon {
            points: points.to_vec(),
            color,
        });
    }

    fn stroke_polygon(&mut self, points: &[Point], color: Color, width: f64) {
        self.ops.push(DrawOp::StrokePolygon {
            points: points.to_vec(),
            color,
            width,
        });
    }

    fn stroke_line(&mut self, from: Point, to: Point, color: Color, width: f64) {
        self.ops.push(DrawOp::Line {
            from,
            to,
            color,
            width,
        });
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Color) {
        self.ops.push(DrawOp::FillRect {
            x,
            y,
            width,
            height,
            color,
        });
    }

    fn draw_sprite(&mut self, sprite_id: &str, x: f64, y: f64, width: f64, height: f64) {
        self.ops.push(DrawOp::Sprite {
            sprite_id: sprite_id.to_owned(),
            x,
            y,
            width,
            height,
        });
    }
}
