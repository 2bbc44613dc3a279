//! Isometric projection and camera math.
//!
//! World space is `(x, y)` on the ground plane plus layer `z`. Isometric
//! space is the 2:1 diamond projection, in pixels, before camera translation
//! and zoom. Screen space is pixels in the viewport with the origin at the
//! top-left corner.

/// Tile footprint and layer height, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsoProjection {
    pub tile_width: f64,
    pub tile_height: f64,
    /// Vertical screen offset per layer.
    pub tile_depth: f64,
}

impl Default for IsoProjection {
    fn default() -> Self {
        Self {
            tile_width: 64.0,
            tile_height: 32.0,
            tile_depth: 32.0,
        }
    }
}

impl IsoProjection {
    pub fn new(tile_width: f64, tile_height: f64, tile_depth: f64) -> Self {
        Self {
            tile_width,
            tile_height,
            tile_depth,
        }
    }

    /// `((x - y) * w/2, (x + y) * h/2 - z * d)`.
    pub fn world_to_iso(&self, x: f64, y: f64, z: f64) -> (f64, f64) {
        (
            (x - y) * self.tile_width / 2.0,
            (x + y) * self.tile_height / 2.0 - z * self.tile_depth,
        )
    }

    /// Exact inverse of the ground-plane (`z = 0`) part of
    /// [`world_to_iso`](Self::world_to_iso).
    pub fn iso_to_world(&self, iso_x: f64, iso_y: f64) -> (f64, f64) {
        let a = iso_x / self.tile_width;
        let b = iso_y / self.tile_height;
        (b + a, b - a)
    }
}

// ---------------------------------------------------------------------------
// Camera
// ---------------------------------------------------------------------------

/// Camera focus and zoom. Zoom is kept within
/// [`MIN_ZOOM`](Self::MIN_ZOOM)`..=`[`MAX_ZOOM`](Self::MAX_ZOOM).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// World-space focus point.
    pub x: f64,
    pub y: f64,
    zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

impl Camera {
    pub const MIN_ZOOM: f64 = 0.1;
    pub const MAX_ZOOM: f64 = 10.0;

    pub fn new(x: f64, y: f64, zoom: f64) -> Self {
        let mut camera = Self { x, y, zoom: 1.0 };
        camera.set_zoom(zoom);
        camera
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Set zoom, clamped to the allowed range. NaN leaves zoom unchanged.
    pub fn set_zoom(&mut self, zoom: f64) {
        if !zoom.is_nan() {
            self.zoom = zoom.clamp(Self::MIN_ZOOM, Self::MAX_ZOOM);
        }
    }

    pub fn zoom_by(&mut self, factor: f64) {
        self.set_zoom(self.zoom * factor);
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }
}

/// Pixel size of the drawing area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> (f64, f64) {
        (f64::from(self.width) / 2.0, f64::from(self.height) / 2.0)
    }
}

// ---------------------------------------------------------------------------
// Screen transforms
// ---------------------------------------------------------------------------

/// Project a world point to screen pixels: camera-relative isometric
/// offset, scaled by zoom, around the viewport centre.
pub fn world_to_screen(
    projection: &IsoProjection,
    camera: &Camera,
    viewport: Viewport,
    x: f64,
    y: f64,
    z: f64,
) -> (f64, f64) {
    let (ix, iy) = projection.world_to_iso(x - camera.x, y - camera.y, z);
    let (cx, cy) = viewport.center();
    (ix * camera.zoom() + cx, iy * camera.zoom() + cy)
}

/// Inverse of [`world_to_screen`] on the ground plane.
pub fn screen_to_world(
    projection: &IsoProjection,
    camera: &Camera,
    viewport: Viewport,
    screen_x: f64,
    screen_y: f64,
) -> (f64, f64) {
    let (cx, cy) = viewport.center();
    let ix = (screen_x - cx) / camera.zoom();
    let iy = (screen_y - cy) / camera.zoom();
    let (wx, wy) = projection.iso_to_world(ix, iy);
    (wx + camera.x, wy + camera.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_projects_to_origin() {
        let p = IsoProjection::default();
        assert_eq!(p.world_to_iso(0.0, 0.0, 0.0), (0.0, 0.0));
    }

    #[test]
    fn layers_raise_the_point() {
        let p = IsoProjection::default();
        let (_, ground) = p.world_to_iso(3.0, 3.0, 0.0);
        let (_, raised) = p.world_to_iso(3.0, 3.0, 2.0);
        assert_eq!(ground - raised, 64.0);
    }

    #[test]
    fn unit_steps_follow_the_diamond() {
        let p = IsoProjection::default();
        assert_eq!(p.world_to_iso(1.0, 0.0, 0.0), (32.0, 16.0));
        assert_eq!(p.world_to_iso(0.0, 1.0, 0.0), (-32.0, 16.0));
        assert_eq!(p.iso_to_world(32.0, 16.0), (1.0, 0.0));
    }

    #[test]
    fn zoom_is_clamped() {
        let mut c = Camera::default();
        c.set_zoom(50.0);
        assert_eq!(c.zoom(), Camera::MAX_ZOOM);
        c.set_zoom(0.0);
        assert_eq!(c.zoom(), Camera::MIN_ZOOM);
        c.set_zoom(f64::NAN);
        assert_eq!(c.zoom(), Camera::MIN_ZOOM);
        assert_eq!(Camera::new(0.0, 0.0, -3.0).zoom(), Camera::MIN_ZOOM);
    }

    #[test]
    fn camera_focus_lands_on_viewport_centre() {
        let p = IsoProjection::default();
        let c = Camera::new(10.0, -4.0, 2.0);
        let v = Viewport::new(800, 600);
        assert_eq!(world_to_screen(&p, &c, v, 10.0, -4.0, 0.0), (400.0, 300.0));
        assert_eq!(screen_to_world(&p, &c, v, 400.0, 300.0), (10.0, -4.0));
    }
}
