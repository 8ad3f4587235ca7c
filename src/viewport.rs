use crate::camera::Camera;
use crate::normalizer::{DEFAULT_WINDOW_CENTER, DEFAULT_WINDOW_WIDTH};

/// Render target state: size, pan, zoom, window and the camera.
///
/// Every setter marks the viewport dirty. Camera mutations through
/// [`Viewport::camera_mut`] are picked up from the camera generation.
#[derive(Debug, Clone)]
pub struct Viewport {
    width: u32,
    height: u32,
    delta_x: f64,
    delta_y: f64,
    zoom: f64,
    window_center: i32,
    window_width: i32,
    camera: Camera,
    dirty: bool,
    clean_generation: u64,
}

impl Viewport {
    pub fn new(width: u32, height: u32, camera: Camera) -> Self {
        let clean_generation = camera.generation();
        Self {
            width,
            height,
            delta_x: 0.0,
            delta_y: 0.0,
            zoom: 1.0,
            window_center: DEFAULT_WINDOW_CENTER,
            window_width: DEFAULT_WINDOW_WIDTH,
            camera,
            dirty: true,
            clean_generation,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn delta_x(&self) -> f64 {
        self.delta_x
    }

    pub fn delta_y(&self) -> f64 {
        self.delta_y
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn window_center(&self) -> i32 {
        self.window_center
    }

    pub fn window_width(&self) -> i32 {
        self.window_width
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Screen pixels per slice pixel. At zoom 1 a slice of `slice_height`
    /// rows fills the viewport height; the camera field of view scales it
    /// further.
    pub fn slice_zoom(&self, slice_height: u32) -> f64 {
        self.zoom * self.height as f64 / slice_height.max(1) as f64 * self.camera.zoom_ratio()
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        if (width, height) != (self.width, self.height) {
            self.width = width;
            self.height = height;
            self.dirty = true;
        }
    }

    pub fn set_pan(&mut self, delta_x: f64, delta_y: f64) {
        self.delta_x = delta_x;
        self.delta_y = delta_y;
        self.dirty = true;
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom;
        self.dirty = true;
    }

    /// Window width is kept at 1 or above.
    pub fn set_window(&mut self, center: i32, width: i32) {
        self.window_center = center;
        self.window_width = width.max(1);
        self.dirty = true;
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty || self.camera.generation() != self.clean_generation
    }

    /// Record that the current state has been rendered.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
        self.clean_generation = self.camera.generation();
    }
}
