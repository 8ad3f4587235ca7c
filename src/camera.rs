use std::cell::OnceCell;

use crate::enums::ViewType;
use crate::frame::Frame;
use crate::math::Vec3;
use crate::volume::Volume;

/// Orthonormal camera frame. `right = direction x up`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraBasis {
    pub right: Vec3,
    pub up: Vec3,
    pub direction: Vec3,
}

/// Virtual camera in patient space.
///
/// The basis is derived lazily and cached until one of eye, look or up
/// changes. Every mutation also bumps [`Camera::generation`], which owners
/// use to notice that a re-render is due.
#[derive(Debug, Clone)]
pub struct Camera {
    eye_point: Vec3,
    look_point: Vec3,
    up_vector: Vec3,
    field_of_view: f64,
    base_field_of_view: f64,
    basis: OnceCell<CameraBasis>,
    generation: u64,
}

impl Camera {
    pub fn new(eye_point: Vec3, look_point: Vec3, up_vector: Vec3, field_of_view: f64) -> Self {
        Self {
            eye_point,
            look_point,
            up_vector,
            field_of_view,
            base_field_of_view: field_of_view,
            basis: OnceCell::new(),
            generation: 0,
        }
    }

    /// Camera looking straight at a frame, with the frame's column direction up.
    pub fn from_frame(frame: &Frame) -> Self {
        let look = frame.image_center;
        Self::new(
            look - frame.image_normal,
            look,
            frame.column_direction(),
            frame.dimensions_mm[1],
        )
    }

    /// Camera centered on a volume along one of the named views.
    pub fn from_volume(volume: &Volume, view: ViewType) -> Self {
        let (direction, up) = match view {
            ViewType::Axial => (Vec3::Z, Vec3::Y),
            ViewType::Coronal | ViewType::Oblique => (Vec3::Y, Vec3::Z),
            ViewType::Sagittal => (Vec3::X, Vec3::Z),
        };
        let look = volume.center();
        Self::new(
            look - direction,
            look,
            up,
            volume.get_oriented_dimension_mm(up),
        )
    }

    pub fn eye_point(&self) -> Vec3 {
        self.eye_point
    }

    pub fn look_point(&self) -> Vec3 {
        self.look_point
    }

    pub fn up_vector(&self) -> Vec3 {
        self.up_vector
    }

    pub fn field_of_view(&self) -> f64 {
        self.field_of_view
    }

    pub fn base_field_of_view(&self) -> f64 {
        self.base_field_of_view
    }

    /// Counter bumped by every mutation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn basis(&self) -> &CameraBasis {
        self.basis.get_or_init(|| {
            let up = self.up_vector.normalize();
            let direction = (self.look_point - self.eye_point).normalize();
            let right = direction.cross(up).normalize();
            CameraBasis {
                right,
                up,
                direction,
            }
        })
    }

    pub fn direction(&self) -> Vec3 {
        self.basis().direction
    }

    pub fn right(&self) -> Vec3 {
        self.basis().right
    }

    pub fn up(&self) -> Vec3 {
        self.basis().up
    }

    /// Ratio between the reset field of view and the current one.
    pub fn zoom_ratio(&self) -> f64 {
        self.base_field_of_view / self.field_of_view
    }

    fn touch(&mut self) {
        self.basis = OnceCell::new();
        self.generation += 1;
    }

    pub fn set_eye_point(&mut self, eye_point: Vec3) {
        self.eye_point = eye_point;
        self.touch();
    }

    pub fn set_look_point(&mut self, look_point: Vec3) {
        self.look_point = look_point;
        self.touch();
    }

    pub fn set_up_vector(&mut self, up_vector: Vec3) {
        self.up_vector = up_vector;
        self.touch();
    }

    /// Move look and eye together, keeping the viewing direction.
    pub fn translate_to(&mut self, look_point: Vec3) {
        let offset = self.eye_point - self.look_point;
        self.look_point = look_point;
        self.eye_point = look_point + offset;
        self.touch();
    }

    pub fn set_field_of_view(&mut self, field_of_view: f64) {
        self.field_of_view = field_of_view;
        self.generation += 1;
    }

    /// Replace the reset field of view, keeping the current zoom ratio.
    pub fn rebase_field_of_view(&mut self, base_field_of_view: f64) {
        let ratio = self.zoom_ratio();
        self.base_field_of_view = base_field_of_view;
        self.field_of_view = base_field_of_view / ratio;
        self.generation += 1;
    }

    pub fn reset_zoom(&mut self) {
        self.field_of_view = self.base_field_of_view;
        self.generation += 1;
    }
}
