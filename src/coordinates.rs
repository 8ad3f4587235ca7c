//! Conversions between patient (LPS), camera and display coordinates.
//!
//! Every space is described by an orthonormal basis and an origin expressed
//! in patient space, which is the common "world" space. Voxel coordinates
//! are handled by [`Volume::patient_to_voxel`](crate::volume::Volume::patient_to_voxel).

use crate::camera::{Camera, CameraBasis};
use crate::dataset::Dataset;
use crate::math::{Mat3, Mat4, Vec3};
use crate::viewport::Viewport;
use crate::volume::SliceDimensions;

pub trait CoordinateSpace {
    /// Unit axes of this space, in world coordinates.
    fn world_basis(&self) -> [Vec3; 3];

    /// Origin of this space, in world coordinates.
    fn world_origin(&self) -> Vec3;

    /// Matrix taking world points into this space.
    fn from_world(&self) -> Mat4 {
        let rotation = Mat3::from_rows(self.world_basis());
        let translation = -rotation.mul_vec(self.world_origin());
        Mat4::affine(&rotation, translation)
    }

    /// Matrix taking points of this space back into world coordinates.
    fn to_world(&self) -> Mat4 {
        let rotation = Mat3::from_rows(self.world_basis()).transpose();
        Mat4::affine(&rotation, self.world_origin())
    }
}

/// Patient coordinates are the world space itself.
impl CoordinateSpace for Dataset {
    fn world_basis(&self) -> [Vec3; 3] {
        [Vec3::X, Vec3::Y, Vec3::Z]
    }

    fn world_origin(&self) -> Vec3 {
        Vec3::ZERO
    }
}

/// Camera space: `(right, up, direction)` axes centered on the look point.
impl CoordinateSpace for Camera {
    fn world_basis(&self) -> [Vec3; 3] {
        let CameraBasis {
            right,
            up,
            direction,
        } = *self.basis();
        [right, up, direction]
    }

    fn world_origin(&self) -> Vec3 {
        self.look_point()
    }
}

pub fn convert_point(point: Vec3, from: &dyn CoordinateSpace, to: &dyn CoordinateSpace) -> Vec3 {
    to.from_world()
        .mul_mat(&from.to_world())
        .transform_point(point)
}

/// A position on the render target, in pixels from its top-left corner.
/// `depth` is the distance in mm in front of the displayed plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayPoint {
    pub x: f64,
    pub y: f64,
    pub depth: f64,
}

/// Maps patient points onto the viewport as currently rendered.
///
/// Display x grows against the camera `right` vector and display y along
/// its `up` vector, which shows a frame in its stored row/column layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayTransform {
    basis: CameraBasis,
    look_point: Vec3,
    center: (f64, f64),
    mm_per_pixel: [f64; 2],
}

impl DisplayTransform {
    pub fn new(viewport: &Viewport, slice: &SliceDimensions) -> Self {
        let camera = viewport.camera();
        let zoom = viewport.slice_zoom(slice.height);
        let (width, height) = (viewport.width() as f64, viewport.height() as f64);
        Self {
            basis: *camera.basis(),
            look_point: camera.look_point(),
            center: (
                width / 2.0 + viewport.delta_x() * width,
                height / 2.0 + viewport.delta_y() * height,
            ),
            mm_per_pixel: [
                slice.pixel_spacing[0] / (zoom * slice.width_ratio),
                slice.pixel_spacing[1] / (zoom * slice.height_ratio),
            ],
        }
    }

    pub fn mm_per_pixel(&self) -> [f64; 2] {
        self.mm_per_pixel
    }

    pub fn to_display(&self, point: Vec3) -> DisplayPoint {
        let offset = point - self.look_point;
        DisplayPoint {
            x: self.center.0 - offset.dot(self.basis.right) / self.mm_per_pixel[0],
            y: self.center.1 + offset.dot(self.basis.up) / self.mm_per_pixel[1],
            depth: offset.dot(self.basis.direction),
        }
    }

    pub fn from_display(&self, point: DisplayPoint) -> Vec3 {
        self.look_point - self.basis.right * ((point.x - self.center.0) * self.mm_per_pixel[0])
            + self.basis.up * ((point.y - self.center.1) * self.mm_per_pixel[1])
            + self.basis.direction * point.depth
    }
}
