use image::RgbaImage;

use crate::dataset::Dataset;
use crate::error::ViewerError;
use crate::math::Vec3;
use crate::render::frame_renderer::shade_gray;
use crate::render::lut::VoiLut;
use crate::render::properties::RenderingProperties;
use crate::render::raster::{self, BACKGROUND, blank_canvas};
use crate::viewport::Viewport;

/// Samples the volume on the plane through the look point, at any
/// orientation. Points outside the voxel grid stay black.
#[derive(Debug, Default)]
pub struct VolumeRenderer {
    lut: Option<VoiLut>,
}

/// Patient position of each slice pixel center.
#[derive(Debug, Clone, Copy)]
struct SliceGrid {
    origin: Vec3,
    step_x: Vec3,
    step_y: Vec3,
}

impl SliceGrid {
    #[inline]
    fn point(&self, column: usize, row: usize) -> Vec3 {
        self.origin + self.step_x * column as f64 + self.step_y * row as f64
    }
}

impl VolumeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(
        &mut self,
        dataset: &Dataset,
        viewport: &Viewport,
    ) -> Result<RgbaImage, ViewerError> {
        let volume = dataset.volume().ok_or_else(|| {
            ViewerError::UnsupportedOperation("volume rendering needs a 3D dataset".into())
        })?;
        let mut canvas = blank_canvas(viewport.width(), viewport.height());

        let camera = viewport.camera();
        let basis = camera.basis();
        let slice = volume.get_slice_dimensions(basis);
        let properties = RenderingProperties::compute(viewport, &slice);
        if !properties.is_image_in_viewport() {
            return Ok(canvas);
        }

        let step_x = -basis.right * slice.pixel_spacing[0];
        let step_y = basis.up * slice.pixel_spacing[1];
        let grid = SliceGrid {
            origin: camera.look_point()
                - step_x * ((slice.width as f64 - 1.0) / 2.0)
                - step_y * ((slice.height as f64 - 1.0) / 2.0),
            step_x,
            step_y,
        };

        let lut = VoiLut::ensure(&mut self.lut, viewport.window_width());
        let (left, right) = (properties.left_limit, properties.right_limit);
        raster::rasterize(&properties, &mut canvas, |column, row| {
            match dataset.voxel_at(grid.point(column, row)) {
                Some((frame, x, y)) => shade_gray(frame, lut, left, right, x, y),
                None => BACKGROUND.0,
            }
        });

        Ok(canvas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::enums::ViewType;
    use crate::fixtures;
    use crate::render::raster::gray;

    #[test]
    fn axial_view_shows_center_slice() {
        let dataset = fixtures::axial_stack(3, 1.0, 4, 2);
        let camera = Camera::from_volume(dataset.volume().unwrap(), ViewType::Axial);
        let mut viewport = Viewport::new(4, 2, camera);
        viewport.set_window(127, 256);

        let image = VolumeRenderer::new().render(&dataset, &viewport).unwrap();
        // Slice 1 pixel i holds 100 + i, shown as 101 + i.
        assert_eq!(image.get_pixel(0, 0).0, gray(101));
        assert_eq!(image.get_pixel(3, 0).0, gray(104));
        assert_eq!(image.get_pixel(0, 1).0, gray(105));
    }

    #[test]
    fn sagittal_view_cuts_across_slices() {
        let dataset = fixtures::axial_stack(3, 1.0, 4, 2);
        let camera = Camera::from_volume(dataset.volume().unwrap(), ViewType::Sagittal);
        // Sagittal cut: y runs over 2 rows, z over 3 slices, shown with z up.
        let mut viewport = Viewport::new(2, 3, camera);
        viewport.set_window(127, 256);

        let image = VolumeRenderer::new().render(&dataset, &viewport).unwrap();
        // Top display row is the first slice, the bottom row the last.
        let top = image.get_pixel(0, 0).0[0];
        let bottom = image.get_pixel(0, 2).0[0];
        assert!(bottom > top + 150, "top {top} bottom {bottom}");
    }

    #[test]
    fn stack_without_volume_is_rejected() {
        let dataset = fixtures::axial_stack(1, 1.0, 2, 2);
        let viewport = Viewport::new(2, 2, Camera::from_frame(dataset.first_frame()));
        assert!(matches!(
            VolumeRenderer::new().render(&dataset, &viewport),
            Err(ViewerError::UnsupportedOperation(_))
        ));
    }
}
