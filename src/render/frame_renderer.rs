use image::RgbaImage;

use crate::dataset::Dataset;
use crate::error::ViewerError;
use crate::frame::{Frame, PixelData};
use crate::render::lut::VoiLut;
use crate::render::properties::RenderingProperties;
use crate::render::raster::{self, BACKGROUND, blank_canvas, gray};
use crate::resolver;
use crate::viewport::Viewport;
use crate::volume::SliceDimensions;

/// Renders the frame under the camera as stored, pixel for pixel.
#[derive(Debug, Default)]
pub struct FrameRenderer {
    lut: Option<VoiLut>,
}

impl FrameRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(
        &mut self,
        dataset: &Dataset,
        viewport: &Viewport,
    ) -> Result<RgbaImage, ViewerError> {
        let mut canvas = blank_canvas(viewport.width(), viewport.height());
        let frame = resolver::find_frame(dataset, viewport.camera())?;
        resolver::validate_camera_2d(frame, viewport.camera())?;

        let properties =
            RenderingProperties::compute(viewport, &SliceDimensions::from_frame(frame));
        if !properties.is_image_in_viewport() {
            return Ok(canvas);
        }

        match &frame.pixel_data {
            PixelData::Int16(_) => {
                let lut = VoiLut::ensure(&mut self.lut, viewport.window_width());
                let (left, right) = (properties.left_limit, properties.right_limit);
                raster::rasterize(&properties, &mut canvas, |column, row| {
                    shade_gray(frame, lut, left, right, column, row)
                });
            }
            PixelData::Rgb(_) => {
                raster::rasterize(&properties, &mut canvas, |column, row| {
                    frame
                        .rgb_value(column, row)
                        .map_or(BACKGROUND.0, |[r, g, b]| [r, g, b, 255])
                });
            }
        }

        Ok(canvas)
    }
}

#[inline]
pub(crate) fn shade_gray(
    frame: &Frame,
    lut: &VoiLut,
    left: i32,
    right: i32,
    column: usize,
    row: usize,
) -> [u8; 4] {
    frame
        .rescaled_value(column, row)
        .map_or(BACKGROUND.0, |raw| gray(lut.intensity(raw, left, right)))
}
