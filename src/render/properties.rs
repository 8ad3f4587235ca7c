use crate::render::lut::VoiLut;
use crate::viewport::Viewport;
use crate::volume::SliceDimensions;

/// Inclusive pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x0: i64,
    pub y0: i64,
    pub x1: i64,
    pub y1: i64,
}

impl PixelRect {
    pub fn width(&self) -> usize {
        (self.x1 - self.x0 + 1) as usize
    }

    pub fn height(&self) -> usize {
        (self.y1 - self.y0 + 1) as usize
    }
}

/// Where the zoomed slice lands on the viewport and which part of it is
/// visible.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderingProperties {
    pub zoom: f64,
    pub width_ratio: f64,
    pub height_ratio: f64,
    pub image_width: usize,
    pub image_height: usize,
    pub left_limit: i32,
    pub right_limit: i32,
    /// Full displayed image in viewport coordinates, possibly off-screen.
    pub viewport_space: PixelRect,
    /// Displayed image clipped to the viewport.
    pub bounded_space: Option<PixelRect>,
    /// Source pixels needed to fill `bounded_space`.
    pub image_space: Option<PixelRect>,
}

impl RenderingProperties {
    pub fn compute(viewport: &Viewport, slice: &SliceDimensions) -> Self {
        let zoom = viewport.slice_zoom(slice.height);
        let (left_limit, right_limit) =
            VoiLut::limits(viewport.window_center(), viewport.window_width());
        let viewport_width = viewport.width() as i64;
        let viewport_height = viewport.height() as i64;

        let displayed_width = (slice.width as f64 * zoom * slice.width_ratio).round() as i64;
        let displayed_height = (slice.height as f64 * zoom * slice.height_ratio).round() as i64;
        let x0 = ((viewport_width - displayed_width) as f64 / 2.0
            + viewport.delta_x() * viewport_width as f64)
            .round() as i64;
        let y0 = ((viewport_height - displayed_height) as f64 / 2.0
            + viewport.delta_y() * viewport_height as f64)
            .round() as i64;
        let viewport_space = PixelRect {
            x0,
            y0,
            x1: x0 + displayed_width - 1,
            y1: y0 + displayed_height - 1,
        };

        let bounded = PixelRect {
            x0: viewport_space.x0.max(0),
            y0: viewport_space.y0.max(0),
            x1: viewport_space.x1.min(viewport_width - 1),
            y1: viewport_space.y1.min(viewport_height - 1),
        };
        let visible = displayed_width > 0
            && displayed_height > 0
            && bounded.x0 <= bounded.x1
            && bounded.y0 <= bounded.y1;

        let mut properties = Self {
            zoom,
            width_ratio: slice.width_ratio,
            height_ratio: slice.height_ratio,
            image_width: slice.width as usize,
            image_height: slice.height as usize,
            left_limit,
            right_limit,
            viewport_space,
            bounded_space: visible.then_some(bounded),
            image_space: None,
        };
        properties.image_space = properties.bounded_space.map(|b| PixelRect {
            x0: properties.image_x(b.x0) as i64,
            y0: properties.image_y(b.y0) as i64,
            x1: properties.image_x(b.x1) as i64,
            y1: properties.image_y(b.y1) as i64,
        });
        properties
    }

    pub fn is_image_in_viewport(&self) -> bool {
        self.bounded_space.is_some()
    }

    /// Source column shown at viewport column `x`.
    #[inline]
    pub fn image_x(&self, x: i64) -> usize {
        let scale = self.zoom * self.width_ratio;
        let column = ((x - self.viewport_space.x0) as f64 / scale).floor();
        column.clamp(0.0, self.image_width.saturating_sub(1) as f64) as usize
    }

    /// Source row shown at viewport row `y`.
    #[inline]
    pub fn image_y(&self, y: i64) -> usize {
        let scale = self.zoom * self.height_ratio;
        let row = ((y - self.viewport_space.y0) as f64 / scale).floor();
        row.clamp(0.0, self.image_height.saturating_sub(1) as f64) as usize
    }
}
