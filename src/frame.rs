use ndarray::{Array2, Array3};

use crate::enums::SampleFormat;
use crate::math::Vec3;

/// Normalized samples of one frame.
///
/// Monochrome data of any supported width is widened into `Int16` with
/// shape `(rows, columns)`. Colour data keeps its bytes as
/// `(rows, columns, 3)`.
#[derive(Debug, Clone)]
pub enum PixelData {
    Int16(Array2<i16>),
    Rgb(Array3<u8>),
}

impl PixelData {
    pub fn is_rgb(&self) -> bool {
        matches!(self, PixelData::Rgb(_))
    }
}

/// One 2D slice with its physical placement in patient space.
#[derive(Debug, Clone)]
pub struct Frame {
    /// `uid` for single-frame instances, `uid.index` inside multi-frame ones.
    pub id: String,
    pub instance_uid: String,
    pub frame_index: usize,
    pub instance_number: Option<i32>,
    pub patient_name: Option<String>,
    pub columns: usize,
    pub rows: usize,
    pub source_format: SampleFormat,
    pub pixel_data: PixelData,
    pub rescale_slope: f64,
    pub rescale_intercept: f64,
    pub window_center: i32,
    pub window_width: i32,
    /// Center of the first transmitted pixel.
    pub image_position: Vec3,
    /// Unit row direction (along columns) and column direction (along rows).
    pub image_orientation: [Vec3; 2],
    /// Millimetres between columns, then between rows.
    pub pixel_spacing: [f64; 2],
    pub image_center: Vec3,
    pub image_normal: Vec3,
    /// Physical width and height.
    pub dimensions_mm: [f64; 2],
    pub slice_location: f64,
    pub spacing_between_slices: f64,
    /// Position, orientation and spacing all came from the instance.
    pub has_explicit_geometry: bool,
}

impl Frame {
    pub fn row_direction(&self) -> Vec3 {
        self.image_orientation[0]
    }

    pub fn column_direction(&self) -> Vec3 {
        self.image_orientation[1]
    }

    pub fn is_int16(&self) -> bool {
        matches!(self.pixel_data, PixelData::Int16(_))
    }

    /// Patient-space center of pixel `(column, row)`.
    pub fn pixel_to_point(&self, column: f64, row: f64) -> Vec3 {
        self.image_position
            + self.row_direction() * (column * self.pixel_spacing[0])
            + self.column_direction() * (row * self.pixel_spacing[1])
    }

    /// Nearest pixel `(column, row)` to a point lying on this frame's plane.
    pub fn point_to_pixel(&self, point: Vec3) -> Option<(usize, usize)> {
        let offset = point - self.image_position;
        let column = (offset.dot(self.row_direction()) / self.pixel_spacing[0]).round();
        let row = (offset.dot(self.column_direction()) / self.pixel_spacing[1]).round();
        let inside = column >= 0.0
            && row >= 0.0
            && column < self.columns as f64
            && row < self.rows as f64;
        inside.then_some((column as usize, row as usize))
    }

    /// Rescaled monochrome value at `(column, row)`, floored to an integer.
    #[inline]
    pub fn rescaled_value(&self, column: usize, row: usize) -> Option<i32> {
        match &self.pixel_data {
            PixelData::Int16(samples) => {
                let raw = *samples.get([row, column])? as f64;
                Some((raw * self.rescale_slope + self.rescale_intercept).floor() as i32)
            }
            PixelData::Rgb(_) => None,
        }
    }

    #[inline]
    pub fn rgb_value(&self, column: usize, row: usize) -> Option<[u8; 3]> {
        match &self.pixel_data {
            PixelData::Rgb(samples) => Some([
                *samples.get([row, column, 0])?,
                *samples.get([row, column, 1])?,
                *samples.get([row, column, 2])?,
            ]),
            PixelData::Int16(_) => None,
        }
    }

    /// Signed distance from the frame plane to `point` along the normal.
    pub fn plane_distance(&self, point: Vec3) -> f64 {
        (point - self.image_center).dot(self.image_normal)
    }
}

#[cfg(test)]
mod tests {
    use crate::fixtures;
    use crate::math::Vec3;
    use approx::assert_relative_eq;

    #[test]
    fn pixel_point_round_trip() {
        let frame = fixtures::axial_frame("1.2.3", 4.0, 3, 2, &[0, 1, 2, 3, 4, 5]);
        let point = frame.pixel_to_point(2.0, 1.0);
        assert_relative_eq!(point.z, 4.0);
        assert_eq!(frame.point_to_pixel(point), Some((2, 1)));
        assert_eq!(frame.point_to_pixel(point + Vec3::X * 10.0), None);
    }

    #[test]
    fn rescale_floors_value() {
        let mut frame = fixtures::axial_frame("1.2.3", 0.0, 2, 1, &[3, -3]);
        frame.rescale_slope = 0.5;
        frame.rescale_intercept = 0.0;
        assert_eq!(frame.rescaled_value(0, 0), Some(1));
        assert_eq!(frame.rescaled_value(1, 0), Some(-2));
        assert_eq!(frame.rescaled_value(2, 0), None);
        assert_eq!(frame.rgb_value(0, 0), None);
    }
}
