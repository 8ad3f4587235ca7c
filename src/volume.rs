use crate::camera::CameraBasis;
use crate::frame::Frame;
use crate::math::Vec3;

const ORIENTATION_TOLERANCE: f64 = 1e-4;
/// Allowed deviation of a slice step, relative to the slice spacing.
const STEP_TOLERANCE: f64 = 1e-2;

/// Regular 3D grid formed by a consistent stack of frames.
///
/// Axes are `(row direction, column direction, stacking direction)`. The
/// stacking direction points from the first frame towards the last one, so
/// it is the frame normal up to sign.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    pub dimensions_voxels: [usize; 3],
    pub dimensions_mm: [f64; 3],
    pub voxel_spacing: [f64; 3],
    pub orientation: [Vec3; 3],
    pub first_voxel_center: Vec3,
    pub oriented_dimensions_mm: [Vec3; 3],
    pub oriented_dimensions_voxels: [Vec3; 3],
    /// Spacing of each axis relative to the column spacing.
    pub display_ratio: [f64; 3],
    /// Centers of the eight extreme voxels.
    pub corners: [Vec3; 8],
}

/// Pixel and physical extent of a volume cut along a camera basis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceDimensions {
    pub width: u32,
    pub height: u32,
    pub width_mm: f64,
    pub height_mm: f64,
    pub field_of_view: f64,
    pub width_ratio: f64,
    pub height_ratio: f64,
    /// Millimetres covered by one slice pixel along the display axes.
    pub pixel_spacing: [f64; 2],
}

impl SliceDimensions {
    /// A frame shown head-on in its stored layout.
    pub fn from_frame(frame: &Frame) -> Self {
        let [width_mm, height_mm] = frame.dimensions_mm;
        Self {
            width: frame.columns as u32,
            height: frame.rows as u32,
            width_mm,
            height_mm,
            field_of_view: height_mm,
            width_ratio: frame.pixel_spacing[0] / frame.pixel_spacing[1],
            height_ratio: 1.0,
            pixel_spacing: frame.pixel_spacing,
        }
    }
}

impl Volume {
    /// Build a volume when the frames form a regular grid. Returns `None`
    /// (and logs why) otherwise.
    pub fn from_frames(
        frames: &[Frame],
        voxel_spacing: [f64; 3],
        min_frames: usize,
    ) -> Option<Self> {
        let reject = |reason: &str| {
            log::debug!("Dataset is not a volume: {reason}");
            None
        };

        let (first, last) = match frames {
            [first, .., last] if frames.len() >= min_frames.max(2) => (first, last),
            _ => return reject("not enough frames"),
        };
        if frames.iter().any(|f| !f.is_int16()) {
            return reject("frames are not signed 16-bit monochrome");
        }
        if frames.iter().any(|f| !f.has_explicit_geometry) {
            return reject("frames without explicit geometry");
        }
        let consistent = frames.iter().all(|f| {
            f.rows == first.rows
                && f.columns == first.columns
                && f.pixel_spacing == first.pixel_spacing
                && f.row_direction().dot(first.row_direction()) > 1.0 - ORIENTATION_TOLERANCE
                && f.column_direction().dot(first.column_direction()) > 1.0 - ORIENTATION_TOLERANCE
        });
        if !consistent {
            return reject("frame dimensions, spacing or orientation differ");
        }

        let slice_spacing = voxel_spacing[2];
        let stacking = (last.image_center - first.image_center).normalize();
        if slice_spacing <= 0.0
            || stacking.dot(first.image_normal).abs() < 1.0 - ORIENTATION_TOLERANCE
        {
            return reject("frames are not stacked along their normal");
        }
        let evenly_spaced = frames.iter().enumerate().all(|(k, f)| {
            let step = (f.image_center - first.image_center).dot(stacking);
            (step - k as f64 * slice_spacing).abs() <= STEP_TOLERANCE * slice_spacing
        });
        if !evenly_spaced {
            return reject("uneven slice spacing");
        }

        Some(Self::new(
            [first.columns, first.rows, frames.len()],
            voxel_spacing,
            [first.row_direction(), first.column_direction(), stacking],
            first.image_position,
        ))
    }

    pub fn new(
        dimensions_voxels: [usize; 3],
        voxel_spacing: [f64; 3],
        orientation: [Vec3; 3],
        first_voxel_center: Vec3,
    ) -> Self {
        let dimensions_mm = [0, 1, 2].map(|i| dimensions_voxels[i] as f64 * voxel_spacing[i]);
        let oriented_dimensions_mm = [0, 1, 2].map(|i| orientation[i] * dimensions_mm[i]);
        let oriented_dimensions_voxels =
            [0, 1, 2].map(|i| orientation[i] * dimensions_voxels[i] as f64);
        let display_ratio = voxel_spacing.map(|s| s / voxel_spacing[1]);

        let extent = [0, 1, 2]
            .map(|i| orientation[i] * ((dimensions_voxels[i] as f64 - 1.0) * voxel_spacing[i]));
        let corners = std::array::from_fn(|index| {
            let mut corner = first_voxel_center;
            for (axis, edge) in extent.iter().enumerate() {
                if index & (1 << axis) != 0 {
                    corner += *edge;
                }
            }
            corner
        });

        Self {
            dimensions_voxels,
            dimensions_mm,
            voxel_spacing,
            orientation,
            first_voxel_center,
            oriented_dimensions_mm,
            oriented_dimensions_voxels,
            display_ratio,
            corners,
        }
    }

    /// Center of the voxel grid.
    pub fn center(&self) -> Vec3 {
        let half_extent = self
            .oriented_dimensions_mm
            .iter()
            .fold(Vec3::ZERO, |acc, d| acc + *d * 0.5);
        let half_voxel = (0..3).fold(Vec3::ZERO, |acc, i| {
            acc + self.orientation[i] * (self.voxel_spacing[i] * 0.5)
        });
        self.first_voxel_center + half_extent - half_voxel
    }

    /// Physical extent of the volume seen along `axis`.
    pub fn get_oriented_dimension_mm(&self, axis: Vec3) -> f64 {
        self.oriented_dimensions_mm
            .iter()
            .map(|d| d.dot(axis).abs())
            .fold(0.0, f64::max)
    }

    /// Millimetres spanned by one voxel step along `axis`.
    pub fn projected_spacing(&self, axis: Vec3) -> f64 {
        (0..3)
            .map(|i| (self.voxel_spacing[i] * self.orientation[i].dot(axis)).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// Extent of the slice a camera with `basis` cuts through the volume.
    /// Display x runs against `right` and display y along `up`.
    pub fn get_slice_dimensions(&self, basis: &CameraBasis) -> SliceDimensions {
        let spacing_x = self.projected_spacing(basis.right);
        let spacing_y = self.projected_spacing(basis.up);
        let (min_x, max_x) = self.corner_range(basis.right);
        let (min_y, max_y) = self.corner_range(basis.up);

        // Corners are voxel centers, add half a voxel on each side.
        let width_mm = max_x - min_x + spacing_x;
        let height_mm = max_y - min_y + spacing_y;
        let width = (width_mm / spacing_x).round().max(1.0) as u32;
        let height = (height_mm / spacing_y).round().max(1.0) as u32;

        SliceDimensions {
            width,
            height,
            width_mm,
            height_mm,
            field_of_view: height_mm,
            width_ratio: 1.0 / ((width as f64 / height as f64) * (height_mm / width_mm)),
            height_ratio: 1.0,
            pixel_spacing: [spacing_x, spacing_y],
        }
    }

    fn corner_range(&self, axis: Vec3) -> (f64, f64) {
        self.corners
            .iter()
            .map(|c| c.dot(axis))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            })
    }

    /// Continuous voxel coordinates `(column, row, slice)` of a patient point.
    pub fn patient_to_voxel(&self, point: Vec3) -> Vec3 {
        let offset = point - self.first_voxel_center;
        Vec3::new(
            offset.dot(self.orientation[0]) / self.voxel_spacing[0],
            offset.dot(self.orientation[1]) / self.voxel_spacing[1],
            offset.dot(self.orientation[2]) / self.voxel_spacing[2],
        )
    }

    pub fn voxel_to_patient(&self, voxel: Vec3) -> Vec3 {
        self.first_voxel_center
            + self.orientation[0] * (voxel.x * self.voxel_spacing[0])
            + self.orientation[1] * (voxel.y * self.voxel_spacing[1])
            + self.orientation[2] * (voxel.z * self.voxel_spacing[2])
    }

    /// Nearest voxel index to `point`, if inside the grid.
    pub fn nearest_voxel(&self, point: Vec3) -> Option<[usize; 3]> {
        let voxel = self.patient_to_voxel(point).to_array();
        let mut index = [0; 3];
        for axis in 0..3 {
            let v = voxel[axis].round();
            if !(0.0..self.dimensions_voxels[axis] as f64).contains(&v) {
                return None;
            }
            index[axis] = v as usize;
        }
        Some(index)
    }
}
