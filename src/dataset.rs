use crate::error::ViewerError;
use crate::frame::Frame;
use crate::math::Vec3;
use crate::volume::Volume;

/// Ordered frames of one series together with their shared geometry.
#[derive(Debug, Clone)]
pub struct Dataset {
    frames: Vec<Frame>,
    voxel_spacing: [f64; 3],
    volume: Option<Volume>,
}

impl Dataset {
    /// Frames must already be in display order.
    pub fn new(frames: Vec<Frame>, min_volume_frames: usize) -> Result<Self, ViewerError> {
        let first = frames.first().ok_or(ViewerError::NoValidImages)?;
        let voxel_spacing = [
            first.pixel_spacing[0],
            first.pixel_spacing[1],
            first.spacing_between_slices,
        ];
        let volume = Volume::from_frames(&frames, voxel_spacing, min_volume_frames);
        if let Some(volume) = &volume {
            log::info!(
                "Volume of {:?} voxels, spacing {:?} mm",
                volume.dimensions_voxels,
                volume.voxel_spacing
            );
        }

        Ok(Self {
            frames,
            voxel_spacing,
            volume,
        })
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Get the first frame. A dataset always holds at least one.
    pub fn first_frame(&self) -> &Frame {
        &self.frames[0]
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn voxel_spacing(&self) -> [f64; 3] {
        self.voxel_spacing
    }

    pub fn volume(&self) -> Option<&Volume> {
        self.volume.as_ref()
    }

    pub fn is_3d(&self) -> bool {
        self.volume.is_some()
    }

    /// Range of positions reachable along `axis`: the volume corners for
    /// volumes, the frame centers otherwise.
    pub fn limits_along_axis(&self, axis: Vec3) -> (f64, f64) {
        let range = |points: &mut dyn Iterator<Item = Vec3>| {
            points
                .map(|p| p.dot(axis))
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                    (lo.min(v), hi.max(v))
                })
        };
        match &self.volume {
            Some(volume) => range(&mut volume.corners.iter().copied()),
            None => range(&mut self.frames.iter().map(|f| f.image_center)),
        }
    }

    /// Frame whose plane is closest to `point`. Volumes index along their
    /// stacking axis; other stacks are scanned for the smallest distance to
    /// each frame's own plane, so their order does not matter.
    pub fn find_closest_frame(&self, point: Vec3) -> &Frame {
        match &self.volume {
            Some(volume) => {
                let first = self.first_frame();
                let index = ((point - first.image_center).dot(volume.orientation[2])
                    / self.voxel_spacing[2])
                    .round()
                    .clamp(0.0, (self.frames.len() - 1) as f64);
                &self.frames[index as usize]
            }
            None => {
                let distance = |frame: &Frame| frame.plane_distance(point).abs();
                self.frames
                    .iter()
                    .min_by(|a, b| distance(a).total_cmp(&distance(b)))
                    .unwrap_or(self.first_frame())
            }
        }
    }

    /// Frame and pixel `(column, row)` holding the voxel nearest to `point`.
    /// Only volumes can be sampled at arbitrary points.
    pub fn voxel_at(&self, point: Vec3) -> Option<(&Frame, usize, usize)> {
        let [column, row, slice] = self.volume.as_ref()?.nearest_voxel(point)?;
        Some((self.frames.get(slice)?, column, row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use approx::assert_relative_eq;

    #[test]
    fn stack_limits_follow_volume_corners() {
        let dataset = fixtures::axial_stack(10, 2.0, 4, 4);
        assert!(dataset.is_3d());
        let (lo, hi) = dataset.limits_along_axis(Vec3::Z);
        assert_relative_eq!(lo, 0.0);
        assert_relative_eq!(hi, 18.0);
        let (lo, hi) = dataset.limits_along_axis(-Vec3::Z);
        assert_relative_eq!(lo, -18.0);
        assert_relative_eq!(hi, 0.0);
    }

    #[test]
    fn closest_frame_rounds_and_clamps() {
        let dataset = fixtures::axial_stack(5, 2.0, 2, 2);
        let at = |z| dataset.find_closest_frame(Vec3::new(0.5, 0.5, z)).image_position.z;
        assert_eq!(at(3.2), 4.0);
        assert_eq!(at(2.9), 2.0);
        assert_eq!(at(-10.0), 0.0);
        assert_eq!(at(100.0), 8.0);
    }

    #[test]
    fn closest_frame_in_descending_flat_stack() {
        let dataset = fixtures::stack_at(&[8.0, 6.0, 4.0, 0.0]);
        assert!(!dataset.is_3d());
        let at = |z| dataset.find_closest_frame(Vec3::new(0.5, 0.5, z)).image_position.z;
        assert_eq!(at(8.4), 8.0);
        assert_eq!(at(5.2), 6.0);
        assert_eq!(at(1.5), 0.0);
        assert_eq!(at(-3.0), 0.0);
    }

    #[test]
    fn voxel_lookup_uses_frame_orientation() {
        let dataset = fixtures::axial_stack(3, 1.0, 3, 2);
        let (frame, column, row) = dataset.voxel_at(Vec3::new(2.0, 1.0, 1.1)).unwrap();
        assert_eq!(frame.image_position.z, 1.0);
        assert_eq!((column, row), (2, 1));
        assert_eq!(frame.rescaled_value(column, row), Some(105));
        assert!(dataset.voxel_at(Vec3::new(2.0, 1.0, 3.0)).is_none());
    }

    #[test]
    fn single_frame_is_not_3d() {
        let dataset = fixtures::axial_stack(1, 1.0, 2, 2);
        assert!(!dataset.is_3d());
        assert!(dataset.voxel_at(Vec3::ZERO).is_none());
        assert_eq!(dataset.limits_along_axis(Vec3::Z), (0.0, 0.0));
    }
}
