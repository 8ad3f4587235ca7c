//! Finds the frame displayed by a camera.
//!
//! A frame matches when its center lies on the plane through the look point
//! orthogonal to the view direction, within [`MATCH_TOLERANCE`].

use crate::camera::Camera;
use crate::dataset::Dataset;
use crate::error::ViewerError;
use crate::frame::Frame;
use crate::math::Vec3;

/// Distance in mm under which a frame plane counts as the viewed plane.
pub const MATCH_TOLERANCE: f64 = 1e-3;

const COLLINEAR_TOLERANCE: f64 = 1e-6;

#[inline]
fn plane_distance(frame: &Frame, look_point: Vec3, direction: Vec3) -> f64 {
    (frame.image_center - look_point).dot(direction).abs()
}

/// Binary search assuming frames are ordered along the view direction.
///
/// Each step compares a candidate with its predecessor and keeps the half
/// holding the smaller distance. Returns `None` when the search converges
/// on a non-matching frame, which happens for unordered stacks.
pub fn binary_search_frame(frames: &[Frame], look_point: Vec3, direction: Vec3) -> Option<usize> {
    let distance = |index: usize| plane_distance(&frames[index], look_point, direction);
    let mut left = 0;
    let mut right = frames.len().checked_sub(1)?;

    while left < right {
        let mid = left + (right - left + 1) / 2;
        let current = distance(mid);
        if current < MATCH_TOLERANCE {
            return Some(mid);
        }
        let previous = distance(mid - 1);
        if previous < MATCH_TOLERANCE {
            return Some(mid - 1);
        }
        if previous < current {
            right = mid - 1;
        } else {
            left = mid;
        }
    }

    (distance(left) < MATCH_TOLERANCE).then_some(left)
}

pub fn linear_search_frame(frames: &[Frame], look_point: Vec3, direction: Vec3) -> Option<usize> {
    frames
        .iter()
        .position(|frame| plane_distance(frame, look_point, direction) < MATCH_TOLERANCE)
}

/// Index of the frame under the camera. A single-frame dataset always
/// resolves to its frame.
pub fn find_frame_index(dataset: &Dataset, camera: &Camera) -> Result<usize, ViewerError> {
    let frames = dataset.frames();
    if frames.len() == 1 {
        return Ok(0);
    }

    let look_point = camera.look_point();
    let direction = camera.direction();
    binary_search_frame(frames, look_point, direction)
        .or_else(|| {
            log::debug!("Binary frame search missed, scanning all frames");
            linear_search_frame(frames, look_point, direction)
        })
        .ok_or(ViewerError::FrameNotFound(look_point))
}

pub fn find_frame<'a>(dataset: &'a Dataset, camera: &Camera) -> Result<&'a Frame, ViewerError> {
    find_frame_index(dataset, camera).map(|index| &dataset.frames()[index])
}

/// Check that `camera` shows `frame` head-on: the view direction is
/// collinear with the frame normal and the look point lies on the frame.
pub fn validate_camera_2d(frame: &Frame, camera: &Camera) -> Result<(), ViewerError> {
    if !camera
        .direction()
        .is_collinear(frame.image_normal, COLLINEAR_TOLERANCE)
    {
        return Err(ViewerError::UnsupportedOperation(
            "camera direction is not collinear with the frame normal".into(),
        ));
    }
    if frame.plane_distance(camera.look_point()).abs() >= MATCH_TOLERANCE {
        return Err(ViewerError::UnsupportedOperation(format!(
            "look point {} is not on frame {}",
            camera.look_point(),
            frame.id
        )));
    }
    Ok(())
}
