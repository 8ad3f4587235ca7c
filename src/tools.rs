//! Interaction tools.
//!
//! Every tool is a pure function of the state captured when the gesture
//! started and the pointer delta since then, so replaying the same move
//! twice gives the same result. [`Toolbox`] keeps the gesture state between
//! pointer events and maps mouse buttons to tools.

use crate::camera::Camera;
use crate::config::ToolSettings;
use crate::dataset::Dataset;
use crate::enums::{MouseButton, MouseTool, ViewType};
use crate::error::ViewerError;
use crate::math::{Mat3, Vec3};
use crate::viewport::Viewport;
use crate::volume::SliceDimensions;

const AXIS_TOLERANCE: f64 = 1e-6;

/// Pan offsets after moving the pointer by `delta` pixels. Offsets that end
/// up inside the dead zone on both axes snap back to the center.
pub fn pan_offsets(
    start: (f64, f64),
    delta: (f64, f64),
    size: (u32, u32),
    settings: &ToolSettings,
) -> (f64, f64) {
    let x = start.0 + delta.0 / size.0.max(1) as f64;
    let y = start.1 + delta.1 / size.1.max(1) as f64;
    if x.abs() < settings.pan_dead_zone && y.abs() < settings.pan_dead_zone {
        (0.0, 0.0)
    } else {
        (x, y)
    }
}

/// Zoom at which the whole slice fits the viewport, never above 1.
pub fn fit_zoom(viewport: &Viewport, slice: &SliceDimensions) -> f64 {
    let width = slice.width.max(1) as f64 * slice.width_ratio;
    let fit = viewport.width() as f64 * slice.height as f64
        / (viewport.height().max(1) as f64 * width);
    fit.min(1.0)
}

/// Zoom after a vertical move of `delta_y` pixels. Dragging up zooms in.
/// `fit` is only snapped to while the image is centered.
pub fn zoom_factor(
    start: f64,
    delta_y: f64,
    height: u32,
    fit: Option<f64>,
    settings: &ToolSettings,
) -> f64 {
    let zoom = (start - delta_y * settings.zoom_sensitivity / height.max(1) as f64)
        .clamp(settings.zoom_min, settings.zoom_max);
    if (zoom - 1.0).abs() < settings.zoom_snap {
        return 1.0;
    }
    match fit {
        Some(fit) if (zoom - fit).abs() < settings.zoom_snap => fit,
        _ => zoom,
    }
}

/// `(center, width)` after moving by `delta`: vertical moves change the
/// level, horizontal moves the width.
pub fn window_level(start: (i32, i32), delta: (f64, f64), settings: &ToolSettings) -> (i32, i32) {
    let center = start.0 as f64 - delta.1 * settings.window_level_sensitivity;
    let width = start.1 as f64 + delta.0 * settings.window_width_sensitivity;
    (
        center.round() as i32,
        (width.round() as i32).max(settings.window_width_min),
    )
}

/// Move the look point `distance` mm along the view direction from
/// `start_look`, staying within the dataset.
///
/// With `snap_to_frames` the look point lands on the closest frame plane.
pub fn page_by_distance(
    camera: &mut Camera,
    dataset: &Dataset,
    start_look: Vec3,
    distance: f64,
    snap_to_frames: bool,
) {
    let direction = camera.direction();
    let (min, max) = dataset.limits_along_axis(direction);

    let mut look = start_look + direction * distance;
    let position = look.dot(direction);
    look += direction * (position.clamp(min, max) - position);

    if snap_to_frames {
        let frame = dataset.find_closest_frame(look);
        look += direction * (frame.image_center - look).dot(direction);
    }

    if look.distance(camera.look_point()) > f64::EPSILON {
        camera.translate_to(look);
    }
}

/// Paging for a vertical move of `delta_y` pixels. Dragging the full
/// viewport height moves through the whole dataset, scaled by the paging
/// sensitivity.
pub fn page(
    viewport: &mut Viewport,
    dataset: &Dataset,
    start_look: Vec3,
    delta_y: f64,
    snap_to_frames: bool,
    settings: &ToolSettings,
) {
    let (min, max) = dataset.limits_along_axis(viewport.camera().direction());
    let sensitivity = (max - min) / viewport.height().max(1) as f64 * settings.paging_sensitivity;
    page_by_distance(
        viewport.camera_mut(),
        dataset,
        start_look,
        -delta_y * sensitivity,
        snap_to_frames,
    );
}

/// Point of the virtual trackball under `cursor`, in camera coordinates
/// `(right, up, direction)`.
///
/// The cursor is projected onto the sphere facing the viewer; positions past
/// the rim are pulled back onto it.
pub fn trackball_vector(center: (f64, f64), radius: f64, cursor: (f64, f64)) -> Vec3 {
    // Display x runs against `right`, display y along `up`.
    let mut x = -(cursor.0 - center.0);
    let mut y = cursor.1 - center.1;
    let length = x.hypot(y);
    if length > radius {
        x *= radius / length;
        y *= radius / length;
    }
    let z = -(radius * radius - x * x - y * y).max(0.0).sqrt();
    Vec3::new(x, y, z)
}

/// Rotate the displayed scene by `angle` radians around the world `axis`.
///
/// The camera turns the opposite way around its look point. The field of
/// view follows the volume extent along the new up vector, keeping the user
/// zoom. Returns the view type matching the new direction.
pub fn rotate_camera(
    camera: &mut Camera,
    dataset: &Dataset,
    axis: Vec3,
    angle: f64,
) -> Result<ViewType, ViewerError> {
    let volume = dataset
        .volume()
        .ok_or_else(|| ViewerError::UnsupportedOperation("unable to rotate a 2D dataset".into()))?;

    let inverse = Mat3::rotation(axis, angle).transpose();
    let direction = inverse.mul_vec(camera.direction()).normalize();
    let up = inverse.mul_vec(camera.up()).normalize();
    let eye_distance = camera.eye_point().distance(camera.look_point());

    camera.set_eye_point(camera.look_point() - direction * eye_distance);
    camera.set_up_vector(up);
    camera.rebase_field_of_view(volume.get_oriented_dimension_mm(up));

    Ok(classify_view(direction))
}

/// Named view for a viewing direction, `Oblique` off the patient axes.
pub fn classify_view(direction: Vec3) -> ViewType {
    if direction.is_collinear(Vec3::Z, AXIS_TOLERANCE) {
        ViewType::Axial
    } else if direction.is_collinear(Vec3::Y, AXIS_TOLERANCE) {
        ViewType::Coronal
    } else if direction.is_collinear(Vec3::X, AXIS_TOLERANCE) {
        ViewType::Sagittal
    } else {
        ViewType::Oblique
    }
}

/// What the tools need to know besides the viewport.
#[derive(Debug, Clone, Copy)]
pub struct ToolContext<'a> {
    pub dataset: &'a Dataset,
    /// The active backend can only show stored frames head-on.
    pub renders_whole_frames: bool,
    /// Zoom at which the current slice fits the viewport.
    pub fit_zoom: f64,
}

#[derive(Debug, Clone, Copy)]
enum Gesture {
    Paging { start_y: f64, start_look: Vec3 },
    Pan { start: (f64, f64), start_offsets: (f64, f64) },
    Rotate { previous: Vec3 },
    Windowing { start: (f64, f64), start_window: (i32, i32) },
    Zoom { start_y: f64, start_zoom: f64, fit_zoom: f64 },
}

/// Button to tool mapping plus the gesture in progress.
#[derive(Debug, Clone)]
pub struct Toolbox {
    left: MouseTool,
    right: MouseTool,
    settings: ToolSettings,
    gesture: Option<(MouseButton, Gesture)>,
}

impl Toolbox {
    pub fn new(left: MouseTool, right: MouseTool, settings: ToolSettings) -> Self {
        Self {
            left,
            right,
            settings,
            gesture: None,
        }
    }

    /// Default left tool for a dataset: paging through stacks, windowing a
    /// single frame.
    pub fn default_left_tool(dataset: &Dataset) -> MouseTool {
        if dataset.len() > 1 {
            MouseTool::Paging
        } else {
            MouseTool::Windowing
        }
    }

    pub fn settings(&self) -> &ToolSettings {
        &self.settings
    }

    /// Tool bound to `button`. The middle button always pans.
    pub fn active_tool(&self, button: MouseButton) -> MouseTool {
        match button {
            MouseButton::Left => self.left,
            MouseButton::Middle => MouseTool::Pan,
            MouseButton::Right => self.right,
        }
    }

    pub fn select_tool(&mut self, button: MouseButton, tool: MouseTool) -> Result<(), ViewerError> {
        match button {
            MouseButton::Left => self.left = tool,
            MouseButton::Right => self.right = tool,
            MouseButton::Middle => {
                return Err(ViewerError::UnsupportedOperation(
                    "the middle button is reserved for panning".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.gesture.is_some()
    }

    /// Start a gesture, replacing any gesture in progress.
    pub fn pointer_down(
        &mut self,
        button: MouseButton,
        position: (f64, f64),
        viewport: &Viewport,
        context: &ToolContext<'_>,
    ) -> Result<(), ViewerError> {
        let gesture = match self.active_tool(button) {
            MouseTool::Paging => Gesture::Paging {
                start_y: position.1,
                start_look: viewport.camera().look_point(),
            },
            MouseTool::Pan => Gesture::Pan {
                start: position,
                start_offsets: (viewport.delta_x(), viewport.delta_y()),
            },
            MouseTool::Rotate => {
                if !context.dataset.is_3d() || context.renders_whole_frames {
                    return Err(ViewerError::UnsupportedOperation(
                        "rotation needs a volume shown by the volume renderer".into(),
                    ));
                }
                let (center, radius) = trackball(viewport);
                Gesture::Rotate {
                    previous: trackball_vector(center, radius, position),
                }
            }
            MouseTool::Windowing => Gesture::Windowing {
                start: position,
                start_window: (viewport.window_center(), viewport.window_width()),
            },
            MouseTool::Zoom => Gesture::Zoom {
                start_y: position.1,
                start_zoom: viewport.zoom(),
                fit_zoom: context.fit_zoom,
            },
        };
        log::trace!("Starting {:?} with {button:?} button", self.active_tool(button));
        self.gesture = Some((button, gesture));
        Ok(())
    }

    /// Apply the active gesture for the pointer at `position`. Returns the
    /// new view type when a rotation changed it.
    pub fn pointer_move(
        &mut self,
        position: (f64, f64),
        viewport: &mut Viewport,
        context: &ToolContext<'_>,
    ) -> Result<Option<ViewType>, ViewerError> {
        let Some((button, gesture)) = self.gesture.as_mut() else {
            return Ok(None);
        };
        let settings = &self.settings;

        match gesture {
            Gesture::Paging { start_y, start_look } => {
                page(
                    viewport,
                    context.dataset,
                    *start_look,
                    position.1 - *start_y,
                    context.renders_whole_frames || !context.dataset.is_3d(),
                    settings,
                );
            }
            Gesture::Pan { start, start_offsets } => {
                let delta = (position.0 - start.0, position.1 - start.1);
                let (x, y) = pan_offsets(
                    *start_offsets,
                    delta,
                    (viewport.width(), viewport.height()),
                    settings,
                );
                viewport.set_pan(x, y);
            }
            Gesture::Rotate { previous } => {
                let (center, radius) = trackball(viewport);
                let current = trackball_vector(center, radius, position);
                let camera = viewport.camera_mut();
                let to_world = |v: Vec3| {
                    camera.right() * v.x + camera.up() * v.y + camera.direction() * v.z
                };
                let (from, to) = (to_world(*previous), to_world(current));
                let axis = from.cross(to);
                let angle = from.angle(to);
                if axis.length() == 0.0 || angle == 0.0 {
                    return Ok(None);
                }
                let view = rotate_camera(camera, context.dataset, axis.normalize(), angle)?;
                *previous = current;
                log::trace!("Rotated {button:?} gesture by {angle:.4} rad");
                return Ok(Some(view));
            }
            Gesture::Windowing { start, start_window } => {
                let delta = (position.0 - start.0, position.1 - start.1);
                let (center, width) = window_level(*start_window, delta, settings);
                viewport.set_window(center, width);
            }
            Gesture::Zoom {
                start_y,
                start_zoom,
                fit_zoom,
            } => {
                let centered = viewport.delta_x() == 0.0 && viewport.delta_y() == 0.0;
                let zoom = zoom_factor(
                    *start_zoom,
                    position.1 - *start_y,
                    viewport.height(),
                    centered.then_some(*fit_zoom),
                    settings,
                );
                viewport.set_zoom(zoom);
            }
        }
        Ok(None)
    }

    /// End the gesture started by `button`.
    pub fn pointer_up(&mut self, button: MouseButton) {
        if self.gesture.as_ref().is_some_and(|(active, _)| *active == button) {
            self.gesture = None;
        }
    }
}

fn trackball(viewport: &Viewport) -> ((f64, f64), f64) {
    let (width, height) = (viewport.width() as f64, viewport.height() as f64);
    ((width / 2.0, height / 2.0), width.min(height) / 2.0)
}
