use std::path::Path;
use std::time::Duration;

use image::RgbaImage;
use web_time::Instant;

use crate::camera::Camera;
use crate::config::ViewerConfig;
use crate::coordinates::DisplayTransform;
use crate::dataset::Dataset;
use crate::enums::{MouseButton, RendererKind, ViewType};
use crate::error::ViewerError;
use crate::loader::DatasetLoader;
use crate::render::RenderBackend;
use crate::tools::{self, ToolContext, Toolbox};
use crate::viewport::Viewport;

/// A dataset on screen: viewport, render backend and interaction state.
#[derive(Debug)]
pub struct Viewer {
    dataset: Dataset,
    viewport: Viewport,
    backend: RenderBackend,
    toolbox: Toolbox,
    view_type: ViewType,
    last_image: Option<RgbaImage>,
}

impl Viewer {
    pub async fn new(dataset: Dataset, width: u32, height: u32) -> Self {
        Self::with_config(dataset, width, height, ViewerConfig::default()).await
    }

    pub async fn with_config(
        dataset: Dataset,
        width: u32,
        height: u32,
        config: ViewerConfig,
    ) -> Self {
        let backend = RenderBackend::create(config.renderer, &dataset).await;
        let (camera, view_type) = initial_camera(&dataset, &backend, config.initial_view);

        let first = dataset.first_frame();
        let mut viewport = Viewport::new(width, height, camera);
        viewport.set_window(first.window_center, first.window_width);

        let left = config
            .left_tool
            .unwrap_or_else(|| Toolbox::default_left_tool(&dataset));
        let toolbox = Toolbox::new(left, config.right_tool, config.tools);

        log::info!(
            "Showing {} frames with the {:?} renderer in {view_type} view",
            dataset.len(),
            backend.kind()
        );
        Self {
            dataset,
            viewport,
            backend,
            toolbox,
            view_type,
            last_image: None,
        }
    }

    /// Load every `.dcm` file of a directory and show it.
    pub async fn open_directory(
        path: impl AsRef<Path>,
        width: u32,
        height: u32,
        config: ViewerConfig,
    ) -> Result<Self, ViewerError> {
        let dataset = DatasetLoader::load_from_directory(path, config.load)?;
        Ok(Self::with_config(dataset, width, height, config).await)
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn view_type(&self) -> ViewType {
        self.view_type
    }

    pub fn renderer(&self) -> RendererKind {
        self.backend.kind()
    }

    pub fn toolbox(&self) -> &Toolbox {
        &self.toolbox
    }

    pub fn toolbox_mut(&mut self) -> &mut Toolbox {
        &mut self.toolbox
    }

    pub fn needs_render(&self) -> bool {
        self.viewport.is_dirty() || self.last_image.is_none()
    }

    /// Current image, rendered again only when the viewport changed.
    pub fn render(&mut self) -> Result<&RgbaImage, ViewerError> {
        if self.needs_render() {
            let image = self.backend.render(&self.dataset, &self.viewport)?;
            self.viewport.mark_clean();
            self.last_image = Some(image);
        }
        self.last_image
            .as_ref()
            .ok_or_else(|| ViewerError::UnsupportedOperation("nothing rendered".into()))
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport.set_size(width, height);
    }

    /// Point the camera along a named view. Only volumes shown by the volume
    /// renderer can change view.
    pub fn set_view_type(&mut self, view_type: ViewType) -> Result<(), ViewerError> {
        let volume = match (&self.backend, self.dataset.volume()) {
            (RenderBackend::Volume(_), Some(volume)) => volume,
            _ => {
                return Err(ViewerError::UnsupportedOperation(format!(
                    "cannot switch to {view_type} view without the volume renderer"
                )));
            }
        };
        let mut camera = Camera::from_volume(volume, view_type);
        camera.set_field_of_view(camera.base_field_of_view() / self.viewport.camera().zoom_ratio());
        self.viewport.set_camera(camera);
        self.view_type = view_type;
        Ok(())
    }

    /// Back to the initial camera, pan and zoom. The window is kept.
    pub fn reset_view(&mut self, initial_view: ViewType) {
        let (camera, view_type) = initial_camera(&self.dataset, &self.backend, initial_view);
        self.viewport.set_camera(camera);
        self.viewport.set_pan(0.0, 0.0);
        self.viewport.set_zoom(1.0);
        self.view_type = view_type;
    }

    /// Mapping between patient points and viewport pixels for the current
    /// state.
    pub fn display_transform(&self) -> Result<DisplayTransform, ViewerError> {
        let slice = self
            .backend
            .slice_dimensions(&self.dataset, self.viewport.camera())?;
        Ok(DisplayTransform::new(&self.viewport, &slice))
    }

    fn fit_zoom(&self) -> f64 {
        self.backend
            .slice_dimensions(&self.dataset, self.viewport.camera())
            .map(|slice| tools::fit_zoom(&self.viewport, &slice))
            .unwrap_or(1.0)
    }

    pub fn pointer_down(
        &mut self,
        button: MouseButton,
        position: (f64, f64),
    ) -> Result<(), ViewerError> {
        let context = ToolContext {
            dataset: &self.dataset,
            renders_whole_frames: self.backend.renders_whole_frames(),
            fit_zoom: self.fit_zoom(),
        };
        self.toolbox
            .pointer_down(button, position, &self.viewport, &context)
    }

    pub fn pointer_move(&mut self, position: (f64, f64)) -> Result<(), ViewerError> {
        if !self.toolbox.is_active() {
            return Ok(());
        }
        let context = ToolContext {
            dataset: &self.dataset,
            renders_whole_frames: self.backend.renders_whole_frames(),
            fit_zoom: 1.0,
        };
        if let Some(view_type) = self
            .toolbox
            .pointer_move(position, &mut self.viewport, &context)?
        {
            if view_type != self.view_type {
                log::debug!("View changed to {view_type}");
            }
            self.view_type = view_type;
        }
        Ok(())
    }

    pub fn pointer_up(&mut self, button: MouseButton) {
        self.toolbox.pointer_up(button);
    }
}

fn initial_camera(
    dataset: &Dataset,
    backend: &RenderBackend,
    view: ViewType,
) -> (Camera, ViewType) {
    match (backend, dataset.volume()) {
        (RenderBackend::Volume(_), Some(volume)) => (Camera::from_volume(volume, view), view),
        _ => {
            let first = dataset.first_frame();
            (Camera::from_frame(first), tools::classify_view(first.image_normal))
        }
    }
}

const STATS_WINDOW: Duration = Duration::from_millis(500);

/// Frame rate and render time over the last completed window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderStats {
    pub frames_per_second: f64,
    pub mean_render_ms: f64,
}

/// Drives rendering from the display's refresh callback.
#[derive(Debug)]
pub struct RenderLoop {
    window_start: Instant,
    frames: u32,
    render_time: Duration,
    stats: RenderStats,
}

impl Default for RenderLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderLoop {
    pub fn new() -> Self {
        Self {
            window_start: Instant::now(),
            frames: 0,
            render_time: Duration::ZERO,
            stats: RenderStats::default(),
        }
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// One refresh. Does nothing without a viewer, while inactive or when
    /// the viewer is up to date. Returns whether a new image was produced.
    pub fn tick(&mut self, viewer: Option<&mut Viewer>, active: bool) -> Result<bool, ViewerError> {
        let Some(viewer) = viewer else {
            return Ok(false);
        };
        if !active || !viewer.needs_render() {
            return Ok(false);
        }

        let started = Instant::now();
        viewer.render()?;
        self.record(started.elapsed());
        Ok(true)
    }

    fn record(&mut self, render_time: Duration) {
        self.frames += 1;
        self.render_time += render_time;

        let elapsed = self.window_start.elapsed();
        if elapsed >= STATS_WINDOW {
            self.stats = RenderStats {
                frames_per_second: self.frames as f64 / elapsed.as_secs_f64(),
                mean_render_ms: self.render_time.as_secs_f64() * 1000.0 / self.frames as f64,
            };
            log::debug!(
                "{:.1} fps, {:.2} ms per render",
                self.stats.frames_per_second,
                self.stats.mean_render_ms
            );
            self.window_start = Instant::now();
            self.frames = 0;
            self.render_time = Duration::ZERO;
        }
    }
}
