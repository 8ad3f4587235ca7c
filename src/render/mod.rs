//! Rendering of the viewport into RGBA images.
//!
//! Three interchangeable backends share the same geometry
//! ([`RenderingProperties`]) and windowing ([`VoiLut`]):
//!  - [`FrameRenderer`] shows stored frames on the CPU
//!  - [`VolumeRenderer`] resamples the volume at any orientation
//!  - [`GpuRenderer`] shows stored frames through a compute shader

pub mod frame_renderer;
pub mod gpu_renderer;
pub mod lut;
pub mod properties;
pub mod raster;
pub mod volume_renderer;

use image::RgbaImage;

pub use frame_renderer::FrameRenderer;
pub use gpu_renderer::{GpuContext, GpuRenderer};
pub use lut::VoiLut;
pub use properties::{PixelRect, RenderingProperties};
pub use volume_renderer::VolumeRenderer;

use crate::camera::Camera;
use crate::dataset::Dataset;
use crate::enums::RendererKind;
use crate::error::ViewerError;
use crate::resolver;
use crate::viewport::Viewport;
use crate::volume::SliceDimensions;

#[derive(Debug)]
pub enum RenderBackend {
    Frame(FrameRenderer),
    Volume(VolumeRenderer),
    Gpu(GpuRenderer),
}

impl RenderBackend {
    /// Create the requested backend. Volume rendering falls back to frames
    /// for datasets that do not form a volume, GPU rendering falls back to
    /// frames when no device is available.
    pub async fn create(kind: RendererKind, dataset: &Dataset) -> Self {
        match kind {
            RendererKind::Frame => RenderBackend::Frame(FrameRenderer::new()),
            RendererKind::Volume if dataset.is_3d() => RenderBackend::Volume(VolumeRenderer::new()),
            RendererKind::Volume => {
                log::warn!("Dataset is not a volume, using the frame renderer");
                RenderBackend::Frame(FrameRenderer::new())
            }
            RendererKind::Gpu => match GpuRenderer::create().await {
                Ok(renderer) => RenderBackend::Gpu(renderer),
                Err(err) => {
                    log::warn!("{err}, using the frame renderer");
                    RenderBackend::Frame(FrameRenderer::new())
                }
            },
        }
    }

    pub fn kind(&self) -> RendererKind {
        match self {
            RenderBackend::Frame(_) => RendererKind::Frame,
            RenderBackend::Volume(_) => RendererKind::Volume,
            RenderBackend::Gpu(_) => RendererKind::Gpu,
        }
    }

    /// Whether the backend can only show stored frames head-on.
    pub fn renders_whole_frames(&self) -> bool {
        !matches!(self, RenderBackend::Volume(_))
    }

    pub fn render(
        &mut self,
        dataset: &Dataset,
        viewport: &Viewport,
    ) -> Result<RgbaImage, ViewerError> {
        if viewport.width() == 0 || viewport.height() == 0 {
            return Ok(RgbaImage::new(viewport.width(), viewport.height()));
        }
        match self {
            RenderBackend::Frame(renderer) => renderer.render(dataset, viewport),
            RenderBackend::Volume(renderer) => renderer.render(dataset, viewport),
            RenderBackend::Gpu(renderer) => renderer.render(dataset, viewport),
        }
    }

    /// Dimensions of the slice this backend shows for `camera`.
    pub fn slice_dimensions(
        &self,
        dataset: &Dataset,
        camera: &Camera,
    ) -> Result<SliceDimensions, ViewerError> {
        match (self, dataset.volume()) {
            (RenderBackend::Volume(_), Some(volume)) => {
                Ok(volume.get_slice_dimensions(camera.basis()))
            }
            _ => resolver::find_frame(dataset, camera).map(SliceDimensions::from_frame),
        }
    }
}
