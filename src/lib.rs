//! # DICOM-viewport library
//!
//! This crate is the geometry and rendering engine of a DICOM viewer. It
//! turns DICOM instances into frames placed in patient space, keeps a
//! virtual camera over them and renders what the camera sees into RGBA
//! images.
//!
//! This library is part of the dicom-rs ecosystem and consumes parsed
//! objects from it. Instances are decoded in parallel using rayon, and a
//! stack of consistent frames becomes a volume that can be cut along any
//! plane:
//!  - Axial
//!  - Coronal
//!  - Sagittal
//!  - Oblique, reached by free trackball rotation
//!
//! Three render backends are available. The frame renderer shows stored
//! frames head-on, the volume renderer resamples the volume at any
//! orientation and the GPU renderer runs the frame renderer's windowing in
//! a WGPU compute shader. Interaction tools (paging, pan, zoom, window/level
//! and rotation) mutate the viewport from pointer gestures.
//!
//! Supported pixel data:
//!   - MONOCHROME1/MONOCHROME2 with 8 or 16 bits, signed or unsigned
//!   - RGB with 8 bits, interleaved or planar
//!   - Single and multi-frame instances, including per-frame and shared
//!     functional groups
//!   - Native (uncompressed) transfer syntaxes only
//!
//! # Examples
//!
//! ## Rendering the center of a volume
//!
//! To read all DICOM files from the dicom/ directory, sort them by
//! InstanceNumber and render a sagittal cut through the volume center.
//!
//! ```no_run
//! # use dicom_viewport::{RendererKind, SortBy, ViewType, Viewer, ViewerConfig};
//! # async fn run() -> Result<(), dicom_viewport::ViewerError> {
//! let config = ViewerConfig::default()
//!     .with_renderer(RendererKind::Volume)
//!     .with_initial_view(ViewType::Sagittal)
//!     .with_sort_by(SortBy::InstanceNumber);
//! let mut viewer = Viewer::open_directory("dicom", 512, 512, config).await?;
//! let image = viewer.render()?;
//! image.save("result.png").expect("should have written the image");
//! # Ok(())
//! # }
//! ```
//!
//! ## Paging through a stack
//!
//! ```no_run
//! # use dicom_viewport::{DatasetLoader, MouseButton, SortBy, Viewer};
//! # async fn run() -> Result<(), dicom_viewport::ViewerError> {
//! let dataset = DatasetLoader::load_from_directory("dicom", SortBy::SliceLocation)?;
//! let mut viewer = Viewer::new(dataset, 512, 512).await;
//! viewer.pointer_down(MouseButton::Left, (256.0, 256.0))?;
//! viewer.pointer_move((256.0, 200.0))?;
//! viewer.pointer_up(MouseButton::Left);
//! let image = viewer.render()?;
//! # Ok(())
//! # }
//! ```

pub mod attributes;
pub mod camera;
pub mod config;
pub mod coordinates;
pub mod dataset;
pub mod enums;
pub mod error;
pub mod frame;
pub mod loader;
pub mod math;
pub mod normalizer;
pub mod render;
pub mod resolver;
pub mod tools;
pub mod viewer;
pub mod viewport;
pub mod volume;

#[cfg(test)]
mod fixtures;

pub use camera::{Camera, CameraBasis};
pub use config::{LoadOptions, ToolSettings, ViewerConfig};
pub use dataset::Dataset;
pub use enums::{MouseButton, MouseTool, RendererKind, SortBy, ViewType};
pub use error::ViewerError;
pub use frame::Frame;
pub use loader::DatasetLoader;
pub use math::Vec3;
pub use render::RenderBackend;
pub use viewer::{RenderLoop, RenderStats, Viewer};
pub use viewport::Viewport;
pub use volume::Volume;
