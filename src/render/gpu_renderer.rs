use std::borrow::Cow;

use image::RgbaImage;
use wgpu::{PollType, util::DeviceExt};

use crate::dataset::Dataset;
use crate::error::ViewerError;
use crate::frame::{Frame, PixelData};
use crate::render::properties::{PixelRect, RenderingProperties};
use crate::render::raster::blank_canvas;
use crate::resolver;
use crate::viewport::Viewport;
use crate::volume::SliceDimensions;

const WORKGROUP_SIZE: u32 = 8;

/// Device and queue shared by GPU work.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Request the default adapter and a device on it.
    pub async fn request() -> Result<Self, ViewerError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await
            .map_err(|err| ViewerError::BackendUnavailable(err.to_string()))?;
        log::info!("Using GPU adapter {}", adapter.get_info().name);
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Viewport Device"),
                ..Default::default()
            })
            .await
            .map_err(|err| ViewerError::BackendUnavailable(err.to_string()))?;
        Ok(Self { device, queue })
    }
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    output_width: u32,
    output_height: u32,
    image_width: u32,
    is_rgb: u32,
    window_center: i32,
    window_width: i32,
    rescale_slope: f32,
    rescale_intercept: f32,
}

/// Samples of the last rendered frame, kept on the device until another
/// frame is shown.
struct FrameSamples {
    frame_id: String,
    buffer: wgpu::Buffer,
}

/// Frame renderer running rescale, windowing and nearest scaling in a
/// compute shader.
pub struct GpuRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    samples: Option<FrameSamples>,
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl GpuRenderer {
    pub fn new(gpu: GpuContext) -> Self {
        let GpuContext { device, queue } = gpu;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Windowing Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!(
                "shaders/windowing.wgsl"
            ))),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Windowing Bind Group Layout"),
            entries: &[
                // Frame samples
                storage_entry(0, true),
                // Column and row lookup
                storage_entry(1, true),
                // Output pixels
                storage_entry(2, false),
                // Uniforms
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Windowing Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Windowing Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            samples: None,
        }
    }

    pub async fn create() -> Result<Self, ViewerError> {
        Ok(Self::new(GpuContext::request().await?))
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
        let Some(bounded) = properties.bounded_space else {
            return Ok(canvas);
        };

        self.upload_samples(frame);
        let pixels = self.run(frame, viewport, &properties, bounded)?;

        let row_bytes = bounded.width() * 4;
        let canvas_width = canvas.width() as usize;
        let target: &mut [u8] = &mut canvas;
        for (index, source) in pixels.chunks_exact(row_bytes).enumerate() {
            let y = bounded.y0 as usize + index;
            let start = (y * canvas_width + bounded.x0 as usize) * 4;
            target[start..start + row_bytes].copy_from_slice(source);
        }
        Ok(canvas)
    }

    fn upload_samples(&mut self, frame: &Frame) {
        if self
            .samples
            .as_ref()
            .is_some_and(|cached| cached.frame_id == frame.id)
        {
            return;
        }
        if let Some(previous) = self.samples.take() {
            previous.buffer.destroy();
        }

        let samples = pack_samples(frame);
        log::trace!("Uploading {} samples of frame {}", samples.len(), frame.id);
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Frame Samples Buffer"),
                contents: bytemuck::cast_slice(&samples),
                usage: wgpu::BufferUsages::STORAGE,
            });
        self.samples = Some(FrameSamples {
            frame_id: frame.id.clone(),
            buffer,
        });
    }

    /// Shade the `bounded` rectangle and read it back as RGBA bytes.
    fn run(
        &self,
        frame: &Frame,
        viewport: &Viewport,
        properties: &RenderingProperties,
        bounded: PixelRect,
    ) -> Result<Vec<u8>, ViewerError> {
        let samples = self
            .samples
            .as_ref()
            .ok_or_else(|| ViewerError::BackendUnavailable("frame samples not uploaded".into()))?;

        let output_width = bounded.width() as u32;
        let output_height = bounded.height() as u32;
        let uniforms = Uniforms {
            output_width,
            output_height,
            image_width: frame.columns as u32,
            is_rgb: frame.pixel_data.is_rgb() as u32,
            window_center: viewport.window_center(),
            window_width: viewport.window_width(),
            rescale_slope: frame.rescale_slope as f32,
            rescale_intercept: frame.rescale_intercept as f32,
        };
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Uniform Buffer"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let lookup: Vec<u32> = (bounded.x0..=bounded.x1)
            .map(|x| properties.image_x(x) as u32)
            .chain((bounded.y0..=bounded.y1).map(|y| properties.image_y(y) as u32))
            .collect();
        let lookup_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Lookup Buffer"),
                contents: bytemuck::cast_slice(&lookup),
                usage: wgpu::BufferUsages::STORAGE,
            });

        let output_size = (output_width * output_height) as u64 * std::mem::size_of::<u32>() as u64;
        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Output Buffer"),
            size: output_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Staging Buffer"),
            size: output_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Windowing Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: samples.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lookup_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: output_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: uniform_buffer.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Windowing Encoder"),
            });
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Windowing Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, &bind_group, &[]);
            compute_pass.dispatch_workgroups(
                output_width.div_ceil(WORKGROUP_SIZE),
                output_height.div_ceil(WORKGROUP_SIZE),
                1,
            );
        }
        encoder.copy_buffer_to_buffer(&output_buffer, 0, &staging_buffer, 0, output_size);
        self.queue.submit(Some(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device
            .poll(PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map_err(|err| ViewerError::BackendUnavailable(err.to_string()))?;
        futures::executor::block_on(receiver)
            .map_err(|_| ViewerError::BackendUnavailable("buffer mapping was cancelled".into()))?
            .map_err(|err| ViewerError::BackendUnavailable(err.to_string()))?;

        let data = buffer_slice.get_mapped_range();
        let pixels = data.to_vec();
        drop(data);
        staging_buffer.unmap();
        output_buffer.destroy();
        staging_buffer.destroy();
        Ok(pixels)
    }
}

impl Drop for GpuRenderer {
    fn drop(&mut self) {
        if let Some(samples) = self.samples.take() {
            samples.buffer.destroy();
        }
    }
}

impl std::fmt::Debug for GpuRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuRenderer")
            .field("frame", &self.samples.as_ref().map(|s| &s.frame_id))
            .finish_non_exhaustive()
    }
}

/// Row-major samples as the shader reads them: stored values for
/// monochrome frames, rescaled on the device, and `0x00BBGGRR` for colour
/// ones.
fn pack_samples(frame: &Frame) -> Vec<i32> {
    match &frame.pixel_data {
        PixelData::Int16(samples) => samples.iter().map(|&v| i32::from(v)).collect(),
        PixelData::Rgb(_) => {
            let mut samples = Vec::with_capacity(frame.rows * frame.columns);
            for row in 0..frame.rows {
                for column in 0..frame.columns {
                    let value = frame.rgb_value(column, row).map_or(0, |[r, g, b]| {
                        i32::from(r) | i32::from(g) << 8 | i32::from(b) << 16
                    });
                    samples.push(value);
                }
            }
            samples
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::fixtures;
    use crate::render::frame_renderer::FrameRenderer;

    #[test]
    fn colour_samples_pack_little_endian() {
        use crate::enums::SortBy;
        use crate::fixtures::InstanceBuilder;
        use crate::loader::DatasetLoader;

        let object = InstanceBuilder::new("5.1", 1, 1)
            .rgb(false)
            .pixel_bytes(vec![1, 2, 3])
            .build();
        let dataset = DatasetLoader::load_from_instances(&[object], SortBy::Identifier).unwrap();
        assert_eq!(pack_samples(dataset.first_frame()), vec![0x030201]);
    }

    #[test]
    fn monochrome_samples_stay_unscaled() {
        let dataset = fixtures::axial_stack(1, 1.0, 3, 2);
        let mut frame = dataset.first_frame().clone();
        frame.rescale_slope = 2.0;
        frame.rescale_intercept = -1000.0;
        assert_eq!(pack_samples(&frame), vec![0, 1, 2, 3, 4, 5]);
    }

    /// Shader float math may round a window step differently.
    fn assert_within_one(actual: &RgbaImage, expected: &RgbaImage) {
        assert_eq!(actual.dimensions(), expected.dimensions());
        for (a, e) in actual.pixels().zip(expected.pixels()) {
            for (x, y) in a.0.iter().zip(e.0.iter()) {
                assert!(x.abs_diff(*y) <= 1, "{a:?} != {e:?}");
            }
        }
    }

    #[tokio::test]
    async fn matches_cpu_frame_renderer() {
        let mut renderer = match GpuRenderer::create().await {
            Ok(renderer) => renderer,
            Err(err) => {
                eprintln!("skipping GPU comparison: {err}");
                return;
            }
        };
        let dataset = fixtures::axial_stack(2, 1.0, 5, 3);
        let mut viewport = Viewport::new(17, 9, Camera::from_frame(&dataset.frames()[1]));
        viewport.set_pan(0.1, -0.05);
        viewport.set_window(108, 12);

        let expected = FrameRenderer::new().render(&dataset, &viewport).unwrap();
        let actual = renderer.render(&dataset, &viewport).unwrap();
        assert_within_one(&actual, &expected);
    }

    #[tokio::test]
    async fn rescales_on_the_device() {
        let mut renderer = match GpuRenderer::create().await {
            Ok(renderer) => renderer,
            Err(err) => {
                eprintln!("skipping GPU comparison: {err}");
                return;
            }
        };
        let frames = fixtures::axial_stack(2, 1.0, 4, 4)
            .frames()
            .iter()
            .cloned()
            .map(|mut frame| {
                frame.rescale_slope = 2.5;
                frame.rescale_intercept = -40.0;
                frame
            })
            .collect();
        let dataset = Dataset::new(frames, 2).unwrap();
        let mut viewport = Viewport::new(8, 8, Camera::from_frame(&dataset.frames()[1]));
        viewport.set_window(230, 60);

        let expected = FrameRenderer::new().render(&dataset, &viewport).unwrap();
        let actual = renderer.render(&dataset, &viewport).unwrap();
        assert_within_one(&actual, &expected);
    }
}
