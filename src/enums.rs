use std::fmt;

/// Named camera orientations. `Oblique` marks any direction reached by
/// free rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewType {
    #[default]
    Axial,
    Coronal,
    Sagittal,
    Oblique,
}

impl fmt::Display for ViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViewType::Axial => "axial",
            ViewType::Coronal => "coronal",
            ViewType::Sagittal => "sagittal",
            ViewType::Oblique => "oblique",
        };
        f.write_str(name)
    }
}

/// Rendering strategy used by a viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RendererKind {
    /// Resolve the frame under the camera and blit it.
    #[default]
    Frame,
    /// Resample an arbitrary plane through the volume.
    Volume,
    /// Window the resolved frame in a compute shader.
    Gpu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    /// Per-instance frame identifier (SOP instance UID, then frame index).
    #[default]
    Identifier,
    InstanceNumber,
    SliceLocation,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotometricInterpretation {
    Monochrome1,
    Monochrome2,
    Rgb,
}

impl PhotometricInterpretation {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "MONOCHROME1" => Some(Self::Monochrome1),
            "MONOCHROME2" => Some(Self::Monochrome2),
            "RGB" => Some(Self::Rgb),
            _ => None,
        }
    }
}

/// Sample layout of a frame as stored in the source instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Rgb,
}

impl SampleFormat {
    /// Bytes per stored pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            SampleFormat::Int8 | SampleFormat::Uint8 => 1,
            SampleFormat::Int16 | SampleFormat::Uint16 => 2,
            SampleFormat::Rgb => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseTool {
    Paging,
    Pan,
    Rotate,
    Windowing,
    Zoom,
}
